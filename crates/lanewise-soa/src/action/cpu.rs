//! Lowerings for a vector CPU target: native rounding and transcendental helpers, the
//! integer and bit families, and 64-bit integer arithmetic.

use lanewise_vec::{BinaryOp, CompareOp, Ordering, TernaryOp, UnaryOp};

use super::{Action, ActionTable, Emit, ZeroDivisor};
use crate::opcode::Opcode;

pub(super) fn install(table: &mut ActionTable) {
    use CompareOp::*;
    use Opcode::*;

    // NaN compares false everywhere except "not equal".
    let ord = Ordering::Ordered;
    let uno = Ordering::Unordered;

    let overrides = [
        (Rcp, Emit::Unary(UnaryOp::Rcp)),
        (Rsq, Emit::RsqrtAbs),
        (Flr, Emit::Unary(UnaryOp::Floor)),
        (Ceil, Emit::Unary(UnaryOp::Ceil)),
        (Round, Emit::Unary(UnaryOp::Round)),
        (Trunc, Emit::Unary(UnaryOp::Trunc)),
        (Ssg, Emit::Unary(UnaryOp::Sign)),
        (Ex2, Emit::Unary(UnaryOp::Exp2)),
        (Lg2, Emit::Unary(UnaryOp::Log2)),
        (Sin, Emit::Unary(UnaryOp::Sin)),
        (Cos, Emit::Unary(UnaryOp::Cos)),
        (Arl, Emit::FloorToInt),
        (Cmp, Emit::SelectNegative),
        (Slt, Emit::CompareFloat(Lt, ord)),
        (Sge, Emit::CompareFloat(Ge, ord)),
        (Seq, Emit::CompareFloat(Eq, ord)),
        (Sne, Emit::CompareFloat(Ne, uno)),
        (Sgt, Emit::CompareFloat(Gt, ord)),
        (Sle, Emit::CompareFloat(Le, ord)),
        (Fseq, Emit::CompareMask(Eq, ord)),
        (Fsne, Emit::CompareMask(Ne, uno)),
        (Fslt, Emit::CompareMask(Lt, ord)),
        (Fsge, Emit::CompareMask(Ge, ord)),
        (F2i, Emit::Convert),
        (I2f, Emit::Convert),
        // 32-bit integer.
        (Uadd, Emit::Binary(BinaryOp::Add)),
        (Udiv, Emit::GuardedDiv(BinaryOp::Div, ZeroDivisor::AllOnes)),
        (Umod, Emit::GuardedDiv(BinaryOp::Rem, ZeroDivisor::AllOnes)),
        (Idiv, Emit::GuardedDiv(BinaryOp::Div, ZeroDivisor::Zero)),
        (Mod, Emit::GuardedDiv(BinaryOp::Rem, ZeroDivisor::AllOnes)),
        (Imax, Emit::Binary(BinaryOp::Max)),
        (Imin, Emit::Binary(BinaryOp::Min)),
        (Umax, Emit::Binary(BinaryOp::Max)),
        (Umin, Emit::Binary(BinaryOp::Min)),
        (Ineg, Emit::Unary(UnaryOp::Neg)),
        (Iabs, Emit::Unary(UnaryOp::Abs)),
        (Issg, Emit::Unary(UnaryOp::Sign)),
        (Shl, Emit::Binary(BinaryOp::Shl)),
        (Ishr, Emit::Binary(BinaryOp::Shr)),
        (Ushr, Emit::Binary(BinaryOp::Shr)),
        (And, Emit::Binary(BinaryOp::And)),
        (Or, Emit::Binary(BinaryOp::Or)),
        (Xor, Emit::Binary(BinaryOp::Xor)),
        (Not, Emit::Unary(UnaryOp::Not)),
        (Useq, Emit::CompareMask(Eq, ord)),
        (Usne, Emit::CompareMask(Ne, ord)),
        (Uslt, Emit::CompareMask(Lt, ord)),
        (Usge, Emit::CompareMask(Ge, ord)),
        (Islt, Emit::CompareMask(Lt, ord)),
        (Isge, Emit::CompareMask(Ge, ord)),
        (Ucmp, Emit::SelectNonZero),
        (Popc, Emit::Unary(UnaryOp::Popcount)),
        (Lsb, Emit::Unary(UnaryOp::FindLsb)),
        (Imsb, Emit::Unary(UnaryOp::FindMsb)),
        (Umsb, Emit::Unary(UnaryOp::FindMsb)),
        (Ibfe, Emit::Ternary(TernaryOp::BitfieldExtract)),
        (Ubfe, Emit::Ternary(TernaryOp::BitfieldExtract)),
        (Bfi, Emit::BitfieldInsert),
        (Brev, Emit::Unary(UnaryOp::BitReverse)),
        (UmulLoHi, Emit::MulLoHi),
        // Double precision.
        (Dabs, Emit::Unary(UnaryOp::Abs)),
        (Dneg, Emit::Unary(UnaryOp::Neg)),
        (Dsqrt, Emit::Unary(UnaryOp::Sqrt)),
        (Drsq, Emit::Unary(UnaryOp::Rsqrt)),
        (Dseq, Emit::CompareMask(Eq, ord)),
        (Dsne, Emit::CompareMask(Ne, uno)),
        (Dslt, Emit::CompareMask(Lt, ord)),
        (Dsge, Emit::CompareMask(Ge, ord)),
        // 64-bit integer.
        (U64Add, Emit::Binary(BinaryOp::Add)),
        (U64Div, Emit::GuardedDiv(BinaryOp::Div, ZeroDivisor::AllOnes)),
        (I64Div, Emit::GuardedDiv(BinaryOp::Div, ZeroDivisor::Zero)),
        (U64Mod, Emit::GuardedDiv(BinaryOp::Rem, ZeroDivisor::AllOnes)),
        (I64Mod, Emit::GuardedDiv(BinaryOp::Rem, ZeroDivisor::AllOnes)),
        (U64Shl, Emit::WideShift(BinaryOp::Shl)),
        (I64Shr, Emit::WideShift(BinaryOp::Shr)),
        (U64Shr, Emit::WideShift(BinaryOp::Shr)),
        (I64Abs, Emit::Unary(UnaryOp::Abs)),
        (I64Neg, Emit::Unary(UnaryOp::Neg)),
        (I64Ssg, Emit::Unary(UnaryOp::Sign)),
        (U64Seq, Emit::CompareMask(Eq, ord)),
        (U64Sne, Emit::CompareMask(Ne, ord)),
        (U64Slt, Emit::CompareMask(Lt, ord)),
        (U64Sge, Emit::CompareMask(Ge, ord)),
        (I64Slt, Emit::CompareMask(Lt, ord)),
        (I64Sge, Emit::CompareMask(Ge, ord)),
        (U64Min, Emit::Binary(BinaryOp::Min)),
        (U64Max, Emit::Binary(BinaryOp::Max)),
        (I64Min, Emit::Binary(BinaryOp::Min)),
        (I64Max, Emit::Binary(BinaryOp::Max)),
    ];
    for (opcode, emit) in overrides {
        table.set(opcode, Action::per_channel(emit));
    }
}
