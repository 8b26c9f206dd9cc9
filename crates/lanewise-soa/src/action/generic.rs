//! Portable lowerings, expressed with nothing beyond basic arithmetic and conversions.

use lanewise_vec::{BinaryOp, TernaryOp, UnaryOp};

use super::{Action, ActionTable, Emit, Fetch};
use crate::opcode::Opcode;

const DP2: &[(u8, u8)] = &[(0, 0), (0, 1), (1, 0), (1, 1)];
const DP3: &[(u8, u8)] = &[(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)];
const DP4: &[(u8, u8)] = &[(0, 0), (0, 1), (0, 2), (0, 3), (1, 0), (1, 1), (1, 2), (1, 3)];
const SRC0_X: &[(u8, u8)] = &[(0, 0)];
const SRC0_XY: &[(u8, u8)] = &[(0, 0), (0, 1)];
const LIT: &[(u8, u8)] = &[(0, 0), (0, 1), (0, 3)];
const DST: &[(u8, u8)] = &[(0, 1), (0, 2), (1, 1), (1, 3)];

pub(super) fn install(table: &mut ActionTable) {
    use Opcode::*;

    let per_channel = [
        (Mov, Emit::Move),
        (Uarl, Emit::Move),
        (Add, Emit::Binary(BinaryOp::Add)),
        (Mul, Emit::Binary(BinaryOp::Mul)),
        (Div, Emit::Binary(BinaryOp::Div)),
        (Min, Emit::Binary(BinaryOp::Min)),
        (Max, Emit::Binary(BinaryOp::Max)),
        (Mad, Emit::Ternary(TernaryOp::Mad)),
        (Fma, Emit::Ternary(TernaryOp::Fma)),
        (Lrp, Emit::Lerp),
        (Frc, Emit::Fraction),
        (Arr, Emit::RoundToInt),
        (Rcp, Emit::Reciprocal(None)),
        (Rsq, Emit::Reciprocal(Some(UnaryOp::Sqrt))),
        (Sqrt, Emit::Unary(UnaryOp::Sqrt)),
        (Pow, Emit::Binary(BinaryOp::Pow)),
        (F2u, Emit::Convert),
        (U2f, Emit::Convert),
        (Umul, Emit::Binary(BinaryOp::Mul)),
        (Umad, Emit::Ternary(TernaryOp::Mad)),
        (ImulHi, Emit::Binary(BinaryOp::MulHi)),
        (UmulHi, Emit::Binary(BinaryOp::MulHi)),
        (Dadd, Emit::Binary(BinaryOp::Add)),
        (Dmul, Emit::Binary(BinaryOp::Mul)),
        (Ddiv, Emit::Binary(BinaryOp::Div)),
        (Dmin, Emit::Binary(BinaryOp::Min)),
        (Dmax, Emit::Binary(BinaryOp::Max)),
        (Dmad, Emit::Ternary(TernaryOp::Mad)),
        (Drcp, Emit::Reciprocal(None)),
        (Dfrac, Emit::Fraction),
        (F2d, Emit::Convert),
        (D2f, Emit::Convert),
        (D2i, Emit::Convert),
        (D2u, Emit::Convert),
        (I2d, Emit::Convert),
        (U2d, Emit::Convert),
        (U64Mul, Emit::Binary(BinaryOp::Mul)),
        (F2i64, Emit::Convert),
        (F2u64, Emit::Convert),
        (D2i64, Emit::Convert),
        (D2u64, Emit::Convert),
        (I2i64, Emit::Convert),
        (U2i64, Emit::Convert),
        (I642f, Emit::Convert),
        (U642f, Emit::Convert),
        (I642d, Emit::Convert),
        (U642d, Emit::Convert),
    ];
    for (opcode, emit) in per_channel {
        table.set(opcode, Action::per_channel(emit));
    }

    table.set(Dp2, Action::new(Fetch::Channels(DP2), Emit::Dot));
    table.set(Dp3, Action::new(Fetch::Channels(DP3), Emit::Dot));
    table.set(Dp4, Action::new(Fetch::Channels(DP4), Emit::Dot));
    table.set(Exp, Action::new(Fetch::Channels(SRC0_X), Emit::Exp));
    table.set(Log, Action::new(Fetch::Channels(SRC0_X), Emit::Log));
    table.set(Lit, Action::new(Fetch::Channels(LIT), Emit::Lit));
    table.set(Dst, Action::new(Fetch::Channels(DST), Emit::Distance));
    table.set(Pk2h, Action::new(Fetch::Channels(SRC0_XY), Emit::PackHalf));
    table.set(Up2h, Action::new(Fetch::Channels(SRC0_X), Emit::UnpackHalf));
}
