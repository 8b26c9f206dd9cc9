//! Lowerings that only need fetched operands and the builder.

use lanewise_vec::{BinaryOp, CompareOp, ElemKind, Ordering, TernaryOp, UnaryOp};

use super::{Emit, ZeroDivisor};
use crate::builder::{BuildError, TargetBuilder};

/// Operands and results of one action invocation.
pub(crate) struct EmitData<V> {
    pub args: Vec<V>,
    /// Channel being computed; `0` for replicated and vector opcodes.
    pub chan: usize,
    pub dst_kind: ElemKind,
    pub output: [Option<V>; 4],
    /// Second destination, for opcodes that produce two registers.
    pub output_hi: [Option<V>; 4],
}

impl<V> EmitData<V> {
    pub(crate) fn new(dst_kind: ElemKind) -> Self {
        Self {
            args: Vec::new(),
            chan: 0,
            dst_kind,
            output: [None, None, None, None],
            output_hi: [None, None, None, None],
        }
    }

    fn arg(&self, index: usize) -> Result<&V, BuildError> {
        self.args
            .get(index)
            .ok_or(BuildError::Unsupported("operand missing for action"))
    }
}

fn float<B: TargetBuilder>(b: &mut B, kind: ElemKind, value: f64) -> Result<B::Value, BuildError> {
    let bits = if kind == ElemKind::F64 {
        value.to_bits()
    } else {
        (value as f32).to_bits() as u64
    };
    b.splat(kind, bits)
}

/// Reinterprets `v` as `kind` when both are 32-bit or both are 64-bit.
fn coerce<B: TargetBuilder>(b: &mut B, v: &B::Value, kind: ElemKind) -> Result<B::Value, BuildError> {
    let have = b.kind_of(v);
    if have == kind || have.is_wide() != kind.is_wide() || have == ElemKind::Mask {
        Ok(v.clone())
    } else {
        b.bitcast(v, kind)
    }
}

pub(crate) fn emit_arith<B: TargetBuilder>(
    b: &mut B,
    emit: Emit,
    data: &mut EmitData<B::Value>,
) -> Result<(), BuildError> {
    let chan = data.chan;
    let result = match emit {
        Emit::Move => data.arg(0)?.clone(),
        Emit::Unary(op) => b.unary(op, data.arg(0)?)?,
        Emit::Binary(op) => {
            let a = data.arg(0)?;
            let kind = b.kind_of(a);
            let rhs = coerce(b, data.arg(1)?, kind)?;
            b.binary(op, a, &rhs)?
        }
        Emit::Ternary(op) => {
            let a = data.arg(0)?;
            let kind = b.kind_of(a);
            let y = coerce(b, data.arg(1)?, kind)?;
            let z = coerce(b, data.arg(2)?, kind)?;
            b.ternary(op, a, &y, &z)?
        }
        Emit::CompareMask(op, ordering) => {
            let m = b.compare(op, ordering, data.arg(0)?, data.arg(1)?)?;
            b.bitcast(&m, ElemKind::U32)?
        }
        Emit::CompareFloat(op, ordering) => {
            let m = b.compare(op, ordering, data.arg(0)?, data.arg(1)?)?;
            let one = float(b, ElemKind::F32, 1.0)?;
            let zero = float(b, ElemKind::F32, 0.0)?;
            b.select(&m, &one, &zero)?
        }
        Emit::Convert => b.convert(data.arg(0)?, data.dst_kind)?,
        Emit::Dot => {
            let n = data.args.len() / 2;
            let mut acc = b.binary(BinaryOp::Mul, data.arg(0)?, data.arg(n)?)?;
            for i in 1..n {
                let term = b.binary(BinaryOp::Mul, data.arg(i)?, data.arg(n + i)?)?;
                acc = b.binary(BinaryOp::Add, &acc, &term)?;
            }
            acc
        }
        Emit::Lerp => {
            // a * b + (1 - a) * c, as (b - c) * a + c
            let diff = b.binary(BinaryOp::Sub, data.arg(1)?, data.arg(2)?)?;
            let scaled = b.binary(BinaryOp::Mul, &diff, data.arg(0)?)?;
            b.binary(BinaryOp::Add, &scaled, data.arg(2)?)?
        }
        Emit::Fraction => {
            let x = data.arg(0)?;
            let floor = b.unary(UnaryOp::Floor, x)?;
            b.binary(BinaryOp::Sub, x, &floor)?
        }
        Emit::FloorToInt => {
            let floor = b.unary(UnaryOp::Floor, data.arg(0)?)?;
            b.convert(&floor, ElemKind::I32)?
        }
        Emit::RoundToInt => {
            let round = b.unary(UnaryOp::Round, data.arg(0)?)?;
            b.convert(&round, ElemKind::I32)?
        }
        Emit::Reciprocal(inner) => {
            let x = data.arg(0)?;
            let x = match inner {
                Some(op) => b.unary(op, x)?,
                None => x.clone(),
            };
            let kind = b.kind_of(&x);
            let one = float(b, kind, 1.0)?;
            b.binary(BinaryOp::Div, &one, &x)?
        }
        Emit::RsqrtAbs => {
            let abs = b.unary(UnaryOp::Abs, data.arg(0)?)?;
            b.unary(UnaryOp::Rsqrt, &abs)?
        }
        Emit::SelectNegative => {
            let x = data.arg(0)?;
            let kind = b.kind_of(x);
            let zero = float(b, kind, 0.0)?;
            let negative = b.compare(CompareOp::Lt, Ordering::Ordered, x, &zero)?;
            b.select(&negative, data.arg(1)?, data.arg(2)?)?
        }
        Emit::SelectNonZero => {
            let x = data.arg(0)?;
            let kind = b.kind_of(x);
            let zero = b.splat(kind, 0)?;
            let set = b.compare(CompareOp::Ne, Ordering::Ordered, x, &zero)?;
            b.select(&set, data.arg(1)?, data.arg(2)?)?
        }
        Emit::GuardedDiv(op, on_zero) => {
            let a = data.arg(0)?;
            let kind = b.kind_of(a);
            let divisor = coerce(b, data.arg(1)?, kind)?;
            let zero = b.splat(kind, 0)?;
            let ones = b.splat(kind, kind.ones())?;
            let by_zero = b.compare(CompareOp::Eq, Ordering::Ordered, &divisor, &zero)?;
            let guard = b.select(&by_zero, &ones, &zero)?;
            let divisor = b.binary(BinaryOp::Or, &divisor, &guard)?;
            let quotient = b.binary(op, a, &divisor)?;
            match on_zero {
                ZeroDivisor::AllOnes => b.binary(BinaryOp::Or, &quotient, &guard)?,
                ZeroDivisor::Zero => {
                    let keep = b.unary(UnaryOp::Not, &guard)?;
                    b.binary(BinaryOp::And, &quotient, &keep)?
                }
            }
        }
        Emit::BitfieldInsert => {
            let base = data.arg(0)?;
            let insert = data.arg(1)?;
            let offset = data.arg(2)?;
            let bits = data.arg(3)?;
            let one = b.splat(ElemKind::U32, 1)?;
            let ones = b.splat(ElemKind::U32, ElemKind::U32.ones())?;
            let thirty_two = b.splat(ElemKind::U32, 32)?;
            let full = b.compare(CompareOp::Ge, Ordering::Ordered, bits, &thirty_two)?;
            let low = b.binary(BinaryOp::Shl, &one, bits)?;
            let low = b.binary(BinaryOp::Sub, &low, &one)?;
            let width = b.select(&full, &ones, &low)?;
            let field = b.binary(BinaryOp::Shl, &width, offset)?;
            let hole = b.unary(UnaryOp::Not, &field)?;
            let kept = b.binary(BinaryOp::And, base, &hole)?;
            let moved = b.binary(BinaryOp::Shl, insert, offset)?;
            let moved = b.binary(BinaryOp::And, &moved, &field)?;
            b.binary(BinaryOp::Or, &kept, &moved)?
        }
        Emit::WideShift(op) => {
            let a = data.arg(0)?;
            let kind = b.kind_of(a);
            let count = b.convert(data.arg(1)?, kind)?;
            b.binary(op, a, &count)?
        }
        Emit::MulLoHi => {
            let a = data.arg(0)?;
            let rhs = data.arg(1)?;
            let lo = b.binary(BinaryOp::Mul, a, rhs)?;
            let hi = b.binary(BinaryOp::MulHi, a, rhs)?;
            data.output_hi[chan] = Some(hi);
            lo
        }
        Emit::PackHalf => {
            let lo = b.unary(UnaryOp::PackHalf, data.arg(0)?)?;
            let hi = b.unary(UnaryOp::PackHalf, data.arg(1)?)?;
            let sixteen = b.splat(ElemKind::U32, 16)?;
            let hi = b.binary(BinaryOp::Shl, &hi, &sixteen)?;
            b.binary(BinaryOp::Or, &lo, &hi)?
        }
        Emit::UnpackHalf => {
            let packed = data.arg(0)?;
            let sixteen = b.splat(ElemKind::U32, 16)?;
            let lo = b.unary(UnaryOp::UnpackHalf, packed)?;
            let upper = b.binary(BinaryOp::Shr, packed, &sixteen)?;
            let hi = b.unary(UnaryOp::UnpackHalf, &upper)?;
            data.output = [Some(lo.clone()), Some(hi.clone()), Some(lo), Some(hi)];
            return Ok(());
        }
        Emit::Exp => {
            let x = data.arg(0)?;
            let floor = b.unary(UnaryOp::Floor, x)?;
            let whole = b.unary(UnaryOp::Exp2, &floor)?;
            let fract = b.binary(BinaryOp::Sub, x, &floor)?;
            let full = b.unary(UnaryOp::Exp2, x)?;
            let one = float(b, ElemKind::F32, 1.0)?;
            data.output = [Some(whole), Some(fract), Some(full), Some(one)];
            return Ok(());
        }
        Emit::Log => {
            let abs = b.unary(UnaryOp::Abs, data.arg(0)?)?;
            let log = b.unary(UnaryOp::Log2, &abs)?;
            let floor = b.unary(UnaryOp::Floor, &log)?;
            let scale = b.unary(UnaryOp::Exp2, &floor)?;
            let mantissa = b.binary(BinaryOp::Div, &abs, &scale)?;
            let one = float(b, ElemKind::F32, 1.0)?;
            data.output = [Some(floor), Some(mantissa), Some(log), Some(one)];
            return Ok(());
        }
        Emit::Lit => {
            let (x, y, w) = (data.arg(0)?, data.arg(1)?, data.arg(2)?);
            let zero = float(b, ElemKind::F32, 0.0)?;
            let one = float(b, ElemKind::F32, 1.0)?;
            let diffuse = b.binary(BinaryOp::Max, x, &zero)?;
            let specular = b.binary(BinaryOp::Max, y, &zero)?;
            let specular = b.binary(BinaryOp::Pow, &specular, w)?;
            let facing_away = b.compare(CompareOp::Lt, Ordering::Ordered, x, &zero)?;
            let specular = b.select(&facing_away, &zero, &specular)?;
            data.output = [Some(one.clone()), Some(diffuse), Some(specular), Some(one)];
            return Ok(());
        }
        Emit::Distance => {
            let one = float(b, ElemKind::F32, 1.0)?;
            let y = b.binary(BinaryOp::Mul, data.arg(0)?, data.arg(2)?)?;
            data.output = [
                Some(one),
                Some(y),
                Some(data.arg(1)?.clone()),
                Some(data.arg(3)?.clone()),
            ];
            return Ok(());
        }
        Emit::Flow(_)
        | Emit::Kill
        | Emit::KillIf
        | Emit::Texture(_)
        | Emit::EmitVertex
        | Emit::EndPrimitive
        | Emit::Load
        | Emit::Store
        | Emit::End
        | Emit::Nop => {
            return Err(BuildError::Unsupported(
                "context action has no arithmetic lowering",
            ))
        }
    };
    data.output[chan] = Some(result);
    Ok(())
}
