//! Lane-wise operation enums and their scalar semantics.
//!
//! Every operation is total: integer arithmetic wraps, shift counts are masked by
//! `width - 1`, and an integer division by zero produces all bits set. The SoA action layer
//! builds its documented divide-by-zero sentinels on top of these primitives.

use half::f16;

use crate::ElemKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Abs,
    Not,
    Floor,
    Ceil,
    /// Round half to even.
    Round,
    Trunc,
    Sqrt,
    Rsqrt,
    Rcp,
    Exp2,
    Log2,
    Sin,
    Cos,
    /// -1, 0 or 1 (NaN maps to 0).
    Sign,
    Popcount,
    /// Index of the lowest set bit, all-ones when no bit is set.
    FindLsb,
    /// Index of the highest set bit (highest bit differing from the sign for signed kinds),
    /// all-ones when there is none.
    FindMsb,
    BitReverse,
    /// `f32` to IEEE half bits in the low 16 bits of a `u32`.
    PackHalf,
    /// Low 16 bits of a `u32` as IEEE half, widened to `f32`.
    UnpackHalf,
}

impl UnaryOp {
    pub const fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Abs => "abs",
            UnaryOp::Not => "not",
            UnaryOp::Floor => "floor",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Round => "round",
            UnaryOp::Trunc => "trunc",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Rsqrt => "rsqrt",
            UnaryOp::Rcp => "rcp",
            UnaryOp::Exp2 => "exp2",
            UnaryOp::Log2 => "log2",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Sign => "sign",
            UnaryOp::Popcount => "popcount",
            UnaryOp::FindLsb => "find_lsb",
            UnaryOp::FindMsb => "find_msb",
            UnaryOp::BitReverse => "bitreverse",
            UnaryOp::PackHalf => "pack_half",
            UnaryOp::UnpackHalf => "unpack_half",
        }
    }

    /// Kind of the result when applied to lanes of `input` kind.
    pub const fn result_kind(self, input: ElemKind) -> ElemKind {
        match self {
            UnaryOp::PackHalf => ElemKind::U32,
            UnaryOp::UnpackHalf => ElemKind::F32,
            _ => input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Min,
    Max,
    Pow,
    And,
    Or,
    Xor,
    Shl,
    /// Arithmetic shift for signed kinds, logical shift for unsigned kinds.
    Shr,
    /// High half of the double-width product.
    MulHi,
}

impl BinaryOp {
    pub const fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
            BinaryOp::Pow => "pow",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::MulHi => "mulhi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TernaryOp {
    /// `a * b + c` with an intermediate rounding step.
    Mad,
    /// `a * b + c` with a single rounding step.
    Fma,
    /// Extract `c` bits of `a` starting at bit `b`; sign-extends for signed kinds.
    BitfieldExtract,
}

impl TernaryOp {
    pub const fn name(self) -> &'static str {
        match self {
            TernaryOp::Mad => "mad",
            TernaryOp::Fma => "fma",
            TernaryOp::BitfieldExtract => "bfe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub const fn name(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
        }
    }

    fn holds(self, ord: core::cmp::Ordering) -> bool {
        use core::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ord == Equal,
            CompareOp::Ne => ord != Equal,
            CompareOp::Lt => ord == Less,
            CompareOp::Le => ord != Greater,
            CompareOp::Gt => ord == Greater,
            CompareOp::Ge => ord != Less,
        }
    }
}

/// NaN policy of a floating-point comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ordering {
    /// False whenever either operand is NaN.
    #[default]
    Ordered,
    /// True whenever either operand is NaN.
    Unordered,
}

macro_rules! float_lane_ops {
    ($unary:ident, $binary:ident, $ternary:ident, $compare:ident, $t:ty, $bits:ty) => {
        pub(crate) fn $unary(op: UnaryOp, a: u64) -> Option<u64> {
            let x = <$t>::from_bits(a as $bits);
            let r: $t = match op {
                UnaryOp::Neg => -x,
                UnaryOp::Abs => x.abs(),
                UnaryOp::Floor => x.floor(),
                UnaryOp::Ceil => x.ceil(),
                UnaryOp::Round => x.round_ties_even(),
                UnaryOp::Trunc => x.trunc(),
                UnaryOp::Sqrt => x.sqrt(),
                UnaryOp::Rsqrt => x.sqrt().recip(),
                UnaryOp::Rcp => x.recip(),
                UnaryOp::Exp2 => x.exp2(),
                UnaryOp::Log2 => x.log2(),
                UnaryOp::Sin => x.sin(),
                UnaryOp::Cos => x.cos(),
                UnaryOp::Sign => {
                    if x > 0.0 {
                        1.0
                    } else if x < 0.0 {
                        -1.0
                    } else {
                        0.0
                    }
                }
                _ => return None,
            };
            Some(r.to_bits() as u64)
        }

        pub(crate) fn $binary(op: BinaryOp, a: u64, b: u64) -> Option<u64> {
            let x = <$t>::from_bits(a as $bits);
            let y = <$t>::from_bits(b as $bits);
            let r: $t = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                BinaryOp::Rem => x % y,
                // NaN operands yield the other operand.
                BinaryOp::Min => x.min(y),
                BinaryOp::Max => x.max(y),
                BinaryOp::Pow => x.powf(y),
                _ => return None,
            };
            Some(r.to_bits() as u64)
        }

        pub(crate) fn $ternary(op: TernaryOp, a: u64, b: u64, c: u64) -> Option<u64> {
            let x = <$t>::from_bits(a as $bits);
            let y = <$t>::from_bits(b as $bits);
            let z = <$t>::from_bits(c as $bits);
            let r: $t = match op {
                TernaryOp::Mad => x * y + z,
                TernaryOp::Fma => x.mul_add(y, z),
                TernaryOp::BitfieldExtract => return None,
            };
            Some(r.to_bits() as u64)
        }

        pub(crate) fn $compare(op: CompareOp, ordering: Ordering, a: u64, b: u64) -> bool {
            let x = <$t>::from_bits(a as $bits);
            let y = <$t>::from_bits(b as $bits);
            match x.partial_cmp(&y) {
                Some(ord) => op.holds(ord),
                None => ordering == Ordering::Unordered,
            }
        }
    };
}

float_lane_ops!(unary_f32, binary_f32, ternary_f32, compare_f32, f32, u32);
float_lane_ops!(unary_f64, binary_f64, ternary_f64, compare_f64, f64, u64);

fn truncate(v: u64, width: u32) -> u64 {
    if width == 32 {
        v & u32::MAX as u64
    } else {
        v
    }
}

fn signed(v: u64, width: u32) -> i64 {
    if width == 32 {
        v as u32 as i32 as i64
    } else {
        v as i64
    }
}

fn all_ones(width: u32) -> u64 {
    truncate(u64::MAX, width)
}

fn msb_index(v: u64, width: u32) -> u64 {
    if v == 0 {
        all_ones(width)
    } else {
        (63 - v.leading_zeros()) as u64
    }
}

pub(crate) fn unary_int(op: UnaryOp, kind: ElemKind, a: u64) -> Option<u64> {
    let w = kind.bit_width();
    let is_signed = kind.is_signed_int();
    let r = match op {
        UnaryOp::Neg => a.wrapping_neg(),
        UnaryOp::Abs if is_signed => signed(a, w).wrapping_abs() as u64,
        UnaryOp::Abs => a,
        UnaryOp::Not => !a,
        UnaryOp::Sign if is_signed => signed(a, w).signum() as u64,
        UnaryOp::Sign => (a != 0) as u64,
        UnaryOp::Popcount => a.count_ones() as u64,
        UnaryOp::FindLsb => {
            if a == 0 {
                all_ones(w)
            } else {
                a.trailing_zeros() as u64
            }
        }
        UnaryOp::FindMsb if is_signed => {
            let v = signed(a, w);
            let probe = (if v < 0 { !v } else { v }) as u64;
            msb_index(truncate(probe, w), w)
        }
        UnaryOp::FindMsb => msb_index(a, w),
        UnaryOp::BitReverse => {
            if w == 32 {
                (a as u32).reverse_bits() as u64
            } else {
                a.reverse_bits()
            }
        }
        UnaryOp::UnpackHalf if kind == ElemKind::U32 => {
            f16::from_bits(a as u16).to_f32().to_bits() as u64
        }
        _ => return None,
    };
    Some(truncate(r, w))
}

pub(crate) fn pack_half(a: u64) -> u64 {
    f16::from_f32(f32::from_bits(a as u32)).to_bits() as u64
}

pub(crate) fn binary_int(op: BinaryOp, kind: ElemKind, a: u64, b: u64) -> Option<u64> {
    let w = kind.bit_width();
    let is_signed = kind.is_signed_int();
    let count = (b & (w as u64 - 1)) as u32;
    let r = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div | BinaryOp::Rem if truncate(b, w) == 0 => all_ones(w),
        BinaryOp::Div if is_signed => signed(a, w).wrapping_div(signed(b, w)) as u64,
        BinaryOp::Div => truncate(a, w) / truncate(b, w),
        BinaryOp::Rem if is_signed => signed(a, w).wrapping_rem(signed(b, w)) as u64,
        BinaryOp::Rem => truncate(a, w) % truncate(b, w),
        BinaryOp::Min if is_signed => signed(a, w).min(signed(b, w)) as u64,
        BinaryOp::Min => a.min(b),
        BinaryOp::Max if is_signed => signed(a, w).max(signed(b, w)) as u64,
        BinaryOp::Max => a.max(b),
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl => a << count,
        BinaryOp::Shr if is_signed => (signed(a, w) >> count) as u64,
        BinaryOp::Shr => truncate(a, w) >> count,
        BinaryOp::MulHi if w == 32 && is_signed => {
            ((signed(a, w) * signed(b, w)) >> 32) as u64
        }
        BinaryOp::MulHi if w == 32 => (truncate(a, w) * truncate(b, w)) >> 32,
        BinaryOp::MulHi if is_signed => {
            ((a as i64 as i128 * b as i64 as i128) >> 64) as u64
        }
        BinaryOp::MulHi => ((a as u128 * b as u128) >> 64) as u64,
        BinaryOp::Pow => return None,
    };
    Some(truncate(r, w))
}

pub(crate) fn ternary_int(op: TernaryOp, kind: ElemKind, a: u64, b: u64, c: u64) -> Option<u64> {
    let w = kind.bit_width();
    let r = match op {
        TernaryOp::Mad => a.wrapping_mul(b).wrapping_add(c),
        TernaryOp::BitfieldExtract => {
            let offset = (b & (w as u64 - 1)) as u32;
            // Saturate the count before narrowing.
            let bits = truncate(c, w).min(u64::from(w - offset)) as u32;
            if bits == 0 {
                0
            } else if kind.is_signed_int() {
                (((a << (64 - offset - bits)) as i64) >> (64 - bits)) as u64
            } else {
                (a >> offset) & (u64::MAX >> (64 - bits))
            }
        }
        TernaryOp::Fma => return None,
    };
    Some(truncate(r, w))
}

pub(crate) fn compare_int(op: CompareOp, kind: ElemKind, a: u64, b: u64) -> bool {
    let w = kind.bit_width();
    let ord = if kind.is_signed_int() {
        signed(a, w).cmp(&signed(b, w))
    } else {
        truncate(a, w).cmp(&truncate(b, w))
    };
    op.holds(ord)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_division_by_zero_is_all_ones() {
        assert_eq!(
            binary_int(BinaryOp::Div, ElemKind::U32, 7, 0),
            Some(0xFFFF_FFFF)
        );
        assert_eq!(
            binary_int(BinaryOp::Rem, ElemKind::U64, 7, 0),
            Some(u64::MAX)
        );
    }

    #[test]
    fn signed_division_overflow_wraps() {
        let min = i32::MIN as u32 as u64;
        let minus_one = (-1i32) as u32 as u64;
        assert_eq!(binary_int(BinaryOp::Div, ElemKind::I32, min, minus_one), Some(min));
    }

    #[test]
    fn shift_count_is_masked_by_width() {
        assert_eq!(binary_int(BinaryOp::Shl, ElemKind::U32, 1, 33), Some(2));
        let neg = (-8i32) as u32 as u64;
        assert_eq!(
            binary_int(BinaryOp::Shr, ElemKind::I32, neg, 1),
            Some((-4i32) as u32 as u64)
        );
    }

    #[test]
    fn find_msb_handles_signed_values() {
        let minus_one = (-1i32) as u32 as u64;
        assert_eq!(unary_int(UnaryOp::FindMsb, ElemKind::I32, minus_one), Some(0xFFFF_FFFF));
        let minus_two = (-2i32) as u32 as u64;
        assert_eq!(unary_int(UnaryOp::FindMsb, ElemKind::I32, minus_two), Some(0));
        assert_eq!(unary_int(UnaryOp::FindMsb, ElemKind::U32, 0x80), Some(7));
    }

    #[test]
    fn bitfield_extract_sign_extends() {
        // 0b1110_0000, take 3 bits at offset 5.
        assert_eq!(
            ternary_int(TernaryOp::BitfieldExtract, ElemKind::I32, 0xE0, 5, 3),
            Some(0xFFFF_FFFF)
        );
        assert_eq!(
            ternary_int(TernaryOp::BitfieldExtract, ElemKind::U32, 0xE0, 5, 3),
            Some(7)
        );
        assert_eq!(
            ternary_int(TernaryOp::BitfieldExtract, ElemKind::U32, 0xE0, 5, 0),
            Some(0)
        );
        assert_eq!(
            ternary_int(TernaryOp::BitfieldExtract, ElemKind::U64, u64::MAX, 8, (1 << 32) | 4),
            Some(u64::MAX >> 8)
        );
    }

    #[test]
    fn float_compare_respects_ordering() {
        let nan = f32::NAN.to_bits() as u64;
        let one = 1.0f32.to_bits() as u64;
        assert!(!compare_f32(CompareOp::Ne, Ordering::Ordered, nan, one));
        assert!(compare_f32(CompareOp::Ne, Ordering::Unordered, nan, one));
        assert!(compare_f32(CompareOp::Lt, Ordering::Ordered, 0, one));
    }

    #[test]
    fn half_packing_round_trips_representable_values() {
        let packed = pack_half(1.5f32.to_bits() as u64);
        assert_eq!(packed, 0x3E00);
        let unpacked = unary_int(UnaryOp::UnpackHalf, ElemKind::U32, packed);
        assert_eq!(unpacked, Some(1.5f32.to_bits() as u64));
    }
}
