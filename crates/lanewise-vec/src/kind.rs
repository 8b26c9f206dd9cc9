use core::fmt;

/// Element kind of a [`crate::LaneVec`].
///
/// Invariants:
/// - `Mask` lanes are either all bits set (active) or all bits clear (inactive).
/// - 64-bit kinds are stored as two 32-bit words per lane, low word first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElemKind {
    F32,
    F64,
    I32,
    U32,
    I64,
    U64,
    Mask,
}

impl ElemKind {
    pub const fn is_wide(self) -> bool {
        matches!(self, ElemKind::F64 | ElemKind::I64 | ElemKind::U64)
    }

    pub const fn words_per_lane(self) -> usize {
        if self.is_wide() {
            2
        } else {
            1
        }
    }

    pub const fn bit_width(self) -> u32 {
        if self.is_wide() {
            64
        } else {
            32
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, ElemKind::F32 | ElemKind::F64)
    }

    pub const fn is_signed_int(self) -> bool {
        matches!(self, ElemKind::I32 | ElemKind::I64)
    }

    pub const fn is_int(self) -> bool {
        matches!(
            self,
            ElemKind::I32 | ElemKind::U32 | ElemKind::I64 | ElemKind::U64
        )
    }

    /// All-bits-set pattern for one lane of this kind.
    pub const fn ones(self) -> u64 {
        if self.is_wide() {
            u64::MAX
        } else {
            u32::MAX as u64
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ElemKind::F32 => "f32",
            ElemKind::F64 => "f64",
            ElemKind::I32 => "i32",
            ElemKind::U32 => "u32",
            ElemKind::I64 => "i64",
            ElemKind::U64 => "u64",
            ElemKind::Mask => "mask",
        }
    }
}

impl fmt::Display for ElemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
