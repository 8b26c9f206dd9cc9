use thiserror::Error;

use crate::ElemKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VecError {
    #[error("lane count mismatch: {left} vs {right}")]
    LaneCountMismatch { left: usize, right: usize },
    #[error("element kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: ElemKind, found: ElemKind },
    #[error("cannot reinterpret {words} words as {to} lanes")]
    WidthMismatch { words: usize, to: ElemKind },
    #[error("lane {lane} holds {bits:#x}, which is not a valid mask pattern")]
    InvalidMask { lane: usize, bits: u64 },
    #[error("{op} is not defined for {kind} lanes")]
    Unsupported { op: &'static str, kind: ElemKind },
}
