//! Fixed-width lane vectors used for every operand, result and predicate of the SoA translator.
//!
//! A [`LaneVec`] stores its lanes as raw 32-bit words. 64-bit element kinds occupy two adjacent
//! words per lane (low word first), which is the same paired layout the register file uses when
//! it splits 64-bit values across two channels.

#![forbid(unsafe_code)]

mod error;
mod kind;
mod lanes;
mod ops;

pub use error::VecError;
pub use kind::ElemKind;
pub use lanes::LaneVec;
pub use ops::{BinaryOp, CompareOp, Ordering, TernaryOp, UnaryOp};
