//! The target code builder seam.
//!
//! The translator never produces code itself; it drives a [`TargetBuilder`]. A builder may
//! execute each call immediately ([`crate::LaneEvaluator`]) or record it
//! ([`crate::ListingBuilder`]). The only place where the two differ observably is
//! [`TargetBuilder::loop_back_edge`].

use core::fmt;

use lanewise_vec::{BinaryOp, CompareOp, ElemKind, Ordering, TernaryOp, UnaryOp, VecError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error(transparent)]
    Vec(#[from] VecError),
    #[error("unknown {what} handle {id}")]
    UnknownHandle { what: &'static str, id: u32 },
    #[error("array access out of bounds: word {offset} of {len}")]
    OutOfBounds { offset: u64, len: usize },
    #[error("unsupported builder request: {0}")]
    Unsupported(&'static str),
}

/// Outcome of a loop back-edge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackEdge {
    /// The builder executes eagerly and at least one lane wants another iteration; the driver
    /// must walk the loop body again.
    Taken,
    /// The builder executes eagerly and the loop is finished.
    NotTaken,
    /// A conditional branch to the loop header was emitted; the driver continues linearly.
    Emitted,
}

pub trait TargetBuilder {
    type Value: Clone + fmt::Debug;
    type Var: Copy + fmt::Debug;
    type Array: Copy + fmt::Debug;
    type Label: Copy + fmt::Debug;

    fn lanes(&self) -> usize;
    fn kind_of(&self, value: &Self::Value) -> ElemKind;

    /// Every lane holds `bits` (low 32 bits for narrow kinds).
    fn splat(&mut self, kind: ElemKind, bits: u64) -> Result<Self::Value, BuildError>;
    /// `i32` lanes `[0, 1, .., lanes - 1]`.
    fn lane_ids(&mut self) -> Result<Self::Value, BuildError>;
    fn undef(&mut self, kind: ElemKind) -> Result<Self::Value, BuildError>;

    fn unary(&mut self, op: UnaryOp, a: &Self::Value) -> Result<Self::Value, BuildError>;
    fn binary(
        &mut self,
        op: BinaryOp,
        a: &Self::Value,
        b: &Self::Value,
    ) -> Result<Self::Value, BuildError>;
    fn ternary(
        &mut self,
        op: TernaryOp,
        a: &Self::Value,
        b: &Self::Value,
        c: &Self::Value,
    ) -> Result<Self::Value, BuildError>;
    /// Produces a `Mask` value.
    fn compare(
        &mut self,
        op: CompareOp,
        ordering: Ordering,
        a: &Self::Value,
        b: &Self::Value,
    ) -> Result<Self::Value, BuildError>;
    fn convert(&mut self, a: &Self::Value, to: ElemKind) -> Result<Self::Value, BuildError>;
    fn bitcast(&mut self, a: &Self::Value, to: ElemKind) -> Result<Self::Value, BuildError>;
    fn select(
        &mut self,
        mask: &Self::Value,
        a: &Self::Value,
        b: &Self::Value,
    ) -> Result<Self::Value, BuildError>;
    /// `[a0, b0, a1, b1, ..]` over two 32-bit vectors.
    fn interleave(&mut self, a: &Self::Value, b: &Self::Value)
        -> Result<Self::Value, BuildError>;
    /// Even and odd lanes of a 32-bit vector.
    fn deinterleave(&mut self, a: &Self::Value)
        -> Result<(Self::Value, Self::Value), BuildError>;

    fn alloca(&mut self, init: &Self::Value) -> Result<Self::Var, BuildError>;
    fn load(&mut self, var: Self::Var) -> Result<Self::Value, BuildError>;
    /// Stores `value`; with a predicate, inactive lanes keep their previous contents.
    fn store(
        &mut self,
        var: Self::Var,
        value: &Self::Value,
        pred: Option<&Self::Value>,
    ) -> Result<(), BuildError>;

    /// Zero-initialised array of `len` 32-bit words.
    fn alloc_array(&mut self, len: usize) -> Result<Self::Array, BuildError>;
    /// Lane `i` reads word `offsets[i]`; the result is reinterpreted as `kind`. Lanes inactive
    /// in `pred` read zero and do not access the array.
    fn gather(
        &mut self,
        array: Self::Array,
        offsets: &Self::Value,
        kind: ElemKind,
        pred: Option<&Self::Value>,
    ) -> Result<Self::Value, BuildError>;
    /// Lane `i` writes `value[i]` to word `offsets[i]` when active in `pred`.
    fn scatter(
        &mut self,
        array: Self::Array,
        offsets: &Self::Value,
        value: &Self::Value,
        pred: Option<&Self::Value>,
    ) -> Result<(), BuildError>;

    /// Shader input `index`, channel `chan`, as raw 32-bit lanes of kind `F32`.
    fn input(&mut self, index: u32, chan: usize) -> Result<Self::Value, BuildError>;
    /// Constant buffer `slot` (four words per constant) and its size in constants as an `i32`
    /// splat.
    fn constant_buffer(&mut self, slot: u32) -> Result<(Self::Array, Self::Value), BuildError>;
    /// Storage buffer `slot` and its length in words as an `i32` splat.
    fn buffer(&mut self, slot: u32) -> Result<(Self::Array, Self::Value), BuildError>;

    fn new_label(&mut self) -> Self::Label;
    fn define_label(&mut self, label: Self::Label) -> Result<(), BuildError>;
    /// Branch back to `header` while any lane of `exec` is active and the `i32` limiter is
    /// positive.
    fn loop_back_edge(
        &mut self,
        exec: &Self::Value,
        limiter: &Self::Value,
        header: Self::Label,
    ) -> Result<BackEdge, BuildError>;
}
