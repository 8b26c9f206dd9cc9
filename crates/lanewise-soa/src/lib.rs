//! Structure-of-arrays translation of register-based shader programs.
//!
//! A [`Program`] is a linear stream of decoded instructions operating on four-channel
//! registers. [`SoaTranslator`] lowers it for N lanes at once: every register channel becomes a
//! lane vector, structured control flow becomes an execution mask, and every store is predicated
//! on that mask so lanes diverge without branching.
//!
//! Code generation goes through the [`TargetBuilder`] seam. Two builders ship with the crate:
//!
//! - [`LaneEvaluator`] executes each request immediately, which makes the translator an
//!   interpreter over concrete lane data;
//! - [`ListingBuilder`] records a textual SSA listing.
//!
//! Instruction streams are treated as untrusted: [`verify_program`] rejects malformed structure
//! up front, numeric faults produce documented sentinel values, and the structural bounds in
//! the `limits` module keep translation finite.

#![forbid(unsafe_code)]

pub mod action;
mod builder;
mod config;
mod error;
mod eval;
mod exec_mask;
mod iface;
mod limits;
mod listing;
mod opcode;
mod program;
mod regfile;
mod translate;
mod verify;

pub use crate::action::{Action, ActionTable, Emit, Fetch};
pub use crate::builder::{BackEdge, BuildError, TargetBuilder};
pub use crate::config::{ActionFlavor, DepthPolicy, TranslateOptions};
pub use crate::error::{Construct, TranslateError};
pub use crate::eval::{ArrayId, LabelId, LaneEvaluator, VarId};
pub use crate::iface::{
    GeometryEmitter, LodControl, NullGeometry, NullSampler, SampleRequest, TextureSampler,
};
pub use crate::listing::{ListingArray, ListingBuilder, ListingLabel, ListingValue, ListingVar};
pub use crate::opcode::{Opcode, OpcodeInfo, OutputMode};
pub use crate::program::{
    DstRegister, Indirect, InstrIndex, Instruction, Program, ProgramInfo, SrcRegister,
    StorageClass, StorageClasses, Swizzle, TextureOperand, TextureTarget, TypeTag, WriteMask,
};
pub use crate::translate::{GeometryTotals, SoaTranslator, TranslateStats, Translation};
pub use crate::verify::{verify_program, VerifyError};

/// Re-exported so callers can build inputs without a direct dependency.
pub use lanewise_vec::{ElemKind, LaneVec};
