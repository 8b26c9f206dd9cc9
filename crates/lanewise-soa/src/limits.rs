//! Centralized structural bounds for SoA translation.
//!
//! Instruction streams are treated as untrusted. These bounds keep the mask stacks, the call
//! stack and loop re-walking finite for pathological inputs.

/// Maximum nesting depth per call frame for each of conditionals, loops and switches.
pub(crate) const MAX_NESTING: usize = 80;

/// Maximum simultaneous call frames: 32 levels of subroutine nesting plus the entry function.
pub(crate) const MAX_CALL_FRAMES: usize = 33;

/// Initial value of each loop's iteration limiter. The back-edge is not taken once it reaches
/// zero, even if lanes are still active.
pub(crate) const MAX_LOOP_ITERATIONS: i32 = 65_535;

/// Highest register index accepted for the classes the register file allocates storage for.
pub(crate) const MAX_REGISTER_INDEX: u32 = 4095;

/// Temporaries at or above this count are kept in a dynamically indexed array instead of
/// individual slots.
pub(crate) const MAX_INLINED_TEMPS: u32 = 128;

/// Immediates at or above this count are kept in a dynamically indexed array.
pub(crate) const MAX_INLINED_IMMEDIATES: u32 = 256;

/// Geometry-stage vertex bound used when a program does not declare one.
pub(crate) const DEFAULT_MAX_OUTPUT_VERTICES: u32 = 32;
