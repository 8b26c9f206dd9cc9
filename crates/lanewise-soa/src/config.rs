/// Which opcode action table a translation context is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActionFlavor {
    /// Portable lowerings only. Opcodes without a portable lowering fall back to undef.
    Generic,
    /// Portable lowerings plus overrides and integer/bit/64-bit families suited to a vector
    /// CPU target.
    #[default]
    Cpu,
}

/// What to do when a conditional/loop/switch nesting bound or the call-frame bound is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthPolicy {
    /// Drop the construct (or call), log a warning and keep translating.
    #[default]
    Degrade,
    /// Abort translation with [`crate::TranslateError::DepthExceeded`] or
    /// [`crate::TranslateError::CallDepthExceeded`].
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TranslateOptions {
    pub flavor: ActionFlavor,
    pub depth_policy: DepthPolicy,
    /// Emit a `trace` event for every instruction walked.
    pub trace_instructions: bool,
}

impl TranslateOptions {
    #[must_use]
    pub fn with_flavor(mut self, flavor: ActionFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    #[must_use]
    pub fn with_depth_policy(mut self, depth_policy: DepthPolicy) -> Self {
        self.depth_policy = depth_policy;
        self
    }
}
