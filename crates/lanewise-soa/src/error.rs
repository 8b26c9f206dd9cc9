use core::fmt;

use thiserror::Error;

use crate::builder::BuildError;
use crate::program::InstrIndex;
use crate::verify::VerifyError;

/// Structured construct tracked by the execution mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Construct {
    Conditional,
    Loop,
    Switch,
}

impl Construct {
    pub(crate) const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Construct::Conditional => "conditional",
            Construct::Loop => "loop",
            Construct::Switch => "switch",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("{construct} nesting exceeds {limit} levels at {at}")]
    DepthExceeded {
        construct: Construct,
        limit: usize,
        at: InstrIndex,
    },
    #[error("call at {at} exceeds {limit} call frames")]
    CallDepthExceeded { at: InstrIndex, limit: usize },
    #[error("instruction {at}: {reason}")]
    Malformed { at: InstrIndex, reason: &'static str },
}
