//! Opcode action tables.
//!
//! Every opcode is bound to an [`Action`]: how its operands are fetched and which lowering
//! produces its results. Tables are plain data built per translation context, so two
//! contexts with different [`ActionFlavor`]s never share state.

mod arith;
mod cpu;
mod generic;
mod soa;

use std::collections::HashMap;

use lanewise_vec::{BinaryOp, CompareOp, Ordering, TernaryOp, UnaryOp};

use crate::config::ActionFlavor;
use crate::opcode::Opcode;

pub(crate) use arith::{emit_arith, EmitData};

/// Which operand channels an action consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// Every source at the channel being computed.
    PerChannel,
    /// Fixed `(source, channel)` pairs, in argument order.
    Channels(&'static [(u8, u8)]),
    /// The action reads its own operands.
    None,
}

/// Result of dividing by a zero lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroDivisor {
    AllOnes,
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOp {
    If,
    Uif,
    Else,
    EndIf,
    BgnLoop,
    EndLoop,
    Brk,
    Cont,
    Switch,
    Case,
    Default,
    EndSwitch,
    Cal,
    Ret,
    BgnSub,
    EndSub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLod {
    Implicit,
    Bias,
    Explicit,
    /// Coordinates divided by `w` before sampling.
    Projected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexOp {
    Sample(SampleLod),
    Fetch,
    Size,
}

/// Lowering applied by an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Ternary(TernaryOp),
    Move,
    /// Comparison written as an all-ones or zero integer.
    CompareMask(CompareOp, Ordering),
    /// Comparison written as `1.0` or `0.0`.
    CompareFloat(CompareOp, Ordering),
    /// Numeric conversion to the destination type.
    Convert,
    Dot,
    Lerp,
    Fraction,
    FloorToInt,
    RoundToInt,
    /// `1 / x`, optionally of `op(x)`.
    Reciprocal(Option<UnaryOp>),
    /// `rsqrt(|x|)`.
    RsqrtAbs,
    /// `src0 < 0 ? src1 : src2`.
    SelectNegative,
    /// `src0 != 0 ? src1 : src2`.
    SelectNonZero,
    Exp,
    Log,
    Lit,
    Distance,
    PackHalf,
    UnpackHalf,
    GuardedDiv(BinaryOp, ZeroDivisor),
    BitfieldInsert,
    /// 64-bit shift by a 32-bit count.
    WideShift(BinaryOp),
    MulLoHi,
    Flow(FlowOp),
    Kill,
    KillIf,
    Texture(TexOp),
    EmitVertex,
    EndPrimitive,
    Load,
    Store,
    End,
    Nop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub fetch: Fetch,
    pub emit: Emit,
}

impl Action {
    pub const fn new(fetch: Fetch, emit: Emit) -> Self {
        Self { fetch, emit }
    }

    pub const fn per_channel(emit: Emit) -> Self {
        Self::new(Fetch::PerChannel, emit)
    }
}

/// Opcode to [`Action`] bindings for one translation context.
#[derive(Debug, Clone)]
pub struct ActionTable {
    flavor: ActionFlavor,
    actions: HashMap<Opcode, Action>,
}

impl ActionTable {
    pub fn new(flavor: ActionFlavor) -> Self {
        let mut table = Self {
            flavor,
            actions: HashMap::new(),
        };
        generic::install(&mut table);
        if flavor == ActionFlavor::Cpu {
            cpu::install(&mut table);
        }
        soa::install(&mut table);
        table
    }

    pub fn flavor(&self) -> ActionFlavor {
        self.flavor
    }

    pub fn get(&self, opcode: Opcode) -> Option<Action> {
        self.actions.get(&opcode).copied()
    }

    /// Binds `opcode`, replacing any earlier binding.
    pub fn set(&mut self, opcode: Opcode, action: Action) {
        self.actions.insert(opcode, action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
