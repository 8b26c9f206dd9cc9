//! Per-lane execution mask for structured control flow.
//!
//! The active set of lanes is the conjunction of up to five masks:
//!
//! ```text
//! exec = cond & (cont & break)? & switch? & ret?
//! ```
//!
//! where each optional term only participates while some call frame has an open construct of
//! that kind (or, for `ret`, while a subroutine is active or `main` returned conditionally).
//! Conditionals, loops and switches keep their saved masks per call frame; the masks
//! themselves are global so that lanes disabled by a caller stay disabled inside the callee.

use std::collections::BTreeMap;

use lanewise_vec::{BinaryOp, CompareOp, ElemKind, Ordering, UnaryOp};
use tracing::{debug, warn};

use crate::builder::{BackEdge, BuildError, TargetBuilder};
use crate::config::DepthPolicy;
use crate::error::{Construct, TranslateError};
use crate::limits::{MAX_CALL_FRAMES, MAX_LOOP_ITERATIONS, MAX_NESTING};
use crate::opcode::Opcode;
use crate::program::{InstrIndex, Program};

/// Where the driver continues after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Next,
    JumpTo(InstrIndex),
    Call {
        target: InstrIndex,
        return_to: InstrIndex,
    },
    Return {
        to: InstrIndex,
    },
    Terminate,
}

/// Which construct a `BRK` leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakTarget {
    Loop,
    Switch,
}

struct LoopScope<B: TargetBuilder> {
    saved_cont: B::Value,
    saved_break: B::Value,
    saved_target: BreakTarget,
    break_var: B::Var,
    limiter: B::Var,
    header: B::Label,
    body: InstrIndex,
}

struct SwitchScope<B: TargetBuilder> {
    saved_switch: B::Value,
    saved_value: Option<B::Value>,
    saved_default: B::Value,
    saved_in_default: bool,
    saved_deferred: Option<InstrIndex>,
    saved_target: BreakTarget,
}

struct Frame<B: TargetBuilder> {
    conds: Vec<B::Value>,
    loops: Vec<LoopScope<B>>,
    switches: Vec<SwitchScope<B>>,
    break_target: BreakTarget,
    /// Selector of the innermost open switch.
    switch_value: Option<B::Value>,
    /// Lanes matched by any `CASE` of the innermost open switch.
    switch_default: B::Value,
    in_default: bool,
    /// Start of a deferred `DEFAULT` body, then the `ENDSWITCH` to return to once it has been
    /// replayed.
    deferred: Option<InstrIndex>,
    /// Constructs opened past the nesting bound and dropped.
    dropped: [usize; 3],
    return_to: Option<InstrIndex>,
    caller_ret: Option<B::Value>,
}

impl<B: TargetBuilder> Frame<B> {
    fn new(none: &B::Value) -> Self {
        Self {
            conds: Vec::new(),
            loops: Vec::new(),
            switches: Vec::new(),
            break_target: BreakTarget::Loop,
            switch_value: None,
            switch_default: none.clone(),
            in_default: false,
            deferred: None,
            dropped: [0; 3],
            return_to: None,
            caller_ret: None,
        }
    }

    fn is_nested(&self) -> bool {
        !self.conds.is_empty()
            || !self.loops.is_empty()
            || !self.switches.is_empty()
            || self.dropped.iter().any(|&d| d > 0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MaskCounters {
    pub depth_drops: usize,
    pub calls_dropped: usize,
    pub default_replays: usize,
    pub back_edges_taken: usize,
}

pub(crate) struct ExecMask<B: TargetBuilder> {
    policy: DepthPolicy,
    frames: Vec<Frame<B>>,
    all: B::Value,
    none: B::Value,
    cond: B::Value,
    cont: B::Value,
    brk: B::Value,
    switch: B::Value,
    ret: B::Value,
    exec: B::Value,
    has_mask: bool,
    ret_in_main: bool,
    /// Break mask and limiter of each loop, keyed by call depth and `BGNLOOP` position, so a
    /// loop entered again by an enclosing loop or a later call reuses its variables.
    loop_storage: BTreeMap<(usize, InstrIndex), (B::Var, B::Var)>,
    counters: MaskCounters,
}

impl<B: TargetBuilder> ExecMask<B> {
    pub(crate) fn new(b: &mut B, policy: DepthPolicy) -> Result<Self, BuildError> {
        let all = b.splat(ElemKind::Mask, ElemKind::Mask.ones())?;
        let none = b.splat(ElemKind::Mask, 0)?;
        Ok(Self {
            policy,
            frames: vec![Frame::new(&none)],
            cond: all.clone(),
            cont: all.clone(),
            brk: all.clone(),
            switch: all.clone(),
            ret: all.clone(),
            exec: all.clone(),
            all,
            none,
            has_mask: false,
            ret_in_main: false,
            loop_storage: BTreeMap::new(),
            counters: MaskCounters::default(),
        })
    }

    /// The active lanes, or `None` while every lane is known to be active.
    pub(crate) fn exec(&self) -> Option<&B::Value> {
        self.has_mask.then_some(&self.exec)
    }

    /// The active lanes, with "no mask" spelled as an all-active value.
    pub(crate) fn exec_or_all(&self) -> &B::Value {
        if self.has_mask {
            &self.exec
        } else {
            &self.all
        }
    }

    pub(crate) fn counters(&self) -> MaskCounters {
        self.counters
    }

    pub(crate) fn call_depth(&self) -> usize {
        self.frames.len()
    }

    fn frame(&mut self) -> &mut Frame<B> {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn update(&mut self, b: &mut B) -> Result<(), BuildError> {
        let in_cond = self.frames.iter().any(|f| !f.conds.is_empty());
        let in_loop = self.frames.iter().any(|f| !f.loops.is_empty());
        let in_switch = self.frames.iter().any(|f| !f.switches.is_empty());
        let in_call = self.frames.len() > 1 || self.ret_in_main;

        let mut exec = self.cond.clone();
        if in_loop {
            let loop_mask = b.binary(BinaryOp::And, &self.cont, &self.brk)?;
            exec = b.binary(BinaryOp::And, &exec, &loop_mask)?;
        }
        if in_switch {
            exec = b.binary(BinaryOp::And, &exec, &self.switch)?;
        }
        if in_call {
            exec = b.binary(BinaryOp::And, &exec, &self.ret)?;
        }
        self.exec = exec;
        self.has_mask = in_cond || in_loop || in_switch || in_call;
        Ok(())
    }

    fn and_not_exec(&mut self, b: &mut B, mask: &B::Value) -> Result<B::Value, BuildError> {
        let inactive = b.unary(UnaryOp::Not, &self.exec)?;
        b.binary(BinaryOp::And, mask, &inactive)
    }

    /// Records a construct opened past the nesting bound. Under [`DepthPolicy::Degrade`] the
    /// construct is dropped and its closing opcode becomes a no-op.
    fn exceeded(&mut self, construct: Construct, at: InstrIndex) -> Result<(), TranslateError> {
        match self.policy {
            DepthPolicy::Fail => Err(TranslateError::DepthExceeded {
                construct,
                limit: MAX_NESTING,
                at,
            }),
            DepthPolicy::Degrade => {
                warn!(%at, %construct, limit = MAX_NESTING, "nesting bound exceeded, dropping construct");
                self.counters.depth_drops += 1;
                self.frame().dropped[construct.slot()] += 1;
                Ok(())
            }
        }
    }

    /// Consumes one dropped level of `construct`, if any.
    fn take_dropped(&mut self, construct: Construct) -> bool {
        let dropped = &mut self.frame().dropped[construct.slot()];
        if *dropped > 0 {
            *dropped -= 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn cond_push(
        &mut self,
        b: &mut B,
        value: &B::Value,
        at: InstrIndex,
    ) -> Result<(), TranslateError> {
        if self.frame().conds.len() >= MAX_NESTING {
            return self.exceeded(Construct::Conditional, at);
        }
        let saved = self.cond.clone();
        self.frame().conds.push(saved);
        self.cond = b.binary(BinaryOp::And, &self.cond, value)?;
        Ok(self.update(b)?)
    }

    pub(crate) fn cond_invert(&mut self, b: &mut B) -> Result<(), TranslateError> {
        if self.frame().dropped[Construct::Conditional.slot()] > 0 {
            return Ok(());
        }
        let Some(prev) = self.frame().conds.last().cloned() else {
            return Ok(());
        };
        let inverted = b.unary(UnaryOp::Not, &self.cond)?;
        self.cond = b.binary(BinaryOp::And, &prev, &inverted)?;
        Ok(self.update(b)?)
    }

    pub(crate) fn cond_pop(&mut self, b: &mut B) -> Result<(), TranslateError> {
        if self.take_dropped(Construct::Conditional) {
            return Ok(());
        }
        if let Some(prev) = self.frame().conds.pop() {
            self.cond = prev;
        }
        Ok(self.update(b)?)
    }

    /// Opens a loop. The enclosing continue/break masks carry into the body so that lanes
    /// retired by an outer loop stay retired.
    pub(crate) fn bgnloop(&mut self, b: &mut B, at: InstrIndex) -> Result<(), TranslateError> {
        if self.frame().loops.len() >= MAX_NESTING {
            return self.exceeded(Construct::Loop, at);
        }
        let budget = b.splat(ElemKind::I32, MAX_LOOP_ITERATIONS as u64)?;
        let key = (self.frames.len(), at);
        let (break_var, limiter) = match self.loop_storage.get(&key) {
            Some(&(break_var, limiter)) => {
                b.store(break_var, &self.brk, None)?;
                b.store(limiter, &budget, None)?;
                (break_var, limiter)
            }
            None => {
                let vars = (b.alloca(&self.brk)?, b.alloca(&budget)?);
                self.loop_storage.insert(key, vars);
                vars
            }
        };
        let header = b.new_label();
        b.define_label(header)?;

        let scope = LoopScope {
            saved_cont: self.cont.clone(),
            saved_break: self.brk.clone(),
            saved_target: self.frame().break_target,
            break_var,
            limiter,
            header,
            body: at.next(),
        };
        let frame = self.frame();
        frame.loops.push(scope);
        frame.break_target = BreakTarget::Loop;
        self.brk = b.load(break_var)?;
        Ok(self.update(b)?)
    }

    pub(crate) fn endloop(&mut self, b: &mut B, at: InstrIndex) -> Result<Flow, TranslateError> {
        if self.take_dropped(Construct::Loop) {
            return Ok(Flow::Next);
        }
        let Some(scope) = self.frame().loops.last() else {
            return Err(TranslateError::Malformed {
                at,
                reason: "ENDLOOP without an open loop",
            });
        };
        let (break_var, limiter, header, body) =
            (scope.break_var, scope.limiter, scope.header, scope.body);
        let outer_cont = scope.saved_cont.clone();

        // Lanes that continued rejoin for the next iteration; broken lanes stay out.
        self.cont = outer_cont;
        self.update(b)?;
        b.store(break_var, &self.brk, None)?;

        let one = b.splat(ElemKind::I32, 1)?;
        let remaining = b.load(limiter)?;
        let remaining = b.binary(BinaryOp::Sub, &remaining, &one)?;
        b.store(limiter, &remaining, None)?;

        if b.loop_back_edge(&self.exec, &remaining, header)? == BackEdge::Taken {
            self.counters.back_edges_taken += 1;
            return Ok(Flow::JumpTo(body));
        }

        if let Some(scope) = self.frame().loops.pop() {
            self.cont = scope.saved_cont;
            self.brk = scope.saved_break;
            self.frame().break_target = scope.saved_target;
        }
        self.update(b)?;
        Ok(Flow::Next)
    }

    pub(crate) fn cont(&mut self, b: &mut B) -> Result<(), TranslateError> {
        let cont = self.cont.clone();
        self.cont = self.and_not_exec(b, &cont)?;
        Ok(self.update(b)?)
    }

    /// `next` is the opcode following the `BRK`; a break directly before `CASE` or `ENDSWITCH`
    /// retires every lane of the switch.
    pub(crate) fn brk(&mut self, b: &mut B, next: Option<Opcode>) -> Result<Flow, TranslateError> {
        match self.frame().break_target {
            BreakTarget::Loop => {
                let brk = self.brk.clone();
                self.brk = self.and_not_exec(b, &brk)?;
            }
            BreakTarget::Switch => {
                let unconditional = matches!(next, Some(Opcode::EndSwitch | Opcode::Case));
                let frame = self.frame();
                if frame.in_default && unconditional {
                    if let Some(resume) = frame.deferred {
                        return Ok(Flow::JumpTo(resume));
                    }
                }
                if unconditional {
                    self.switch = self.none.clone();
                } else {
                    let switch = self.switch.clone();
                    self.switch = self.and_not_exec(b, &switch)?;
                }
            }
        }
        self.update(b)?;
        Ok(Flow::Next)
    }

    pub(crate) fn switch(
        &mut self,
        b: &mut B,
        value: &B::Value,
        at: InstrIndex,
    ) -> Result<(), TranslateError> {
        if self.frame().switches.len() >= MAX_NESTING {
            return self.exceeded(Construct::Switch, at);
        }
        let saved_switch = self.switch.clone();
        let none = self.none.clone();
        let frame = self.frame();
        let scope = SwitchScope {
            saved_switch,
            saved_value: frame.switch_value.replace(value.clone()),
            saved_default: core::mem::replace(&mut frame.switch_default, none.clone()),
            saved_in_default: core::mem::replace(&mut frame.in_default, false),
            saved_deferred: frame.deferred.take(),
            saved_target: core::mem::replace(&mut frame.break_target, BreakTarget::Switch),
        };
        frame.switches.push(scope);
        self.switch = none;
        Ok(self.update(b)?)
    }

    pub(crate) fn case(&mut self, b: &mut B, value: &B::Value) -> Result<(), TranslateError> {
        let frame = self.frame();
        if frame.dropped[Construct::Switch.slot()] > 0 || frame.in_default {
            return Ok(());
        }
        let (Some(scope), Some(selector)) = (frame.switches.last(), frame.switch_value.clone())
        else {
            return Ok(());
        };
        let prev = scope.saved_switch.clone();
        let matched = b.compare(CompareOp::Eq, Ordering::Ordered, value, &selector)?;
        let frame = self.frame();
        frame.switch_default = b.binary(BinaryOp::Or, &matched, &frame.switch_default)?;
        let entered = b.binary(BinaryOp::Or, &matched, &self.switch)?;
        self.switch = b.binary(BinaryOp::And, &entered, &prev)?;
        Ok(self.update(b)?)
    }

    /// `DEFAULT` may sit anywhere among the cases. When it is the last label the mask is
    /// updated in place; otherwise its body is deferred and replayed from `ENDSWITCH` with the
    /// lanes no case claimed.
    pub(crate) fn default(
        &mut self,
        b: &mut B,
        program: &Program,
        at: InstrIndex,
    ) -> Result<Flow, TranslateError> {
        if self.frame().dropped[Construct::Switch.slot()] > 0 {
            return Ok(Flow::Next);
        }
        let Some(prev) = self.frame().switches.last().map(|s| s.saved_switch.clone()) else {
            return Ok(Flow::Next);
        };
        match next_same_level_case(program, at) {
            None => {
                let unclaimed = b.unary(UnaryOp::Not, &self.frame().switch_default)?;
                let unclaimed = b.binary(BinaryOp::Or, &unclaimed, &self.switch)?;
                self.switch = b.binary(BinaryOp::And, &prev, &unclaimed)?;
                self.frame().in_default = true;
                self.update(b)?;
                Ok(Flow::Next)
            }
            Some(case) => {
                let fallthrough = !matches!(
                    at.prev().and_then(|p| program.opcode_at(p)),
                    Some(Opcode::Brk | Opcode::Switch)
                );
                self.frame().deferred = Some(at.next());
                debug!(%at, fallthrough, "deferring default body to endswitch");
                Ok(if fallthrough {
                    Flow::Next
                } else {
                    Flow::JumpTo(case)
                })
            }
        }
    }

    pub(crate) fn endswitch(&mut self, b: &mut B, at: InstrIndex) -> Result<Flow, TranslateError> {
        if self.take_dropped(Construct::Switch) {
            return Ok(Flow::Next);
        }
        let frame = self.frame();
        if let (Some(resume), false) = (frame.deferred, frame.in_default) {
            let Some(prev) = frame.switches.last().map(|s| s.saved_switch.clone()) else {
                return Err(TranslateError::Malformed {
                    at,
                    reason: "ENDSWITCH without an open switch",
                });
            };
            let unclaimed = b.unary(UnaryOp::Not, &frame.switch_default)?;
            self.switch = b.binary(BinaryOp::And, &prev, &unclaimed)?;
            let frame = self.frame();
            frame.in_default = true;
            frame.deferred = Some(at);
            self.counters.default_replays += 1;
            self.update(b)?;
            return Ok(Flow::JumpTo(resume));
        }

        let Some(scope) = frame.switches.pop() else {
            return Err(TranslateError::Malformed {
                at,
                reason: "ENDSWITCH without an open switch",
            });
        };
        frame.switch_value = scope.saved_value;
        frame.switch_default = scope.saved_default;
        frame.in_default = scope.saved_in_default;
        frame.deferred = scope.saved_deferred;
        frame.break_target = scope.saved_target;
        self.switch = scope.saved_switch;
        self.update(b)?;
        Ok(Flow::Next)
    }

    pub(crate) fn call(
        &mut self,
        b: &mut B,
        target: InstrIndex,
        at: InstrIndex,
    ) -> Result<Flow, TranslateError> {
        if self.frames.len() >= MAX_CALL_FRAMES {
            return match self.policy {
                DepthPolicy::Fail => Err(TranslateError::CallDepthExceeded {
                    at,
                    limit: MAX_CALL_FRAMES,
                }),
                DepthPolicy::Degrade => {
                    warn!(%at, limit = MAX_CALL_FRAMES, "call stack bound exceeded, dropping call");
                    self.counters.calls_dropped += 1;
                    Ok(Flow::Next)
                }
            };
        }
        let mut frame = Frame::new(&self.none);
        frame.return_to = Some(at.next());
        frame.caller_ret = Some(self.ret.clone());
        self.frames.push(frame);
        self.update(b)?;
        Ok(Flow::Call {
            target,
            return_to: at.next(),
        })
    }

    pub(crate) fn ret(&mut self, b: &mut B) -> Result<Flow, TranslateError> {
        if self.frames.len() == 1 {
            if !self.frame().is_nested() {
                return Ok(Flow::Terminate);
            }
            // Lanes returned inside a construct of `main` must stay off after it closes.
            self.ret_in_main = true;
        }
        let ret = self.ret.clone();
        self.ret = self.and_not_exec(b, &ret)?;
        self.update(b)?;
        Ok(Flow::Next)
    }

    /// Falling into a subroutine body from `main` ends the program.
    pub(crate) fn bgnsub(&self) -> Flow {
        if self.frames.len() == 1 {
            Flow::Terminate
        } else {
            Flow::Next
        }
    }

    pub(crate) fn endsub(&mut self, b: &mut B) -> Result<Flow, TranslateError> {
        if self.frames.len() == 1 {
            return Ok(Flow::Terminate);
        }
        let Some(frame) = self.frames.pop() else {
            return Ok(Flow::Terminate);
        };
        if let Some(ret) = frame.caller_ret {
            self.ret = ret;
        }
        self.update(b)?;
        Ok(match frame.return_to {
            Some(to) => Flow::Return { to },
            None => Flow::Terminate,
        })
    }
}

/// Finds the first `CASE` of the same switch after the `DEFAULT` at `at`, skipping cases that
/// label the default body itself. `None` means `DEFAULT` is the last label.
fn next_same_level_case(program: &Program, at: InstrIndex) -> Option<InstrIndex> {
    let mut pc = at.next();
    while program.opcode_at(pc) == Some(Opcode::Case) {
        pc = pc.next();
    }
    let mut depth = 0usize;
    while let Some(opcode) = program.opcode_at(pc) {
        match opcode {
            Opcode::Case if depth == 0 => return Some(pc),
            Opcode::Switch => depth += 1,
            Opcode::EndSwitch if depth == 0 => return None,
            Opcode::EndSwitch => depth -= 1,
            _ => {}
        }
        pc = pc.next();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::LaneEvaluator;
    use crate::program::Instruction;
    use lanewise_vec::LaneVec;
    use pretty_assertions::assert_eq;

    fn at(i: u32) -> InstrIndex {
        InstrIndex::new(i)
    }

    fn active(mask: &ExecMask<LaneEvaluator>) -> Vec<bool> {
        mask.exec_or_all().to_bools()
    }

    #[test]
    fn else_only_enables_lanes_active_at_the_if() {
        let mut b = LaneEvaluator::new(4);
        let mut m = ExecMask::new(&mut b, DepthPolicy::Degrade).unwrap();
        assert!(m.exec().is_none());

        m.cond_push(&mut b, &LaneVec::from_bools(&[true, true, false, false]), at(0))
            .unwrap();
        m.cond_push(&mut b, &LaneVec::from_bools(&[true, false, true, false]), at(1))
            .unwrap();
        assert_eq!(active(&m), vec![true, false, false, false]);
        m.cond_invert(&mut b).unwrap();
        assert_eq!(active(&m), vec![false, true, false, false]);
        m.cond_pop(&mut b).unwrap();
        m.cond_pop(&mut b).unwrap();
        assert!(m.exec().is_none());
    }

    #[test]
    fn break_retires_lanes_until_the_loop_ends() {
        let mut b = LaneEvaluator::new(4);
        let mut m = ExecMask::new(&mut b, DepthPolicy::Degrade).unwrap();
        m.bgnloop(&mut b, at(0)).unwrap();
        m.cond_push(&mut b, &LaneVec::from_bools(&[true, false, false, true]), at(1))
            .unwrap();
        m.brk(&mut b, Some(Opcode::EndIf)).unwrap();
        m.cond_pop(&mut b).unwrap();
        assert_eq!(active(&m), vec![false, true, true, false]);

        m.cond_push(&mut b, &LaneVec::from_bools(&[false, true, true, false]), at(4))
            .unwrap();
        m.brk(&mut b, Some(Opcode::EndIf)).unwrap();
        m.cond_pop(&mut b).unwrap();
        assert_eq!(m.endloop(&mut b, at(6)).unwrap(), Flow::Next);
        assert!(m.exec().is_none());
    }

    #[test]
    fn reentered_loops_reuse_their_storage() {
        let mut b = LaneEvaluator::new(2);
        let mut m = ExecMask::new(&mut b, DepthPolicy::Degrade).unwrap();
        m.bgnloop(&mut b, at(0)).unwrap();
        m.bgnloop(&mut b, at(1)).unwrap();
        let allocated = b.variable_count();
        for _ in 0..3 {
            m.brk(&mut b, Some(Opcode::EndLoop)).unwrap();
            assert_eq!(m.endloop(&mut b, at(3)).unwrap(), Flow::Next);
            // Walking the outer body again re-enters the inner loop with a fresh break mask.
            m.bgnloop(&mut b, at(1)).unwrap();
            assert_eq!(active(&m), vec![true, true]);
        }
        assert_eq!(b.variable_count(), allocated);
    }

    #[test]
    fn nesting_past_the_bound_degrades_or_fails() {
        let mut b = LaneEvaluator::new(2);
        let yes = LaneVec::from_bools(&[true, true]);

        let mut m = ExecMask::new(&mut b, DepthPolicy::Degrade).unwrap();
        for i in 0..=MAX_NESTING as u32 {
            m.cond_push(&mut b, &yes, at(i)).unwrap();
        }
        assert_eq!(m.counters().depth_drops, 1);
        for _ in 0..=MAX_NESTING {
            m.cond_pop(&mut b).unwrap();
        }
        assert!(m.exec().is_none());

        let mut m = ExecMask::new(&mut b, DepthPolicy::Fail).unwrap();
        for i in 0..MAX_NESTING as u32 {
            m.cond_push(&mut b, &yes, at(i)).unwrap();
        }
        let err = m.cond_push(&mut b, &yes, at(80)).unwrap_err();
        assert_eq!(
            err,
            TranslateError::DepthExceeded {
                construct: Construct::Conditional,
                limit: MAX_NESTING,
                at: at(80)
            }
        );
    }

    #[test]
    fn calls_past_the_frame_bound_are_dropped() {
        let mut b = LaneEvaluator::new(2);
        let mut m = ExecMask::new(&mut b, DepthPolicy::Degrade).unwrap();
        for i in 0..(MAX_CALL_FRAMES - 1) as u32 {
            assert!(matches!(m.call(&mut b, at(100), at(i)).unwrap(), Flow::Call { .. }));
        }
        assert_eq!(m.call(&mut b, at(100), at(99)).unwrap(), Flow::Next);
        assert_eq!(m.counters().calls_dropped, 1);
        assert_eq!(m.call_depth(), MAX_CALL_FRAMES);
    }

    #[test]
    fn unconditional_return_from_main_terminates() {
        let mut b = LaneEvaluator::new(2);
        let mut m = ExecMask::new(&mut b, DepthPolicy::Degrade).unwrap();
        assert_eq!(m.ret(&mut b).unwrap(), Flow::Terminate);

        m.cond_push(&mut b, &LaneVec::from_bools(&[true, false]), at(0))
            .unwrap();
        assert_eq!(m.ret(&mut b).unwrap(), Flow::Next);
        m.cond_pop(&mut b).unwrap();
        assert_eq!(active(&m), vec![false, true]);
    }

    #[test]
    fn default_scan_skips_nested_switches() {
        let ops = [
            Opcode::Default,
            Opcode::Case,
            Opcode::Switch,
            Opcode::Case,
            Opcode::EndSwitch,
            Opcode::Case,
            Opcode::EndSwitch,
        ];
        let program = Program::new(ops.iter().map(|&op| Instruction::new(op)).collect(), vec![]);
        assert_eq!(next_same_level_case(&program, at(0)), Some(at(5)));
        assert_eq!(next_same_level_case(&program, at(5)), None);
    }
}
