//! The instruction driver loop.
//!
//! [`SoaTranslator`] walks a verified [`Program`] with an explicit program counter. Each
//! instruction is dispatched through the context's [`ActionTable`]; control-flow actions
//! update the [`ExecMask`] and return the next position, everything else computes per-channel
//! results and stores them through the composite execution mask.

use lanewise_vec::{BinaryOp, CompareOp, ElemKind, Ordering, UnaryOp};
use tracing::{debug, trace, warn};

use crate::action::{
    emit_arith, ActionTable, Emit, EmitData, Fetch, FlowOp, SampleLod, TexOp,
};
use crate::builder::{BuildError, TargetBuilder};
use crate::config::TranslateOptions;
use crate::error::TranslateError;
use crate::exec_mask::{ExecMask, Flow};
use crate::iface::{GeometryEmitter, LodControl, SampleRequest, TextureSampler};
use crate::opcode::{Opcode, OutputMode};
use crate::program::{
    DstRegister, Indirect, InstrIndex, Instruction, Program, SrcRegister, StorageClass, TypeTag,
};
use crate::regfile::{RegRef, RegisterFile};
use crate::verify::verify_program;

/// Counters describing one translation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslateStats {
    /// Instructions walked, counting every re-walk of a loop body or subroutine.
    pub instructions_emitted: usize,
    /// Conditionals, loops and switches dropped at the nesting bound.
    pub depth_drops: usize,
    pub calls_dropped: usize,
    /// Instructions whose opcode had no action, or whose capability was not provided.
    pub undefined_actions: usize,
    pub deferred_default_replays: usize,
    pub back_edges_taken: usize,
}

/// Final geometry-stage counters, per lane.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryTotals<V> {
    pub total_vertices: V,
    pub primitives: V,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Translation<V> {
    /// Raw `F32` words of every output register.
    pub outputs: Vec<[V; 4]>,
    /// Lanes not killed, when the program can kill.
    pub live_mask: Option<V>,
    pub geometry: Option<GeometryTotals<V>>,
    pub stats: TranslateStats,
}

/// One translation context: a builder, options, the action table they select, and the
/// optional sampling and geometry capabilities.
pub struct SoaTranslator<'a, B: TargetBuilder> {
    builder: &'a mut B,
    options: TranslateOptions,
    actions: ActionTable,
    sampler: Option<&'a mut dyn TextureSampler<B>>,
    geometry: Option<&'a mut dyn GeometryEmitter<B>>,
}

impl<'a, B: TargetBuilder> SoaTranslator<'a, B> {
    pub fn new(builder: &'a mut B, options: TranslateOptions) -> Self {
        Self {
            builder,
            options,
            actions: ActionTable::new(options.flavor),
            sampler: None,
            geometry: None,
        }
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: &'a mut dyn TextureSampler<B>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    #[must_use]
    pub fn with_geometry(mut self, geometry: &'a mut dyn GeometryEmitter<B>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    pub fn options(&self) -> TranslateOptions {
        self.options
    }

    pub fn translate(
        &mut self,
        program: &Program,
    ) -> Result<Translation<B::Value>, TranslateError> {
        verify_program(program)?;
        debug!(
            instructions = program.len(),
            flavor = ?self.options.flavor,
            lanes = self.builder.lanes(),
            "translating program"
        );

        let b = &mut *self.builder;
        let regs = RegisterFile::new(b, program)?;
        let mask = ExecMask::new(b, self.options.depth_policy)?;
        let can_kill = program
            .instructions()
            .iter()
            .any(|inst| matches!(inst.opcode, Opcode::Kill | Opcode::KillIf));
        let live = if can_kill {
            let all = b.splat(ElemKind::Mask, ElemKind::Mask.ones())?;
            Some(b.alloca(&all)?)
        } else {
            None
        };
        let gs = if self.geometry.is_some() {
            Some(GeometryState::new(b, program.info().max_output_vertices)?)
        } else {
            None
        };

        let mut driver = Driver {
            b,
            options: self.options,
            actions: &self.actions,
            sampler: self.sampler.as_deref_mut(),
            geometry: self.geometry.as_deref_mut(),
            program,
            regs,
            mask,
            live,
            gs,
            at: InstrIndex::new(0),
            stats: TranslateStats::default(),
        };
        driver.run()?;
        driver.finish()
    }
}

/// Per-lane `U32` counters of the geometry stage.
struct GeometryState<B: TargetBuilder> {
    total: B::Var,
    vertices: B::Var,
    primitives: B::Var,
    max_vertices: u32,
}

impl<B: TargetBuilder> Clone for GeometryState<B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: TargetBuilder> Copy for GeometryState<B> {}

impl<B: TargetBuilder> GeometryState<B> {
    fn new(b: &mut B, max_vertices: u32) -> Result<Self, BuildError> {
        let zero = b.splat(ElemKind::U32, 0)?;
        Ok(Self {
            total: b.alloca(&zero)?,
            vertices: b.alloca(&zero)?,
            primitives: b.alloca(&zero)?,
            max_vertices,
        })
    }
}

struct Driver<'t, 'a, B: TargetBuilder> {
    b: &'t mut B,
    options: TranslateOptions,
    actions: &'t ActionTable,
    sampler: Option<&'t mut (dyn TextureSampler<B> + 'a)>,
    geometry: Option<&'t mut (dyn GeometryEmitter<B> + 'a)>,
    program: &'t Program,
    regs: RegisterFile<B>,
    mask: ExecMask<B>,
    /// Lanes not killed, as a `Mask`.
    live: Option<B::Var>,
    gs: Option<GeometryState<B>>,
    at: InstrIndex,
    stats: TranslateStats,
}

impl<'t, 'a, B: TargetBuilder> Driver<'t, 'a, B> {
    fn run(&mut self) -> Result<(), TranslateError> {
        let program = self.program;
        let mut pc = (!program.is_empty()).then_some(InstrIndex::new(0));
        while let Some(at) = pc {
            let Some(inst) = program.get(at) else {
                break;
            };
            pc = match self.step(at, inst)? {
                Flow::Next => Some(at.next()),
                Flow::JumpTo(to) => Some(to),
                Flow::Call { target, return_to } => {
                    trace!(%at, %target, %return_to, "entering subroutine");
                    Some(target)
                }
                Flow::Return { to } => Some(to),
                Flow::Terminate => None,
            };
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Translation<B::Value>, TranslateError> {
        let geometry = match self.gs {
            Some(gs) => Some(self.geometry_epilogue(gs)?),
            None => None,
        };
        let outputs = self.regs.outputs(self.b)?;
        let live_mask = match self.live {
            Some(live) => Some(self.b.load(live)?),
            None => None,
        };

        let counters = self.mask.counters();
        self.stats.depth_drops = counters.depth_drops;
        self.stats.calls_dropped = counters.calls_dropped;
        self.stats.deferred_default_replays = counters.default_replays;
        self.stats.back_edges_taken = counters.back_edges_taken;
        debug!(
            instructions = self.stats.instructions_emitted,
            undefined = self.stats.undefined_actions,
            depth_drops = self.stats.depth_drops,
            "translation finished"
        );
        Ok(Translation {
            outputs,
            live_mask,
            geometry,
            stats: self.stats,
        })
    }

    fn step(&mut self, at: InstrIndex, inst: &Instruction) -> Result<Flow, TranslateError> {
        self.at = at;
        self.stats.instructions_emitted += 1;
        if self.options.trace_instructions {
            trace!(%at, opcode = %inst.opcode, frames = self.mask.call_depth(), "instruction");
        }

        let Some(action) = self.actions.get(inst.opcode) else {
            warn!(
                %at,
                opcode = %inst.opcode,
                flavor = ?self.actions.flavor(),
                "no action bound for opcode, writing undefined values"
            );
            self.write_undefined(inst)?;
            return Ok(Flow::Next);
        };

        match action.emit {
            Emit::Flow(op) => return self.flow(op, action.fetch, at, inst),
            Emit::End => return Ok(Flow::Terminate),
            Emit::Nop => {}
            Emit::Kill => self.kill(Vec::new())?,
            Emit::KillIf => {
                let conditions = self.fetch_args(action.fetch, inst, 0)?;
                self.kill(conditions)?;
            }
            Emit::Texture(op) => self.texture(op, action.fetch, inst)?,
            Emit::EmitVertex => self.emit_vertex(inst)?,
            Emit::EndPrimitive => self.end_primitive(inst)?,
            Emit::Load => self.load_buffer(inst)?,
            Emit::Store => self.store_buffer(inst)?,
            emit => self.arith(action.fetch, emit, inst)?,
        }
        Ok(Flow::Next)
    }

    fn flow(
        &mut self,
        op: FlowOp,
        fetch: Fetch,
        at: InstrIndex,
        inst: &Instruction,
    ) -> Result<Flow, TranslateError> {
        match op {
            FlowOp::If | FlowOp::Uif => {
                let x = self.first_arg(fetch, inst)?;
                let kind = self.b.kind_of(&x);
                let zero = self.b.splat(kind, 0)?;
                // A NaN float condition counts as true.
                let ordering = if op == FlowOp::If {
                    Ordering::Unordered
                } else {
                    Ordering::Ordered
                };
                let cond = self.b.compare(CompareOp::Ne, ordering, &x, &zero)?;
                self.mask.cond_push(self.b, &cond, at)?;
            }
            FlowOp::Else => self.mask.cond_invert(self.b)?,
            FlowOp::EndIf => self.mask.cond_pop(self.b)?,
            FlowOp::BgnLoop => self.mask.bgnloop(self.b, at)?,
            FlowOp::EndLoop => return self.mask.endloop(self.b, at),
            FlowOp::Brk => {
                let next = self.program.opcode_at(at.next());
                return self.mask.brk(self.b, next);
            }
            FlowOp::Cont => self.mask.cont(self.b)?,
            FlowOp::Switch => {
                let value = self.first_arg(fetch, inst)?;
                self.mask.switch(self.b, &value, at)?;
            }
            FlowOp::Case => {
                let value = self.first_arg(fetch, inst)?;
                self.mask.case(self.b, &value)?;
            }
            FlowOp::Default => return self.mask.default(self.b, self.program, at),
            FlowOp::EndSwitch => return self.mask.endswitch(self.b, at),
            FlowOp::Cal => {
                let target = inst.label.ok_or(TranslateError::Malformed {
                    at,
                    reason: "CAL without a target",
                })?;
                return self.mask.call(self.b, target, at);
            }
            FlowOp::Ret => return self.mask.ret(self.b),
            FlowOp::BgnSub => return Ok(self.mask.bgnsub()),
            FlowOp::EndSub => return self.mask.endsub(self.b),
        }
        Ok(Flow::Next)
    }

    fn first_arg(&mut self, fetch: Fetch, inst: &Instruction) -> Result<B::Value, TranslateError> {
        self.fetch_args(fetch, inst, 0)?
            .into_iter()
            .next()
            .ok_or(TranslateError::Malformed {
                at: self.at,
                reason: "missing condition operand",
            })
    }

    fn arith(&mut self, fetch: Fetch, emit: Emit, inst: &Instruction) -> Result<(), TranslateError> {
        let dst_ty = inst.opcode.dst_type();
        let mut data = EmitData::new(dst_ty.kind());
        let enabled = inst.dst.iter().fold(0u8, |m, d| m | d.mask.0);

        match inst.opcode.info().output {
            OutputMode::Componentwise => {
                // A 64-bit result occupies a channel pair and is computed once per pair.
                let step = if dst_ty.is_64bit() { 2 } else { 1 };
                for chan in (0..4).step_by(step) {
                    if (chan..chan + step).all(|c| enabled & (1 << c) == 0) {
                        continue;
                    }
                    data.chan = chan;
                    data.args = self.fetch_args(fetch, inst, chan)?;
                    emit_arith(self.b, emit, &mut data)?;
                }
            }
            OutputMode::Replicate => {
                data.args = self.fetch_args(fetch, inst, 0)?;
                emit_arith(self.b, emit, &mut data)?;
                if let Some(value) = data.output[0].clone() {
                    data.output = [
                        Some(value.clone()),
                        Some(value.clone()),
                        Some(value.clone()),
                        Some(value),
                    ];
                }
            }
            OutputMode::Vector => {
                data.args = self.fetch_args(fetch, inst, 0)?;
                emit_arith(self.b, emit, &mut data)?;
            }
            OutputMode::None => return Ok(()),
        }

        for (i, dst) in inst.dst.iter().enumerate() {
            let results = if i == 0 { &data.output } else { &data.output_hi };
            self.write_dst(dst, dst_ty, inst.saturate, results)?;
        }
        Ok(())
    }

    fn fetch_args(
        &mut self,
        fetch: Fetch,
        inst: &Instruction,
        chan: usize,
    ) -> Result<Vec<B::Value>, TranslateError> {
        let mut args = Vec::new();
        match fetch {
            Fetch::PerChannel => {
                let wide_dst = inst.opcode.dst_type().is_64bit();
                for index in 0..inst.src.len() {
                    let wide_src = self.src_type(inst, index).is_64bit();
                    // Channel pairs of 64-bit operands line up with single channels of 32-bit
                    // ones: `xy` pairs with `x`, `zw` with `y`.
                    let slot = match (wide_src, wide_dst) {
                        (true, true) => chan & !1,
                        (true, false) => (chan * 2) % 4,
                        (false, true) => chan / 2,
                        (false, false) => chan,
                    };
                    args.push(self.fetch_src(inst, index, slot)?);
                }
            }
            Fetch::Channels(pairs) => {
                for &(index, slot) in pairs {
                    args.push(self.fetch_src(inst, index as usize, slot as usize)?);
                }
            }
            Fetch::None => {}
        }
        Ok(args)
    }

    fn src_type(&self, inst: &Instruction, index: usize) -> TypeTag {
        inst.src
            .get(index)
            .and_then(|src| src.ty)
            .unwrap_or_else(|| inst.opcode.src_type(index))
    }

    /// Source operand `index` at swizzle position `slot` (and `slot + 1` for 64-bit types),
    /// typed and with modifiers applied.
    fn fetch_src(
        &mut self,
        inst: &Instruction,
        index: usize,
        slot: usize,
    ) -> Result<B::Value, TranslateError> {
        let src = self.src(inst, index)?;
        let ty = self.src_type(inst, index);
        let reg = self.resolve(src.class, src.index, src.dimension, src.indirect)?;
        let value = if ty.is_64bit() {
            let (lo, hi) = (src.swizzle.get(slot), src.swizzle.get(slot + 1));
            self.regs.fetch_wide(self.b, &reg, lo, hi, ty.kind())?
        } else {
            let raw = self.regs.fetch(self.b, &reg, src.swizzle.get(slot))?;
            self.b.bitcast(&raw, ty.kind())?
        };
        self.modifiers(src, ty, value)
    }

    fn src<'i>(&self, inst: &'i Instruction, index: usize) -> Result<&'i SrcRegister, TranslateError> {
        inst.src.get(index).ok_or(TranslateError::Malformed {
            at: self.at,
            reason: "action reads a missing source operand",
        })
    }

    fn modifiers(
        &mut self,
        src: &SrcRegister,
        ty: TypeTag,
        mut value: B::Value,
    ) -> Result<B::Value, TranslateError> {
        if src.absolute && !matches!(ty, TypeTag::Uint | TypeTag::Uint64) {
            value = self.b.unary(UnaryOp::Abs, &value)?;
        }
        if src.negate {
            value = self.b.unary(UnaryOp::Neg, &value)?;
        }
        Ok(value)
    }

    fn resolve(
        &mut self,
        class: StorageClass,
        index: u32,
        dimension: u32,
        indirect: Option<Indirect>,
    ) -> Result<RegRef<B::Value>, TranslateError> {
        let mut reg = RegRef {
            class,
            index,
            dimension,
            indirect: None,
        };
        if let Some(ind) = indirect {
            let addr = RegRef::direct(ind.class, ind.index);
            let lanes = self
                .regs
                .indirect_index(self.b, class, index, &addr, ind.chan as usize)?;
            reg.indirect = Some(lanes);
        }
        Ok(reg)
    }

    /// Composite execution mask AND-ed with the live mask; `None` while every lane is active.
    fn store_pred(&mut self) -> Result<Option<B::Value>, BuildError> {
        let exec = self.mask.exec().cloned();
        let Some(live) = self.live else {
            return Ok(exec);
        };
        let live = self.b.load(live)?;
        Ok(Some(match exec {
            Some(exec) => self.b.binary(BinaryOp::And, &exec, &live)?,
            None => live,
        }))
    }

    fn write_dst(
        &mut self,
        dst: &DstRegister,
        ty: TypeTag,
        saturate: bool,
        results: &[Option<B::Value>; 4],
    ) -> Result<(), TranslateError> {
        let reg = self.resolve(dst.class, dst.index, 0, dst.indirect)?;
        let pred = self.store_pred()?;

        if ty.is_64bit() {
            for chan in [0, 2] {
                if !(dst.mask.contains(chan) || dst.mask.contains(chan + 1)) {
                    continue;
                }
                if let Some(value) = &results[chan] {
                    self.regs
                        .store_wide(self.b, &reg, chan, value, pred.as_ref(), dst.mask)?;
                }
            }
            return Ok(());
        }

        for chan in dst.mask.channels() {
            let Some(value) = &results[chan] else {
                continue;
            };
            let value = if saturate && matches!(ty, TypeTag::Float | TypeTag::Untyped) {
                self.saturate(value)?
            } else {
                value.clone()
            };
            let raw = self.b.bitcast(&value, ElemKind::F32)?;
            self.regs.store(self.b, &reg, chan, &raw, pred.as_ref())?;
        }
        Ok(())
    }

    /// Clamps to `[0, 1]`; NaN becomes 0.
    fn saturate(&mut self, value: &B::Value) -> Result<B::Value, BuildError> {
        let zero = self.b.splat(ElemKind::F32, 0)?;
        let one = self.b.splat(ElemKind::F32, 1.0f32.to_bits() as u64)?;
        let clamped = self.b.binary(BinaryOp::Max, value, &zero)?;
        self.b.binary(BinaryOp::Min, &clamped, &one)
    }

    fn write_undefined(&mut self, inst: &Instruction) -> Result<(), TranslateError> {
        self.stats.undefined_actions += 1;
        let undef = self.b.undef(ElemKind::F32)?;
        let results = [
            Some(undef.clone()),
            Some(undef.clone()),
            Some(undef.clone()),
            Some(undef),
        ];
        for dst in &inst.dst {
            if dst.class != StorageClass::Buffer {
                self.write_dst(dst, TypeTag::Untyped, false, &results)?;
            }
        }
        Ok(())
    }

    /// Removes lanes from the live mask: every active lane when `conditions` is empty,
    /// otherwise active lanes where any condition is negative.
    fn kill(&mut self, conditions: Vec<B::Value>) -> Result<(), TranslateError> {
        let Some(live_var) = self.live else {
            return Ok(());
        };
        let exec = self.mask.exec_or_all().clone();
        let killed = if conditions.is_empty() {
            exec
        } else {
            let mut any = self.b.splat(ElemKind::Mask, 0)?;
            for value in &conditions {
                let kind = self.b.kind_of(value);
                let zero = self.b.splat(kind, 0)?;
                let negative = self.b.compare(CompareOp::Lt, Ordering::Ordered, value, &zero)?;
                any = self.b.binary(BinaryOp::Or, &any, &negative)?;
            }
            self.b.binary(BinaryOp::And, &any, &exec)?
        };
        let live = self.b.load(live_var)?;
        let keep = self.b.unary(UnaryOp::Not, &killed)?;
        let live = self.b.binary(BinaryOp::And, &live, &keep)?;
        self.b.store(live_var, &live, None)?;
        Ok(())
    }

    fn texture(&mut self, op: TexOp, fetch: Fetch, inst: &Instruction) -> Result<(), TranslateError> {
        let at = self.at;
        let texture = inst.texture.ok_or(TranslateError::Malformed {
            at,
            reason: "texture opcode without a texture operand",
        })?;
        let args = self.fetch_args(fetch, inst, 0)?;
        if args.len() < 4 {
            return Err(TranslateError::Malformed {
                at,
                reason: "texture opcode needs four coordinate channels",
            });
        }
        let mask = self.store_pred()?;

        let Some(sampler) = self.sampler.as_deref_mut() else {
            warn!(%at, opcode = %inst.opcode, "no texture sampler bound, writing undefined values");
            return self.write_undefined(inst);
        };
        let coords = &args[..texture.target.coord_count()];
        let results = match op {
            TexOp::Size => sampler.size(self.b, texture.target, texture.unit, &args[0])?,
            TexOp::Fetch => {
                let request = SampleRequest {
                    target: texture.target,
                    unit: texture.unit,
                    coords,
                    lod: LodControl::Explicit(args[3].clone()),
                    mask: mask.as_ref(),
                };
                sampler.fetch(self.b, &request)?
            }
            TexOp::Sample(lod) => {
                let mut coords = coords.to_vec();
                let lod = match lod {
                    SampleLod::Implicit => LodControl::Implicit,
                    SampleLod::Bias => LodControl::Bias(args[3].clone()),
                    SampleLod::Explicit => LodControl::Explicit(args[3].clone()),
                    SampleLod::Projected => {
                        for coord in &mut coords {
                            *coord = self.b.binary(BinaryOp::Div, coord, &args[3])?;
                        }
                        LodControl::Implicit
                    }
                };
                let request = SampleRequest {
                    target: texture.target,
                    unit: texture.unit,
                    coords: &coords,
                    lod,
                    mask: mask.as_ref(),
                };
                sampler.sample(self.b, &request)?
            }
        };

        let results = results.map(Some);
        for dst in &inst.dst {
            self.write_dst(dst, inst.opcode.dst_type(), inst.saturate, &results)?;
        }
        Ok(())
    }

    /// Stream index of `EMIT`/`ENDPRIM`, read from the immediate table.
    fn stream_of(&self, inst: &Instruction) -> u32 {
        inst.src
            .first()
            .filter(|src| src.class == StorageClass::Immediate)
            .and_then(|src| {
                self.program
                    .info()
                    .immediates
                    .get(src.index as usize)
                    .map(|imm| imm[src.swizzle.get(0)])
            })
            .unwrap_or(0)
    }

    fn missing_geometry(&mut self, inst: &Instruction) -> Result<(), TranslateError> {
        warn!(at = %self.at, opcode = %inst.opcode, "no geometry emitter bound, ignoring");
        self.stats.undefined_actions += 1;
        Ok(())
    }

    fn active_lanes(&mut self) -> Result<B::Value, BuildError> {
        match self.store_pred()? {
            Some(pred) => Ok(pred),
            None => self.b.splat(ElemKind::Mask, ElemKind::Mask.ones()),
        }
    }

    fn increment(&mut self, var: B::Var, mask: &B::Value) -> Result<(), BuildError> {
        let one = self.b.splat(ElemKind::U32, 1)?;
        let zero = self.b.splat(ElemKind::U32, 0)?;
        let step = self.b.select(mask, &one, &zero)?;
        let count = self.b.load(var)?;
        let count = self.b.binary(BinaryOp::Add, &count, &step)?;
        self.b.store(var, &count, None)
    }

    /// Emits a vertex for active lanes that are still below the vertex bound.
    fn emit_vertex(&mut self, inst: &Instruction) -> Result<(), TranslateError> {
        let Some(gs) = self.gs else {
            return self.missing_geometry(inst);
        };
        let stream = self.stream_of(inst);
        let exec = self.active_lanes()?;
        let total = self.b.load(gs.total)?;
        let max = self.b.splat(ElemKind::U32, gs.max_vertices as u64)?;
        let below = self.b.compare(CompareOp::Lt, Ordering::Ordered, &total, &max)?;
        let mask = self.b.binary(BinaryOp::And, &exec, &below)?;
        let outputs = self.regs.outputs(self.b)?;
        if let Some(geometry) = self.geometry.as_deref_mut() {
            geometry.emit_vertex(self.b, &outputs, &total, &mask, stream)?;
        }
        self.increment(gs.total, &mask)?;
        self.increment(gs.vertices, &mask)?;
        Ok(())
    }

    fn end_primitive(&mut self, inst: &Instruction) -> Result<(), TranslateError> {
        let Some(gs) = self.gs else {
            return self.missing_geometry(inst);
        };
        let stream = self.stream_of(inst);
        let exec = self.active_lanes()?;
        self.close_primitive(gs, &exec, stream)?;
        Ok(())
    }

    /// Ends the current primitive for lanes in `exec` that emitted at least one vertex since
    /// the last one.
    fn close_primitive(
        &mut self,
        gs: GeometryState<B>,
        exec: &B::Value,
        stream: u32,
    ) -> Result<(), BuildError> {
        let vertices = self.b.load(gs.vertices)?;
        let zero = self.b.splat(ElemKind::U32, 0)?;
        let pending = self.b.compare(CompareOp::Ne, Ordering::Ordered, &vertices, &zero)?;
        let mask = self.b.binary(BinaryOp::And, exec, &pending)?;
        let total = self.b.load(gs.total)?;
        let primitives = self.b.load(gs.primitives)?;
        if let Some(geometry) = self.geometry.as_deref_mut() {
            geometry.end_primitive(self.b, &total, &vertices, &primitives, &mask, stream)?;
        }
        self.increment(gs.primitives, &mask)?;
        let cleared = self.b.select(&mask, &zero, &vertices)?;
        self.b.store(gs.vertices, &cleared, None)
    }

    fn geometry_epilogue(
        &mut self,
        gs: GeometryState<B>,
    ) -> Result<GeometryTotals<B::Value>, TranslateError> {
        let all = self.b.splat(ElemKind::Mask, ElemKind::Mask.ones())?;
        self.close_primitive(gs, &all, 0)?;
        let total_vertices = self.b.load(gs.total)?;
        let primitives = self.b.load(gs.primitives)?;
        if let Some(geometry) = self.geometry.as_deref_mut() {
            geometry.epilogue(self.b, &total_vertices, &primitives)?;
        }
        Ok(GeometryTotals {
            total_vertices,
            primitives,
        })
    }

    /// Word offsets `(byte_offset >> 2) + chan` read from source `src`, as `I32`, and the
    /// lanes where they fall inside a buffer of `size` words.
    fn buffer_offsets(
        &mut self,
        inst: &Instruction,
        src: usize,
        chan: usize,
        size: &B::Value,
    ) -> Result<(B::Value, B::Value), TranslateError> {
        let bytes = self.fetch_src(inst, src, 0)?;
        let two = self.b.splat(ElemKind::U32, 2)?;
        let words = self.b.binary(BinaryOp::Shr, &bytes, &two)?;
        let chan = self.b.splat(ElemKind::U32, chan as u64)?;
        let words = self.b.binary(BinaryOp::Add, &words, &chan)?;
        let size = self.b.bitcast(size, ElemKind::U32)?;
        let in_range = self.b.compare(CompareOp::Lt, Ordering::Ordered, &words, &size)?;
        let offsets = self.b.bitcast(&words, ElemKind::I32)?;
        Ok((offsets, in_range))
    }

    fn load_buffer(&mut self, inst: &Instruction) -> Result<(), TranslateError> {
        let slot = self.src(inst, 0)?.index;
        let (array, size) = self.regs.buffer_binding(self.b, slot)?;
        for dst in &inst.dst {
            let mut results = [None, None, None, None];
            for chan in dst.mask.channels() {
                let (offsets, in_range) = self.buffer_offsets(inst, 1, chan, &size)?;
                results[chan] =
                    Some(self.b.gather(array, &offsets, ElemKind::U32, Some(&in_range))?);
            }
            self.write_dst(dst, TypeTag::Uint, false, &results)?;
        }
        Ok(())
    }

    fn store_buffer(&mut self, inst: &Instruction) -> Result<(), TranslateError> {
        let pred = self.store_pred()?;
        for dst in &inst.dst {
            let (array, size) = self.regs.buffer_binding(self.b, dst.index)?;
            for chan in dst.mask.channels() {
                let (offsets, in_range) = self.buffer_offsets(inst, 0, chan, &size)?;
                let value = self.fetch_src(inst, 1, chan)?;
                let active = match &pred {
                    Some(pred) => self.b.binary(BinaryOp::And, pred, &in_range)?,
                    None => in_range,
                };
                self.b.scatter(array, &offsets, &value, Some(&active))?;
            }
        }
        Ok(())
    }
}
