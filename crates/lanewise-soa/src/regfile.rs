//! Register storage for the translator.
//!
//! Every channel is one 32-bit lane vector held as raw `F32` words; typed reads and writes
//! bitcast at the edges. A class lives in one of four shapes, picked once in the prologue:
//!
//! - read-only values materialised up front (inputs, small immediate sets),
//! - one variable per channel (temporaries, outputs, address registers),
//! - a per-lane array, word `(index * 4 + chan) * lanes + lane`, for classes addressed
//!   indirectly or too large to keep in variables,
//! - a uniform array, word `index * 4 + chan`, for indirect immediates and constant buffers.

use std::collections::BTreeMap;

use lanewise_vec::{BinaryOp, CompareOp, ElemKind, Ordering};

use crate::builder::{BuildError, TargetBuilder};
use crate::limits::{MAX_INLINED_IMMEDIATES, MAX_INLINED_TEMPS};
use crate::program::{Program, StorageClass, WriteMask};

enum Storage<B: TargetBuilder> {
    Unused,
    Values(Vec<[B::Value; 4]>),
    Slots(Vec<[B::Var; 4]>),
    Lanes(B::Array),
    Uniform(B::Array),
}

/// A register operand after indirect addressing has been resolved.
#[derive(Debug, Clone)]
pub(crate) struct RegRef<V> {
    pub class: StorageClass,
    pub index: u32,
    /// Constant buffer or storage buffer slot.
    pub dimension: u32,
    /// Per-lane `i32` register index replacing `index`.
    pub indirect: Option<V>,
}

impl<V> RegRef<V> {
    pub(crate) fn direct(class: StorageClass, index: u32) -> Self {
        Self {
            class,
            index,
            dimension: 0,
            indirect: None,
        }
    }
}

pub(crate) struct RegisterFile<B: TargetBuilder> {
    storage: Vec<Storage<B>>,
    file_max: [Option<u32>; StorageClass::COUNT],
    constants: BTreeMap<u32, (B::Array, B::Value)>,
    buffers: BTreeMap<u32, (B::Array, B::Value)>,
    lane_ids: B::Value,
    lanes: usize,
}

impl<B: TargetBuilder> RegisterFile<B> {
    /// Allocates storage for every class the program touches and binds its resources, so that
    /// everything the body refers to is defined before the first instruction.
    pub(crate) fn new(b: &mut B, program: &Program) -> Result<Self, BuildError> {
        let info = program.info();
        let lanes = b.lanes();
        let lane_ids = b.lane_ids()?;
        let zero = b.splat(ElemKind::F32, 0)?;
        let mut file = Self {
            storage: Vec::with_capacity(StorageClass::COUNT),
            file_max: info.file_max,
            constants: BTreeMap::new(),
            buffers: BTreeMap::new(),
            lane_ids,
            lanes,
        };

        for class in StorageClass::ALL {
            let Some(max) = info.file_max(class) else {
                file.storage.push(Storage::Unused);
                continue;
            };
            let count = max
                .checked_add(1)
                .ok_or(BuildError::Unsupported("register index exceeds the register file"))?;
            let indirect = info.uses_indirect(class);
            let storage = match class {
                StorageClass::Temporary | StorageClass::Output
                    if indirect || (class == StorageClass::Temporary && count >= MAX_INLINED_TEMPS) =>
                {
                    Storage::Lanes(b.alloc_array(count as usize * 4 * lanes)?)
                }
                StorageClass::Temporary | StorageClass::Output | StorageClass::Address => {
                    let mut slots = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        slots.push([
                            b.alloca(&zero)?,
                            b.alloca(&zero)?,
                            b.alloca(&zero)?,
                            b.alloca(&zero)?,
                        ]);
                    }
                    Storage::Slots(slots)
                }
                StorageClass::Input => {
                    let mut values = Vec::with_capacity(count as usize);
                    for index in 0..count {
                        values.push([
                            b.input(index, 0)?,
                            b.input(index, 1)?,
                            b.input(index, 2)?,
                            b.input(index, 3)?,
                        ]);
                    }
                    if indirect {
                        let array = b.alloc_array(count as usize * 4 * lanes)?;
                        file.fill_lanes(b, array, &values)?;
                        Storage::Lanes(array)
                    } else {
                        Storage::Values(values)
                    }
                }
                StorageClass::Immediate => {
                    if indirect || count >= MAX_INLINED_IMMEDIATES {
                        // Indices past the immediate table stay zero.
                        let array = b.alloc_array(count as usize * 4)?;
                        for (index, imm) in info.immediates.iter().enumerate() {
                            for (chan, &bits) in imm.iter().enumerate() {
                                let offset = b.splat(ElemKind::I32, (index * 4 + chan) as u64)?;
                                let word = b.splat(ElemKind::F32, bits as u64)?;
                                b.scatter(array, &offset, &word, None)?;
                            }
                        }
                        Storage::Uniform(array)
                    } else {
                        let mut values = Vec::with_capacity(info.immediates.len());
                        for imm in &info.immediates {
                            values.push([
                                b.splat(ElemKind::F32, imm[0] as u64)?,
                                b.splat(ElemKind::F32, imm[1] as u64)?,
                                b.splat(ElemKind::F32, imm[2] as u64)?,
                                b.splat(ElemKind::F32, imm[3] as u64)?,
                            ]);
                        }
                        Storage::Values(values)
                    }
                }
                // Bound per slot below.
                StorageClass::Constant | StorageClass::Buffer => Storage::Unused,
            };
            file.storage.push(storage);
        }

        for inst in program.instructions() {
            for src in &inst.src {
                match src.class {
                    StorageClass::Constant => {
                        file.constant_binding(b, src.dimension)?;
                    }
                    StorageClass::Buffer => {
                        file.buffer_binding(b, src.index)?;
                    }
                    _ => {}
                }
            }
            for dst in &inst.dst {
                if dst.class == StorageClass::Buffer {
                    file.buffer_binding(b, dst.index)?;
                }
            }
        }
        Ok(file)
    }

    fn fill_lanes(
        &mut self,
        b: &mut B,
        array: B::Array,
        values: &[[B::Value; 4]],
    ) -> Result<(), BuildError> {
        for (index, regs) in values.iter().enumerate() {
            let index = b.splat(ElemKind::I32, index as u64)?;
            for (chan, value) in regs.iter().enumerate() {
                let offsets = self.lane_offsets(b, &index, chan)?;
                b.scatter(array, &offsets, value, None)?;
            }
        }
        Ok(())
    }

    pub(crate) fn file_max(&self, class: StorageClass) -> Option<u32> {
        self.file_max[class.index()]
    }

    fn constant_binding(
        &mut self,
        b: &mut B,
        slot: u32,
    ) -> Result<(B::Array, B::Value), BuildError> {
        if let Some(bound) = self.constants.get(&slot) {
            return Ok(bound.clone());
        }
        let bound = b.constant_buffer(slot)?;
        self.constants.insert(slot, bound.clone());
        Ok(bound)
    }

    pub(crate) fn buffer_binding(
        &mut self,
        b: &mut B,
        slot: u32,
    ) -> Result<(B::Array, B::Value), BuildError> {
        if let Some(bound) = self.buffers.get(&slot) {
            return Ok(bound.clone());
        }
        let bound = b.buffer(slot)?;
        self.buffers.insert(slot, bound.clone());
        Ok(bound)
    }

    /// `base + class[addr.index].chan`, clamped to the highest declared register of `class`.
    /// Constant indices are left unclamped; out-of-range constant reads yield zero instead.
    pub(crate) fn indirect_index(
        &mut self,
        b: &mut B,
        class: StorageClass,
        base: u32,
        addr: &RegRef<B::Value>,
        addr_chan: usize,
    ) -> Result<B::Value, BuildError> {
        let offset = self.fetch(b, addr, addr_chan)?;
        let offset = b.bitcast(&offset, ElemKind::I32)?;
        let base = b.splat(ElemKind::I32, base as u64)?;
        let index = b.binary(BinaryOp::Add, &base, &offset)?;
        if class == StorageClass::Constant {
            return Ok(index);
        }
        // Unsigned clamp: negative indices land on the last register as well.
        let max = b.splat(ElemKind::U32, self.file_max(class).unwrap_or(0) as u64)?;
        let index = b.bitcast(&index, ElemKind::U32)?;
        let index = b.binary(BinaryOp::Min, &index, &max)?;
        b.bitcast(&index, ElemKind::I32)
    }

    fn index_value(&self, b: &mut B, reg: &RegRef<B::Value>) -> Result<B::Value, BuildError> {
        match &reg.indirect {
            Some(index) => Ok(index.clone()),
            None => b.splat(ElemKind::I32, reg.index as u64),
        }
    }

    fn lane_offsets(
        &self,
        b: &mut B,
        index: &B::Value,
        chan: usize,
    ) -> Result<B::Value, BuildError> {
        let offsets = self.uniform_offsets(b, index, chan)?;
        let lanes = b.splat(ElemKind::I32, self.lanes as u64)?;
        let offsets = b.binary(BinaryOp::Mul, &offsets, &lanes)?;
        b.binary(BinaryOp::Add, &offsets, &self.lane_ids)
    }

    fn uniform_offsets(
        &self,
        b: &mut B,
        index: &B::Value,
        chan: usize,
    ) -> Result<B::Value, BuildError> {
        let four = b.splat(ElemKind::I32, 4)?;
        let chan = b.splat(ElemKind::I32, chan as u64)?;
        let offsets = b.binary(BinaryOp::Mul, index, &four)?;
        b.binary(BinaryOp::Add, &offsets, &chan)
    }

    /// Raw 32-bit contents of one channel, as `F32` lanes.
    pub(crate) fn fetch(
        &mut self,
        b: &mut B,
        reg: &RegRef<B::Value>,
        chan: usize,
    ) -> Result<B::Value, BuildError> {
        if reg.class == StorageClass::Constant {
            return self.fetch_constant(b, reg, chan);
        }
        match (&self.storage[reg.class.index()], &reg.indirect) {
            (Storage::Values(values), None) => match values.get(reg.index as usize) {
                Some(regs) => Ok(regs[chan].clone()),
                None => b.undef(ElemKind::F32),
            },
            (Storage::Slots(slots), None) => match slots.get(reg.index as usize) {
                Some(vars) => b.load(vars[chan]),
                None => b.undef(ElemKind::F32),
            },
            (Storage::Lanes(array), _) => {
                let array = *array;
                let index = self.index_value(b, reg)?;
                let offsets = self.lane_offsets(b, &index, chan)?;
                b.gather(array, &offsets, ElemKind::F32, None)
            }
            (Storage::Uniform(array), _) => {
                let array = *array;
                let index = self.index_value(b, reg)?;
                let offsets = self.uniform_offsets(b, &index, chan)?;
                b.gather(array, &offsets, ElemKind::F32, None)
            }
            (Storage::Unused, _) => b.undef(ElemKind::F32),
            (Storage::Values(_) | Storage::Slots(_), Some(_)) => Err(BuildError::Unsupported(
                "indirect access to a directly addressed register class",
            )),
        }
    }

    fn fetch_constant(
        &mut self,
        b: &mut B,
        reg: &RegRef<B::Value>,
        chan: usize,
    ) -> Result<B::Value, BuildError> {
        let (array, size) = self.constant_binding(b, reg.dimension)?;
        let index = self.index_value(b, reg)?;
        let index_u = b.bitcast(&index, ElemKind::U32)?;
        let size_u = b.bitcast(&size, ElemKind::U32)?;
        let in_range = b.compare(CompareOp::Lt, Ordering::Ordered, &index_u, &size_u)?;
        let zero = b.splat(ElemKind::I32, 0)?;
        let index = b.select(&in_range, &index, &zero)?;
        let offsets = self.uniform_offsets(b, &index, chan)?;
        // Lanes outside the buffer never touch memory and read as zero.
        b.gather(array, &offsets, ElemKind::F32, Some(&in_range))
    }

    /// Writes raw `F32` words to one channel; lanes inactive in `pred` keep their contents.
    pub(crate) fn store(
        &mut self,
        b: &mut B,
        reg: &RegRef<B::Value>,
        chan: usize,
        value: &B::Value,
        pred: Option<&B::Value>,
    ) -> Result<(), BuildError> {
        match (&self.storage[reg.class.index()], &reg.indirect) {
            (Storage::Slots(slots), None) => match slots.get(reg.index as usize) {
                Some(vars) => b.store(vars[chan], value, pred),
                None => Ok(()),
            },
            (Storage::Lanes(array), _) => {
                let array = *array;
                let index = self.index_value(b, reg)?;
                let offsets = self.lane_offsets(b, &index, chan)?;
                b.scatter(array, &offsets, value, pred)
            }
            _ => Err(BuildError::Unsupported("store to a read-only register class")),
        }
    }

    /// Reads a 64-bit value split across channels `lo` and `hi`.
    pub(crate) fn fetch_wide(
        &mut self,
        b: &mut B,
        reg: &RegRef<B::Value>,
        lo: usize,
        hi: usize,
        kind: ElemKind,
    ) -> Result<B::Value, BuildError> {
        let lo = self.fetch(b, reg, lo)?;
        let hi = self.fetch(b, reg, hi)?;
        let lo = b.bitcast(&lo, ElemKind::U32)?;
        let hi = b.bitcast(&hi, ElemKind::U32)?;
        let paired = b.interleave(&lo, &hi)?;
        b.bitcast(&paired, kind)
    }

    /// Writes a 64-bit value to channels `chan` (low word) and `chan + 1` (high word), each
    /// only if enabled in `mask`.
    pub(crate) fn store_wide(
        &mut self,
        b: &mut B,
        reg: &RegRef<B::Value>,
        chan: usize,
        value: &B::Value,
        pred: Option<&B::Value>,
        mask: WriteMask,
    ) -> Result<(), BuildError> {
        let words = b.bitcast(value, ElemKind::U32)?;
        let (lo, hi) = b.deinterleave(&words)?;
        for (half, word) in [(chan, lo), (chan + 1, hi)] {
            if mask.contains(half) {
                let word = b.bitcast(&word, ElemKind::F32)?;
                self.store(b, reg, half, &word, pred)?;
            }
        }
        Ok(())
    }

    /// Current contents of every output register.
    pub(crate) fn outputs(&mut self, b: &mut B) -> Result<Vec<[B::Value; 4]>, BuildError> {
        let count = self.file_max(StorageClass::Output).map_or(0, |m| m + 1);
        let mut outputs = Vec::with_capacity(count as usize);
        for index in 0..count {
            let reg = RegRef::direct(StorageClass::Output, index);
            outputs.push([
                self.fetch(b, &reg, 0)?,
                self.fetch(b, &reg, 1)?,
                self.fetch(b, &reg, 2)?,
                self.fetch(b, &reg, 3)?,
            ]);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::LaneEvaluator;
    use crate::opcode::Opcode;
    use crate::program::{DstRegister, Indirect, Instruction, SrcRegister};
    use lanewise_vec::LaneVec;
    use pretty_assertions::assert_eq;

    fn mov(dst: DstRegister, src: SrcRegister) -> Instruction {
        Instruction::new(Opcode::Mov).with_dst(dst).with_src(src)
    }

    #[test]
    fn indirect_temporaries_use_per_lane_offsets() {
        let program = Program::new(
            vec![mov(
                DstRegister::new(StorageClass::Temporary, 0).indirect(Indirect::address(0, 0)),
                SrcRegister::new(StorageClass::Temporary, 3),
            )],
            vec![],
        );
        let mut b = LaneEvaluator::new(4);
        let mut regs = RegisterFile::new(&mut b, &program).unwrap();

        let index = LaneVec::from_i32(&[0, 1, 2, 3]);
        let reg = RegRef {
            indirect: Some(index.clone()),
            ..RegRef::direct(StorageClass::Temporary, 0)
        };
        let value = LaneVec::from_f32(&[10.0, 11.0, 12.0, 13.0]);
        regs.store(&mut b, &reg, 1, &value, None).unwrap();

        let read = regs
            .fetch(&mut b, &RegRef::direct(StorageClass::Temporary, 2), 1)
            .unwrap();
        assert_eq!(read.to_f32(), vec![0.0, 0.0, 12.0, 0.0]);
    }

    #[test]
    fn indirect_index_is_clamped_to_the_declared_range() {
        let program = Program::new(
            vec![
                Instruction::new(Opcode::Arl)
                    .with_dst(DstRegister::new(StorageClass::Address, 0))
                    .with_src(SrcRegister::new(StorageClass::Input, 0)),
                mov(
                    DstRegister::new(StorageClass::Output, 0),
                    SrcRegister::new(StorageClass::Temporary, 0).indirect(Indirect::address(0, 0)),
                ),
                mov(
                    DstRegister::new(StorageClass::Temporary, 2),
                    SrcRegister::new(StorageClass::Input, 0),
                ),
            ],
            vec![],
        );
        let mut b = LaneEvaluator::new(4);
        let mut regs = RegisterFile::new(&mut b, &program).unwrap();
        let addr = RegRef::direct(StorageClass::Address, 0);
        let offsets = LaneVec::from_i32(&[0, 1, 7, -1]).bitcast(ElemKind::F32).unwrap();
        regs.store(&mut b, &addr, 0, &offsets, None).unwrap();

        let index = regs
            .indirect_index(&mut b, StorageClass::Temporary, 1, &addr, 0)
            .unwrap();
        assert_eq!(index.to_i32(), vec![1, 2, 2, 0]);
    }

    #[test]
    fn constants_outside_the_bound_buffer_read_zero() {
        let program = Program::new(
            vec![mov(
                DstRegister::new(StorageClass::Output, 0),
                SrcRegister::new(StorageClass::Constant, 0).indirect(Indirect::address(0, 0)),
            )],
            vec![],
        );
        let one = 1.0f32.to_bits();
        let two = 2.0f32.to_bits();
        let mut b = LaneEvaluator::new(4).with_constants(0, &[[one; 4], [two; 4]]);
        let mut regs = RegisterFile::new(&mut b, &program).unwrap();
        let reg = RegRef {
            indirect: Some(LaneVec::from_i32(&[0, 1, 2, -1])),
            ..RegRef::direct(StorageClass::Constant, 0)
        };
        let read = regs.fetch(&mut b, &reg, 3).unwrap();
        assert_eq!(read.to_f32(), vec![1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn wide_values_span_two_channels() {
        let program = Program::new(
            vec![mov(
                DstRegister::new(StorageClass::Temporary, 0),
                SrcRegister::new(StorageClass::Temporary, 0),
            )],
            vec![],
        );
        let mut b = LaneEvaluator::new(2);
        let mut regs = RegisterFile::new(&mut b, &program).unwrap();
        let reg = RegRef::direct(StorageClass::Temporary, 0);
        let value = LaneVec::from_f64(&[1.5, -0.25]);
        regs.store_wide(&mut b, &reg, 2, &value, None, WriteMask::ZW)
            .unwrap();

        let lo = regs.fetch(&mut b, &reg, 2).unwrap();
        assert_eq!(lo.to_u32(), vec![0, 0]);
        let back = regs
            .fetch_wide(&mut b, &reg, 2, 3, ElemKind::F64)
            .unwrap();
        assert_eq!(back.to_f64(), vec![1.5, -0.25]);
    }
}
