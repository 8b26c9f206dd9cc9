//! Eager [`TargetBuilder`] that computes every lane as it is requested.

use std::collections::HashMap;

use lanewise_vec::{BinaryOp, CompareOp, ElemKind, LaneVec, Ordering, TernaryOp, UnaryOp};

use crate::builder::{BackEdge, BuildError, TargetBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(u32);

/// Executes translated programs directly on [`LaneVec`]s.
///
/// Inputs, constant buffers and storage buffers are supplied up front; storage buffers can be
/// read back once translation has finished.
#[derive(Debug, Clone)]
pub struct LaneEvaluator {
    lanes: usize,
    vars: Vec<LaneVec>,
    arrays: Vec<Vec<u32>>,
    inputs: HashMap<(u32, usize), LaneVec>,
    constant_data: HashMap<u32, Vec<u32>>,
    constant_arrays: HashMap<u32, ArrayId>,
    buffer_data: HashMap<u32, Vec<u32>>,
    buffer_arrays: HashMap<u32, ArrayId>,
    next_label: u32,
}

impl LaneEvaluator {
    pub fn new(lanes: usize) -> Self {
        Self {
            lanes,
            vars: Vec::new(),
            arrays: Vec::new(),
            inputs: HashMap::new(),
            constant_data: HashMap::new(),
            constant_arrays: HashMap::new(),
            buffer_data: HashMap::new(),
            buffer_arrays: HashMap::new(),
            next_label: 0,
        }
    }

    /// Sets input register `index`, channel `chan`. Values are stored as raw 32-bit words.
    pub fn set_input(&mut self, index: u32, chan: usize, value: LaneVec) {
        self.inputs.insert((index, chan), value);
    }

    #[must_use]
    pub fn with_input(mut self, index: u32, chan: usize, value: LaneVec) -> Self {
        self.set_input(index, chan, value);
        self
    }

    /// Binds constant buffer `slot`; every constant is four raw channel words.
    #[must_use]
    pub fn with_constants(mut self, slot: u32, constants: &[[u32; 4]]) -> Self {
        self.constant_data
            .insert(slot, constants.iter().flatten().copied().collect());
        self
    }

    #[must_use]
    pub fn with_buffer(mut self, slot: u32, words: Vec<u32>) -> Self {
        self.buffer_data.insert(slot, words);
        self
    }

    /// Current contents of storage buffer `slot`.
    pub fn buffer_words(&self, slot: u32) -> Option<&[u32]> {
        match self.buffer_arrays.get(&slot) {
            Some(id) => self.arrays.get(id.0 as usize).map(Vec::as_slice),
            None => self.buffer_data.get(&slot).map(Vec::as_slice),
        }
    }

    #[cfg(test)]
    pub(crate) fn variable_count(&self) -> usize {
        self.vars.len()
    }

    fn var(&self, var: VarId) -> Result<&LaneVec, BuildError> {
        self.vars
            .get(var.0 as usize)
            .ok_or(BuildError::UnknownHandle {
                what: "variable",
                id: var.0,
            })
    }

    fn array(&self, array: ArrayId) -> Result<&Vec<u32>, BuildError> {
        self.arrays
            .get(array.0 as usize)
            .ok_or(BuildError::UnknownHandle {
                what: "array",
                id: array.0,
            })
    }

    fn new_array(&mut self, words: Vec<u32>) -> ArrayId {
        let id = ArrayId(self.arrays.len() as u32);
        self.arrays.push(words);
        id
    }

    fn bind(&mut self, slot: u32, constant: bool) -> Result<(ArrayId, LaneVec), BuildError> {
        let bound = if constant {
            self.constant_arrays.get(&slot)
        } else {
            self.buffer_arrays.get(&slot)
        };
        let id = match bound.copied() {
            Some(id) => id,
            None => {
                let data = if constant {
                    self.constant_data.get(&slot)
                } else {
                    self.buffer_data.get(&slot)
                };
                let words = data.cloned().unwrap_or_default();
                let id = self.new_array(words);
                if constant {
                    self.constant_arrays.insert(slot, id);
                } else {
                    self.buffer_arrays.insert(slot, id);
                }
                id
            }
        };
        let words = self.array(id)?.len();
        let size = if constant { words / 4 } else { words };
        let size = LaneVec::splat(ElemKind::I32, self.lanes, size as u64)?;
        Ok((id, size))
    }
}

impl TargetBuilder for LaneEvaluator {
    type Value = LaneVec;
    type Var = VarId;
    type Array = ArrayId;
    type Label = LabelId;

    fn lanes(&self) -> usize {
        self.lanes
    }

    fn kind_of(&self, value: &LaneVec) -> ElemKind {
        value.kind()
    }

    fn splat(&mut self, kind: ElemKind, bits: u64) -> Result<LaneVec, BuildError> {
        Ok(LaneVec::splat(kind, self.lanes, bits)?)
    }

    fn lane_ids(&mut self) -> Result<LaneVec, BuildError> {
        Ok(LaneVec::lane_ids(self.lanes))
    }

    fn undef(&mut self, kind: ElemKind) -> Result<LaneVec, BuildError> {
        Ok(LaneVec::zero(kind, self.lanes))
    }

    fn unary(&mut self, op: UnaryOp, a: &LaneVec) -> Result<LaneVec, BuildError> {
        Ok(a.unary(op)?)
    }

    fn binary(&mut self, op: BinaryOp, a: &LaneVec, b: &LaneVec) -> Result<LaneVec, BuildError> {
        Ok(a.binary(op, b)?)
    }

    fn ternary(
        &mut self,
        op: TernaryOp,
        a: &LaneVec,
        b: &LaneVec,
        c: &LaneVec,
    ) -> Result<LaneVec, BuildError> {
        Ok(a.ternary(op, b, c)?)
    }

    fn compare(
        &mut self,
        op: CompareOp,
        ordering: Ordering,
        a: &LaneVec,
        b: &LaneVec,
    ) -> Result<LaneVec, BuildError> {
        Ok(a.compare(op, ordering, b)?)
    }

    fn convert(&mut self, a: &LaneVec, to: ElemKind) -> Result<LaneVec, BuildError> {
        Ok(a.convert(to)?)
    }

    fn bitcast(&mut self, a: &LaneVec, to: ElemKind) -> Result<LaneVec, BuildError> {
        Ok(a.bitcast(to)?)
    }

    fn select(&mut self, mask: &LaneVec, a: &LaneVec, b: &LaneVec) -> Result<LaneVec, BuildError> {
        Ok(mask.select(a, b)?)
    }

    fn interleave(&mut self, a: &LaneVec, b: &LaneVec) -> Result<LaneVec, BuildError> {
        Ok(a.interleave(b)?)
    }

    fn deinterleave(&mut self, a: &LaneVec) -> Result<(LaneVec, LaneVec), BuildError> {
        Ok(a.deinterleave()?)
    }

    fn alloca(&mut self, init: &LaneVec) -> Result<VarId, BuildError> {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(init.clone());
        Ok(id)
    }

    fn load(&mut self, var: VarId) -> Result<LaneVec, BuildError> {
        self.var(var).cloned()
    }

    fn store(
        &mut self,
        var: VarId,
        value: &LaneVec,
        pred: Option<&LaneVec>,
    ) -> Result<(), BuildError> {
        let merged = match pred {
            Some(pred) => pred.select(value, self.var(var)?)?,
            None => value.clone(),
        };
        self.vars[var.0 as usize] = merged;
        Ok(())
    }

    fn alloc_array(&mut self, len: usize) -> Result<ArrayId, BuildError> {
        Ok(self.new_array(vec![0; len]))
    }

    fn gather(
        &mut self,
        array: ArrayId,
        offsets: &LaneVec,
        kind: ElemKind,
        pred: Option<&LaneVec>,
    ) -> Result<LaneVec, BuildError> {
        let active = match pred {
            Some(pred) => pred.to_bools(),
            None => vec![true; offsets.lanes()],
        };
        let words = self.array(array)?;
        let mut out = Vec::with_capacity(offsets.lanes());
        for (offset, live) in offsets.to_u32().into_iter().zip(active) {
            if !live {
                out.push(0);
                continue;
            }
            let word = words
                .get(offset as usize)
                .copied()
                .ok_or(BuildError::OutOfBounds {
                    offset: offset as u64,
                    len: words.len(),
                })?;
            out.push(word);
        }
        Ok(LaneVec::from_words(kind, out)?)
    }

    fn scatter(
        &mut self,
        array: ArrayId,
        offsets: &LaneVec,
        value: &LaneVec,
        pred: Option<&LaneVec>,
    ) -> Result<(), BuildError> {
        let active = match pred {
            Some(pred) => pred.to_bools(),
            None => vec![true; offsets.lanes()],
        };
        let len = self.array(array)?.len();
        let words = &mut self.arrays[array.0 as usize];
        for ((offset, word), live) in offsets.to_u32().into_iter().zip(value.words()).zip(active) {
            if !live {
                continue;
            }
            let slot = words.get_mut(offset as usize).ok_or(BuildError::OutOfBounds {
                offset: offset as u64,
                len,
            })?;
            *slot = *word;
        }
        Ok(())
    }

    fn input(&mut self, index: u32, chan: usize) -> Result<LaneVec, BuildError> {
        match self.inputs.get(&(index, chan)) {
            Some(v) => Ok(LaneVec::from_words(ElemKind::F32, v.words().to_vec())?),
            None => Ok(LaneVec::zero(ElemKind::F32, self.lanes)),
        }
    }

    fn constant_buffer(&mut self, slot: u32) -> Result<(ArrayId, LaneVec), BuildError> {
        self.bind(slot, true)
    }

    fn buffer(&mut self, slot: u32) -> Result<(ArrayId, LaneVec), BuildError> {
        self.bind(slot, false)
    }

    fn new_label(&mut self) -> LabelId {
        let id = LabelId(self.next_label);
        self.next_label += 1;
        id
    }

    fn define_label(&mut self, _label: LabelId) -> Result<(), BuildError> {
        Ok(())
    }

    fn loop_back_edge(
        &mut self,
        exec: &LaneVec,
        limiter: &LaneVec,
        _header: LabelId,
    ) -> Result<BackEdge, BuildError> {
        let budget = limiter.to_i32().first().copied().unwrap_or(0);
        Ok(if exec.any_active() && budget > 0 {
            BackEdge::Taken
        } else {
            BackEdge::NotTaken
        })
    }
}
