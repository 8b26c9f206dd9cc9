use crate::ops::{self, BinaryOp, CompareOp, Ordering, TernaryOp, UnaryOp};
use crate::{ElemKind, VecError};

/// Immutable fixed-lane-count vector.
///
/// Invariants:
/// - `words.len()` is a multiple of `kind.words_per_lane()`.
/// - `Mask` vectors only hold `0` or `0xFFFF_FFFF` words.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LaneVec {
    kind: ElemKind,
    words: Vec<u32>,
}

impl LaneVec {
    /// Builds a vector from per-lane bit patterns (low 32 bits used for narrow kinds).
    pub fn from_lane_bits(
        kind: ElemKind,
        lanes: impl IntoIterator<Item = u64>,
    ) -> Result<Self, VecError> {
        let mut words = Vec::new();
        for (lane, bits) in lanes.into_iter().enumerate() {
            if kind.is_wide() {
                words.push(bits as u32);
                words.push((bits >> 32) as u32);
            } else {
                let word = bits as u32;
                if kind == ElemKind::Mask && word != 0 && word != u32::MAX {
                    return Err(VecError::InvalidMask { lane, bits });
                }
                words.push(word);
            }
        }
        Ok(Self { kind, words })
    }

    pub fn from_words(kind: ElemKind, words: Vec<u32>) -> Result<Self, VecError> {
        if words.len() % kind.words_per_lane() != 0 {
            return Err(VecError::WidthMismatch {
                words: words.len(),
                to: kind,
            });
        }
        if kind == ElemKind::Mask {
            if let Some(lane) = words.iter().position(|&w| w != 0 && w != u32::MAX) {
                return Err(VecError::InvalidMask {
                    lane,
                    bits: words[lane] as u64,
                });
            }
        }
        Ok(Self { kind, words })
    }

    pub fn splat(kind: ElemKind, lanes: usize, bits: u64) -> Result<Self, VecError> {
        Self::from_lane_bits(kind, std::iter::repeat(bits).take(lanes))
    }

    pub fn zero(kind: ElemKind, lanes: usize) -> Self {
        Self {
            kind,
            words: vec![0; lanes * kind.words_per_lane()],
        }
    }

    /// Mask with every lane active.
    pub fn all_active(lanes: usize) -> Self {
        Self {
            kind: ElemKind::Mask,
            words: vec![u32::MAX; lanes],
        }
    }

    /// `i32` vector holding `[0, 1, .., lanes - 1]`.
    pub fn lane_ids(lanes: usize) -> Self {
        Self {
            kind: ElemKind::I32,
            words: (0..lanes as u32).collect(),
        }
    }

    pub fn from_f32(values: &[f32]) -> Self {
        Self {
            kind: ElemKind::F32,
            words: values.iter().map(|v| v.to_bits()).collect(),
        }
    }

    pub fn from_i32(values: &[i32]) -> Self {
        Self {
            kind: ElemKind::I32,
            words: values.iter().map(|&v| v as u32).collect(),
        }
    }

    pub fn from_u32(values: &[u32]) -> Self {
        Self {
            kind: ElemKind::U32,
            words: values.to_vec(),
        }
    }

    pub fn from_f64(values: &[f64]) -> Self {
        Self::wide(ElemKind::F64, values.iter().map(|v| v.to_bits()))
    }

    pub fn from_i64(values: &[i64]) -> Self {
        Self::wide(ElemKind::I64, values.iter().map(|&v| v as u64))
    }

    pub fn from_u64(values: &[u64]) -> Self {
        Self::wide(ElemKind::U64, values.iter().copied())
    }

    pub fn from_bools(values: &[bool]) -> Self {
        Self {
            kind: ElemKind::Mask,
            words: values.iter().map(|&b| if b { u32::MAX } else { 0 }).collect(),
        }
    }

    fn wide(kind: ElemKind, lanes: impl Iterator<Item = u64>) -> Self {
        let mut words = Vec::new();
        for bits in lanes {
            words.push(bits as u32);
            words.push((bits >> 32) as u32);
        }
        Self { kind, words }
    }

    pub fn kind(&self) -> ElemKind {
        self.kind
    }

    pub fn lanes(&self) -> usize {
        self.words.len() / self.kind.words_per_lane()
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Bit pattern of one lane, `None` when `lane` is out of range.
    pub fn lane(&self, lane: usize) -> Option<u64> {
        if self.kind.is_wide() {
            let lo = *self.words.get(lane * 2)? as u64;
            let hi = *self.words.get(lane * 2 + 1)? as u64;
            Some(lo | (hi << 32))
        } else {
            self.words.get(lane).map(|&w| w as u64)
        }
    }

    fn lane_iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.lanes()).filter_map(move |l| self.lane(l))
    }

    // Typed readers reinterpret the raw words; they do not convert.

    pub fn to_f32(&self) -> Vec<f32> {
        self.words.iter().map(|&w| f32::from_bits(w)).collect()
    }

    pub fn to_i32(&self) -> Vec<i32> {
        self.words.iter().map(|&w| w as i32).collect()
    }

    pub fn to_u32(&self) -> Vec<u32> {
        self.words.clone()
    }

    pub fn to_u64(&self) -> Vec<u64> {
        self.words
            .chunks_exact(2)
            .map(|p| p[0] as u64 | ((p[1] as u64) << 32))
            .collect()
    }

    pub fn to_i64(&self) -> Vec<i64> {
        self.to_u64().into_iter().map(|v| v as i64).collect()
    }

    pub fn to_f64(&self) -> Vec<f64> {
        self.to_u64().into_iter().map(f64::from_bits).collect()
    }

    /// Per-lane activity: a lane is active when any of its bits are set.
    pub fn to_bools(&self) -> Vec<bool> {
        self.lane_iter().map(|b| b != 0).collect()
    }

    pub fn any_active(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    fn expect_kind(&self, kind: ElemKind) -> Result<(), VecError> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(VecError::KindMismatch {
                expected: kind,
                found: self.kind,
            })
        }
    }

    fn expect_lanes(&self, other: &LaneVec) -> Result<(), VecError> {
        if self.lanes() == other.lanes() {
            Ok(())
        } else {
            Err(VecError::LaneCountMismatch {
                left: self.lanes(),
                right: other.lanes(),
            })
        }
    }

    fn same_shape(&self, other: &LaneVec) -> Result<(), VecError> {
        other.expect_kind(self.kind)?;
        self.expect_lanes(other)
    }

    pub fn unary(&self, op: UnaryOp) -> Result<Self, VecError> {
        let kind = self.kind;
        let out_kind = op.result_kind(kind);
        let unsupported = VecError::Unsupported {
            op: op.name(),
            kind,
        };
        let mut lanes = Vec::with_capacity(self.lanes());
        for a in self.lane_iter() {
            let r = match (kind, op) {
                (ElemKind::F32, UnaryOp::PackHalf) => Some(ops::pack_half(a)),
                (ElemKind::F32, _) => ops::unary_f32(op, a),
                (ElemKind::F64, _) => ops::unary_f64(op, a),
                (ElemKind::Mask, UnaryOp::Not) => Some(!a & u32::MAX as u64),
                (ElemKind::Mask, _) => None,
                _ => ops::unary_int(op, kind, a),
            };
            lanes.push(r.ok_or_else(|| unsupported.clone())?);
        }
        Self::from_lane_bits(out_kind, lanes)
    }

    pub fn binary(&self, op: BinaryOp, rhs: &LaneVec) -> Result<Self, VecError> {
        self.same_shape(rhs)?;
        let kind = self.kind;
        let unsupported = VecError::Unsupported {
            op: op.name(),
            kind,
        };
        let mut lanes = Vec::with_capacity(self.lanes());
        for (a, b) in self.lane_iter().zip(rhs.lane_iter()) {
            let r = match kind {
                ElemKind::F32 => ops::binary_f32(op, a, b),
                ElemKind::F64 => ops::binary_f64(op, a, b),
                ElemKind::Mask => match op {
                    BinaryOp::And => Some(a & b),
                    BinaryOp::Or => Some(a | b),
                    BinaryOp::Xor => Some(a ^ b),
                    _ => None,
                },
                _ => ops::binary_int(op, kind, a, b),
            };
            lanes.push(r.ok_or_else(|| unsupported.clone())?);
        }
        Self::from_lane_bits(kind, lanes)
    }

    pub fn ternary(&self, op: TernaryOp, b: &LaneVec, c: &LaneVec) -> Result<Self, VecError> {
        self.same_shape(b)?;
        self.same_shape(c)?;
        let kind = self.kind;
        let unsupported = VecError::Unsupported {
            op: op.name(),
            kind,
        };
        let mut lanes = Vec::with_capacity(self.lanes());
        for ((x, y), z) in self.lane_iter().zip(b.lane_iter()).zip(c.lane_iter()) {
            let r = match kind {
                ElemKind::F32 => ops::ternary_f32(op, x, y, z),
                ElemKind::F64 => ops::ternary_f64(op, x, y, z),
                ElemKind::Mask => None,
                _ => ops::ternary_int(op, kind, x, y, z),
            };
            lanes.push(r.ok_or_else(|| unsupported.clone())?);
        }
        Self::from_lane_bits(kind, lanes)
    }

    /// Lane-wise comparison producing a `Mask` vector.
    pub fn compare(
        &self,
        op: CompareOp,
        ordering: Ordering,
        rhs: &LaneVec,
    ) -> Result<Self, VecError> {
        self.same_shape(rhs)?;
        let kind = self.kind;
        let lanes = self
            .lane_iter()
            .zip(rhs.lane_iter())
            .map(|(a, b)| match kind {
                ElemKind::F32 => ops::compare_f32(op, ordering, a, b),
                ElemKind::F64 => ops::compare_f64(op, ordering, a, b),
                _ => ops::compare_int(op, kind, a, b),
            });
        Ok(Self::from_bools(&lanes.collect::<Vec<_>>()))
    }

    /// Numeric conversion. Float to integer saturates and maps NaN to zero; integer to integer
    /// wraps after sign or zero extension.
    pub fn convert(&self, to: ElemKind) -> Result<Self, VecError> {
        if self.kind == ElemKind::Mask || to == ElemKind::Mask {
            return Err(VecError::Unsupported {
                op: "convert",
                kind: if to == ElemKind::Mask { to } else { self.kind },
            });
        }
        let from = self.kind;
        let lanes = self.lane_iter().map(|bits| {
            if from.is_float() {
                let v = if from == ElemKind::F32 {
                    f32::from_bits(bits as u32) as f64
                } else {
                    f64::from_bits(bits)
                };
                match to {
                    ElemKind::F32 => (v as f32).to_bits() as u64,
                    ElemKind::F64 => v.to_bits(),
                    ElemKind::I32 => v as i32 as u32 as u64,
                    ElemKind::U32 => v as u32 as u64,
                    ElemKind::I64 => v as i64 as u64,
                    _ => v as u64,
                }
            } else {
                let v: i128 = match from {
                    ElemKind::I32 => bits as u32 as i32 as i128,
                    ElemKind::I64 => bits as i64 as i128,
                    ElemKind::U32 => (bits as u32) as i128,
                    _ => bits as i128,
                };
                match to {
                    ElemKind::F32 => (v as f32).to_bits() as u64,
                    ElemKind::F64 => (v as f64).to_bits(),
                    _ if to.is_wide() => v as u64,
                    _ => v as u64 & u32::MAX as u64,
                }
            }
        });
        Self::from_lane_bits(to, lanes.collect::<Vec<_>>())
    }

    /// Reinterprets the raw words as `to`; the lane count follows the word count.
    pub fn bitcast(&self, to: ElemKind) -> Result<Self, VecError> {
        Self::from_words(to, self.words.clone())
    }

    /// `mask ? a : b` per lane. `self` must be a `Mask` with the operands' lane count.
    pub fn select(&self, a: &LaneVec, b: &LaneVec) -> Result<Self, VecError> {
        self.expect_kind(ElemKind::Mask)?;
        a.same_shape(b)?;
        self.expect_lanes(a)?;
        let wpl = a.kind.words_per_lane();
        let mut words = Vec::with_capacity(a.words.len());
        for (lane, &m) in self.words.iter().enumerate() {
            let src = if m != 0 { a } else { b };
            words.extend_from_slice(&src.words[lane * wpl..(lane + 1) * wpl]);
        }
        Ok(Self { kind: a.kind, words })
    }

    /// Interleaves lane `i` of `self` and lane `i` of `other`: `[a0, b0, a1, b1, ..]`.
    pub fn interleave(&self, other: &LaneVec) -> Result<Self, VecError> {
        self.same_shape(other)?;
        if self.kind.is_wide() {
            return Err(VecError::Unsupported {
                op: "interleave",
                kind: self.kind,
            });
        }
        let words = self
            .words
            .iter()
            .zip(&other.words)
            .flat_map(|(&a, &b)| [a, b])
            .collect();
        Ok(Self {
            kind: self.kind,
            words,
        })
    }

    /// Inverse of [`LaneVec::interleave`]: returns the even lanes and the odd lanes.
    pub fn deinterleave(&self) -> Result<(Self, Self), VecError> {
        if self.kind.is_wide() || self.words.len() % 2 != 0 {
            return Err(VecError::Unsupported {
                op: "deinterleave",
                kind: self.kind,
            });
        }
        let even = self.words.iter().step_by(2).copied().collect();
        let odd = self.words.iter().skip(1).step_by(2).copied().collect();
        Ok((
            Self {
                kind: self.kind,
                words: even,
            },
            Self {
                kind: self.kind,
                words: odd,
            },
        ))
    }
}
