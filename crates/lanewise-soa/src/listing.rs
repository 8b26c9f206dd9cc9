//! Recording [`TargetBuilder`] that renders a textual SSA listing.
//!
//! Every value-producing request becomes one `%n = op.kind operands` line. The listing is
//! what a deferred backend would lower; loops appear once, closed by a `br.any` back edge.

use core::fmt;

use lanewise_vec::{BinaryOp, CompareOp, ElemKind, Ordering, TernaryOp, UnaryOp};

use crate::builder::{BackEdge, BuildError, TargetBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingValue {
    id: u32,
    kind: ElemKind,
}

impl ListingValue {
    pub fn kind(self) -> ElemKind {
        self.kind
    }
}

impl fmt::Display for ListingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingVar(u32);

impl fmt::Display for ListingVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingArray(u32);

impl fmt::Display for ListingArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@a{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingLabel(u32);

impl fmt::Display for ListingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

fn ordering_name(ordering: Ordering) -> &'static str {
    match ordering {
        Ordering::Ordered => "ord",
        Ordering::Unordered => "uno",
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListingBuilder {
    lanes: usize,
    next_value: u32,
    var_kinds: Vec<ElemKind>,
    next_array: u32,
    next_label: u32,
    lines: Vec<String>,
}

impl ListingBuilder {
    pub fn new(lanes: usize) -> Self {
        Self {
            lanes,
            ..Self::default()
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    fn value(&mut self, kind: ElemKind) -> ListingValue {
        let v = ListingValue {
            id: self.next_value,
            kind,
        };
        self.next_value += 1;
        v
    }

    fn def(&mut self, kind: ElemKind, rhs: fmt::Arguments<'_>) -> ListingValue {
        let v = self.value(kind);
        self.lines.push(format!("{v} = {rhs}"));
        v
    }

    fn var_kind(&self, var: ListingVar) -> Result<ElemKind, BuildError> {
        self.var_kinds
            .get(var.0 as usize)
            .copied()
            .ok_or(BuildError::UnknownHandle {
                what: "variable",
                id: var.0,
            })
    }
}

impl TargetBuilder for ListingBuilder {
    type Value = ListingValue;
    type Var = ListingVar;
    type Array = ListingArray;
    type Label = ListingLabel;

    fn lanes(&self) -> usize {
        self.lanes
    }

    fn kind_of(&self, value: &ListingValue) -> ElemKind {
        value.kind
    }

    fn splat(&mut self, kind: ElemKind, bits: u64) -> Result<ListingValue, BuildError> {
        Ok(self.def(kind, format_args!("splat.{kind} {bits:#x}")))
    }

    fn lane_ids(&mut self) -> Result<ListingValue, BuildError> {
        Ok(self.def(ElemKind::I32, format_args!("lane_ids")))
    }

    fn undef(&mut self, kind: ElemKind) -> Result<ListingValue, BuildError> {
        Ok(self.def(kind, format_args!("undef.{kind}")))
    }

    fn unary(&mut self, op: UnaryOp, a: &ListingValue) -> Result<ListingValue, BuildError> {
        let kind = op.result_kind(a.kind);
        Ok(self.def(kind, format_args!("{}.{} {a}", op.name(), a.kind)))
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        a: &ListingValue,
        b: &ListingValue,
    ) -> Result<ListingValue, BuildError> {
        Ok(self.def(a.kind, format_args!("{}.{} {a}, {b}", op.name(), a.kind)))
    }

    fn ternary(
        &mut self,
        op: TernaryOp,
        a: &ListingValue,
        b: &ListingValue,
        c: &ListingValue,
    ) -> Result<ListingValue, BuildError> {
        Ok(self.def(a.kind, format_args!("{}.{} {a}, {b}, {c}", op.name(), a.kind)))
    }

    fn compare(
        &mut self,
        op: CompareOp,
        ordering: Ordering,
        a: &ListingValue,
        b: &ListingValue,
    ) -> Result<ListingValue, BuildError> {
        let order = if a.kind.is_float() {
            ordering_name(ordering)
        } else {
            "int"
        };
        Ok(self.def(
            ElemKind::Mask,
            format_args!("cmp.{}.{order}.{} {a}, {b}", op.name(), a.kind),
        ))
    }

    fn convert(&mut self, a: &ListingValue, to: ElemKind) -> Result<ListingValue, BuildError> {
        Ok(self.def(to, format_args!("convert.{}.{to} {a}", a.kind)))
    }

    fn bitcast(&mut self, a: &ListingValue, to: ElemKind) -> Result<ListingValue, BuildError> {
        Ok(self.def(to, format_args!("bitcast.{}.{to} {a}", a.kind)))
    }

    fn select(
        &mut self,
        mask: &ListingValue,
        a: &ListingValue,
        b: &ListingValue,
    ) -> Result<ListingValue, BuildError> {
        Ok(self.def(a.kind, format_args!("select.{} {mask}, {a}, {b}", a.kind)))
    }

    fn interleave(
        &mut self,
        a: &ListingValue,
        b: &ListingValue,
    ) -> Result<ListingValue, BuildError> {
        Ok(self.def(a.kind, format_args!("interleave.{} {a}, {b}", a.kind)))
    }

    fn deinterleave(
        &mut self,
        a: &ListingValue,
    ) -> Result<(ListingValue, ListingValue), BuildError> {
        let even = self.value(a.kind);
        let odd = self.value(a.kind);
        self.lines
            .push(format!("{even}, {odd} = deinterleave.{} {a}", a.kind));
        Ok((even, odd))
    }

    fn alloca(&mut self, init: &ListingValue) -> Result<ListingVar, BuildError> {
        let var = ListingVar(self.var_kinds.len() as u32);
        self.var_kinds.push(init.kind);
        self.lines.push(format!("{var} = alloca.{} {init}", init.kind));
        Ok(var)
    }

    fn load(&mut self, var: ListingVar) -> Result<ListingValue, BuildError> {
        let kind = self.var_kind(var)?;
        Ok(self.def(kind, format_args!("load.{kind} {var}")))
    }

    fn store(
        &mut self,
        var: ListingVar,
        value: &ListingValue,
        pred: Option<&ListingValue>,
    ) -> Result<(), BuildError> {
        self.var_kind(var)?;
        self.lines.push(match pred {
            Some(pred) => format!("store {var}, {value}, pred {pred}"),
            None => format!("store {var}, {value}"),
        });
        Ok(())
    }

    fn alloc_array(&mut self, len: usize) -> Result<ListingArray, BuildError> {
        let array = ListingArray(self.next_array);
        self.next_array += 1;
        self.lines.push(format!("{array} = array {len}"));
        Ok(array)
    }

    fn gather(
        &mut self,
        array: ListingArray,
        offsets: &ListingValue,
        kind: ElemKind,
        pred: Option<&ListingValue>,
    ) -> Result<ListingValue, BuildError> {
        Ok(match pred {
            Some(pred) => self.def(
                kind,
                format_args!("gather.{kind} {array}[{offsets}], pred {pred}"),
            ),
            None => self.def(kind, format_args!("gather.{kind} {array}[{offsets}]")),
        })
    }

    fn scatter(
        &mut self,
        array: ListingArray,
        offsets: &ListingValue,
        value: &ListingValue,
        pred: Option<&ListingValue>,
    ) -> Result<(), BuildError> {
        self.lines.push(match pred {
            Some(pred) => format!("scatter {array}[{offsets}], {value}, pred {pred}"),
            None => format!("scatter {array}[{offsets}], {value}"),
        });
        Ok(())
    }

    fn input(&mut self, index: u32, chan: usize) -> Result<ListingValue, BuildError> {
        let chan = ["x", "y", "z", "w"]
            .get(chan)
            .ok_or(BuildError::Unsupported("input channel out of range"))?;
        Ok(self.def(ElemKind::F32, format_args!("input IN[{index}].{chan}")))
    }

    fn constant_buffer(&mut self, slot: u32) -> Result<(ListingArray, ListingValue), BuildError> {
        let array = ListingArray(self.next_array);
        self.next_array += 1;
        let size = self.value(ElemKind::I32);
        self.lines
            .push(format!("{array}, {size} = constant_buffer {slot}"));
        Ok((array, size))
    }

    fn buffer(&mut self, slot: u32) -> Result<(ListingArray, ListingValue), BuildError> {
        let array = ListingArray(self.next_array);
        self.next_array += 1;
        let size = self.value(ElemKind::I32);
        self.lines.push(format!("{array}, {size} = buffer {slot}"));
        Ok((array, size))
    }

    fn new_label(&mut self) -> ListingLabel {
        let label = ListingLabel(self.next_label);
        self.next_label += 1;
        label
    }

    fn define_label(&mut self, label: ListingLabel) -> Result<(), BuildError> {
        self.lines.push(format!("{label}:"));
        Ok(())
    }

    fn loop_back_edge(
        &mut self,
        exec: &ListingValue,
        limiter: &ListingValue,
        header: ListingLabel,
    ) -> Result<BackEdge, BuildError> {
        self.lines
            .push(format!("br.any {exec}, {limiter}, {header}"));
        Ok(BackEdge::Emitted)
    }
}
