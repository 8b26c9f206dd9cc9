//! Decoded instruction stream consumed by the translator.

use core::fmt;

use bitflags::bitflags;
use lanewise_vec::ElemKind;

use crate::limits::DEFAULT_MAX_OUTPUT_VERTICES;
use crate::opcode::Opcode;

/// Opaque position in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrIndex(u32);

impl InstrIndex {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub const fn prev(self) -> Option<Self> {
        match self.0.checked_sub(1) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Display for InstrIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageClass {
    Temporary,
    Output,
    Input,
    Address,
    Immediate,
    Constant,
    Buffer,
}

impl StorageClass {
    pub const COUNT: usize = 7;

    pub const ALL: [StorageClass; Self::COUNT] = [
        StorageClass::Temporary,
        StorageClass::Output,
        StorageClass::Input,
        StorageClass::Address,
        StorageClass::Immediate,
        StorageClass::Constant,
        StorageClass::Buffer,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn flag(self) -> StorageClasses {
        match self {
            StorageClass::Temporary => StorageClasses::TEMPORARY,
            StorageClass::Output => StorageClasses::OUTPUT,
            StorageClass::Input => StorageClasses::INPUT,
            StorageClass::Address => StorageClasses::ADDRESS,
            StorageClass::Immediate => StorageClasses::IMMEDIATE,
            StorageClass::Constant => StorageClasses::CONSTANT,
            StorageClass::Buffer => StorageClasses::BUFFER,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            StorageClass::Temporary => "TEMP",
            StorageClass::Output => "OUT",
            StorageClass::Input => "IN",
            StorageClass::Address => "ADDR",
            StorageClass::Immediate => "IMM",
            StorageClass::Constant => "CONST",
            StorageClass::Buffer => "BUFFER",
        }
    }
}

bitflags! {
    /// Set of storage classes, used to record which classes are indirectly addressed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StorageClasses: u8 {
        const TEMPORARY = 1 << 0;
        const OUTPUT = 1 << 1;
        const INPUT = 1 << 2;
        const ADDRESS = 1 << 3;
        const IMMEDIATE = 1 << 4;
        const CONSTANT = 1 << 5;
        const BUFFER = 1 << 6;
    }
}

/// Interpretation applied to the raw channel bits of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Float,
    Int,
    Uint,
    Double,
    Int64,
    Uint64,
    /// Raw bits, moved without interpretation.
    Untyped,
}

impl TypeTag {
    pub const fn kind(self) -> ElemKind {
        match self {
            TypeTag::Float | TypeTag::Untyped => ElemKind::F32,
            TypeTag::Int => ElemKind::I32,
            TypeTag::Uint => ElemKind::U32,
            TypeTag::Double => ElemKind::F64,
            TypeTag::Int64 => ElemKind::I64,
            TypeTag::Uint64 => ElemKind::U64,
        }
    }

    pub const fn is_64bit(self) -> bool {
        matches!(self, TypeTag::Double | TypeTag::Int64 | TypeTag::Uint64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteMask(pub u8);

impl WriteMask {
    pub const X: WriteMask = WriteMask(0b0001);
    pub const Y: WriteMask = WriteMask(0b0010);
    pub const Z: WriteMask = WriteMask(0b0100);
    pub const W: WriteMask = WriteMask(0b1000);
    pub const XY: WriteMask = WriteMask(0b0011);
    pub const ZW: WriteMask = WriteMask(0b1100);
    pub const XYZW: WriteMask = WriteMask(0b1111);

    pub const fn contains(self, chan: usize) -> bool {
        chan < 4 && self.0 & (1 << chan) != 0
    }

    pub fn channels(self) -> impl Iterator<Item = usize> {
        (0..4).filter(move |&c| self.contains(c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle(pub [u8; 4]);

impl Swizzle {
    pub const XYZW: Swizzle = Swizzle([0, 1, 2, 3]);

    pub const fn splat(chan: u8) -> Self {
        Self([chan, chan, chan, chan])
    }

    pub const fn get(self, chan: usize) -> usize {
        (self.0[chan & 3] & 3) as usize
    }
}

/// Per-lane index source: `class[index].chan`, read as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Indirect {
    pub class: StorageClass,
    pub index: u32,
    pub chan: u8,
}

impl Indirect {
    pub const fn address(index: u32, chan: u8) -> Self {
        Self {
            class: StorageClass::Address,
            index,
            chan,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DstRegister {
    pub class: StorageClass,
    pub index: u32,
    pub mask: WriteMask,
    pub indirect: Option<Indirect>,
}

impl DstRegister {
    pub const fn new(class: StorageClass, index: u32) -> Self {
        Self {
            class,
            index,
            mask: WriteMask::XYZW,
            indirect: None,
        }
    }

    #[must_use]
    pub const fn masked(mut self, mask: WriteMask) -> Self {
        self.mask = mask;
        self
    }

    #[must_use]
    pub const fn indirect(mut self, indirect: Indirect) -> Self {
        self.indirect = Some(indirect);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SrcRegister {
    pub class: StorageClass,
    pub index: u32,
    pub swizzle: Swizzle,
    pub negate: bool,
    pub absolute: bool,
    pub indirect: Option<Indirect>,
    /// Overrides the opcode's operand type.
    pub ty: Option<TypeTag>,
    /// Constant buffer slot for `Constant` operands.
    pub dimension: u32,
}

impl SrcRegister {
    pub const fn new(class: StorageClass, index: u32) -> Self {
        Self {
            class,
            index,
            swizzle: Swizzle::XYZW,
            negate: false,
            absolute: false,
            indirect: None,
            ty: None,
            dimension: 0,
        }
    }

    #[must_use]
    pub const fn swizzled(mut self, swizzle: Swizzle) -> Self {
        self.swizzle = swizzle;
        self
    }

    /// Broadcasts one channel to all four.
    #[must_use]
    pub const fn scalar(self, chan: u8) -> Self {
        self.swizzled(Swizzle::splat(chan))
    }

    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    #[must_use]
    pub const fn absolute(mut self) -> Self {
        self.absolute = true;
        self
    }

    #[must_use]
    pub const fn typed(mut self, ty: TypeTag) -> Self {
        self.ty = Some(ty);
        self
    }

    #[must_use]
    pub const fn indirect(mut self, indirect: Indirect) -> Self {
        self.indirect = Some(indirect);
        self
    }

    #[must_use]
    pub const fn in_buffer(mut self, dimension: u32) -> Self {
        self.dimension = dimension;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    D1,
    D2,
    D3,
    Cube,
    D2Array,
}

impl TextureTarget {
    /// Number of coordinate channels consumed (array layer included).
    pub const fn coord_count(self) -> usize {
        match self {
            TextureTarget::D1 => 1,
            TextureTarget::D2 => 2,
            TextureTarget::D3 | TextureTarget::Cube | TextureTarget::D2Array => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureOperand {
    pub target: TextureTarget,
    pub unit: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub saturate: bool,
    pub dst: Vec<DstRegister>,
    pub src: Vec<SrcRegister>,
    /// Subroutine entry for `CAL`.
    pub label: Option<InstrIndex>,
    pub texture: Option<TextureOperand>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            saturate: false,
            dst: Vec::new(),
            src: Vec::new(),
            label: None,
            texture: None,
        }
    }

    #[must_use]
    pub fn with_dst(mut self, dst: DstRegister) -> Self {
        self.dst.push(dst);
        self
    }

    #[must_use]
    pub fn with_src(mut self, src: SrcRegister) -> Self {
        self.src.push(src);
        self
    }

    #[must_use]
    pub fn with_label(mut self, target: InstrIndex) -> Self {
        self.label = Some(target);
        self
    }

    #[must_use]
    pub fn with_texture(mut self, target: TextureTarget, unit: u32) -> Self {
        self.texture = Some(TextureOperand { target, unit });
        self
    }

    #[must_use]
    pub fn saturated(mut self) -> Self {
        self.saturate = true;
        self
    }
}

/// Static capability metadata for one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInfo {
    /// Highest register index referenced per class, `None` when the class is unused.
    pub file_max: [Option<u32>; StorageClass::COUNT],
    /// Classes accessed through a per-lane index anywhere in the program.
    pub indirect: StorageClasses,
    /// Immediate vectors, four raw 32-bit channels each.
    pub immediates: Vec<[u32; 4]>,
    /// Geometry-stage bound on vertices emitted per invocation.
    pub max_output_vertices: u32,
}

impl Default for ProgramInfo {
    fn default() -> Self {
        Self {
            file_max: [None; StorageClass::COUNT],
            indirect: StorageClasses::empty(),
            immediates: Vec::new(),
            max_output_vertices: DEFAULT_MAX_OUTPUT_VERTICES,
        }
    }
}

impl ProgramInfo {
    pub fn scan(instructions: &[Instruction], immediates: Vec<[u32; 4]>) -> Self {
        let mut info = Self {
            immediates,
            ..Self::default()
        };
        if !info.immediates.is_empty() {
            info.declare(StorageClass::Immediate, info.immediates.len() as u32 - 1);
        }
        for inst in instructions {
            for dst in &inst.dst {
                info.note(dst.class, dst.index, dst.indirect);
            }
            for src in &inst.src {
                info.note(src.class, src.index, src.indirect);
            }
        }
        info
    }

    fn note(&mut self, class: StorageClass, index: u32, indirect: Option<Indirect>) {
        self.declare(class, index);
        if let Some(ind) = indirect {
            self.indirect |= class.flag();
            self.declare(ind.class, ind.index);
        }
    }

    /// Raises the declared maximum index of `class` to at least `index`.
    pub fn declare(&mut self, class: StorageClass, index: u32) {
        let slot = &mut self.file_max[class.index()];
        *slot = Some(slot.map_or(index, |m| m.max(index)));
    }

    pub fn file_max(&self, class: StorageClass) -> Option<u32> {
        self.file_max[class.index()]
    }

    pub fn uses_indirect(&self, class: StorageClass) -> bool {
        self.indirect.contains(class.flag())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,
    info: ProgramInfo,
}

impl Program {
    /// Builds a program, deriving [`ProgramInfo`] from the instruction stream.
    pub fn new(instructions: Vec<Instruction>, immediates: Vec<[u32; 4]>) -> Self {
        let info = ProgramInfo::scan(&instructions, immediates);
        Self { instructions, info }
    }

    pub fn with_info(instructions: Vec<Instruction>, info: ProgramInfo) -> Self {
        Self { instructions, info }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn info(&self) -> &ProgramInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut ProgramInfo {
        &mut self.info
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, at: InstrIndex) -> Option<&Instruction> {
        self.instructions.get(at.index())
    }

    pub fn opcode_at(&self, at: InstrIndex) -> Option<Opcode> {
        self.get(at).map(|inst| inst.opcode)
    }
}
