use core::fmt;

use crate::program::TypeTag;

/// How an opcode's results map onto destination channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// No register result (control flow, kills, stores to resources).
    None,
    /// One independent computation per enabled destination channel.
    Componentwise,
    /// One scalar result written to every enabled channel.
    Replicate,
    /// One computation filling all four channels at once.
    Vector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub num_dst: u8,
    pub num_src: u8,
    pub output: OutputMode,
}

const fn info(num_dst: u8, num_src: u8, output: OutputMode) -> OpcodeInfo {
    OpcodeInfo {
        num_dst,
        num_src,
        output,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    Nop,
    End,
    // Structured control flow.
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
    Kill,
    KillIf,
    EmitVertex,
    EndPrimitive,
    // Float.
    Mov,
    Add,
    Mul,
    Mad,
    Fma,
    Lrp,
    Div,
    Min,
    Max,
    Frc,
    Flr,
    Ceil,
    Round,
    Trunc,
    Ssg,
    Cmp,
    Slt,
    Sge,
    Seq,
    Sne,
    Sgt,
    Sle,
    Fseq,
    Fsne,
    Fslt,
    Fsge,
    Rcp,
    Rsq,
    Sqrt,
    Ex2,
    Lg2,
    Pow,
    Sin,
    Cos,
    Dp2,
    Dp3,
    Dp4,
    Exp,
    Log,
    Lit,
    Dst,
    Pk2h,
    Up2h,
    // Address and conversions.
    Arl,
    Arr,
    Uarl,
    F2i,
    F2u,
    I2f,
    U2f,
    // 32-bit integer.
    Uadd,
    Umul,
    Umad,
    ImulHi,
    UmulHi,
    UmulLoHi,
    Idiv,
    Udiv,
    Mod,
    Umod,
    Imax,
    Imin,
    Umax,
    Umin,
    Ineg,
    Iabs,
    Issg,
    Shl,
    Ishr,
    Ushr,
    And,
    Or,
    Xor,
    Not,
    Useq,
    Usne,
    Uslt,
    Usge,
    Islt,
    Isge,
    Ucmp,
    Popc,
    Lsb,
    Imsb,
    Umsb,
    Ibfe,
    Ubfe,
    Bfi,
    Brev,
    // Double precision.
    Dadd,
    Dmul,
    Dmad,
    Ddiv,
    Dmax,
    Dmin,
    Dabs,
    Dneg,
    Drcp,
    Dsqrt,
    Drsq,
    Dfrac,
    Dseq,
    Dsne,
    Dslt,
    Dsge,
    F2d,
    D2f,
    D2i,
    D2u,
    I2d,
    U2d,
    // 64-bit integer.
    U64Add,
    U64Mul,
    U64Div,
    I64Div,
    U64Mod,
    I64Mod,
    U64Shl,
    I64Shr,
    U64Shr,
    I64Abs,
    I64Neg,
    I64Ssg,
    U64Seq,
    U64Sne,
    U64Slt,
    U64Sge,
    I64Slt,
    I64Sge,
    U64Min,
    U64Max,
    I64Min,
    I64Max,
    F2i64,
    F2u64,
    D2i64,
    D2u64,
    I2i64,
    U2i64,
    I642f,
    U642f,
    I642d,
    U642d,
    // Resources.
    Tex,
    Txb,
    Txl,
    Txp,
    Txf,
    Txq,
    Load,
    Store,
}

impl Opcode {
    pub const fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "NOP",
            End => "END",
            If => "IF",
            Uif => "UIF",
            Else => "ELSE",
            EndIf => "ENDIF",
            BgnLoop => "BGNLOOP",
            EndLoop => "ENDLOOP",
            Brk => "BRK",
            Cont => "CONT",
            Switch => "SWITCH",
            Case => "CASE",
            Default => "DEFAULT",
            EndSwitch => "ENDSWITCH",
            Cal => "CAL",
            Ret => "RET",
            BgnSub => "BGNSUB",
            EndSub => "ENDSUB",
            Kill => "KILL",
            KillIf => "KILL_IF",
            EmitVertex => "EMIT",
            EndPrimitive => "ENDPRIM",
            Mov => "MOV",
            Add => "ADD",
            Mul => "MUL",
            Mad => "MAD",
            Fma => "FMA",
            Lrp => "LRP",
            Div => "DIV",
            Min => "MIN",
            Max => "MAX",
            Frc => "FRC",
            Flr => "FLR",
            Ceil => "CEIL",
            Round => "ROUND",
            Trunc => "TRUNC",
            Ssg => "SSG",
            Cmp => "CMP",
            Slt => "SLT",
            Sge => "SGE",
            Seq => "SEQ",
            Sne => "SNE",
            Sgt => "SGT",
            Sle => "SLE",
            Fseq => "FSEQ",
            Fsne => "FSNE",
            Fslt => "FSLT",
            Fsge => "FSGE",
            Rcp => "RCP",
            Rsq => "RSQ",
            Sqrt => "SQRT",
            Ex2 => "EX2",
            Lg2 => "LG2",
            Pow => "POW",
            Sin => "SIN",
            Cos => "COS",
            Dp2 => "DP2",
            Dp3 => "DP3",
            Dp4 => "DP4",
            Exp => "EXP",
            Log => "LOG",
            Lit => "LIT",
            Dst => "DST",
            Pk2h => "PK2H",
            Up2h => "UP2H",
            Arl => "ARL",
            Arr => "ARR",
            Uarl => "UARL",
            F2i => "F2I",
            F2u => "F2U",
            I2f => "I2F",
            U2f => "U2F",
            Uadd => "UADD",
            Umul => "UMUL",
            Umad => "UMAD",
            ImulHi => "IMUL_HI",
            UmulHi => "UMUL_HI",
            UmulLoHi => "UMUL_LOHI",
            Idiv => "IDIV",
            Udiv => "UDIV",
            Mod => "MOD",
            Umod => "UMOD",
            Imax => "IMAX",
            Imin => "IMIN",
            Umax => "UMAX",
            Umin => "UMIN",
            Ineg => "INEG",
            Iabs => "IABS",
            Issg => "ISSG",
            Shl => "SHL",
            Ishr => "ISHR",
            Ushr => "USHR",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Not => "NOT",
            Useq => "USEQ",
            Usne => "USNE",
            Uslt => "USLT",
            Usge => "USGE",
            Islt => "ISLT",
            Isge => "ISGE",
            Ucmp => "UCMP",
            Popc => "POPC",
            Lsb => "LSB",
            Imsb => "IMSB",
            Umsb => "UMSB",
            Ibfe => "IBFE",
            Ubfe => "UBFE",
            Bfi => "BFI",
            Brev => "BREV",
            Dadd => "DADD",
            Dmul => "DMUL",
            Dmad => "DMAD",
            Ddiv => "DDIV",
            Dmax => "DMAX",
            Dmin => "DMIN",
            Dabs => "DABS",
            Dneg => "DNEG",
            Drcp => "DRCP",
            Dsqrt => "DSQRT",
            Drsq => "DRSQ",
            Dfrac => "DFRAC",
            Dseq => "DSEQ",
            Dsne => "DSNE",
            Dslt => "DSLT",
            Dsge => "DSGE",
            F2d => "F2D",
            D2f => "D2F",
            D2i => "D2I",
            D2u => "D2U",
            I2d => "I2D",
            U2d => "U2D",
            U64Add => "U64ADD",
            U64Mul => "U64MUL",
            U64Div => "U64DIV",
            I64Div => "I64DIV",
            U64Mod => "U64MOD",
            I64Mod => "I64MOD",
            U64Shl => "U64SHL",
            I64Shr => "I64SHR",
            U64Shr => "U64SHR",
            I64Abs => "I64ABS",
            I64Neg => "I64NEG",
            I64Ssg => "I64SSG",
            U64Seq => "U64SEQ",
            U64Sne => "U64SNE",
            U64Slt => "U64SLT",
            U64Sge => "U64SGE",
            I64Slt => "I64SLT",
            I64Sge => "I64SGE",
            U64Min => "U64MIN",
            U64Max => "U64MAX",
            I64Min => "I64MIN",
            I64Max => "I64MAX",
            F2i64 => "F2I64",
            F2u64 => "F2U64",
            D2i64 => "D2I64",
            D2u64 => "D2U64",
            I2i64 => "I2I64",
            U2i64 => "U2I64",
            I642f => "I642F",
            U642f => "U642F",
            I642d => "I642D",
            U642d => "U642D",
            Tex => "TEX",
            Txb => "TXB",
            Txl => "TXL",
            Txp => "TXP",
            Txf => "TXF",
            Txq => "TXQ",
            Load => "LOAD",
            Store => "STORE",
        }
    }

    pub const fn info(self) -> OpcodeInfo {
        use Opcode::*;
        use OutputMode as M;
        match self {
            Nop | End | Else | EndIf | BgnLoop | EndLoop | Brk | Cont | Default | EndSwitch
            | Cal | Ret | BgnSub | EndSub | Kill => info(0, 0, M::None),
            If | Uif | Switch | Case | KillIf | EmitVertex | EndPrimitive => info(0, 1, M::None),
            Store => info(1, 2, M::None),

            Mov | Frc | Flr | Ceil | Round | Trunc | Ssg | Arl | Arr | Uarl | F2i | F2u | I2f
            | U2f | Ineg | Iabs | Issg | Not | Popc | Lsb | Imsb | Umsb | Brev | Dabs | Dneg
            | Drcp | Dsqrt | Drsq | Dfrac | F2d | D2f | D2i | D2u | I2d | U2d | I64Abs
            | I64Neg | I64Ssg | F2i64 | F2u64 | D2i64 | D2u64 | I2i64 | U2i64 | I642f
            | U642f | I642d | U642d => info(1, 1, M::Componentwise),

            Add | Mul | Div | Min | Max | Slt | Sge | Seq | Sne | Sgt | Sle | Fseq | Fsne
            | Fslt | Fsge | Uadd | Umul | ImulHi | UmulHi | Idiv | Udiv | Mod | Umod | Imax
            | Imin | Umax | Umin | Shl | Ishr | Ushr | And | Or | Xor | Useq | Usne | Uslt
            | Usge | Islt | Isge | Dadd | Dmul | Ddiv | Dmax | Dmin | Dseq | Dsne | Dslt
            | Dsge | U64Add | U64Mul | U64Div | I64Div | U64Mod | I64Mod | U64Shl | I64Shr
            | U64Shr | U64Seq | U64Sne | U64Slt | U64Sge | I64Slt | I64Sge | U64Min
            | U64Max | I64Min | I64Max => info(1, 2, M::Componentwise),

            Mad | Fma | Lrp | Cmp | Umad | Ucmp | Ibfe | Ubfe | Dmad => {
                info(1, 3, M::Componentwise)
            }
            Bfi => info(1, 4, M::Componentwise),
            UmulLoHi => info(2, 2, M::Componentwise),

            Rcp | Rsq | Sqrt | Ex2 | Lg2 | Sin | Cos | Pk2h => info(1, 1, M::Replicate),
            Pow | Dp2 | Dp3 | Dp4 => info(1, 2, M::Replicate),

            Exp | Log | Lit | Up2h => info(1, 1, M::Vector),
            Dst => info(1, 2, M::Vector),
            Tex | Txb | Txl | Txp | Txf | Txq => info(1, 1, M::Vector),
            Load => info(1, 2, M::Vector),
        }
    }

    /// Interpretation of source operand `index` unless the operand carries its own tag.
    pub const fn src_type(self, index: usize) -> TypeTag {
        use Opcode::*;
        use TypeTag as T;
        match self {
            Mov => T::Untyped,
            Uif | Switch | Case | EmitVertex | EndPrimitive | Uarl | U2f | Uadd | Umul
            | Umad | UmulHi | UmulLoHi | Udiv | Umod | Umax | Umin | Shl | Ushr | And | Or
            | Xor | Not | Useq | Usne | Uslt | Usge | Ucmp | Popc | Lsb | Umsb | Ubfe | Bfi
            | Brev | Up2h | U2d | U2i64 | Load | Store => T::Uint,
            I2f | Ineg | Iabs | Issg | ImulHi | Idiv | Mod | Imax | Imin | Ishr | Islt | Isge
            | Imsb | I2d | I2i64 | Txf | Txq => T::Int,
            // Bitfield offset and width operands are unsigned.
            Ibfe if index > 0 => T::Uint,
            Ibfe => T::Int,
            Dadd | Dmul | Dmad | Ddiv | Dmax | Dmin | Dabs | Dneg | Drcp | Dsqrt | Drsq
            | Dfrac | Dseq | Dsne | Dslt | Dsge | D2f | D2i | D2u | D2i64 | D2u64 => T::Double,
            U64Shl | I64Shr | U64Shr if index == 1 => T::Uint,
            U64Add | U64Mul | U64Div | U64Mod | U64Shl | U64Shr | U64Seq | U64Sne | U64Slt
            | U64Sge | U64Min | U64Max | U642f | U642d => T::Uint64,
            I64Div | I64Mod | I64Shr | I64Abs | I64Neg | I64Ssg | I64Slt | I64Sge | I64Min
            | I64Max | I642f | I642d => T::Int64,
            _ => T::Float,
        }
    }

    pub const fn dst_type(self) -> TypeTag {
        use Opcode::*;
        use TypeTag as T;
        match self {
            Mov => T::Untyped,
            Arl | Arr | Uarl | F2i | Ineg | Iabs | Issg | ImulHi | Idiv | Mod | Imax | Imin
            | Ishr | Imsb | Ibfe | D2i | Txf | Txq => T::Int,
            Fseq | Fsne | Fslt | Fsge | F2u | Uadd | Umul | Umad | UmulHi | UmulLoHi | Udiv
            | Umod | Umax | Umin | Shl | Ushr | And | Or | Xor | Not | Useq | Usne | Uslt
            | Usge | Islt | Isge | Ucmp | Popc | Lsb | Umsb | Ubfe | Bfi | Brev | Pk2h
            | Dseq | Dsne | Dslt | Dsge | D2u | U64Seq | U64Sne | U64Slt | U64Sge | I64Slt
            | I64Sge | Load => T::Uint,
            Dadd | Dmul | Dmad | Ddiv | Dmax | Dmin | Dabs | Dneg | Drcp | Dsqrt | Drsq
            | Dfrac | F2d | I2d | U2d | I642d | U642d => T::Double,
            U64Add | U64Mul | U64Div | U64Mod | U64Shl | U64Shr | U64Min | U64Max | F2u64
            | D2u64 => T::Uint64,
            I64Div | I64Mod | I64Shr | I64Abs | I64Neg | I64Ssg | I64Min | I64Max | F2i64
            | D2i64 | I2i64 | U2i64 => T::Int64,
            _ => T::Float,
        }
    }

    /// Opcodes that open a construct closed by a matching opcode.
    pub const fn is_block_start(self) -> bool {
        matches!(
            self,
            Opcode::If | Opcode::Uif | Opcode::BgnLoop | Opcode::Switch | Opcode::BgnSub
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_counts_of_64bit_shifts_are_32bit() {
        assert_eq!(Opcode::U64Shl.src_type(0), TypeTag::Uint64);
        assert_eq!(Opcode::U64Shl.src_type(1), TypeTag::Uint);
        assert_eq!(Opcode::I64Shr.src_type(0), TypeTag::Int64);
        assert_eq!(Opcode::I64Shr.src_type(1), TypeTag::Uint);
    }

    #[test]
    fn double_compares_produce_32bit_masks() {
        assert_eq!(Opcode::Dslt.src_type(0), TypeTag::Double);
        assert_eq!(Opcode::Dslt.dst_type(), TypeTag::Uint);
    }

    #[test]
    fn dual_result_opcode_declares_two_destinations() {
        let info = Opcode::UmulLoHi.info();
        assert_eq!(info.num_dst, 2);
        assert_eq!(info.output, OutputMode::Componentwise);
    }
}
