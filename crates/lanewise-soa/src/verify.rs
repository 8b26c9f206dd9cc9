//! Structural validation of an instruction stream.
//!
//! The translator trusts what passes here: every construct is balanced, every call lands on a
//! subroutine entry and every operand list matches its opcode.

use thiserror::Error;

use crate::limits::MAX_REGISTER_INDEX;
use crate::opcode::Opcode;
use crate::program::{InstrIndex, Instruction, Program, StorageClass};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error(
        "{opcode} at {at} takes {expected_dst} destination(s) and {expected_src} source(s), \
         found {dst} and {src}"
    )]
    OperandCount {
        at: InstrIndex,
        opcode: Opcode,
        expected_dst: u8,
        expected_src: u8,
        dst: usize,
        src: usize,
    },
    #[error("{opcode} at {at} does not close an open {expected}")]
    Unbalanced {
        at: InstrIndex,
        opcode: Opcode,
        expected: &'static str,
    },
    #[error("{opcode} opened at {at} is never closed")]
    Unclosed { at: InstrIndex, opcode: Opcode },
    #[error("{opcode} at {at} {reason}")]
    Misplaced {
        at: InstrIndex,
        opcode: Opcode,
        reason: &'static str,
    },
    #[error("{opcode} at {at}: {reason}")]
    InvalidOperand {
        at: InstrIndex,
        opcode: Opcode,
        reason: &'static str,
    },
    #[error("call at {at} does not target a subroutine entry")]
    BadCallTarget { at: InstrIndex },
    #[error("indirect addressing through or of {} at {at} is not supported", .class.name())]
    UnsupportedIndirect { at: InstrIndex, class: StorageClass },
    #[error("{opcode} at {at} has no texture operand")]
    MissingTexture { at: InstrIndex, opcode: Opcode },
    #[error("{}[{index}] at {at} is past the last addressable register", .class.name())]
    RegisterIndex {
        at: InstrIndex,
        class: StorageClass,
        index: u32,
    },
    #[error("declared {} range ends at {index}, past the last addressable register", .class.name())]
    DeclaredRange { class: StorageClass, index: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    If { seen_else: bool },
    Loop,
    Switch,
    Sub,
}

impl Block {
    const fn name(self) -> &'static str {
        match self {
            Block::If { .. } => "IF",
            Block::Loop => "BGNLOOP",
            Block::Switch => "SWITCH",
            Block::Sub => "BGNSUB",
        }
    }
}

pub fn verify_program(program: &Program) -> Result<(), VerifyError> {
    for class in StorageClass::ALL {
        match program.info().file_max(class) {
            Some(index) if allocated(class) && index > MAX_REGISTER_INDEX => {
                return Err(VerifyError::DeclaredRange { class, index });
            }
            _ => {}
        }
    }

    let mut stack: Vec<(Block, InstrIndex, Opcode)> = Vec::new();

    for (i, inst) in program.instructions().iter().enumerate() {
        let at = InstrIndex::new(i as u32);
        let opcode = inst.opcode;
        check_operands(at, inst)?;

        let close = |stack: &mut Vec<(Block, InstrIndex, Opcode)>, expected: Block| {
            match stack.last() {
                Some((open, _, _))
                    if core::mem::discriminant(open) == core::mem::discriminant(&expected) =>
                {
                    stack.pop();
                    Ok(())
                }
                _ => Err(VerifyError::Unbalanced {
                    at,
                    opcode,
                    expected: expected.name(),
                }),
            }
        };
        let misplaced = |reason| VerifyError::Misplaced { at, opcode, reason };

        match opcode {
            Opcode::If | Opcode::Uif => stack.push((Block::If { seen_else: false }, at, opcode)),
            Opcode::Else => match stack.last_mut() {
                Some((Block::If { seen_else }, _, _)) if !*seen_else => *seen_else = true,
                Some((Block::If { .. }, _, _)) => return Err(misplaced("follows another ELSE")),
                _ => {
                    return Err(VerifyError::Unbalanced {
                        at,
                        opcode,
                        expected: "IF",
                    })
                }
            },
            Opcode::EndIf => close(&mut stack, Block::If { seen_else: false })?,
            Opcode::BgnLoop => stack.push((Block::Loop, at, opcode)),
            Opcode::EndLoop => close(&mut stack, Block::Loop)?,
            Opcode::Switch => stack.push((Block::Switch, at, opcode)),
            Opcode::Case | Opcode::Default => {
                if !matches!(stack.last(), Some((Block::Switch, _, _))) {
                    return Err(misplaced("is not directly inside a SWITCH"));
                }
            }
            Opcode::EndSwitch => close(&mut stack, Block::Switch)?,
            Opcode::BgnSub => {
                if !stack.is_empty() {
                    return Err(misplaced("opens a subroutine inside another construct"));
                }
                stack.push((Block::Sub, at, opcode));
            }
            Opcode::EndSub => close(&mut stack, Block::Sub)?,
            Opcode::Brk => {
                let breakable = innermost_body(&stack)
                    .iter()
                    .any(|(block, _, _)| matches!(block, Block::Loop | Block::Switch));
                if !breakable {
                    return Err(misplaced("is outside any loop or switch"));
                }
            }
            Opcode::Cont => {
                let in_loop = innermost_body(&stack)
                    .iter()
                    .any(|(block, _, _)| *block == Block::Loop);
                if !in_loop {
                    return Err(misplaced("is outside any loop"));
                }
            }
            Opcode::Cal => {
                let target = inst.label.filter(|&t| program.opcode_at(t) == Some(Opcode::BgnSub));
                if target.is_none() {
                    return Err(VerifyError::BadCallTarget { at });
                }
            }
            Opcode::Tex | Opcode::Txb | Opcode::Txl | Opcode::Txp | Opcode::Txf | Opcode::Txq => {
                if inst.texture.is_none() {
                    return Err(VerifyError::MissingTexture { at, opcode });
                }
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some((_, at, opcode)) => Err(VerifyError::Unclosed { at, opcode }),
        None => Ok(()),
    }
}

/// Constructs of the current subroutine body, or of `main`.
fn innermost_body(
    stack: &[(Block, InstrIndex, Opcode)],
) -> &[(Block, InstrIndex, Opcode)] {
    match stack.iter().rposition(|(block, _, _)| *block == Block::Sub) {
        Some(sub) => &stack[sub + 1..],
        None => stack,
    }
}

fn check_operands(at: InstrIndex, inst: &Instruction) -> Result<(), VerifyError> {
    let info = inst.opcode.info();
    if inst.dst.len() != info.num_dst as usize || inst.src.len() != info.num_src as usize {
        return Err(VerifyError::OperandCount {
            at,
            opcode: inst.opcode,
            expected_dst: info.num_dst,
            expected_src: info.num_src,
            dst: inst.dst.len(),
            src: inst.src.len(),
        });
    }

    let invalid = |reason| VerifyError::InvalidOperand {
        at,
        opcode: inst.opcode,
        reason,
    };
    for dst in &inst.dst {
        let writable = match inst.opcode {
            Opcode::Store => dst.class == StorageClass::Buffer,
            _ => matches!(
                dst.class,
                StorageClass::Temporary | StorageClass::Output | StorageClass::Address
            ),
        };
        if !writable {
            return Err(invalid("destination register class is not writable here"));
        }
    }
    if inst.opcode == Opcode::Load && inst.src[0].class != StorageClass::Buffer {
        return Err(invalid("first source must be a buffer"));
    }

    let operands = inst
        .dst
        .iter()
        .map(|d| (d.class, d.index, d.indirect))
        .chain(inst.src.iter().map(|s| (s.class, s.index, s.indirect)));
    for (class, index, indirect) in operands {
        if allocated(class) && index > MAX_REGISTER_INDEX {
            return Err(VerifyError::RegisterIndex { at, class, index });
        }
        let Some(indirect) = indirect else {
            continue;
        };
        if matches!(class, StorageClass::Address | StorageClass::Buffer) {
            return Err(VerifyError::UnsupportedIndirect { at, class });
        }
        if !matches!(
            indirect.class,
            StorageClass::Address | StorageClass::Temporary
        ) {
            return Err(VerifyError::UnsupportedIndirect {
                at,
                class: indirect.class,
            });
        }
        if indirect.index > MAX_REGISTER_INDEX {
            return Err(VerifyError::RegisterIndex {
                at,
                class: indirect.class,
                index: indirect.index,
            });
        }
    }
    Ok(())
}

/// Classes backed by register-file storage; constant and buffer indices address external data.
fn allocated(class: StorageClass) -> bool {
    !matches!(class, StorageClass::Constant | StorageClass::Buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{DstRegister, Indirect, ProgramInfo, SrcRegister};
    use pretty_assertions::assert_eq;

    fn op(opcode: Opcode) -> Instruction {
        Instruction::new(opcode)
    }

    fn cond(opcode: Opcode) -> Instruction {
        op(opcode).with_src(SrcRegister::new(StorageClass::Temporary, 0))
    }

    fn program(insts: Vec<Instruction>) -> Program {
        Program::new(insts, vec![])
    }

    #[test]
    fn accepts_nested_constructs_and_subroutines() {
        let p = program(vec![
            op(Opcode::BgnLoop),
            cond(Opcode::Switch),
            cond(Opcode::Case),
            op(Opcode::Brk),
            op(Opcode::Default),
            cond(Opcode::If),
            op(Opcode::Cont),
            op(Opcode::Else),
            op(Opcode::EndIf),
            op(Opcode::EndSwitch),
            op(Opcode::EndLoop),
            op(Opcode::Cal).with_label(InstrIndex::new(13)),
            op(Opcode::End),
            op(Opcode::BgnSub),
            op(Opcode::Ret),
            op(Opcode::EndSub),
        ]);
        assert_eq!(verify_program(&p), Ok(()));
    }

    #[test]
    fn rejects_unbalanced_and_unclosed_constructs() {
        let p = program(vec![op(Opcode::BgnLoop), op(Opcode::EndIf)]);
        assert_eq!(
            verify_program(&p),
            Err(VerifyError::Unbalanced {
                at: InstrIndex::new(1),
                opcode: Opcode::EndIf,
                expected: "IF"
            })
        );

        let p = program(vec![cond(Opcode::If)]);
        assert_eq!(
            verify_program(&p),
            Err(VerifyError::Unclosed {
                at: InstrIndex::new(0),
                opcode: Opcode::If
            })
        );

        let p = program(vec![
            cond(Opcode::If),
            op(Opcode::Else),
            op(Opcode::Else),
            op(Opcode::EndIf),
        ]);
        assert!(matches!(
            verify_program(&p),
            Err(VerifyError::Misplaced { .. })
        ));
    }

    #[test]
    fn continue_inside_switch_needs_an_enclosing_loop() {
        let p = program(vec![
            cond(Opcode::Switch),
            op(Opcode::Cont),
            op(Opcode::EndSwitch),
        ]);
        assert_eq!(
            verify_program(&p),
            Err(VerifyError::Misplaced {
                at: InstrIndex::new(1),
                opcode: Opcode::Cont,
                reason: "is outside any loop"
            })
        );
    }

    #[test]
    fn loops_do_not_reach_into_subroutines() {
        let p = program(vec![
            op(Opcode::End),
            op(Opcode::BgnSub),
            op(Opcode::Brk),
            op(Opcode::EndSub),
        ]);
        assert!(matches!(
            verify_program(&p),
            Err(VerifyError::Misplaced { opcode: Opcode::Brk, .. })
        ));
    }

    #[test]
    fn rejects_calls_off_a_subroutine_entry() {
        let p = program(vec![
            op(Opcode::Cal).with_label(InstrIndex::new(1)),
            op(Opcode::Nop),
        ]);
        assert_eq!(
            verify_program(&p),
            Err(VerifyError::BadCallTarget {
                at: InstrIndex::new(0)
            })
        );

        let p = program(vec![op(Opcode::Cal).with_label(InstrIndex::new(9))]);
        assert!(verify_program(&p).is_err());
    }

    #[test]
    fn rejects_operand_count_mismatch() {
        let p = program(vec![op(Opcode::Add)
            .with_dst(DstRegister::new(StorageClass::Temporary, 0))
            .with_src(SrcRegister::new(StorageClass::Temporary, 1))]);
        assert_eq!(
            verify_program(&p),
            Err(VerifyError::OperandCount {
                at: InstrIndex::new(0),
                opcode: Opcode::Add,
                expected_dst: 1,
                expected_src: 2,
                dst: 1,
                src: 1
            })
        );
    }

    #[test]
    fn rejects_indirect_address_registers() {
        let p = program(vec![op(Opcode::Mov)
            .with_dst(
                DstRegister::new(StorageClass::Address, 0).indirect(Indirect::address(0, 0)),
            )
            .with_src(SrcRegister::new(StorageClass::Temporary, 0))]);
        assert_eq!(
            verify_program(&p),
            Err(VerifyError::UnsupportedIndirect {
                at: InstrIndex::new(0),
                class: StorageClass::Address
            })
        );
    }

    #[test]
    fn register_indices_are_bounded() {
        let mov = op(Opcode::Mov)
            .with_dst(DstRegister::new(StorageClass::Temporary, u32::MAX))
            .with_src(SrcRegister::new(StorageClass::Constant, 70_000));
        assert_eq!(
            verify_program(&program(vec![mov.clone()])),
            Err(VerifyError::DeclaredRange {
                class: StorageClass::Temporary,
                index: u32::MAX
            })
        );
        assert_eq!(
            verify_program(&Program::with_info(vec![mov], ProgramInfo::default())),
            Err(VerifyError::RegisterIndex {
                at: InstrIndex::new(0),
                class: StorageClass::Temporary,
                index: u32::MAX
            })
        );

        // Constant indices address the bound buffer, not register storage.
        let p = program(vec![op(Opcode::Mov)
            .with_dst(DstRegister::new(StorageClass::Temporary, MAX_REGISTER_INDEX))
            .with_src(SrcRegister::new(StorageClass::Constant, 70_000))]);
        assert_eq!(verify_program(&p), Ok(()));
    }

    #[test]
    fn rejects_writes_to_read_only_classes() {
        let p = program(vec![op(Opcode::Mov)
            .with_dst(DstRegister::new(StorageClass::Constant, 0))
            .with_src(SrcRegister::new(StorageClass::Temporary, 0))]);
        assert!(matches!(
            verify_program(&p),
            Err(VerifyError::InvalidOperand { opcode: Opcode::Mov, .. })
        ));
    }

    #[test]
    fn texture_opcodes_need_a_texture_operand() {
        let p = program(vec![op(Opcode::Tex)
            .with_dst(DstRegister::new(StorageClass::Temporary, 0))
            .with_src(SrcRegister::new(StorageClass::Input, 0))]);
        assert_eq!(
            verify_program(&p),
            Err(VerifyError::MissingTexture {
                at: InstrIndex::new(0),
                opcode: Opcode::Tex
            })
        );
    }
}
