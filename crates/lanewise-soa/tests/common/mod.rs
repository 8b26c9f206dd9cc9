#![allow(dead_code)]

use lanewise_soa::{
    DstRegister, Instruction, LaneEvaluator, LaneVec, Opcode, Program, SoaTranslator,
    SrcRegister, StorageClass, TranslateOptions, Translation,
};

pub fn temp(index: u32) -> DstRegister {
    DstRegister::new(StorageClass::Temporary, index)
}

pub fn out(index: u32) -> DstRegister {
    DstRegister::new(StorageClass::Output, index)
}

pub fn addr(index: u32) -> DstRegister {
    DstRegister::new(StorageClass::Address, index)
}

pub fn tmp(index: u32) -> SrcRegister {
    SrcRegister::new(StorageClass::Temporary, index)
}

pub fn input(index: u32) -> SrcRegister {
    SrcRegister::new(StorageClass::Input, index)
}

pub fn imm(index: u32) -> SrcRegister {
    SrcRegister::new(StorageClass::Immediate, index)
}

pub fn f(value: f32) -> u32 {
    value.to_bits()
}

pub fn op(opcode: Opcode) -> Instruction {
    Instruction::new(opcode)
}

pub fn unary(opcode: Opcode, dst: DstRegister, a: SrcRegister) -> Instruction {
    op(opcode).with_dst(dst).with_src(a)
}

pub fn binary(opcode: Opcode, dst: DstRegister, a: SrcRegister, b: SrcRegister) -> Instruction {
    op(opcode).with_dst(dst).with_src(a).with_src(b)
}

/// Single-source control opcode (`IF`, `SWITCH`, `CASE`, ...).
pub fn cond(opcode: Opcode, src: SrcRegister) -> Instruction {
    op(opcode).with_src(src)
}

pub fn evaluate(program: &Program, eval: &mut LaneEvaluator) -> Translation<LaneVec> {
    evaluate_with(program, eval, TranslateOptions::default())
}

pub fn evaluate_with(
    program: &Program,
    eval: &mut LaneEvaluator,
    options: TranslateOptions,
) -> Translation<LaneVec> {
    SoaTranslator::new(eval, options)
        .translate(program)
        .expect("program translates")
}

pub fn channel(translation: &Translation<LaneVec>, index: usize, chan: usize) -> Vec<f32> {
    translation.outputs[index][chan].to_f32()
}

pub fn channel_bits(translation: &Translation<LaneVec>, index: usize, chan: usize) -> Vec<u32> {
    translation.outputs[index][chan].to_u32()
}

/// Four lanes whose `IN[0].x` holds the lane number as a float.
pub fn lane_numbers() -> LaneEvaluator {
    LaneEvaluator::new(4).with_input(0, 0, LaneVec::from_f32(&[0.0, 1.0, 2.0, 3.0]))
}

pub fn output(index: u32) -> SrcRegister {
    SrcRegister::new(StorageClass::Output, index)
}

/// Routes translator warnings to the test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
