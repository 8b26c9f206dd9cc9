mod common;

use common::*;
use lanewise_soa::{
    Construct, DepthPolicy, InstrIndex, LaneEvaluator, LaneVec, Opcode, Program, SoaTranslator,
    TranslateError, TranslateOptions, WriteMask,
};
use pretty_assertions::assert_eq;

const X: WriteMask = WriteMask::X;

#[test]
fn if_else_splits_lanes() {
    let p = Program::new(
        vec![
            binary(Opcode::Slt, temp(0).masked(X), input(0).scalar(0), imm(0).scalar(0)),
            cond(Opcode::If, tmp(0).scalar(0)),
            unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(1)),
            op(Opcode::Else),
            unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(2)),
            op(Opcode::EndIf),
            op(Opcode::End),
        ],
        vec![[f(2.0), f(1.0), f(2.0), 0]],
    );
    let t = evaluate(&p, &mut lane_numbers());
    assert_eq!(channel(&t, 0, 0), vec![1.0, 1.0, 2.0, 2.0]);
    assert_eq!(t.stats.instructions_emitted, 7);
}

#[test]
fn nan_condition_takes_the_if_branch() {
    let p = Program::new(
        vec![
            cond(Opcode::If, input(0).scalar(0)),
            unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(0)),
            op(Opcode::EndIf),
        ],
        vec![[f(1.0), 0, 0, 0]],
    );
    let mut eval = LaneEvaluator::new(4)
        .with_input(0, 0, LaneVec::from_f32(&[f32::NAN, 0.0, 1.0, -0.0]));
    let t = evaluate(&p, &mut eval);
    assert_eq!(channel(&t, 0, 0), vec![1.0, 0.0, 1.0, 0.0]);
}

#[test]
fn nested_conditionals_restore_the_outer_mask() {
    // if (lane < 3) { out = 1; if (lane < 1) { out = 2 } else { out = 3 } ; out.y = 4 }
    let p = Program::new(
        vec![
            binary(Opcode::Slt, temp(0).masked(X), input(0).scalar(0), imm(0).scalar(2)),
            binary(Opcode::Slt, temp(0).masked(WriteMask::Y), input(0).scalar(0), imm(0).scalar(0)),
            cond(Opcode::If, tmp(0).scalar(0)),
            unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(0)),
            cond(Opcode::If, tmp(0).scalar(1)),
            unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(1)),
            op(Opcode::Else),
            unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(2)),
            op(Opcode::EndIf),
            unary(Opcode::Mov, out(0).masked(WriteMask::Y), imm(0).scalar(3)),
            op(Opcode::EndIf),
        ],
        vec![[f(1.0), f(2.0), f(3.0), f(4.0)]],
    );
    let t = evaluate(&p, &mut lane_numbers());
    assert_eq!(channel(&t, 0, 0), vec![2.0, 3.0, 3.0, 0.0]);
    assert_eq!(channel(&t, 0, 1), vec![4.0, 4.0, 4.0, 0.0]);
}

#[test]
fn loop_with_per_lane_trip_counts_and_continue() {
    // TEMP0.x counts iterations, TEMP0.y counts every pass, TEMP0.z only odd ones.
    let p = Program::new(
        vec![
            op(Opcode::BgnLoop),
            binary(Opcode::Sge, temp(1).masked(X), tmp(0).scalar(0), input(0).scalar(0)),
            cond(Opcode::If, tmp(1).scalar(0)),
            op(Opcode::Brk),
            op(Opcode::EndIf),
            binary(Opcode::Add, temp(0).masked(X), tmp(0).scalar(0), imm(0).scalar(0)),
            binary(Opcode::Add, temp(0).masked(WriteMask::Y), tmp(0).scalar(1), imm(0).scalar(0)),
            binary(Opcode::Mul, temp(1).masked(WriteMask::Y), tmp(0).scalar(0), imm(0).scalar(3)),
            unary(Opcode::Frc, temp(1).masked(WriteMask::Z), tmp(1).scalar(1)),
            binary(Opcode::Seq, temp(1).masked(WriteMask::W), tmp(1).scalar(2), imm(0).scalar(2)),
            cond(Opcode::If, tmp(1).scalar(3)),
            op(Opcode::Cont),
            op(Opcode::EndIf),
            binary(Opcode::Add, temp(0).masked(WriteMask::Z), tmp(0).scalar(2), imm(0).scalar(0)),
            op(Opcode::EndLoop),
            unary(Opcode::Mov, out(0), tmp(0)),
            op(Opcode::End),
        ],
        vec![[f(1.0), f(2.0), f(0.0), f(0.5)]],
    );
    let mut eval =
        LaneEvaluator::new(4).with_input(0, 0, LaneVec::from_f32(&[1.0, 2.0, 3.0, 4.0]));
    let t = evaluate(&p, &mut eval);
    assert_eq!(channel(&t, 0, 0), vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(channel(&t, 0, 1), vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(channel(&t, 0, 2), vec![1.0, 1.0, 2.0, 2.0]);
    // Lane 3 needs five passes: four iterations and the one that breaks.
    assert_eq!(t.stats.back_edges_taken, 4);
}

#[test]
fn inner_break_leaves_the_outer_loop_running() {
    let p = Program::new(
        vec![
            op(Opcode::BgnLoop),
            binary(Opcode::Sge, temp(1).masked(X), tmp(0).scalar(0), imm(0).scalar(1)),
            cond(Opcode::If, tmp(1).scalar(0)),
            op(Opcode::Brk),
            op(Opcode::EndIf),
            binary(Opcode::Add, temp(0).masked(X), tmp(0).scalar(0), imm(0).scalar(0)),
            unary(Opcode::Mov, temp(0).masked(WriteMask::Y), imm(0).scalar(2)),
            op(Opcode::BgnLoop),
            binary(Opcode::Sge, temp(1).masked(WriteMask::Y), tmp(0).scalar(1), input(0).scalar(0)),
            cond(Opcode::If, tmp(1).scalar(1)),
            op(Opcode::Brk),
            op(Opcode::EndIf),
            binary(Opcode::Add, temp(0).masked(WriteMask::Y), tmp(0).scalar(1), imm(0).scalar(0)),
            binary(Opcode::Add, temp(0).masked(WriteMask::Z), tmp(0).scalar(2), imm(0).scalar(0)),
            op(Opcode::EndLoop),
            op(Opcode::EndLoop),
            unary(Opcode::Mov, out(0), tmp(0)),
            op(Opcode::End),
        ],
        vec![[f(1.0), f(2.0), f(0.0), 0]],
    );
    let t = evaluate(&p, &mut lane_numbers());
    assert_eq!(channel(&t, 0, 0), vec![2.0; 4]);
    assert_eq!(channel(&t, 0, 1), vec![0.0, 1.0, 2.0, 3.0]);
    assert_eq!(channel(&t, 0, 2), vec![0.0, 2.0, 4.0, 6.0]);
}

#[test]
fn runaway_loop_stops_at_the_iteration_limit() {
    let p = Program::new(vec![op(Opcode::BgnLoop), op(Opcode::EndLoop)], vec![]);
    let t = evaluate(&p, &mut LaneEvaluator::new(2));
    assert_eq!(t.stats.back_edges_taken, 65_534);
    assert_eq!(t.stats.instructions_emitted, 65_536);
}

fn switch_program(default_first: bool) -> Program {
    // switch (IN0.x) { case 1: out = 1; break; case 2: out = 2; break; default: out = 9; break; }
    let case = |value: u8, result: u8| {
        vec![
            cond(Opcode::Case, imm(0).scalar(value)),
            unary(Opcode::Mov, out(0).masked(X), imm(1).scalar(result)),
            op(Opcode::Brk),
        ]
    };
    let default = vec![
        op(Opcode::Default),
        unary(Opcode::Mov, out(0).masked(X), imm(1).scalar(2)),
        op(Opcode::Brk),
    ];
    let mut insts = vec![cond(Opcode::Switch, input(0).scalar(0))];
    if default_first {
        insts.extend(default.clone());
    }
    insts.extend(case(0, 0));
    insts.extend(case(1, 1));
    if !default_first {
        insts.extend(default);
    }
    insts.push(op(Opcode::EndSwitch));
    insts.push(op(Opcode::End));
    Program::new(insts, vec![[1, 2, 0, 0], [f(1.0), f(2.0), f(9.0), 0]])
}

fn selectors() -> LaneEvaluator {
    LaneEvaluator::new(4).with_input(0, 0, LaneVec::from_u32(&[1, 2, 3, 0]))
}

#[test]
fn switch_default_position_does_not_change_results() {
    let last = evaluate(&switch_program(false), &mut selectors());
    let first = evaluate(&switch_program(true), &mut selectors());
    assert_eq!(channel(&last, 0, 0), vec![1.0, 2.0, 9.0, 9.0]);
    assert_eq!(channel(&first, 0, 0), channel(&last, 0, 0));
    assert_eq!(first.stats.deferred_default_replays, 1);
    assert_eq!(last.stats.deferred_default_replays, 0);
}

#[test]
fn case_without_break_falls_through() {
    // case 1: out += 1; case 2: out += 2; break;
    let p = Program::new(
        vec![
            cond(Opcode::Switch, input(0).scalar(0)),
            cond(Opcode::Case, imm(0).scalar(0)),
            binary(Opcode::Add, out(0).masked(X), tmp(0).scalar(0), imm(1).scalar(0)),
            unary(Opcode::Mov, temp(0).masked(X), output(0).scalar(0)),
            cond(Opcode::Case, imm(0).scalar(1)),
            binary(Opcode::Add, out(0).masked(X), tmp(0).scalar(0), imm(1).scalar(1)),
            op(Opcode::Brk),
            op(Opcode::EndSwitch),
        ],
        vec![[1, 2, 0, 0], [f(1.0), f(2.0), 0, 0]],
    );
    let t = evaluate(&p, &mut selectors());
    assert_eq!(channel(&t, 0, 0), vec![3.0, 2.0, 0.0, 0.0]);
}

#[test]
fn fallthrough_into_and_out_of_a_leading_default() {
    // case 0: t += 1; default: t += 2; case 1: t += 4; break; case 2: t += 8;
    let add = |bit: u8| {
        binary(Opcode::Uadd, temp(0).masked(X), tmp(0).scalar(0), imm(1).scalar(bit))
    };
    let p = Program::new(
        vec![
            cond(Opcode::Switch, input(0).scalar(0)),
            cond(Opcode::Case, imm(0).scalar(0)),
            add(0),
            op(Opcode::Default),
            add(1),
            cond(Opcode::Case, imm(0).scalar(1)),
            add(2),
            op(Opcode::Brk),
            cond(Opcode::Case, imm(0).scalar(2)),
            add(3),
            op(Opcode::EndSwitch),
            unary(Opcode::Mov, out(0).masked(X), tmp(0).scalar(0)),
            op(Opcode::End),
        ],
        vec![[0, 1, 2, 0], [1, 2, 4, 8]],
    );
    let mut eval = LaneEvaluator::new(4).with_input(0, 0, LaneVec::from_u32(&[0, 1, 2, 3]));
    let t = evaluate(&p, &mut eval);
    // Lane 0 runs case 0 into the default body and on into case 1; lane 3 enters at the
    // default through the replay and falls into case 1.
    assert_eq!(channel_bits(&t, 0, 0), vec![7, 4, 8, 6]);
    assert_eq!(t.stats.deferred_default_replays, 1);
}

#[test]
fn subroutine_return_masks_lanes_until_endsub() {
    let p = Program::new(
        vec![
            unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(3)),
            op(Opcode::Cal).with_label(InstrIndex::new(4)),
            binary(Opcode::Add, out(0).masked(X), output(0).scalar(0), imm(0).scalar(2)),
            op(Opcode::End),
            op(Opcode::BgnSub),
            binary(Opcode::Slt, temp(0).masked(X), input(0).scalar(0), imm(0).scalar(0)),
            cond(Opcode::If, tmp(0).scalar(0)),
            op(Opcode::Ret),
            op(Opcode::EndIf),
            binary(Opcode::Add, out(0).masked(X), output(0).scalar(0), imm(0).scalar(1)),
            op(Opcode::EndSub),
        ],
        vec![[f(2.0), f(10.0), f(5.0), 0]],
    );
    let t = evaluate(&p, &mut lane_numbers());
    assert_eq!(channel(&t, 0, 0), vec![5.0, 5.0, 15.0, 15.0]);
}

#[test]
fn unconditional_return_from_main_ends_the_program() {
    let p = Program::new(
        vec![
            unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(0)),
            op(Opcode::Ret),
            unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(1)),
            op(Opcode::End),
        ],
        vec![[f(1.0), f(2.0), 0, 0]],
    );
    let t = evaluate(&p, &mut lane_numbers());
    assert_eq!(channel(&t, 0, 0), vec![1.0; 4]);
    assert_eq!(t.stats.instructions_emitted, 2);
}

#[test]
fn conditional_return_from_main_keeps_lanes_off() {
    let p = Program::new(
        vec![
            binary(Opcode::Slt, temp(0).masked(X), input(0).scalar(0), imm(0).scalar(0)),
            cond(Opcode::If, tmp(0).scalar(0)),
            op(Opcode::Ret),
            op(Opcode::EndIf),
            unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(1)),
        ],
        vec![[f(2.0), f(7.0), 0, 0]],
    );
    let t = evaluate(&p, &mut lane_numbers());
    assert_eq!(channel(&t, 0, 0), vec![0.0, 0.0, 7.0, 7.0]);
}

fn nested_ifs(depth: usize) -> Program {
    let mut insts = Vec::new();
    insts.extend((0..depth).map(|_| cond(Opcode::If, imm(0).scalar(0))));
    insts.push(unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(0)));
    insts.extend((0..depth).map(|_| op(Opcode::EndIf)));
    Program::new(insts, vec![[f(1.0), 0, 0, 0]])
}

#[test]
fn nesting_past_the_bound_degrades_by_default() {
    init_tracing();
    let t = evaluate(&nested_ifs(81), &mut LaneEvaluator::new(4));
    assert_eq!(t.stats.depth_drops, 1);
    assert_eq!(channel(&t, 0, 0), vec![1.0; 4]);

    let t = evaluate(&nested_ifs(80), &mut LaneEvaluator::new(4));
    assert_eq!(t.stats.depth_drops, 0);
}

#[test]
fn nesting_past_the_bound_fails_when_asked_to() {
    let options = TranslateOptions::default().with_depth_policy(DepthPolicy::Fail);
    let mut eval = LaneEvaluator::new(4);
    let err = SoaTranslator::new(&mut eval, options)
        .translate(&nested_ifs(81))
        .unwrap_err();
    assert_eq!(
        err,
        TranslateError::DepthExceeded {
            construct: Construct::Conditional,
            limit: 80,
            at: InstrIndex::new(80),
        }
    );
}

fn recursive_program() -> Program {
    Program::new(
        vec![
            op(Opcode::Cal).with_label(InstrIndex::new(2)),
            op(Opcode::End),
            op(Opcode::BgnSub),
            op(Opcode::Cal).with_label(InstrIndex::new(2)),
            op(Opcode::EndSub),
        ],
        vec![],
    )
}

#[test]
fn runaway_recursion_drops_the_excess_call() {
    init_tracing();
    let t = evaluate(&recursive_program(), &mut LaneEvaluator::new(4));
    assert_eq!(t.stats.calls_dropped, 1);
}

#[test]
fn runaway_recursion_fails_under_the_strict_policy() {
    let options = TranslateOptions::default().with_depth_policy(DepthPolicy::Fail);
    let mut eval = LaneEvaluator::new(4);
    let err = SoaTranslator::new(&mut eval, options)
        .translate(&recursive_program())
        .unwrap_err();
    assert_eq!(
        err,
        TranslateError::CallDepthExceeded {
            at: InstrIndex::new(3),
            limit: 33,
        }
    );
}

#[test]
fn malformed_structure_is_rejected_before_translation() {
    let p = Program::new(vec![op(Opcode::EndIf)], vec![]);
    let mut eval = LaneEvaluator::new(4);
    let err = SoaTranslator::new(&mut eval, TranslateOptions::default())
        .translate(&p)
        .unwrap_err();
    assert!(matches!(err, TranslateError::Verify(_)));
}
