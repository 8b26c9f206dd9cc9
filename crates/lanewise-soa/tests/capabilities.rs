mod common;

use common::*;
use lanewise_soa::{
    BuildError, GeometryEmitter, LaneEvaluator, LaneVec, LodControl, NullSampler, Opcode,
    Program, SampleRequest, SoaTranslator, TargetBuilder, TextureSampler, TextureTarget,
    TranslateOptions, WriteMask,
};
use pretty_assertions::assert_eq;

const X: WriteMask = WriteMask::X;

/// Returns the coordinates it was asked for and remembers the level-of-detail control.
#[derive(Default)]
struct EchoSampler {
    lods: Vec<&'static str>,
    units: Vec<u32>,
}

impl EchoSampler {
    fn echo(
        &mut self,
        b: &mut LaneEvaluator,
        request: &SampleRequest<'_, LaneVec>,
    ) -> Result<[LaneVec; 4], BuildError> {
        self.lods.push(match request.lod {
            LodControl::Implicit => "implicit",
            LodControl::Bias(_) => "bias",
            LodControl::Explicit(_) => "explicit",
        });
        self.units.push(request.unit);
        let zero = b.splat(lanewise_soa::ElemKind::F32, 0)?;
        let coord = |i: usize| request.coords.get(i).cloned().unwrap_or_else(|| zero.clone());
        Ok([coord(0), coord(1), coord(2), zero.clone()])
    }
}

impl TextureSampler<LaneEvaluator> for EchoSampler {
    fn sample(
        &mut self,
        b: &mut LaneEvaluator,
        request: &SampleRequest<'_, LaneVec>,
    ) -> Result<[LaneVec; 4], BuildError> {
        self.echo(b, request)
    }

    fn fetch(
        &mut self,
        b: &mut LaneEvaluator,
        request: &SampleRequest<'_, LaneVec>,
    ) -> Result<[LaneVec; 4], BuildError> {
        self.echo(b, request)
    }

    fn size(
        &mut self,
        b: &mut LaneEvaluator,
        _target: TextureTarget,
        unit: u32,
        lod: &LaneVec,
    ) -> Result<[LaneVec; 4], BuildError> {
        self.units.push(unit);
        let width = b.splat(lanewise_soa::ElemKind::I32, 64)?;
        let levels = b.splat(lanewise_soa::ElemKind::I32, 7)?;
        Ok([width.clone(), width, lod.clone(), levels])
    }
}

fn texture_program(opcode: Opcode) -> Program {
    Program::new(
        vec![op(opcode)
            .with_dst(out(0))
            .with_src(input(0))
            .with_texture(TextureTarget::D2, 3)],
        vec![],
    )
}

fn coordinates() -> LaneEvaluator {
    LaneEvaluator::new(4)
        .with_input(0, 0, LaneVec::from_f32(&[2.0, 4.0, 6.0, 8.0]))
        .with_input(0, 1, LaneVec::from_f32(&[1.0, 1.0, 1.0, 1.0]))
        .with_input(0, 2, LaneVec::from_f32(&[5.0; 4]))
        .with_input(0, 3, LaneVec::from_f32(&[2.0, 2.0, 2.0, 2.0]))
}

#[test]
fn projected_sample_divides_coordinates_by_w() {
    let mut sampler = EchoSampler::default();
    let mut eval = coordinates();
    let t = SoaTranslator::new(&mut eval, TranslateOptions::default())
        .with_sampler(&mut sampler)
        .translate(&texture_program(Opcode::Txp))
        .unwrap();
    assert_eq!(channel(&t, 0, 0), vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(channel(&t, 0, 1), vec![0.5; 4]);
    // A 2D target only passes two coordinates.
    assert_eq!(channel(&t, 0, 2), vec![0.0; 4]);
    assert_eq!(sampler.lods, vec!["implicit"]);
    assert_eq!(sampler.units, vec![3]);
}

#[test]
fn sample_variants_pick_their_lod_control() {
    let mut sampler = EchoSampler::default();
    for opcode in [Opcode::Tex, Opcode::Txb, Opcode::Txl, Opcode::Txf] {
        let mut eval = coordinates();
        SoaTranslator::new(&mut eval, TranslateOptions::default())
            .with_sampler(&mut sampler)
            .translate(&texture_program(opcode))
            .unwrap();
    }
    assert_eq!(sampler.lods, vec!["implicit", "bias", "explicit", "explicit"]);
}

#[test]
fn size_query_passes_the_first_channel_as_lod() {
    let mut sampler = EchoSampler::default();
    let mut eval = LaneEvaluator::new(2).with_input(0, 0, LaneVec::from_i32(&[0, 2]));
    let t = SoaTranslator::new(&mut eval, TranslateOptions::default())
        .with_sampler(&mut sampler)
        .translate(&texture_program(Opcode::Txq))
        .unwrap();
    assert_eq!(t.outputs[0][0].to_i32(), vec![64, 64]);
    assert_eq!(t.outputs[0][2].to_i32(), vec![0, 2]);
    assert_eq!(t.outputs[0][3].to_i32(), vec![7, 7]);
}

#[test]
fn sampling_without_a_sampler_writes_undefined_values() {
    init_tracing();
    let t = evaluate(&texture_program(Opcode::Tex), &mut coordinates());
    assert_eq!(t.stats.undefined_actions, 1);
    assert_eq!(t.outputs.len(), 1);
}

#[test]
fn null_sampler_returns_zeros() {
    let mut sampler = NullSampler;
    let mut eval = coordinates();
    let t = SoaTranslator::new(&mut eval, TranslateOptions::default())
        .with_sampler(&mut sampler)
        .translate(&texture_program(Opcode::Tex))
        .unwrap();
    assert_eq!(channel(&t, 0, 0), vec![0.0; 4]);
    assert_eq!(t.stats.undefined_actions, 0);
}

#[derive(Default)]
struct Recorder {
    emitted: Vec<Vec<bool>>,
    streams: Vec<u32>,
    positions: Vec<Vec<f32>>,
    ended: Vec<Vec<bool>>,
    epilogue: Option<(Vec<u32>, Vec<u32>)>,
}

impl GeometryEmitter<LaneEvaluator> for Recorder {
    fn emit_vertex(
        &mut self,
        _b: &mut LaneEvaluator,
        outputs: &[[LaneVec; 4]],
        _total_vertices: &LaneVec,
        mask: &LaneVec,
        stream: u32,
    ) -> Result<(), BuildError> {
        self.emitted.push(mask.to_bools());
        self.streams.push(stream);
        self.positions.push(outputs[0][0].to_f32());
        Ok(())
    }

    fn end_primitive(
        &mut self,
        _b: &mut LaneEvaluator,
        _total_vertices: &LaneVec,
        _vertices: &LaneVec,
        _primitives: &LaneVec,
        mask: &LaneVec,
        _stream: u32,
    ) -> Result<(), BuildError> {
        self.ended.push(mask.to_bools());
        Ok(())
    }

    fn epilogue(
        &mut self,
        _b: &mut LaneEvaluator,
        total_vertices: &LaneVec,
        primitives: &LaneVec,
    ) -> Result<(), BuildError> {
        self.epilogue = Some((total_vertices.to_u32(), primitives.to_u32()));
        Ok(())
    }
}

fn geometry_program() -> Program {
    // Two vertices and a primitive for every lane, then lanes 0 and 1 try two more.
    let mut p = Program::new(
        vec![
            unary(Opcode::Mov, out(0).masked(X), input(0).scalar(0)),
            cond(Opcode::EmitVertex, imm(0).scalar(0)),
            cond(Opcode::EmitVertex, imm(0).scalar(0)),
            cond(Opcode::EndPrimitive, imm(0).scalar(0)),
            binary(Opcode::Slt, temp(0).masked(X), input(0).scalar(0), imm(0).scalar(1)),
            cond(Opcode::If, tmp(0).scalar(0)),
            cond(Opcode::EmitVertex, imm(0).scalar(2)),
            cond(Opcode::EmitVertex, imm(0).scalar(2)),
            op(Opcode::EndIf),
            op(Opcode::End),
        ],
        vec![[0, f(2.0), 1, 0]],
    );
    p.info_mut().max_output_vertices = 3;
    p
}

#[test]
fn geometry_counters_respect_the_vertex_bound() {
    let mut recorder = Recorder::default();
    let mut eval = lane_numbers();
    let t = SoaTranslator::new(&mut eval, TranslateOptions::default())
        .with_geometry(&mut recorder)
        .translate(&geometry_program())
        .unwrap();

    let all = vec![true; 4];
    assert_eq!(
        recorder.emitted,
        vec![
            all.clone(),
            all.clone(),
            vec![true, true, false, false],
            vec![false; 4],
        ]
    );
    assert_eq!(recorder.streams, vec![0, 0, 1, 1]);
    assert_eq!(recorder.positions[0], vec![0.0, 1.0, 2.0, 3.0]);
    // The explicit ENDPRIM, then the epilogue closing what lanes 0 and 1 left open.
    assert_eq!(recorder.ended, vec![all, vec![true, true, false, false]]);

    let totals = t.geometry.unwrap();
    assert_eq!(totals.total_vertices.to_u32(), vec![3, 3, 2, 2]);
    assert_eq!(totals.primitives.to_u32(), vec![2, 2, 1, 1]);
    assert_eq!(
        recorder.epilogue,
        Some((vec![3, 3, 2, 2], vec![2, 2, 1, 1]))
    );
}

#[test]
fn geometry_opcodes_without_an_emitter_are_ignored() {
    init_tracing();
    let t = evaluate(&geometry_program(), &mut lane_numbers());
    assert_eq!(t.geometry, None);
    assert_eq!(t.stats.undefined_actions, 5);
}

#[test]
fn kill_if_retires_lanes_with_a_negative_channel() {
    let p = Program::new(
        vec![
            cond(Opcode::KillIf, input(0)),
            unary(Opcode::Mov, out(0).masked(X), imm(0).scalar(0)),
        ],
        vec![[f(1.0), 0, 0, 0]],
    );
    let mut eval = LaneEvaluator::new(4)
        .with_input(0, 0, LaneVec::from_f32(&[1.0, -1.0, 0.0, 2.0]))
        .with_input(0, 3, LaneVec::from_f32(&[0.0, 0.0, 0.0, -0.5]));
    let t = evaluate(&p, &mut eval);
    assert_eq!(
        t.live_mask.as_ref().map(|m| m.to_bools()),
        Some(vec![true, false, true, false])
    );
    assert_eq!(channel(&t, 0, 0), vec![1.0, 0.0, 1.0, 0.0]);
}

#[test]
fn kill_only_affects_active_lanes() {
    let p = Program::new(
        vec![
            binary(Opcode::Slt, temp(0).masked(X), input(0).scalar(0), imm(0).scalar(0)),
            cond(Opcode::If, tmp(0).scalar(0)),
            op(Opcode::Kill),
            op(Opcode::EndIf),
        ],
        vec![[f(1.0), 0, 0, 0]],
    );
    let t = evaluate(&p, &mut lane_numbers());
    assert_eq!(
        t.live_mask.map(|m| m.to_bools()),
        Some(vec![false, true, true, true])
    );
}

#[test]
fn programs_that_cannot_kill_have_no_live_mask() {
    let p = Program::new(vec![unary(Opcode::Mov, out(0), imm(0))], vec![[0; 4]]);
    assert_eq!(evaluate(&p, &mut lane_numbers()).live_mask, None);
}
