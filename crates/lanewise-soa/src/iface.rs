//! Capabilities the translator calls into for opcodes it does not lower itself.
//!
//! Both interfaces receive the builder so implementations emit their code into the same
//! stream as the translator.

use lanewise_vec::ElemKind;

use crate::builder::{BuildError, TargetBuilder};
use crate::program::TextureTarget;

/// Level-of-detail control for a texture sample.
#[derive(Debug, Clone)]
pub enum LodControl<V> {
    /// Derived by the sampler.
    Implicit,
    /// Added to the implicit level.
    Bias(V),
    /// Used as the level directly.
    Explicit(V),
}

#[derive(Debug, Clone)]
pub struct SampleRequest<'r, V> {
    pub target: TextureTarget,
    pub unit: u32,
    /// `target.coord_count()` coordinates; integer texel coordinates for fetches.
    pub coords: &'r [V],
    pub lod: LodControl<V>,
    /// Lanes the result is observed in, or `None` when every lane is active.
    pub mask: Option<&'r V>,
}

pub trait TextureSampler<B: TargetBuilder> {
    /// Filtered sample; returns `F32` channels.
    fn sample(
        &mut self,
        b: &mut B,
        request: &SampleRequest<'_, B::Value>,
    ) -> Result<[B::Value; 4], BuildError>;

    /// Unfiltered texel fetch at integer coordinates; returns raw `F32` words.
    fn fetch(
        &mut self,
        b: &mut B,
        request: &SampleRequest<'_, B::Value>,
    ) -> Result<[B::Value; 4], BuildError>;

    /// Dimensions of `unit` at mip level `lod`, as `I32` channels (width, height, depth,
    /// levels).
    fn size(
        &mut self,
        b: &mut B,
        target: TextureTarget,
        unit: u32,
        lod: &B::Value,
    ) -> Result<[B::Value; 4], BuildError>;
}

/// Geometry-stage vertex emission. Counter arguments are per-lane `U32` values.
pub trait GeometryEmitter<B: TargetBuilder> {
    /// Emits the current outputs as vertex number `total_vertices` for lanes active in
    /// `mask`.
    fn emit_vertex(
        &mut self,
        b: &mut B,
        outputs: &[[B::Value; 4]],
        total_vertices: &B::Value,
        mask: &B::Value,
        stream: u32,
    ) -> Result<(), BuildError>;

    /// Closes the primitive of `vertices` vertices for lanes active in `mask`.
    fn end_primitive(
        &mut self,
        b: &mut B,
        total_vertices: &B::Value,
        vertices: &B::Value,
        primitives: &B::Value,
        mask: &B::Value,
        stream: u32,
    ) -> Result<(), BuildError>;

    /// Called once after the last instruction with the final counters.
    fn epilogue(
        &mut self,
        b: &mut B,
        total_vertices: &B::Value,
        primitives: &B::Value,
    ) -> Result<(), BuildError>;
}

/// Sampler that returns zero for every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSampler;

impl<B: TargetBuilder> TextureSampler<B> for NullSampler {
    fn sample(
        &mut self,
        b: &mut B,
        _request: &SampleRequest<'_, B::Value>,
    ) -> Result<[B::Value; 4], BuildError> {
        zeros(b, ElemKind::F32)
    }

    fn fetch(
        &mut self,
        b: &mut B,
        _request: &SampleRequest<'_, B::Value>,
    ) -> Result<[B::Value; 4], BuildError> {
        zeros(b, ElemKind::F32)
    }

    fn size(
        &mut self,
        b: &mut B,
        _target: TextureTarget,
        _unit: u32,
        _lod: &B::Value,
    ) -> Result<[B::Value; 4], BuildError> {
        zeros(b, ElemKind::I32)
    }
}

fn zeros<B: TargetBuilder>(
    b: &mut B,
    kind: ElemKind,
) -> Result<[B::Value; 4], BuildError> {
    let zero = b.splat(kind, 0)?;
    Ok([zero.clone(), zero.clone(), zero.clone(), zero])
}

/// Emitter that discards every vertex.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGeometry;

impl<B: TargetBuilder> GeometryEmitter<B> for NullGeometry {
    fn emit_vertex(
        &mut self,
        _b: &mut B,
        _outputs: &[[B::Value; 4]],
        _total_vertices: &B::Value,
        _mask: &B::Value,
        _stream: u32,
    ) -> Result<(), BuildError> {
        Ok(())
    }

    fn end_primitive(
        &mut self,
        _b: &mut B,
        _total_vertices: &B::Value,
        _vertices: &B::Value,
        _primitives: &B::Value,
        _mask: &B::Value,
        _stream: u32,
    ) -> Result<(), BuildError> {
        Ok(())
    }

    fn epilogue(
        &mut self,
        _b: &mut B,
        _total_vertices: &B::Value,
        _primitives: &B::Value,
    ) -> Result<(), BuildError> {
        Ok(())
    }
}
