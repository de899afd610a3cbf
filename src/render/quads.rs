use crate::foundation::core::Argb;
use crate::foundation::ids::{GpuHandle, NodeId, ShaderId};
use crate::foundation::math::premultiplied_abgr;
use crate::render::backend::ScissorRect;
use crate::scene::context::AffineContext;
use std::ops::Range;

/// Floats per vertex: x, y, u, v, packed colour bits.
pub const FLOATS_PER_VERTEX: usize = 5;
pub const FLOATS_PER_QUAD: usize = 4 * FLOATS_PER_VERTEX;

/// Run of consecutive quads sharing shader, owner, target and scissor.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOperation {
    pub shader: ShaderId,
    pub shader_owner: Option<NodeId>,
    pub target: Option<GpuHandle>,
    pub scissor: Option<ScissorRect>,
    pub quads: Range<usize>,
}

impl BatchOperation {
    fn accepts(&self, key: &OpKey) -> bool {
        self.shader == key.shader
            && self.shader_owner == key.owner
            && self.target == key.target
            && self.scissor == key.scissor
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct OpKey {
    shader: ShaderId,
    owner: Option<NodeId>,
    target: Option<GpuHandle>,
    scissor: Option<ScissorRect>,
}

/// Source-side description of one quad, kept next to the vertex data.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadRecord {
    pub texture: GpuHandle,
    pub node: Option<NodeId>,
    /// Placement on the target surface; `alpha` is already folded into `colors`.
    pub ctx: AffineContext,
    pub width: f64,
    pub height: f64,
    /// Texture coordinates `[u0, v0, u1, v1]`.
    pub coords: [f32; 4],
    /// Premultiplied ABGR per corner: top-left, top-right, bottom-right, bottom-left.
    pub colors: [u32; 4],
}

/// A quad to append.
#[derive(Clone, Copy, Debug)]
pub struct QuadParams {
    pub texture: GpuHandle,
    pub node: Option<NodeId>,
    pub ctx: AffineContext,
    pub width: f64,
    pub height: f64,
    pub coords: [f32; 4],
    pub colors: [Argb; 4],
    pub shader: ShaderId,
    pub shader_owner: Option<NodeId>,
    pub scissor: Option<ScissorRect>,
}

/// Fixed-capacity vertex buffer plus the operations that partition it.
pub struct QuadBatch {
    floats: Vec<f32>,
    records: Vec<QuadRecord>,
    ops: Vec<BatchOperation>,
    capacity: usize,
    target: Option<GpuHandle>,
    overflowed: bool,
    dropped: usize,
}

impl QuadBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            floats: Vec::with_capacity(capacity.min(4096) * FLOATS_PER_QUAD),
            records: Vec::with_capacity(capacity.min(4096)),
            ops: Vec::new(),
            capacity,
            target: None,
            overflowed: false,
            dropped: 0,
        }
    }

    pub fn reset(&mut self) {
        self.floats.clear();
        self.records.clear();
        self.ops.clear();
        self.target = None;
        self.overflowed = false;
        self.dropped = 0;
    }

    /// Route subsequent quads to `target` (`None` is the screen). Returns the previous target.
    pub fn set_target(&mut self, target: Option<GpuHandle>) -> Option<GpuHandle> {
        std::mem::replace(&mut self.target, target)
    }

    pub fn target(&self) -> Option<GpuHandle> {
        self.target
    }

    pub fn quad_count(&self) -> usize {
        self.records.len()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn operations(&self) -> &[BatchOperation] {
        &self.ops
    }

    pub fn records(&self) -> &[QuadRecord] {
        &self.records
    }

    pub fn record(&self, quad: usize) -> Option<&QuadRecord> {
        self.records.get(quad)
    }

    /// Vertex floats of `quad`.
    pub fn vertices(&self, quad: usize) -> &[f32] {
        let start = quad * FLOATS_PER_QUAD;
        self.floats
            .get(start..start + FLOATS_PER_QUAD)
            .unwrap_or(&[])
    }

    pub fn floats(&self) -> &[f32] {
        &self.floats
    }

    /// Append a quad, opening a new operation when its key differs from the open one.
    ///
    /// Returns `false` when the buffer is full and the quad was dropped.
    pub fn add_quad(&mut self, q: &QuadParams) -> bool {
        if self.records.len() >= self.capacity {
            if !self.overflowed {
                tracing::warn!(capacity = self.capacity, "quad buffer full, dropping quads");
                self.overflowed = true;
            }
            self.dropped += 1;
            return false;
        }

        let c = &q.ctx;
        let colors = q.colors.map(|argb| premultiplied_abgr(argb, c.alpha));
        let [u0, v0, u1, v1] = q.coords;
        let (w, h) = (q.width, q.height);
        let corners = [
            (c.px, c.py, u0, v0),
            (c.px + w * c.ta, c.py + w * c.tc, u1, v0),
            (
                c.px + w * c.ta + h * c.tb,
                c.py + w * c.tc + h * c.td,
                u1,
                v1,
            ),
            (c.px + h * c.tb, c.py + h * c.td, u0, v1),
        ];
        for (i, (x, y, u, v)) in corners.into_iter().enumerate() {
            self.floats.extend_from_slice(&[
                x as f32,
                y as f32,
                u,
                v,
                f32::from_bits(colors[i]),
            ]);
        }

        let index = self.records.len();
        self.records.push(QuadRecord {
            texture: q.texture,
            node: q.node,
            ctx: q.ctx,
            width: w,
            height: h,
            coords: q.coords,
            colors,
        });

        let key = OpKey {
            shader: q.shader,
            owner: q.shader_owner,
            target: self.target,
            scissor: q.scissor,
        };
        match self.ops.last_mut() {
            Some(op) if op.accepts(&key) && op.quads.end == index => op.quads.end = index + 1,
            _ => self.ops.push(BatchOperation {
                shader: key.shader,
                shader_owner: key.owner,
                target: key.target,
                scissor: key.scissor,
                quads: index..index + 1,
            }),
        }
        true
    }

    /// If exactly one quad was added since `mark` and it covers a `width x height` target as
    /// the identity full-texture quad with the default shader, remove it and return its texture.
    pub fn take_identity_quad(&mut self, mark: usize, width: f64, height: f64) -> Option<GpuHandle> {
        if self.records.len() != mark + 1 {
            return None;
        }
        let op = self.ops.last()?;
        if op.quads.end != mark + 1 {
            return None;
        }
        if !op.shader.is_default() || op.scissor.is_some() {
            return None;
        }
        if !is_identity_quad(self.vertices(mark), width as f32, height as f32) {
            return None;
        }

        let texture = self.records.pop().map(|r| r.texture)?;
        self.floats.truncate(mark * FLOATS_PER_QUAD);
        if let Some(op) = self.ops.last_mut() {
            op.quads.end = mark;
            if op.quads.is_empty() {
                self.ops.pop();
            }
        }
        Some(texture)
    }
}

/// Compare emitted floats bit-for-bit against the full-target white quad.
fn is_identity_quad(v: &[f32], w: f32, h: f32) -> bool {
    let white = f32::from_bits(0xffff_ffff);
    let expected = [
        0.0, 0.0, 0.0, 0.0, white, w, 0.0, 1.0, 0.0, white, w, h, 1.0, 1.0, white, 0.0, h, 0.0,
        1.0, white,
    ];
    v.len() == expected.len()
        && v
            .iter()
            .zip(expected.iter())
            .all(|(a, b)| a.to_bits() == b.to_bits())
}

#[cfg(test)]
#[path = "../../tests/unit/render/quads.rs"]
mod tests;
