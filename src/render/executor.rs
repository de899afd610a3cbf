use crate::foundation::error::StageResult;
use crate::foundation::ids::{GpuHandle, NodeId, ShaderId};
use crate::render::backend::{RenderBackend, ScissorRect};
use crate::render::quads::QuadBatch;
use std::collections::HashSet;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorStats {
    pub operations: usize,
    /// Operations drawn into an offscreen target.
    pub offscreen_operations: usize,
    pub draw_calls: usize,
    /// Backend bind/scissor calls actually issued.
    pub state_changes: usize,
    pub targets_cleared: usize,
}

/// Replays a [`QuadBatch`] against a backend, skipping redundant state changes.
///
/// Bound state is only remembered within one frame.
#[derive(Debug, Default)]
pub struct FrameExecutor {
    target: Option<Option<GpuHandle>>,
    scissor: Option<Option<ScissorRect>>,
    shader: Option<(ShaderId, Option<NodeId>)>,
    texture: Option<GpuHandle>,
    cleared: HashSet<GpuHandle>,
}

impl FrameExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.target = None;
        self.scissor = None;
        self.shader = None;
        self.texture = None;
        self.cleared.clear();
    }

    /// Draw `batch` as one frame. The screen is cleared to `clear_rgba` (premultiplied) first;
    /// each offscreen target is cleared to transparent before its first draw.
    #[tracing::instrument(level = "trace", skip_all, fields(ops = batch.operations().len()))]
    pub fn execute<B: RenderBackend + ?Sized>(
        &mut self,
        batch: &QuadBatch,
        backend: &mut B,
        clear_rgba: [u8; 4],
    ) -> StageResult<ExecutorStats> {
        self.reset();
        let mut stats = ExecutorStats::default();

        backend.begin_frame()?;
        backend.bind_render_target(None)?;
        self.target = Some(None);
        backend.clear(clear_rgba)?;
        stats.state_changes += 1;

        for op in batch.operations() {
            stats.operations += 1;
            if op.target.is_some() {
                stats.offscreen_operations += 1;
            }

            if self.target != Some(op.target) {
                backend.bind_render_target(op.target)?;
                self.target = Some(op.target);
                stats.state_changes += 1;
            }
            if let Some(t) = op.target
                && self.cleared.insert(t)
            {
                backend.clear([0; 4])?;
                stats.targets_cleared += 1;
            }
            if self.scissor != Some(op.scissor) {
                backend.set_scissor(op.scissor)?;
                self.scissor = Some(op.scissor);
                stats.state_changes += 1;
            }
            let shader = (op.shader, op.shader_owner);
            if self.shader != Some(shader) {
                backend.bind_shader(op.shader, op.shader_owner)?;
                self.shader = Some(shader);
                stats.state_changes += 1;
            }

            let records = batch.records();
            let mut start = op.quads.start;
            while start < op.quads.end {
                let texture = records[start].texture;
                let mut end = start + 1;
                while end < op.quads.end && records[end].texture == texture {
                    end += 1;
                }
                if self.texture != Some(texture) {
                    backend.bind_texture(texture)?;
                    self.texture = Some(texture);
                    stats.state_changes += 1;
                }
                backend.draw_quads(batch, start..end)?;
                stats.draw_calls += 1;
                start = end;
            }
        }

        backend.end_frame()?;
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/executor.rs"]
mod tests;
