use crate::foundation::core::{Rect, WHITE};
use crate::foundation::error::StageResult;
use crate::foundation::ids::{GpuHandle, NodeId, ShaderId};
use crate::render::backend::{RenderBackend, ScissorRect};
use crate::render::quads::{QuadBatch, QuadParams};
use crate::render::target_pool::RenderTargetPool;
use crate::scene::bounds::OutOfBounds;
use crate::scene::context::AffineContext;
use crate::scene::node::{recalc, render_updates};
use crate::scene::tree::SceneTree;
use crate::texture::manager::TextureManager;

/// Largest offscreen target edge a texturizer may request.
pub const MAX_TARGET_SIZE: f64 = 16384.0;

/// Counters for one render pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassStats {
    pub quads: usize,
    /// Texturizers whose target was redrawn.
    pub offscreen_rebuilds: usize,
    /// Texturizers drawn from their cached result.
    pub offscreen_cached: usize,
    /// Rebuilds that reused a single child texture instead of the target.
    pub identity_reuses: usize,
}

/// What a node inherits from its parent while rendering.
#[derive(Clone, Copy, Debug)]
struct RenderFrame {
    shader: ShaderId,
    owner: Option<NodeId>,
    caching: bool,
}

/// Walks the updated tree in z order and appends quads to the batch.
pub(crate) struct RenderPass<'a, B: RenderBackend + ?Sized> {
    pub(crate) tree: &'a mut SceneTree,
    pub(crate) textures: &'a TextureManager,
    pub(crate) pool: &'a mut RenderTargetPool,
    pub(crate) backend: &'a mut B,
    pub(crate) batch: &'a mut QuadBatch,
    pub(crate) frame: u64,
    pub(crate) stats: RenderPassStats,
}

impl<B: RenderBackend + ?Sized> RenderPass<'_, B> {
    #[tracing::instrument(level = "trace", skip(self), fields(frame = self.frame))]
    pub(crate) fn run(&mut self) -> StageResult<RenderPassStats> {
        let root = self.tree.root;
        let rf = RenderFrame {
            shader: ShaderId::DEFAULT,
            owner: None,
            caching: false,
        };
        self.render_node(root, rf)?;
        self.stats.quads = self.batch.quad_count();
        Ok(self.stats)
    }

    fn render_node(&mut self, id: NodeId, rf: RenderFrame) -> StageResult<()> {
        let Some(node) = self.tree.nodes.get(id) else {
            return Ok(());
        };
        if node.world.alpha <= 0.0 || node.oob == OutOfBounds::Outside {
            return Ok(());
        }
        let (shader, owner) = match node.shader {
            Some(s) => (s, Some(id)),
            None => (rf.shader, rf.owner),
        };

        if node.rtt_active {
            self.render_texturized(id, rf, shader, owner)?;
        } else {
            self.release_stale_target(id);
            let node = &self.tree.nodes[id];
            let (oob, ctx, colors, scissor) =
                (node.oob, node.render_ctx(), node.colors, node.scissor);
            if oob == OutOfBounds::InBounds {
                self.draw_own(id, ctx, colors, shader, owner, scissor);
            }
            let child = RenderFrame {
                shader,
                owner,
                caching: rf.caching,
            };
            for c in self.tree.render_order(id) {
                self.render_node(c, child)?;
            }
        }

        self.finish(id, rf);
        Ok(())
    }

    fn render_texturized(
        &mut self,
        id: NodeId,
        rf: RenderFrame,
        shader: ShaderId,
        owner: Option<NodeId>,
    ) -> StageResult<()> {
        let node = &self.tree.nodes[id];
        if node.oob == OutOfBounds::WithinMargin {
            return Ok(());
        }
        if node.rw > MAX_TARGET_SIZE || node.rh > MAX_TARGET_SIZE {
            tracing::warn!(?id, width = node.rw, height = node.rh, "texturizer too large, skipped");
            return Ok(());
        }
        let (w, h) = (node.rw.ceil() as u32, node.rh.ceil() as u32);
        if w == 0 || h == 0 {
            return Ok(());
        }
        let Some(tz) = node.texturizer.as_ref() else {
            return Ok(());
        };
        let (colorize, lazy, offscreen) = (tz.colorize, tz.lazy, tz.render_offscreen);
        let rebuild = tz.needs_rebuild(node.has_render_updates, w, h);

        if rebuild {
            self.rebuild_target(id, w, h, colorize, rf.caching || lazy)?;
        } else {
            self.stats.offscreen_cached += 1;
            tracing::trace!(?id, "texturizer cache hit");
        }

        let node = &mut self.tree.nodes[id];
        let Some(tz) = node.texturizer.as_mut() else {
            return Ok(());
        };
        tz.rendered_frame = self.frame;
        let Some(result) = tz.result else {
            return Ok(());
        };
        if offscreen {
            return Ok(());
        }
        let colors = if colorize { node.colors } else { [WHITE; 4] };
        let q = QuadParams {
            texture: result,
            node: Some(id),
            ctx: node.render_ctx(),
            width: node.rw,
            height: node.rh,
            coords: [0.0, 0.0, 1.0, 1.0],
            colors,
            shader,
            shader_owner: owner,
            scissor: node.scissor.map(ScissorRect::from_rect),
        };
        self.batch.add_quad(&q);
        Ok(())
    }

    /// Redraw `id`'s subtree into an offscreen target of `w x h`.
    fn rebuild_target(
        &mut self,
        id: NodeId,
        w: u32,
        h: u32,
        colorize: bool,
        caching: bool,
    ) -> StageResult<()> {
        let existing = self.tree.nodes[id]
            .texturizer
            .as_mut()
            .and_then(|t| t.target.take());
        let target = match existing {
            Some(t) if t.width == w && t.height == h => t,
            other => {
                if let Some(old) = other {
                    self.pool.release(old, self.frame, self.backend);
                }
                self.pool.borrow(w, h, self.frame, self.backend)?
            }
        };

        let prev = self.batch.set_target(Some(target.handle));
        let mark = self.batch.quad_count();

        let node = &self.tree.nodes[id];
        let colors = if colorize { [WHITE; 4] } else { node.colors };
        let own = AffineContext {
            alpha: 1.0,
            ..AffineContext::IDENTITY
        };
        self.draw_own(id, own, colors, ShaderId::DEFAULT, None, None);
        let child = RenderFrame {
            shader: ShaderId::DEFAULT,
            owner: None,
            caching,
        };
        let drawn = self
            .tree
            .render_order(id)
            .into_iter()
            .try_for_each(|c| self.render_node(c, child));
        self.batch.set_target(prev);
        if let Err(e) = drawn {
            self.pool.release(target, self.frame, self.backend);
            return Err(e);
        }

        let drew = self.batch.quad_count() > mark;
        let reused = if drew {
            self.batch.take_identity_quad(mark, f64::from(w), f64::from(h))
        } else {
            None
        };

        let (result, keep_target) = match reused {
            Some(tex) => {
                self.stats.identity_reuses += 1;
                (Some(tex), false)
            }
            None if drew => (Some(target.handle), true),
            None => (None, false),
        };
        if !keep_target {
            self.pool.release(target, self.frame, self.backend);
        }

        self.stats.offscreen_rebuilds += 1;
        tracing::trace!(?id, w, h, reused = reused.is_some(), "texturizer rebuilt");
        if let Some(tz) = self.tree.nodes[id].texturizer.as_mut() {
            tz.target = keep_target.then_some(target);
            tz.result = result;
            tz.reused = reused.is_some();
            tz.result_size = (w, h);
        }
        Ok(())
    }

    /// Draw the node's displayed texture, if it has one and it is uploaded.
    fn draw_own(
        &mut self,
        id: NodeId,
        ctx: AffineContext,
        colors: [u32; 4],
        shader: ShaderId,
        owner: Option<NodeId>,
        scissor: Option<Rect>,
    ) {
        let node = &self.tree.nodes[id];
        if node.rw <= 0.0 || node.rh <= 0.0 {
            return;
        }
        let Some(drawable) = node.displayed.and_then(|t| self.textures.drawable(t)) else {
            return;
        };
        let q = QuadParams {
            texture: drawable.handle,
            node: Some(id),
            ctx,
            width: node.rw,
            height: node.rh,
            coords: drawable.coords,
            colors,
            shader,
            shader_owner: owner,
            scissor: scissor.map(ScissorRect::from_rect),
        };
        self.batch.add_quad(&q);
    }

    /// The node stopped rendering to texture: give its target back.
    fn release_stale_target(&mut self, id: NodeId) {
        let target = self.tree.nodes[id]
            .texturizer
            .as_mut()
            .and_then(|t| t.take_target());
        if let Some(t) = target {
            self.pool.release(t, self.frame, self.backend);
        }
    }

    /// Close out `id` for this frame: record the update level a lazy texturizer decides on and
    /// clear it.
    fn finish(&mut self, id: NodeId, rf: RenderFrame) {
        let node = &mut self.tree.nodes[id];
        let hru = node.has_render_updates;
        let rtt = node.rtt_active;
        let mut flip = false;
        if let Some(tz) = node.texturizer.as_mut()
            && tz.enabled
            && tz.lazy
        {
            tz.prev_render_updates = hru;
            flip = tz.must_render_to_texture(rf.caching) != rtt;
        }
        node.has_render_updates = render_updates::NONE;
        if flip {
            self.tree.set_recalc(id, recalc::RTT_MODE);
        }
    }
}

/// Handle drawn for `id`'s texturizer result, if it has one.
pub(crate) fn texturizer_result(tree: &SceneTree, id: NodeId) -> Option<(GpuHandle, (u32, u32))> {
    let tz = tree.nodes.get(id)?.texturizer.as_ref()?;
    Some((tz.result?, tz.result_size))
}
