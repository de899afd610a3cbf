use crate::anim::transition::{TransitionSet, TransitionSettings};
use crate::config::StageOpts;
use crate::foundation::core::Rect;
use crate::foundation::error::{LoadError, StageError, StageResult};
use crate::foundation::ids::{NodeId, SourceId, TextureId};
use crate::render::backend::{FrameRGBA, RenderBackend};
use crate::render::executor::FrameExecutor;
use crate::render::pass::{RenderPass, RenderPassStats, texturizer_result};
use crate::render::quads::QuadBatch;
use crate::render::target_pool::{RenderTargetPool, RenderTargetPoolOpts, RenderTargetPoolStats};
use crate::scene::tree::{NodeMut, NodeProperty, SceneTree, TreeSignal};
use crate::scene::update::PassContext;
use crate::texture::manager::{DemandOutcome, TextureManager, TextureStats};
use crate::texture::source::{SourceLoader, StaticLoader, TextureSourceData};
use std::collections::HashMap;
use std::rc::Rc;

const WHITE_TEXTURE_KEY: &str = "stagelight:white";

/// Notifications queued during [`Stage::frame`] and drained by the application.
#[derive(Clone, Debug, PartialEq)]
pub enum StageEvent {
    NodeActivated(NodeId),
    NodeDeactivated(NodeId),
    TextureLoaded(TextureId),
    TextureFailed(TextureId, LoadError),
}

/// Per-frame counters returned by [`Stage::frame`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub nodes_updated: usize,
    pub quads: usize,
    pub dropped_quads: usize,
    pub operations: usize,
    pub offscreen_operations: usize,
    pub draw_calls: usize,
    pub offscreen_rebuilds: usize,
    pub offscreen_cached: usize,
    /// Render targets created by the backend this frame.
    pub targets_allocated: u64,
    pub textures_uploaded: u64,
    pub evicted_texels: u64,
}

/// Owns a scene tree and everything needed to turn it into draw calls each frame.
pub struct Stage<B: RenderBackend = Box<dyn RenderBackend>> {
    opts: StageOpts,
    tree: SceneTree,
    textures: TextureManager,
    pool: RenderTargetPool,
    batch: QuadBatch,
    executor: FrameExecutor,
    transitions: TransitionSet,
    backend: B,
    frame: u64,
    events: Vec<StageEvent>,
    /// Render-result texture per texturizer node exposed through `texturizer_texture`.
    render_results: HashMap<NodeId, (SourceId, TextureId)>,
}

impl<B: RenderBackend> Stage<B> {
    pub fn new(opts: StageOpts, mut backend: B) -> StageResult<Self> {
        opts.validate()?;

        let mut textures = TextureManager::new(opts.texture_memory_texels);
        let white = TextureSourceData::solid(1, 1, [255; 4])?;
        let source = textures.get_or_create(Rc::new(StaticLoader(white)), Some(WHITE_TEXTURE_KEY));
        textures.set_permanent(source, true);
        textures.preload(source);
        textures.drain_loads(&mut backend);
        if !textures.resource(source).is_some_and(|r| r.is_uploaded()) {
            return Err(StageError::backend("failed to upload the white texture"));
        }
        let white_texture = textures.create_texture(source)?;

        let mut tree = SceneTree::new();
        tree.white_texture = Some(white_texture);

        let pool = RenderTargetPool::new(RenderTargetPoolOpts {
            max_pool_texels: opts.render_target_memory_texels,
            max_targets_per_bucket: opts.max_targets_per_bucket,
            idle_frames: opts.render_target_idle_frames,
        });

        Ok(Self {
            batch: QuadBatch::new(opts.quad_buffer_capacity),
            opts,
            tree,
            textures,
            pool,
            executor: FrameExecutor::new(),
            transitions: TransitionSet::new(),
            backend,
            frame: 0,
            events: Vec::new(),
            render_results: HashMap::new(),
        })
    }

    pub fn opts(&self) -> &StageOpts {
        &self.opts
    }

    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SceneTree {
        &mut self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn node_mut(&mut self, id: NodeId) -> StageResult<NodeMut<'_>> {
        self.tree.node_mut(id)
    }

    pub fn textures(&self) -> &TextureManager {
        &self.textures
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn transitions_mut(&mut self) -> &mut TransitionSet {
        &mut self.transitions
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn pool_stats(&self) -> RenderTargetPoolStats {
        self.pool.stats()
    }

    pub fn texture_stats(&self) -> TextureStats {
        self.textures.stats()
    }

    /// New texture handle on the resource registered under `key`, creating it with `loader` if
    /// absent. Nothing loads until a node displaying it becomes active.
    pub fn create_texture(
        &mut self,
        loader: Rc<dyn SourceLoader>,
        key: Option<&str>,
    ) -> StageResult<TextureId> {
        let source = self.textures.get_or_create(loader, key);
        self.textures.create_texture(source)
    }

    /// Texture backed by in-memory pixels.
    pub fn texture_from_data(
        &mut self,
        data: TextureSourceData,
        key: Option<&str>,
    ) -> StageResult<TextureId> {
        self.create_texture(Rc::new(StaticLoader(data)), key)
    }

    /// Crop `texture` to `region`. Nodes displaying it pick up the new natural size.
    pub fn set_texture_region(&mut self, texture: TextureId, region: Option<Rect>) -> StageResult<()> {
        self.textures.set_region(texture, region)?;
        let size = self.textures.natural_size(texture);
        let nodes: Vec<NodeId> = self
            .tree
            .nodes
            .iter()
            .filter(|(_, n)| n.displayed == Some(texture))
            .map(|(id, _)| id)
            .collect();
        for n in nodes {
            self.tree
                .set_displayed(n, Some(texture), size.unwrap_or((0.0, 0.0)));
        }
        Ok(())
    }

    /// Load `texture`'s resource again, clearing a cached failure.
    pub fn reload(&mut self, texture: TextureId) -> StageResult<()> {
        let Some(source) = self.textures.source_of(texture) else {
            return Err(StageError::validation("unknown texture"));
        };
        self.textures.reload(source)
    }

    /// Evict every texture no active node uses. Returns the texels reclaimed.
    pub fn free_unused_textures(&mut self) -> u64 {
        self.textures.free_unused(&mut self.backend)
    }

    /// Texture showing the offscreen result of `node`'s texturizer.
    ///
    /// The texture is updated after each frame that renders the texturizer; nodes displaying it
    /// pick up a new result on the following frame.
    pub fn texturizer_texture(&mut self, node: NodeId) -> StageResult<TextureId> {
        if let Some(&(_, tex)) = self.render_results.get(&node) {
            return Ok(tex);
        }
        let enabled = self
            .tree
            .nodes
            .get(node)
            .and_then(|n| n.texturizer.as_ref())
            .is_some_and(|t| t.enabled);
        if !enabled {
            return Err(StageError::validation("node has no enabled texturizer"));
        }
        let source = self.textures.create_render_result(node);
        let tex = self.textures.create_texture(source)?;
        if let Some((handle, size)) = texturizer_result(&self.tree, node) {
            self.textures.set_render_result(source, Some(handle), size);
        }
        self.render_results.insert(node, (source, tex));
        Ok(tex)
    }

    /// Animate `prop` of `node` towards `to`.
    pub fn transition(
        &mut self,
        node: NodeId,
        prop: NodeProperty,
        to: f64,
        settings: TransitionSettings,
    ) -> StageResult<()> {
        self.transitions
            .start(&mut self.tree, node, prop, to, settings)
    }

    pub fn drain_events(&mut self) -> Vec<StageEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read back the screen from backends that keep it in memory.
    pub fn readback(&mut self) -> StageResult<Option<FrameRGBA>> {
        self.backend.readback_rgba8()
    }

    /// Advance `dt` seconds and draw one frame.
    #[tracing::instrument(level = "debug", skip(self), fields(frame = self.frame + 1))]
    pub fn frame(&mut self, dt: f64) -> StageResult<FrameStats> {
        self.frame += 1;
        let frame = self.frame;
        let tex_before = self.textures.stats();
        let pool_before = self.pool.stats();

        // Consumers removed since the last frame must not receive their finished loads.
        self.process_signals();
        self.merge_loads();
        self.transitions.progress(&mut self.tree, dt);

        let viewport = Rect::new(
            0.0,
            0.0,
            f64::from(self.opts.width),
            f64::from(self.opts.height),
        );
        let mut pass = PassContext::new(frame, viewport, self.opts.bounds_margin);
        self.tree.update(&mut pass);
        self.process_signals();
        if self.tree.has_pending_updates() {
            // Textures that became drawable while processing demand.
            self.tree.update(&mut pass);
            self.process_signals();
        }

        self.batch.reset();
        let render = RenderPass {
            tree: &mut self.tree,
            textures: &self.textures,
            pool: &mut self.pool,
            backend: &mut self.backend,
            batch: &mut self.batch,
            frame,
            stats: RenderPassStats::default(),
        }
        .run()?;
        let exec = self.executor.execute(
            &self.batch,
            &mut self.backend,
            self.opts.clear_rgba.unwrap_or([0; 4]),
        )?;

        self.release_unrendered(frame);
        self.refresh_render_results();
        self.pool.age_out(frame, &mut self.backend);
        if self.textures.is_full() {
            self.textures.free_unused(&mut self.backend);
        }

        let tex_after = self.textures.stats();
        let pool_after = self.pool.stats();
        let stats = FrameStats {
            frame,
            nodes_updated: pass.nodes_updated,
            quads: render.quads,
            dropped_quads: self.batch.dropped(),
            operations: exec.operations,
            offscreen_operations: exec.offscreen_operations,
            draw_calls: exec.draw_calls,
            offscreen_rebuilds: render.offscreen_rebuilds,
            offscreen_cached: render.offscreen_cached,
            targets_allocated: pool_after.alloc_targets.saturating_sub(pool_before.alloc_targets),
            textures_uploaded: tex_after.uploads.saturating_sub(tex_before.uploads),
            evicted_texels: tex_after
                .evicted_texels
                .saturating_sub(tex_before.evicted_texels),
        };
        tracing::trace!(?stats, "frame done");
        Ok(stats)
    }

    /// Apply loader results that arrived since the previous frame.
    fn merge_loads(&mut self) {
        for outcome in self.textures.drain_loads(&mut self.backend) {
            for tex in self.textures.textures_of(outcome.source) {
                match &outcome.result {
                    Ok(()) => {
                        self.events.push(StageEvent::TextureLoaded(tex));
                        self.invalidate_displaying(tex);
                        self.show_if_requested(tex);
                    }
                    Err(e) => self.events.push(StageEvent::TextureFailed(tex, e.clone())),
                }
            }
        }
    }

    /// Force a rebuild on nodes already showing `tex`: a reload replaced its GPU handle, so
    /// cached offscreen results drawn from the old one are stale.
    fn invalidate_displaying(&mut self, tex: TextureId) {
        let nodes: Vec<NodeId> = self
            .tree
            .nodes
            .iter()
            .filter(|(_, n)| n.displayed == Some(tex))
            .map(|(id, _)| id)
            .collect();
        for n in nodes {
            self.tree.mark_content_changed(n);
        }
    }

    /// Display `tex` on every active node that requested it, now that it is drawable.
    fn show_if_requested(&mut self, tex: TextureId) {
        if !self.textures.is_ready(tex) {
            return;
        }
        let size = self.textures.natural_size(tex).unwrap_or((0.0, 0.0));
        for node in self.textures.consumer_nodes(tex) {
            if self.tree.nodes.get(node).is_some_and(|n| n.texture == Some(tex)) {
                self.tree.set_displayed(node, Some(tex), size);
            }
        }
    }

    fn process_signals(&mut self) {
        while !self.tree.signals.is_empty() {
            for signal in std::mem::take(&mut self.tree.signals) {
                self.process_signal(signal);
            }
        }
    }

    fn process_signal(&mut self, signal: TreeSignal) {
        match signal {
            TreeSignal::Activated(n) => self.events.push(StageEvent::NodeActivated(n)),
            TreeSignal::Deactivated(n) => self.events.push(StageEvent::NodeDeactivated(n)),
            TreeSignal::Demand {
                node,
                texture,
                active: true,
            } => match self.textures.add_consumer(texture, node, &mut self.backend) {
                DemandOutcome::Ready => self.show_if_requested(texture),
                DemandOutcome::Failed(e) => {
                    self.events.push(StageEvent::TextureFailed(texture, e));
                }
                DemandOutcome::Pending => {}
            },
            TreeSignal::Demand {
                node,
                texture,
                active: false,
            } => self.textures.remove_consumer(texture, node),
            TreeSignal::Destroyed { node, target } => {
                if let Some(t) = target {
                    self.pool.release(t, self.frame, &mut self.backend);
                }
                if let Some((source, _)) = self.render_results.remove(&node) {
                    self.textures.release_render_result(source);
                }
                self.transitions.cancel_node(node);
            }
        }
    }

    /// Point render-result textures at this frame's texturizer output.
    fn refresh_render_results(&mut self) {
        let entries: Vec<(NodeId, SourceId, TextureId)> = self
            .render_results
            .iter()
            .map(|(n, (s, t))| (*n, *s, *t))
            .collect();
        for (node, source, tex) in entries {
            let (handle, size) = match texturizer_result(&self.tree, node) {
                Some((h, size)) => (Some(h), size),
                None => (None, (0, 0)),
            };
            if self.textures.set_render_result(source, handle, size) {
                self.show_if_requested(tex);
            }
        }
    }

    /// Give back targets of texturizers that were not rendered this frame.
    fn release_unrendered(&mut self, frame: u64) {
        let ids: Vec<NodeId> = self.tree.texturized.iter().copied().collect();
        for id in ids {
            let Some(node) = self.tree.nodes.get_mut(id) else {
                self.tree.texturized.remove(&id);
                continue;
            };
            let Some(tz) = node.texturizer.as_mut() else {
                continue;
            };
            if tz.rendered_frame == frame {
                continue;
            }
            if let Some(t) = tz.take_target() {
                self.pool.release(t, frame, &mut self.backend);
            }
            if !tz.enabled {
                self.tree.texturized.remove(&id);
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/stage.rs"]
mod tests;
