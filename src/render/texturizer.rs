use crate::foundation::ids::GpuHandle;
use crate::render::target_pool::RenderTarget;
use crate::scene::node::render_updates;

/// Render-to-texture state of one node.
#[derive(Debug, Default)]
pub(crate) struct Texturizer {
    pub(crate) enabled: bool,
    /// Cache the subtree only while it is static.
    pub(crate) lazy: bool,
    /// Draw the result with the node's colours.
    pub(crate) colorize: bool,
    /// Render the target without drawing the result quad.
    pub(crate) render_offscreen: bool,
    pub(crate) target: Option<RenderTarget>,
    /// Texture holding the rendered subtree: the target, or a reused child texture.
    pub(crate) result: Option<GpuHandle>,
    pub(crate) result_size: (u32, u32),
    /// `result` is a child's texture, not `target`.
    pub(crate) reused: bool,
    pub(crate) rendered_frame: u64,
    /// The owner's `has_render_updates` captured at the end of its previous render.
    pub(crate) prev_render_updates: u8,
}

impl Texturizer {
    /// Whether the subtree should render through a target this frame.
    ///
    /// A lazy texturizer caches only when its subtree had no rebuild-level updates during the
    /// previous frame, and never while an ancestor is already caching.
    pub(crate) fn must_render_to_texture(&self, caching_ancestor: bool) -> bool {
        self.enabled
            && (!self.lazy
                || (!caching_ancestor && self.prev_render_updates < render_updates::REBUILD))
    }

    /// Whether the cached result is stale for a `width x height` render.
    pub(crate) fn needs_rebuild(&self, has_render_updates: u8, width: u32, height: u32) -> bool {
        has_render_updates >= render_updates::REBUILD
            || self.result.is_none()
            || self.result_size != (width, height)
    }

    /// Drop the result and hand back the target for release to the pool.
    pub(crate) fn take_target(&mut self) -> Option<RenderTarget> {
        self.result = None;
        self.reused = false;
        self.target.take()
    }
}
