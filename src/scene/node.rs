use crate::foundation::core::{Argb, Rect, WHITE};
use crate::foundation::ids::{NodeId, ShaderId, TextureId};
use crate::render::texturizer::Texturizer;
use crate::scene::bounds::OutOfBounds;
use crate::scene::context::{AffineContext, LocalTransform};
use crate::scene::zorder::ZChildren;
use smallvec::SmallVec;

/// Dirty bits carried in [`SceneNode::recalc`].
pub(crate) mod recalc {
    pub(crate) const ALPHA: u32 = 1;
    pub(crate) const TRANSLATE: u32 = 2;
    pub(crate) const TRANSFORM: u32 = 4;
    pub(crate) const DIMENSIONS: u32 = 8;
    pub(crate) const BOUNDS: u32 = 16;
    pub(crate) const RTT_MODE: u32 = 32;
    pub(crate) const BECOMES_VISIBLE: u32 = 128;

    /// Bits a parent hands down to its children.
    pub(crate) const INHERITED: u32 = ALPHA | TRANSLATE | TRANSFORM | BECOMES_VISIBLE;
    pub(crate) const FULL: u32 = ALPHA | TRANSLATE | TRANSFORM | DIMENSIONS | BOUNDS;
}

/// `has_render_updates` levels.
pub(crate) mod render_updates {
    pub(crate) const NONE: u8 = 0;
    /// Only the node's own quad changes (shader or colorize colour); cached content stays valid.
    pub(crate) const SHADER: u8 = 1;
    /// Any enclosing offscreen target must be rebuilt.
    pub(crate) const REBUILD: u8 = 3;
}

/// Tree node: local inputs, computed contexts and per-pass state.
pub(crate) struct SceneNode {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) is_root: bool,

    pub(crate) local: LocalTransform,
    pub(crate) alpha: f64,
    pub(crate) visible: bool,

    pub(crate) explicit_w: Option<f64>,
    pub(crate) explicit_h: Option<f64>,
    pub(crate) natural_w: f64,
    pub(crate) natural_h: f64,
    pub(crate) estimated: Option<(f64, f64)>,
    /// Render width/height: explicit size, else natural size of the displayed texture.
    pub(crate) rw: f64,
    pub(crate) rh: f64,

    /// Per-corner colours: top-left, top-right, bottom-right, bottom-left.
    pub(crate) colors: [Argb; 4],
    pub(crate) shader: Option<ShaderId>,
    pub(crate) rect: bool,
    pub(crate) texture: Option<TextureId>,
    pub(crate) displayed: Option<TextureId>,
    /// Textures this node currently holds consumer demand on.
    pub(crate) demanded: SmallVec<[TextureId; 2]>,

    pub(crate) clipping: bool,
    pub(crate) bounds_margin: Option<[f64; 4]>,

    pub(crate) recalc: u32,
    pub(crate) has_updates: bool,
    pub(crate) has_render_updates: u8,

    pub(crate) world: AffineContext,
    /// Context relative to the nearest offscreen target; `None` when it equals `world`.
    pub(crate) render: Option<AffineContext>,
    pub(crate) scissor: Option<Rect>,
    pub(crate) bbox: Rect,
    pub(crate) oob: OutOfBounds,
    pub(crate) active: bool,
    /// Children frame key from the last update, used to detect clip area changes.
    pub(crate) child_clip: Option<(Option<Rect>, Rect, [f64; 4])>,

    pub(crate) z_index: i32,
    pub(crate) force_z_context: bool,
    pub(crate) z_parent: Option<NodeId>,
    pub(crate) z_children: ZChildren,
    pub(crate) tree_order: u64,

    pub(crate) texturizer: Option<Texturizer>,
    pub(crate) rtt_active: bool,
}

impl SceneNode {
    pub(crate) fn new() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            is_root: false,
            local: LocalTransform::default(),
            alpha: 1.0,
            visible: true,
            explicit_w: None,
            explicit_h: None,
            natural_w: 0.0,
            natural_h: 0.0,
            estimated: None,
            rw: 0.0,
            rh: 0.0,
            colors: [WHITE; 4],
            shader: None,
            rect: false,
            texture: None,
            displayed: None,
            demanded: SmallVec::new(),
            clipping: false,
            bounds_margin: None,
            recalc: 0,
            has_updates: false,
            has_render_updates: render_updates::NONE,
            world: AffineContext {
                alpha: 0.0,
                ..AffineContext::IDENTITY
            },
            render: None,
            scissor: None,
            bbox: Rect::ZERO,
            oob: OutOfBounds::InBounds,
            active: false,
            child_clip: None,
            z_index: 0,
            force_z_context: false,
            z_parent: None,
            z_children: ZChildren::Unsorted,
            tree_order: 0,
            texturizer: None,
            rtt_active: false,
        }
    }

    /// Opacity the node contributes before composition.
    pub(crate) fn local_alpha(&self) -> f64 {
        if self.visible { self.alpha } else { 0.0 }
    }

    /// Context this node's own quad is positioned with on its surface.
    pub(crate) fn render_ctx(&self) -> AffineContext {
        self.render.unwrap_or(self.world)
    }

    pub(crate) fn is_z_context(&self) -> bool {
        self.is_root
            || self.parent.is_none()
            || self.force_z_context
            || self.z_index != 0
            || self.texturizer.as_ref().is_some_and(|t| t.enabled)
    }

    /// Recompute `rw`/`rh`; returns whether they changed.
    pub(crate) fn refresh_dimensions(&mut self) -> bool {
        let (nw, nh) = if self.rect {
            (0.0, 0.0)
        } else {
            (self.natural_w, self.natural_h)
        };
        let w = self.explicit_w.unwrap_or(nw);
        let h = self.explicit_h.unwrap_or(nh);
        let changed = w != self.rw || h != self.rh;
        self.rw = w;
        self.rh = h;
        changed
    }

    /// Placeholder box while the requested texture has not been displayed yet.
    pub(crate) fn pending_estimate(&self) -> Option<(f64, f64)> {
        match self.estimated {
            Some(e) if self.texture.is_some() && self.displayed != self.texture => Some(e),
            _ => None,
        }
    }
}
