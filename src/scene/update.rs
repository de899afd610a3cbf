use crate::foundation::core::Rect;
use crate::foundation::ids::NodeId;
use crate::foundation::math::clamp_alpha;
use crate::scene::bounds::{OutOfBounds, classify, intersect};
use crate::scene::context::AffineContext;
use crate::scene::node::recalc;
use crate::scene::tree::SceneTree;

/// Per-pass state threaded through the update walk.
#[derive(Debug)]
pub(crate) struct PassContext {
    pub(crate) frame: u64,
    /// Monotonic counter handed out as `tree_order` when z-lists are sorted.
    pub(crate) tree_order: u64,
    pub(crate) viewport: Rect,
    pub(crate) margin: [f64; 4],
    pub(crate) nodes_updated: usize,
}

impl PassContext {
    pub(crate) fn new(frame: u64, viewport: Rect, margin: [f64; 4]) -> Self {
        Self {
            frame,
            tree_order: 0,
            viewport,
            margin,
            nodes_updated: 0,
        }
    }
}

/// What a node inherits from its parent during the update walk.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ParentFrame {
    world: AffineContext,
    /// Context children compose their render context against.
    render: AffineContext,
    in_target: bool,
    scissor: Option<Rect>,
    /// Surface the children are drawn on: the viewport or an offscreen target.
    area: Rect,
    margin: [f64; 4],
    /// An ancestor is already caching its subtree lazily.
    caching: bool,
}

impl SceneTree {
    /// Run the update pass from the root.
    ///
    /// Only branches with pending updates are visited, so cost follows the number of changed
    /// nodes rather than the size of the tree.
    #[tracing::instrument(level = "trace", skip(self, pass), fields(frame = pass.frame))]
    pub(crate) fn update(&mut self, pass: &mut PassContext) {
        let frame = ParentFrame {
            world: AffineContext::IDENTITY,
            render: AffineContext::IDENTITY,
            in_target: false,
            scissor: None,
            area: pass.viewport,
            margin: pass.margin,
            caching: false,
        };
        let root = self.root;
        if let Some(r) = self.nodes.get_mut(root)
            && r.child_clip.is_some_and(|(_, area, margin)| area != pass.viewport || margin != pass.margin)
        {
            r.recalc |= recalc::BOUNDS;
            r.has_updates = true;
        }
        self.update_node(root, &frame, 0, false, pass);
    }

    pub(crate) fn has_pending_updates(&self) -> bool {
        self.nodes.get(self.root).is_some_and(|r| r.has_updates)
    }

    fn update_node(
        &mut self,
        id: NodeId,
        pf: &ParentFrame,
        parent_bits: u32,
        parent_render_changed: bool,
        pass: &mut PassContext,
    ) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let own_bits = node.recalc;
        node.recalc |= parent_bits;

        let was_visible = node.world.alpha > 0.0;
        let now_visible = clamp_alpha(pf.world.alpha * node.local_alpha()) > 0.0;
        if !(node.has_updates || (node.recalc != 0 && now_visible) || (was_visible && !now_visible))
        {
            return;
        }
        pass.nodes_updated += 1;

        if !now_visible {
            if was_visible || node.active {
                self.hide_subtree(id);
                self.mark_ancestors_render(id);
            } else {
                node.recalc = 0;
                node.has_updates = false;
            }
            return;
        }

        let becomes_visible = !was_visible || node.recalc & recalc::BECOMES_VISIBLE != 0;
        if becomes_visible {
            node.recalc |= recalc::FULL | recalc::BECOMES_VISIBLE;
        }

        let rtt = node
            .texturizer
            .as_ref()
            .is_some_and(|t| t.must_render_to_texture(pf.caching));
        let mode_flip = rtt != node.rtt_active;
        if mode_flip {
            node.rtt_active = rtt;
            node.recalc |= recalc::RTT_MODE;
        }

        let mut returned = false;
        if node.recalc != 0 {
            node.refresh_dimensions();
            let (w, h) = (node.rw, node.rh);
            let local = node.local.to_context(w, h, node.local_alpha());

            let mut world = pf.world.compose(&local);
            world.alpha = clamp_alpha(world.alpha);
            node.world = world;
            node.render = if pf.in_target {
                let mut r = pf.render.compose(&local);
                r.alpha = clamp_alpha(r.alpha);
                (r != world).then_some(r)
            } else {
                None
            };

            let rctx = node.render_ctx();
            let mut bbox = rctx.bbox(w, h);
            let estimate = node.pending_estimate();
            if let Some((ew, eh)) = estimate {
                bbox = bbox.union(rctx.bbox(ew, eh));
            }
            node.bbox = bbox;
            node.scissor = pf.scissor;

            let margin = node.bounds_margin.unwrap_or(pf.margin);
            let container = w == 0.0 && h == 0.0 && estimate.is_none();
            let oob = if container {
                OutOfBounds::InBounds
            } else {
                classify(bbox, pf.scissor.unwrap_or(pf.area), margin)
            };
            returned = node.oob == OutOfBounds::Outside && oob != OutOfBounds::Outside;
            node.oob = oob;
            if returned {
                node.recalc |= recalc::FULL | recalc::BECOMES_VISIBLE;
            }
        }

        if node.oob == OutOfBounds::Outside {
            node.recalc = 0;
            node.has_updates = false;
            let was_active = node.active;
            self.cull_subtree(id);
            if was_active {
                self.mark_ancestors_render(id);
            }
            return;
        }

        let render_changed = own_bits != 0 || parent_render_changed || becomes_visible || returned;
        let node = &mut self.nodes[id];
        let margin = node.bounds_margin.unwrap_or(pf.margin);
        let caching = pf.caching
            || (node.rtt_active && node.texturizer.as_ref().is_some_and(|t| t.lazy));
        let child = if node.rtt_active {
            ParentFrame {
                world: node.world,
                render: AffineContext::IDENTITY,
                in_target: true,
                scissor: None,
                area: Rect::new(0.0, 0.0, node.rw.ceil(), node.rh.ceil()),
                margin,
                caching,
            }
        } else {
            let scissor = if node.clipping {
                Some(intersect(pf.scissor.unwrap_or(pf.area), node.bbox))
            } else {
                pf.scissor
            };
            ParentFrame {
                world: node.world,
                render: node.render_ctx(),
                in_target: pf.in_target,
                scissor,
                area: pf.area,
                margin,
                caching,
            }
        };

        let clip_key = Some((child.scissor, child.area, child.margin));
        let mut child_bits = node.recalc & recalc::INHERITED;
        if node.child_clip != clip_key {
            node.child_clip = clip_key;
            child_bits |= recalc::BOUNDS;
        }
        if mode_flip {
            child_bits |= recalc::FULL;
        }
        let child_render_changed = render_changed && !node.rtt_active;
        let children = std::mem::take(&mut node.children);

        self.set_active(id, true);
        if render_changed || mode_flip {
            self.mark_ancestors_render(id);
        }

        for c in &children {
            self.update_node(*c, &child, child_bits, child_render_changed, pass);
        }
        self.nodes[id].children = children;

        self.sort_z_children(id, &mut pass.tree_order);
        let node = &mut self.nodes[id];
        node.recalc = 0;
        node.has_updates = false;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/update.rs"]
mod tests;
