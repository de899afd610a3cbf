use crate::foundation::core::{Argb, Rect};
use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::{NodeId, ShaderId, TextureId};
use crate::foundation::math::clamp_alpha;
use crate::render::target_pool::RenderTarget;
use crate::render::texturizer::Texturizer;
use crate::scene::bounds::OutOfBounds;
use crate::scene::context::AffineContext;
use crate::scene::node::{SceneNode, recalc, render_updates};
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// Notifications produced by tree mutation and the update pass, consumed by the stage.
#[derive(Debug, PartialEq)]
pub(crate) enum TreeSignal {
    Activated(NodeId),
    Deactivated(NodeId),
    Demand {
        node: NodeId,
        texture: TextureId,
        active: bool,
    },
    Destroyed {
        node: NodeId,
        target: Option<RenderTarget>,
    },
}

/// Numeric node properties addressable by transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeProperty {
    X,
    Y,
    ScaleX,
    ScaleY,
    Rotation,
    Alpha,
    Width,
    Height,
    PivotX,
    PivotY,
    MountX,
    MountY,
}

/// Arena of scene nodes rooted at a synthetic stage root.
pub struct SceneTree {
    pub(crate) nodes: SlotMap<NodeId, SceneNode>,
    pub(crate) root: NodeId,
    pub(crate) signals: Vec<TreeSignal>,
    pub(crate) white_texture: Option<TextureId>,
    pub(crate) texturized: BTreeSet<NodeId>,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let mut root = SceneNode::new();
        root.is_root = true;
        root.recalc = recalc::FULL;
        root.has_updates = true;
        let root = nodes.insert(root);
        Self {
            nodes,
            root,
            signals: Vec::new(),
            white_texture: None,
            texturized: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a detached node. It is not updated or drawn until attached below the root.
    pub fn create_node(&mut self) -> NodeId {
        self.nodes.insert(SceneNode::new())
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.nodes.get(id).map(|node| NodeRef { id, node })
    }

    pub fn node_mut(&mut self, id: NodeId) -> StageResult<NodeMut<'_>> {
        self.check(id)?;
        Ok(NodeMut { tree: self, id })
    }

    fn check(&self, id: NodeId) -> StageResult<()> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(StageError::invalid_tree(format!("stale node id {id:?}")))
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, of: NodeId) -> bool {
        let mut cur = Some(of);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.nodes.get(c).and_then(|n| n.parent);
        }
        false
    }

    /// Whether `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.is_ancestor_or_self(self.root, id)
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> StageResult<()> {
        let len = self.nodes.get(parent).map_or(0, |p| p.children.len());
        self.insert_child(parent, child, len)
    }

    /// Insert `child` at `index` among `parent`'s children, re-parenting it if needed.
    pub fn insert_child(&mut self, parent: NodeId, child: NodeId, index: usize) -> StageResult<()> {
        self.check(parent)?;
        self.check(child)?;
        if child == self.root {
            return Err(StageError::invalid_tree("the root cannot be re-parented"));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(StageError::invalid_tree(
                "cannot re-parent a node into its own subtree",
            ));
        }

        if let Some(old) = self.nodes[child].parent {
            self.nodes[old].children.retain(|c| *c != child);
            self.mark_content_changed(old);
        }

        let siblings = &mut self.nodes[parent].children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.nodes[child].parent = Some(parent);

        self.refresh_z_membership(child);
        self.request_full_resort(parent);
        if self.is_attached(parent) {
            self.nodes[child].recalc |= recalc::FULL;
            self.set_has_updates(child);
        } else {
            self.hide_subtree(child);
        }
        self.mark_content_changed(parent);
        Ok(())
    }

    /// Move `child` to `index` among its current siblings.
    pub fn set_child_index(&mut self, child: NodeId, index: usize) -> StageResult<()> {
        self.check(child)?;
        let Some(parent) = self.nodes[child].parent else {
            return Err(StageError::invalid_tree("node has no parent"));
        };
        let siblings = &mut self.nodes[parent].children;
        let Some(from) = siblings.iter().position(|c| *c == child) else {
            return Err(StageError::invalid_tree("node missing from its parent"));
        };
        let to = index.min(siblings.len() - 1);
        if from == to {
            return Ok(());
        }
        siblings.remove(from);
        siblings.insert(to, child);

        self.request_full_resort(parent);
        self.mark_content_changed(parent);
        Ok(())
    }

    /// Detach `child` from its parent; the subtree stays alive and can be re-attached.
    pub fn detach(&mut self, child: NodeId) -> StageResult<()> {
        self.check(child)?;
        if child == self.root {
            return Err(StageError::invalid_tree("the root cannot be detached"));
        }
        let Some(parent) = self.nodes[child].parent.take() else {
            return Ok(());
        };
        self.nodes[parent].children.retain(|c| *c != child);
        self.mark_content_changed(parent);
        self.refresh_z_membership(child);
        self.hide_subtree(child);
        Ok(())
    }

    /// Destroy `id` and its subtree, releasing texture demand and offscreen targets.
    pub fn destroy(&mut self, id: NodeId) -> StageResult<()> {
        self.check(id)?;
        if id == self.root {
            return Err(StageError::invalid_tree("the root cannot be destroyed"));
        }
        self.detach(id)?;

        let mut stack = vec![id];
        let mut doomed = Vec::new();
        while let Some(n) = stack.pop() {
            stack.extend(self.nodes[n].children.iter().copied());
            doomed.push(n);
        }
        for n in &doomed {
            self.z_unlink(*n);
        }
        for n in doomed {
            if let Some(node) = self.nodes.remove(n) {
                self.texturized.remove(&n);
                let target = node.texturizer.and_then(|t| t.target);
                self.signals.push(TreeSignal::Destroyed { node: n, target });
            }
        }
        Ok(())
    }

    /// Flag `id` and its ancestors as having pending updates.
    ///
    /// Stops at the first ancestor already flagged: everything above it is flagged too.
    pub(crate) fn set_has_updates(&mut self, id: NodeId) {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(n) = self.nodes.get_mut(c) else {
                return;
            };
            if n.has_updates {
                return;
            }
            n.has_updates = true;
            cur = n.parent;
        }
    }

    pub(crate) fn mark_ancestors_render(&mut self, id: NodeId) {
        let mut cur = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(p) = cur {
            let n = &mut self.nodes[p];
            n.has_render_updates = render_updates::REBUILD;
            cur = n.parent;
        }
    }

    /// Raise `id`'s render update level and force a rebuild of every enclosing target.
    pub(crate) fn set_render_updates(&mut self, id: NodeId, level: u8) {
        let Some(n) = self.nodes.get_mut(id) else {
            return;
        };
        if n.world.alpha <= 0.0 {
            return;
        }
        n.has_render_updates = n.has_render_updates.max(level);
        self.mark_ancestors_render(id);
    }

    pub(crate) fn set_recalc(&mut self, id: NodeId, bits: u32) {
        let Some(n) = self.nodes.get_mut(id) else {
            return;
        };
        n.recalc |= bits;
        let parent = n.parent;
        self.set_has_updates(id);
        if let Some(p) = parent {
            self.set_render_updates(p, render_updates::REBUILD);
        }
    }

    pub(crate) fn mark_content_changed(&mut self, id: NodeId) {
        self.set_render_updates(id, render_updates::REBUILD);
        self.set_has_updates(id);
    }

    pub(crate) fn set_active(&mut self, id: NodeId, active: bool) {
        let Some(n) = self.nodes.get_mut(id) else {
            return;
        };
        if n.active == active {
            return;
        }
        n.active = active;
        self.signals.push(if active {
            TreeSignal::Activated(id)
        } else {
            TreeSignal::Deactivated(id)
        });
        self.sync_demand(id);
    }

    /// Diff the textures `id` should hold demand on against what it holds, emitting signals.
    pub(crate) fn sync_demand(&mut self, id: NodeId) {
        let Some(n) = self.nodes.get_mut(id) else {
            return;
        };
        let mut desired: SmallVec<[TextureId; 2]> = SmallVec::new();
        if n.active {
            for t in [n.texture, n.displayed].into_iter().flatten() {
                if !desired.contains(&t) {
                    desired.push(t);
                }
            }
        }
        for t in n.demanded.iter().filter(|t| !desired.contains(t)) {
            self.signals.push(TreeSignal::Demand {
                node: id,
                texture: *t,
                active: false,
            });
        }
        for t in desired.iter().filter(|t| !n.demanded.contains(t)) {
            self.signals.push(TreeSignal::Demand {
                node: id,
                texture: *t,
                active: true,
            });
        }
        n.demanded = desired;
    }

    /// Zero world alpha and deactivate `id` and its subtree.
    pub(crate) fn hide_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(c) = stack.pop() {
            let Some(n) = self.nodes.get_mut(c) else {
                continue;
            };
            n.world.alpha = 0.0;
            n.has_updates = false;
            n.recalc = 0;
            stack.extend(n.children.iter().copied());
            self.set_active(c, false);
        }
    }

    /// Mark `id` outside its clip area: deactivate the subtree without visiting it again.
    pub(crate) fn cull_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(c) = stack.pop() {
            let Some(n) = self.nodes.get_mut(c) else {
                continue;
            };
            n.oob = OutOfBounds::Outside;
            if c != id {
                n.has_updates = false;
            }
            stack.extend(n.children.iter().copied());
            self.set_active(c, false);
        }
    }

    /// Show `texture` on `id` with the given natural size.
    ///
    /// Used once a requested texture becomes drawable; `None` shows nothing.
    pub(crate) fn set_displayed(&mut self, id: NodeId, texture: Option<TextureId>, size: (f64, f64)) {
        let Some(n) = self.nodes.get_mut(id) else {
            return;
        };
        if n.displayed == texture && (n.natural_w, n.natural_h) == size {
            return;
        }
        n.displayed = texture;
        n.natural_w = size.0;
        n.natural_h = size.1;
        let dims = n.refresh_dimensions();
        let bits = if dims {
            recalc::DIMENSIONS | recalc::TRANSLATE | recalc::BOUNDS
        } else {
            recalc::BOUNDS
        };
        self.set_recalc(id, bits);
        self.set_render_updates(id, render_updates::REBUILD);
        self.sync_demand(id);
    }

    /// Nodes whose requested texture is `texture`.
    pub(crate) fn nodes_requesting(&self, texture: TextureId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.texture == Some(texture))
            .map(|(id, _)| id)
            .collect()
    }

    /// Nodes drawn directly under `id`, in z order.
    pub fn render_children(&self, id: NodeId) -> Vec<NodeId> {
        self.render_order(id).into_vec()
    }

    pub fn property(&self, id: NodeId, prop: NodeProperty) -> Option<f64> {
        let n = self.nodes.get(id)?;
        let l = &n.local;
        Some(match prop {
            NodeProperty::X => l.x,
            NodeProperty::Y => l.y,
            NodeProperty::ScaleX => l.scale_x,
            NodeProperty::ScaleY => l.scale_y,
            NodeProperty::Rotation => l.rotation,
            NodeProperty::Alpha => n.alpha,
            NodeProperty::Width => n.rw,
            NodeProperty::Height => n.rh,
            NodeProperty::PivotX => l.pivot_x,
            NodeProperty::PivotY => l.pivot_y,
            NodeProperty::MountX => l.mount_x,
            NodeProperty::MountY => l.mount_y,
        })
    }
}

/// Read-only view of a node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    id: NodeId,
    node: &'a SceneNode,
}

impl NodeRef<'_> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.node.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.node.children
    }

    pub fn world(&self) -> AffineContext {
        self.node.world
    }

    /// Context relative to the surface the node is drawn on.
    pub fn render_context(&self) -> AffineContext {
        self.node.render_ctx()
    }

    pub fn bbox(&self) -> Rect {
        self.node.bbox
    }

    pub fn out_of_bounds(&self) -> OutOfBounds {
        self.node.oob
    }

    pub fn is_active(&self) -> bool {
        self.node.active
    }

    pub fn has_updates(&self) -> bool {
        self.node.has_updates
    }

    pub fn width(&self) -> f64 {
        self.node.rw
    }

    pub fn height(&self) -> f64 {
        self.node.rh
    }

    pub fn alpha(&self) -> f64 {
        self.node.alpha
    }

    pub fn z_index(&self) -> i32 {
        self.node.z_index
    }

    pub fn z_parent(&self) -> Option<NodeId> {
        self.node.z_parent
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.node.texture
    }

    pub fn displayed_texture(&self) -> Option<TextureId> {
        self.node.displayed
    }

    pub fn scissor(&self) -> Option<Rect> {
        self.node.scissor
    }

    /// Whether the node currently renders its subtree into an offscreen target.
    pub fn renders_to_texture(&self) -> bool {
        self.node.rtt_active
    }
}

/// Mutable handle for setting node properties; every setter records the dirty state it implies.
pub struct NodeMut<'a> {
    tree: &'a mut SceneTree,
    id: NodeId,
}

impl NodeMut<'_> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn node(&mut self) -> &mut SceneNode {
        &mut self.tree.nodes[self.id]
    }

    fn update_local(&mut self, f: impl FnOnce(&mut SceneNode) -> bool, bits: u32) -> &mut Self {
        if f(self.node()) {
            self.tree.set_recalc(self.id, bits);
        }
        self
    }

    fn content_changed(&mut self, level: u8) {
        self.tree.set_render_updates(self.id, level);
        self.tree.set_has_updates(self.id);
    }

    pub fn set_x(&mut self, x: f64) -> &mut Self {
        self.update_local(|n| replace(&mut n.local.x, x), recalc::TRANSLATE)
    }

    pub fn set_y(&mut self, y: f64) -> &mut Self {
        self.update_local(|n| replace(&mut n.local.y, y), recalc::TRANSLATE)
    }

    pub fn set_position(&mut self, x: f64, y: f64) -> &mut Self {
        self.set_x(x).set_y(y)
    }

    pub fn set_scale(&mut self, sx: f64, sy: f64) -> &mut Self {
        self.update_local(
            |n| replace(&mut n.local.scale_x, sx) | replace(&mut n.local.scale_y, sy),
            recalc::TRANSFORM | recalc::TRANSLATE,
        )
    }

    pub fn set_rotation(&mut self, radians: f64) -> &mut Self {
        self.update_local(
            |n| replace(&mut n.local.rotation, radians),
            recalc::TRANSFORM | recalc::TRANSLATE,
        )
    }

    pub fn set_pivot(&mut self, px: f64, py: f64) -> &mut Self {
        self.update_local(
            |n| replace(&mut n.local.pivot_x, px) | replace(&mut n.local.pivot_y, py),
            recalc::TRANSLATE,
        )
    }

    pub fn set_mount(&mut self, mx: f64, my: f64) -> &mut Self {
        self.update_local(
            |n| replace(&mut n.local.mount_x, mx) | replace(&mut n.local.mount_y, my),
            recalc::TRANSLATE,
        )
    }

    /// Set opacity, clamped to `[0, 1]`.
    pub fn set_alpha(&mut self, alpha: f64) -> &mut Self {
        let alpha = clamp_alpha(alpha);
        self.update_local(|n| replace(&mut n.alpha, alpha), recalc::ALPHA)
    }

    pub fn set_visible(&mut self, visible: bool) -> &mut Self {
        self.update_local(|n| replace(&mut n.visible, visible), recalc::ALPHA)
    }

    pub fn set_size(&mut self, w: f64, h: f64) -> StageResult<&mut Self> {
        check_dimension(w)?;
        check_dimension(h)?;
        self.apply_size(Some(w), Some(h));
        Ok(self)
    }

    pub fn set_width(&mut self, w: f64) -> StageResult<&mut Self> {
        check_dimension(w)?;
        let h = self.node().explicit_h;
        self.apply_size(Some(w), h);
        Ok(self)
    }

    pub fn set_height(&mut self, h: f64) -> StageResult<&mut Self> {
        check_dimension(h)?;
        let w = self.node().explicit_w;
        self.apply_size(w, Some(h));
        Ok(self)
    }

    /// Drop explicit dimensions; the node follows its displayed texture again.
    pub fn clear_size(&mut self) -> &mut Self {
        self.apply_size(None, None);
        self
    }

    fn apply_size(&mut self, w: Option<f64>, h: Option<f64>) {
        let n = self.node();
        n.explicit_w = w;
        n.explicit_h = h;
        if n.refresh_dimensions() {
            self.tree.set_recalc(
                self.id,
                recalc::DIMENSIONS | recalc::TRANSLATE | recalc::BOUNDS,
            );
            self.content_changed(render_updates::REBUILD);
        }
    }

    /// Placeholder size used for bounds until the requested texture is displayed.
    pub fn set_estimated_size(&mut self, w: f64, h: f64) -> StageResult<&mut Self> {
        check_dimension(w)?;
        check_dimension(h)?;
        let est = Some((w, h));
        if self.node().estimated != est {
            self.node().estimated = est;
            self.tree.set_recalc(self.id, recalc::BOUNDS);
        }
        Ok(self)
    }

    pub fn set_color(&mut self, argb: Argb) -> &mut Self {
        self.set_colors([argb; 4])
    }

    /// Per-corner colours: top-left, top-right, bottom-right, bottom-left.
    pub fn set_colors(&mut self, colors: [Argb; 4]) -> &mut Self {
        if self.node().colors == colors {
            return self;
        }
        self.node().colors = colors;
        let colorized = self
            .node()
            .texturizer
            .as_ref()
            .is_some_and(|t| t.enabled && t.colorize);
        self.content_changed(if colorized {
            render_updates::SHADER
        } else {
            render_updates::REBUILD
        });
        self
    }

    /// Draw a solid rectangle using the node's colours; needs an explicit size.
    pub fn set_rect(&mut self, rect: bool) -> &mut Self {
        if self.node().rect == rect {
            return self;
        }
        self.node().rect = rect;
        let texture = if rect { self.tree.white_texture } else { None };
        self.set_texture(texture);
        if self.node().refresh_dimensions() {
            self.tree.set_recalc(
                self.id,
                recalc::DIMENSIONS | recalc::TRANSLATE | recalc::BOUNDS,
            );
        }
        self
    }

    /// Request `texture`. The previous texture stays displayed until the new one is drawable.
    pub fn set_texture(&mut self, texture: Option<TextureId>) -> &mut Self {
        if self.node().texture == texture {
            return self;
        }
        self.node().texture = texture;
        if texture.is_none() {
            self.tree.set_displayed(self.id, None, (0.0, 0.0));
        }
        self.tree.set_recalc(self.id, recalc::BOUNDS);
        self.content_changed(render_updates::REBUILD);
        self.tree.sync_demand(self.id);
        self
    }

    pub fn set_z_index(&mut self, z: i32) -> &mut Self {
        if self.node().z_index == z {
            return self;
        }
        self.tree.z_unlink(self.id);
        self.node().z_index = z;
        self.tree.refresh_z_membership(self.id);
        self.content_changed(render_updates::REBUILD);
        self
    }

    pub fn set_force_z_context(&mut self, force: bool) -> &mut Self {
        if self.node().force_z_context == force {
            return self;
        }
        self.node().force_z_context = force;
        self.tree.refresh_z_membership(self.id);
        self.content_changed(render_updates::REBUILD);
        self
    }

    pub fn set_clipping(&mut self, clipping: bool) -> &mut Self {
        if replace(&mut self.node().clipping, clipping) {
            self.tree.set_recalc(self.id, recalc::BOUNDS);
            self.content_changed(render_updates::REBUILD);
        }
        self
    }

    /// Override the inherited bounds margin `[left, top, right, bottom]`.
    pub fn set_bounds_margin(&mut self, margin: Option<[f64; 4]>) -> &mut Self {
        if self.node().bounds_margin != margin {
            self.node().bounds_margin = margin;
            self.tree.set_recalc(self.id, recalc::BOUNDS);
        }
        self
    }

    /// Shader for this node and, unless overridden, its descendants.
    pub fn set_shader(&mut self, shader: Option<ShaderId>) -> &mut Self {
        if self.node().shader != shader {
            self.node().shader = shader;
            self.content_changed(render_updates::SHADER);
        }
        self
    }

    /// Render this subtree through an offscreen target.
    ///
    /// A `lazy` texturizer only caches while the subtree is static.
    pub fn enable_texturizer(&mut self, lazy: bool) -> &mut Self {
        let id = self.id;
        let n = self.node();
        let t = n.texturizer.get_or_insert_with(Texturizer::default);
        let was = t.enabled;
        t.enabled = true;
        t.lazy = lazy;
        self.tree.texturized.insert(id);
        if !was {
            self.tree.refresh_z_membership(id);
        }
        self.tree.set_recalc(id, recalc::RTT_MODE);
        self.content_changed(render_updates::REBUILD);
        self
    }

    pub fn disable_texturizer(&mut self) -> &mut Self {
        let id = self.id;
        let Some(t) = self.node().texturizer.as_mut() else {
            return self;
        };
        if !replace(&mut t.enabled, false) {
            return self;
        }
        self.tree.refresh_z_membership(id);
        self.tree.set_recalc(id, recalc::RTT_MODE);
        self.content_changed(render_updates::REBUILD);
        self
    }

    /// Tint the offscreen result with the node's colours instead of its own content.
    pub fn set_texturizer_colorize(&mut self, colorize: bool) -> &mut Self {
        if let Some(t) = self.node().texturizer.as_mut()
            && replace(&mut t.colorize, colorize)
        {
            self.content_changed(render_updates::REBUILD);
        }
        self
    }

    /// Render the target but do not draw the result quad; see `Stage::texturizer_texture`.
    pub fn set_render_offscreen(&mut self, offscreen: bool) -> &mut Self {
        if let Some(t) = self.node().texturizer.as_mut()
            && replace(&mut t.render_offscreen, offscreen)
        {
            self.content_changed(render_updates::SHADER);
        }
        self
    }

    pub fn set_property(&mut self, prop: NodeProperty, value: f64) -> StageResult<&mut Self> {
        let l = self.node().local;
        match prop {
            NodeProperty::X => self.set_x(value),
            NodeProperty::Y => self.set_y(value),
            NodeProperty::ScaleX => self.set_scale(value, l.scale_y),
            NodeProperty::ScaleY => self.set_scale(l.scale_x, value),
            NodeProperty::Rotation => self.set_rotation(value),
            NodeProperty::Alpha => self.set_alpha(value),
            NodeProperty::Width => self.set_width(value)?,
            NodeProperty::Height => self.set_height(value)?,
            NodeProperty::PivotX => self.set_pivot(value, l.pivot_y),
            NodeProperty::PivotY => self.set_pivot(l.pivot_x, value),
            NodeProperty::MountX => self.set_mount(value, l.mount_y),
            NodeProperty::MountY => self.set_mount(l.mount_x, value),
        };
        Ok(self)
    }
}

/// Store `value` into `slot`, returning whether it differed.
fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

fn check_dimension(v: f64) -> StageResult<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(StageError::invalid_tree(format!(
            "dimensions must be finite and >= 0, got {v}"
        )))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/tree.rs"]
mod tests;
