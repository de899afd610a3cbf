use crate::foundation::ids::NodeId;
use crate::scene::node::render_updates;
use crate::scene::tree::SceneTree;
use smallvec::SmallVec;

/// Rendering order of a node's z-members.
#[derive(Debug, Default)]
pub(crate) enum ZChildren {
    /// Tree order; no member carries a non-zero z-index.
    #[default]
    Unsorted,
    ZSorted {
        /// Sorted by `(z_index, tree_order)`.
        members: Vec<NodeId>,
        /// Inserted or re-indexed members awaiting a merge into `members`.
        pending: Vec<NodeId>,
        full_resort: bool,
        /// Members with a non-zero z-index. The list reverts to `Unsorted` at zero.
        usage: usize,
    },
}

impl ZChildren {
    pub(crate) fn needs_sort(&self) -> bool {
        match self {
            ZChildren::Unsorted => false,
            ZChildren::ZSorted {
                pending,
                full_resort,
                ..
            } => *full_resort || !pending.is_empty(),
        }
    }
}

pub(crate) type RenderOrder = SmallVec<[NodeId; 8]>;

impl SceneTree {
    /// Nearest z-context at or above `start`.
    pub(crate) fn find_z_context(&self, start: NodeId) -> Option<NodeId> {
        let mut cur = Some(start);
        while let Some(id) = cur {
            let n = self.nodes.get(id)?;
            if n.is_z_context() {
                return Some(id);
            }
            cur = n.parent;
        }
        None
    }

    fn desired_z_parent(&self, id: NodeId) -> Option<NodeId> {
        let n = self.nodes.get(id)?;
        let parent = n.parent?;
        if n.z_index == 0 {
            Some(parent)
        } else {
            self.find_z_context(parent)
        }
    }

    /// Remove `id` from its z-parent's list, using the z-index it was linked with.
    pub(crate) fn z_unlink(&mut self, id: NodeId) {
        let Some(n) = self.nodes.get_mut(id) else {
            return;
        };
        let Some(zp) = n.z_parent.take() else {
            return;
        };
        let counted = n.z_index != 0;
        let Some(list) = self.nodes.get_mut(zp).map(|p| &mut p.z_children) else {
            return;
        };
        let revert = match list {
            ZChildren::Unsorted => false,
            ZChildren::ZSorted {
                members,
                pending,
                usage,
                ..
            } => {
                members.retain(|m| *m != id);
                pending.retain(|m| *m != id);
                if counted {
                    *usage = usage.saturating_sub(1);
                }
                *usage == 0
            }
        };
        if revert {
            *list = ZChildren::Unsorted;
        }
    }

    fn z_link(&mut self, id: NodeId, zp: NodeId) {
        let Some(z) = self.nodes.get(id).map(|n| n.z_index) else {
            return;
        };
        let unsorted = matches!(
            self.nodes.get(zp).map(|p| &p.z_children),
            Some(ZChildren::Unsorted)
        );
        let existing: Vec<NodeId> = if unsorted && z != 0 {
            self.nodes[zp]
                .children
                .iter()
                .copied()
                .filter(|c| *c != id && self.nodes[*c].z_parent == Some(zp))
                .collect()
        } else {
            Vec::new()
        };

        self.nodes[id].z_parent = Some(zp);
        let list = &mut self.nodes[zp].z_children;
        if let ZChildren::ZSorted { pending, usage, .. } = list {
            pending.push(id);
            if z != 0 {
                *usage += 1;
            }
        } else if z != 0 {
            *list = ZChildren::ZSorted {
                members: existing,
                pending: vec![id],
                full_resort: true,
                usage: 1,
            };
        }
        self.set_has_updates(zp);
    }

    /// Re-resolve z-parents for `start` and every descendant whose z-context could be affected.
    ///
    /// Does not descend below nested z-contexts: their members resolve to them regardless.
    pub(crate) fn refresh_z_membership(&mut self, start: NodeId) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let desired = self.desired_z_parent(id);
            let Some(n) = self.nodes.get(id) else {
                continue;
            };
            if n.z_parent != desired {
                self.z_unlink(id);
                if let Some(zp) = desired {
                    self.z_link(id, zp);
                }
            }
            let n = &self.nodes[id];
            if id == start || !n.is_z_context() {
                stack.extend(n.children.iter().rev().copied());
            }
        }
    }

    /// Sibling order changed below `parent`: sorted lists it feeds must be rebuilt from scratch.
    pub(crate) fn request_full_resort(&mut self, parent: NodeId) {
        let mut targets: SmallVec<[NodeId; 2]> = SmallVec::new();
        targets.push(parent);
        if let Some(ctx) = self.find_z_context(parent)
            && ctx != parent
        {
            targets.push(ctx);
        }
        for t in targets {
            if let Some(ZChildren::ZSorted { full_resort, .. }) =
                self.nodes.get_mut(t).map(|n| &mut n.z_children)
            {
                *full_resort = true;
                self.set_has_updates(t);
            }
        }
    }

    /// Number `id`'s subtree in depth-first order, stopping below nested z-contexts.
    fn assign_tree_order(&mut self, id: NodeId, counter: &mut u64) {
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(c) = stack.pop() {
            *counter += 1;
            let n = &mut self.nodes[c];
            n.tree_order = *counter;
            if !n.is_z_context() {
                stack.extend(n.children.iter().rev().copied());
            }
        }
    }

    /// Bring `id`'s z-sorted list up to date.
    ///
    /// A full resort stable-sorts every member; otherwise only the pending members are sorted and
    /// merged into the existing order.
    pub(crate) fn sort_z_children(&mut self, id: NodeId, counter: &mut u64) {
        if !self.nodes.get(id).is_some_and(|n| n.z_children.needs_sort()) {
            return;
        }
        self.assign_tree_order(id, counter);

        let ZChildren::ZSorted {
            members,
            pending,
            full_resort,
            ..
        } = &mut self.nodes[id].z_children
        else {
            return;
        };
        let mut members = std::mem::take(members);
        let mut pending = std::mem::take(pending);
        let full = std::mem::replace(full_resort, false);

        let nodes = &self.nodes;
        let key = |n: &NodeId| (nodes[*n].z_index, nodes[*n].tree_order);
        let sorted = if full {
            members.append(&mut pending);
            members.sort_by_key(key);
            members
        } else {
            pending.sort_by_key(key);
            let mut out = Vec::with_capacity(members.len() + pending.len());
            let (mut i, mut j) = (0, 0);
            while i < members.len() && j < pending.len() {
                if key(&members[i]) <= key(&pending[j]) {
                    out.push(members[i]);
                    i += 1;
                } else {
                    out.push(pending[j]);
                    j += 1;
                }
            }
            out.extend_from_slice(&members[i..]);
            out.extend_from_slice(&pending[j..]);
            out
        };

        if let ZChildren::ZSorted { members, .. } = &mut self.nodes[id].z_children {
            *members = sorted;
        }
        self.set_render_updates(id, render_updates::REBUILD);
    }

    /// Nodes rendered directly under `id`, in drawing order.
    pub(crate) fn render_order(&self, id: NodeId) -> RenderOrder {
        let Some(n) = self.nodes.get(id) else {
            return RenderOrder::new();
        };
        match &n.z_children {
            ZChildren::ZSorted {
                members, pending, ..
            } => members.iter().chain(pending.iter()).copied().collect(),
            ZChildren::Unsorted => n
                .children
                .iter()
                .copied()
                .filter(|c| self.nodes.get(*c).is_some_and(|cn| cn.z_parent == Some(id)))
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/zorder.rs"]
mod tests;
