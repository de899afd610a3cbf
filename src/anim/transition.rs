use crate::anim::ease::Ease;
use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::NodeId;
use crate::scene::tree::{NodeProperty, SceneTree};
use std::collections::HashMap;

/// Maps linear progress in `[0, 1]` to the interpolation factor.
#[derive(Clone, Copy, Debug)]
pub enum Timing {
    Ease(Ease),
    Custom(fn(f64) -> f64),
}

impl Default for Timing {
    fn default() -> Self {
        Timing::Ease(Ease::Linear)
    }
}

impl Timing {
    pub fn apply(self, p: f64) -> f64 {
        match self {
            Timing::Ease(e) => e.apply(p),
            Timing::Custom(f) => f(p.clamp(0.0, 1.0)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TransitionSettings {
    /// Seconds from start to end; `<= 0` jumps straight to the target value.
    pub duration: f64,
    /// Seconds to wait before the value starts moving.
    pub delay: f64,
    pub timing: Timing,
}

impl TransitionSettings {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }
}

#[derive(Clone, Copy, Debug)]
struct Transition {
    from: f64,
    to: f64,
    elapsed: f64,
    settings: TransitionSettings,
}

impl Transition {
    fn value(&self) -> (f64, bool) {
        let t = self.elapsed - self.settings.delay;
        if t < 0.0 {
            return (self.from, false);
        }
        let p = (t / self.settings.duration).clamp(0.0, 1.0);
        if p >= 1.0 {
            return (self.to, true);
        }
        let k = self.settings.timing.apply(p);
        (self.from + (self.to - self.from) * k, false)
    }
}

/// Running property transitions, advanced once per frame.
///
/// At most one transition runs per `(node, property)`; starting another retargets it from the
/// current value.
#[derive(Debug, Default)]
pub struct TransitionSet {
    running: HashMap<(NodeId, NodeProperty), Transition>,
}

impl TransitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    pub fn is_running(&self, node: NodeId, prop: NodeProperty) -> bool {
        self.running.contains_key(&(node, prop))
    }

    /// Move `prop` of `node` towards `to`.
    pub fn start(
        &mut self,
        tree: &mut SceneTree,
        node: NodeId,
        prop: NodeProperty,
        to: f64,
        settings: TransitionSettings,
    ) -> StageResult<()> {
        let Some(from) = tree.property(node, prop) else {
            return Err(StageError::invalid_tree(format!("stale node id {node:?}")));
        };
        if settings.duration.is_nan() || settings.duration <= 0.0 {
            self.running.remove(&(node, prop));
            tree.node_mut(node)?.set_property(prop, to)?;
            return Ok(());
        }
        self.running.insert(
            (node, prop),
            Transition {
                from,
                to,
                elapsed: 0.0,
                settings,
            },
        );
        Ok(())
    }

    /// Stop a transition where it is. Returns whether one was running.
    pub fn stop(&mut self, node: NodeId, prop: NodeProperty) -> bool {
        self.running.remove(&(node, prop)).is_some()
    }

    /// Jump a running transition to its target value.
    pub fn finish(
        &mut self,
        tree: &mut SceneTree,
        node: NodeId,
        prop: NodeProperty,
    ) -> StageResult<()> {
        if let Some(t) = self.running.remove(&(node, prop)) {
            tree.node_mut(node)?.set_property(prop, t.to)?;
        }
        Ok(())
    }

    /// Advance every transition by `dt` seconds and write the values through the node setters.
    ///
    /// Returns the transitions that completed. Transitions of destroyed nodes are dropped.
    pub fn progress(&mut self, tree: &mut SceneTree, dt: f64) -> Vec<(NodeId, NodeProperty)> {
        let mut done = Vec::new();
        let mut dropped = Vec::new();
        for (&(node, prop), t) in self.running.iter_mut() {
            t.elapsed += dt.max(0.0);
            let (value, finished) = t.value();
            let applied = match tree.node_mut(node) {
                Ok(mut n) => n.set_property(prop, value).map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = applied {
                tracing::debug!(?node, ?prop, error = %e, "dropping transition");
                dropped.push((node, prop));
            } else if finished {
                done.push((node, prop));
            }
        }
        for key in dropped.iter().chain(done.iter()) {
            self.running.remove(key);
        }
        done
    }

    /// Drop every transition of `node`.
    pub fn cancel_node(&mut self, node: NodeId) {
        self.running.retain(|(n, _), _| *n != node);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/anim/transition.rs"]
mod tests;
