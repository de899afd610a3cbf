use crate::foundation::error::StageResult;
use crate::foundation::ids::GpuHandle;
use crate::render::backend::RenderBackend;
use std::collections::HashMap;

/// Pool configuration for offscreen render targets.
#[derive(Debug, Clone, Copy)]
pub struct RenderTargetPoolOpts {
    /// Texel ceiling across borrowed and retained targets.
    pub max_pool_texels: u64,
    /// Maximum number of retained targets per (w,h) bucket.
    pub max_targets_per_bucket: usize,
    /// Frames a retained target survives without being borrowed.
    pub idle_frames: u64,
}

impl Default for RenderTargetPoolOpts {
    fn default() -> Self {
        Self {
            max_pool_texels: 12_000_000,
            max_targets_per_bucket: 8,
            idle_frames: 60,
        }
    }
}

/// Offscreen surface borrowed by exactly one texturizer at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub handle: GpuHandle,
    pub last_used_frame: u64,
}

impl RenderTarget {
    pub fn texels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct TargetKey {
    w: u32,
    h: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderTargetPoolStats {
    pub retained_targets: usize,
    pub retained_texels: u64,
    /// Texels of every live target, borrowed or retained.
    pub live_texels: u64,
    pub alloc_targets: u64,
    pub reused_targets: u64,
    pub freed_targets: u64,
    pub over_budget_allocs: u64,
}

struct Bucket {
    targets: Vec<RenderTarget>,
}

/// Bounded recycler of offscreen render targets.
///
/// Keyed by `(width, height)`. Retained targets are reused most-recent first and destroyed once
/// idle for `idle_frames`, or earlier when a new allocation would exceed the texel ceiling.
pub struct RenderTargetPool {
    opts: RenderTargetPoolOpts,
    stats: RenderTargetPoolStats,

    bucket_idx_by_key: HashMap<TargetKey, usize>,
    buckets: Vec<Bucket>,
}

impl RenderTargetPool {
    pub fn new(opts: RenderTargetPoolOpts) -> Self {
        Self {
            opts,
            stats: RenderTargetPoolStats::default(),
            bucket_idx_by_key: HashMap::new(),
            buckets: Vec::new(),
        }
    }

    pub fn stats(&self) -> RenderTargetPoolStats {
        self.stats.clone()
    }

    pub fn borrow<B: RenderBackend + ?Sized>(
        &mut self,
        width: u32,
        height: u32,
        frame: u64,
        backend: &mut B,
    ) -> StageResult<RenderTarget> {
        let key = TargetKey {
            w: width,
            h: height,
        };
        if let Some(&bi) = self.bucket_idx_by_key.get(&key)
            && let Some(mut t) = self.buckets[bi].targets.pop()
        {
            self.stats.retained_targets = self.stats.retained_targets.saturating_sub(1);
            self.stats.retained_texels = self.stats.retained_texels.saturating_sub(t.texels());
            self.stats.reused_targets = self.stats.reused_targets.saturating_add(1);
            t.last_used_frame = frame;
            return Ok(t);
        }

        let texels = u64::from(width) * u64::from(height);
        self.make_room(texels, backend);
        if self.stats.live_texels.saturating_add(texels) > self.opts.max_pool_texels {
            self.stats.over_budget_allocs = self.stats.over_budget_allocs.saturating_add(1);
            tracing::warn!(
                width,
                height,
                live_texels = self.stats.live_texels,
                max_texels = self.opts.max_pool_texels,
                "render target memory over budget"
            );
        }

        let handle = backend.create_render_target(width, height)?;
        self.stats.alloc_targets = self.stats.alloc_targets.saturating_add(1);
        self.stats.live_texels = self.stats.live_texels.saturating_add(texels);
        tracing::debug!(width, height, ?handle, "allocated render target");
        Ok(RenderTarget {
            width,
            height,
            handle,
            last_used_frame: frame,
        })
    }

    pub fn release<B: RenderBackend + ?Sized>(
        &mut self,
        mut target: RenderTarget,
        frame: u64,
        backend: &mut B,
    ) {
        target.last_used_frame = frame;
        if self.opts.max_targets_per_bucket == 0 {
            self.destroy(target, backend);
            return;
        }

        let key = TargetKey {
            w: target.width,
            h: target.height,
        };
        let bi = match self.bucket_idx_by_key.get(&key).copied() {
            Some(i) => i,
            None => {
                let i = self.buckets.len();
                self.buckets.push(Bucket {
                    targets: Vec::new(),
                });
                self.bucket_idx_by_key.insert(key, i);
                i
            }
        };

        if self.buckets[bi].targets.len() >= self.opts.max_targets_per_bucket {
            self.destroy(target, backend);
            return;
        }
        self.buckets[bi].targets.push(target);
        self.stats.retained_targets = self.stats.retained_targets.saturating_add(1);
        self.stats.retained_texels = self.stats.retained_texels.saturating_add(target.texels());
    }

    /// Destroy retained targets idle for more than `idle_frames`. Returns how many were freed.
    pub fn age_out<B: RenderBackend + ?Sized>(&mut self, frame: u64, backend: &mut B) -> usize {
        let idle = self.opts.idle_frames;
        let mut expired = Vec::new();
        for b in &mut self.buckets {
            b.targets.retain(|t| {
                let keep = frame.saturating_sub(t.last_used_frame) <= idle;
                if !keep {
                    expired.push(*t);
                }
                keep
            });
        }
        let n = expired.len();
        for t in expired {
            self.forget_retained(&t);
            self.destroy(t, backend);
        }
        if n > 0 {
            tracing::debug!(freed = n, frame, "aged out render targets");
        }
        n
    }

    /// Destroy every retained target.
    pub fn clear<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        let all: Vec<RenderTarget> = self
            .buckets
            .iter_mut()
            .flat_map(|b| b.targets.drain(..))
            .collect();
        for t in all {
            self.forget_retained(&t);
            self.destroy(t, backend);
        }
    }

    /// Free idle targets, least recently used first, until `texels` more fit under the ceiling.
    fn make_room<B: RenderBackend + ?Sized>(&mut self, texels: u64, backend: &mut B) {
        while self.stats.live_texels.saturating_add(texels) > self.opts.max_pool_texels {
            let oldest = self
                .buckets
                .iter()
                .enumerate()
                .filter_map(|(bi, b)| {
                    b.targets
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, t)| t.last_used_frame)
                        .map(|(ti, t)| (bi, ti, t.last_used_frame))
                })
                .min_by_key(|(_, _, f)| *f);
            let Some((bi, ti, _)) = oldest else {
                return;
            };
            let t = self.buckets[bi].targets.remove(ti);
            self.forget_retained(&t);
            self.destroy(t, backend);
        }
    }

    fn forget_retained(&mut self, t: &RenderTarget) {
        self.stats.retained_targets = self.stats.retained_targets.saturating_sub(1);
        self.stats.retained_texels = self.stats.retained_texels.saturating_sub(t.texels());
    }

    fn destroy<B: RenderBackend + ?Sized>(&mut self, t: RenderTarget, backend: &mut B) {
        backend.free_render_target(t.handle);
        self.stats.freed_targets = self.stats.freed_targets.saturating_add(1);
        self.stats.live_texels = self.stats.live_texels.saturating_sub(t.texels());
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/target_pool.rs"]
mod tests;
