use crate::foundation::core::Rect;
use crate::foundation::error::{LoadError, StageError, StageResult};
use crate::foundation::ids::{GpuHandle, NodeId, SourceId, TextureId};
use crate::render::backend::RenderBackend;
use crate::texture::resource::{LoadState, Texture, TextureResource};
use crate::texture::source::{LoadMessage, LoadTicket, SourceLoader, TextureSourceData};
use slotmap::SlotMap;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Instant;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextureStats {
    pub used_texels: u64,
    pub uploads: u64,
    pub loads_started: u64,
    pub loads_cancelled: u64,
    pub evicted_resources: u64,
    pub evicted_texels: u64,
    pub over_budget_uploads: u64,
}

/// Result of adding a consumer to a texture.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DemandOutcome {
    /// Loading, or waiting for a render result.
    Pending,
    /// Uploaded and drawable now.
    Ready,
    /// The cached load error; not retried until `reload`.
    Failed(LoadError),
}

/// A load merged at frame start.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LoadOutcome {
    pub(crate) source: SourceId,
    pub(crate) result: Result<(), LoadError>,
}

/// What the render pass needs to draw a texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Drawable {
    pub(crate) handle: GpuHandle,
    pub(crate) coords: [f32; 4],
}

/// Deduplicating table of texture resources with a texel budget.
pub struct TextureManager {
    sources: SlotMap<SourceId, TextureResource>,
    lookup: HashMap<String, SourceId>,
    textures: SlotMap<TextureId, Texture>,
    max_texels: u64,
    next_generation: u64,
    stats: TextureStats,
    tx: mpsc::Sender<LoadMessage>,
    rx: mpsc::Receiver<LoadMessage>,
}

impl TextureManager {
    pub fn new(max_texels: u64) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            sources: SlotMap::with_key(),
            lookup: HashMap::new(),
            textures: SlotMap::with_key(),
            max_texels,
            next_generation: 0,
            stats: TextureStats::default(),
            tx,
            rx,
        }
    }

    pub fn stats(&self) -> TextureStats {
        self.stats.clone()
    }

    pub fn resource(&self, source: SourceId) -> Option<&TextureResource> {
        self.sources.get(source)
    }

    pub fn texture(&self, texture: TextureId) -> Option<&Texture> {
        self.textures.get(texture)
    }

    pub fn source_of(&self, texture: TextureId) -> Option<SourceId> {
        self.textures.get(texture).map(|t| t.source)
    }

    /// Return the resource registered under `lookup_key`, or create a lazy one.
    ///
    /// Without a key the resource is never shared. Nothing loads until a consumer arrives.
    pub fn get_or_create(
        &mut self,
        loader: Rc<dyn SourceLoader>,
        lookup_key: Option<&str>,
    ) -> SourceId {
        if let Some(key) = lookup_key
            && let Some(&id) = self.lookup.get(key)
            && self.sources.contains_key(id)
        {
            return id;
        }
        let id = self.sources.insert(TextureResource::new(
            lookup_key.map(str::to_owned),
            Some(loader),
        ));
        if let Some(key) = lookup_key {
            self.lookup.insert(key.to_owned(), id);
        }
        id
    }

    /// New consumer handle on `source`.
    pub fn create_texture(&mut self, source: SourceId) -> StageResult<TextureId> {
        let Some(res) = self.sources.get_mut(source) else {
            return Err(StageError::validation("unknown texture source"));
        };
        let id = self.textures.insert(Texture::new(source));
        res.textures.push(id);
        Ok(id)
    }

    /// Crop `texture` to `region` (source pixels). `None` shows the whole source.
    pub fn set_region(&mut self, texture: TextureId, region: Option<Rect>) -> StageResult<()> {
        let Some(t) = self.textures.get_mut(texture) else {
            return Err(StageError::validation("unknown texture"));
        };
        if let Some(r) = region
            && (r.width() <= 0.0 || r.height() <= 0.0 || r.x0 < 0.0 || r.y0 < 0.0)
        {
            return Err(StageError::validation("texture region must be non-empty and >= 0"));
        }
        t.region = region;
        Ok(())
    }

    pub fn set_permanent(&mut self, source: SourceId, permanent: bool) {
        if let Some(r) = self.sources.get_mut(source) {
            r.permanent = permanent;
        }
    }

    /// Resource exposing the texturizer output of `node`. Never evicted.
    pub(crate) fn create_render_result(&mut self, node: NodeId) -> SourceId {
        let mut res = TextureResource::new(None, None);
        res.render_result = Some(node);
        self.sources.insert(res)
    }

    /// Point a render-result resource at the current output. The handle is borrowed, not owned.
    pub(crate) fn set_render_result(
        &mut self,
        source: SourceId,
        handle: Option<GpuHandle>,
        size: (u32, u32),
    ) -> bool {
        let Some(r) = self.sources.get_mut(source) else {
            return false;
        };
        let changed = r.gpu != handle || r.size != Some(size);
        r.gpu = handle;
        r.size = Some(size);
        r.state = if handle.is_some() {
            LoadState::Loaded
        } else {
            LoadState::Idle
        };
        changed
    }

    /// The owning node is gone: drop the borrowed handle and let the resource be swept.
    pub(crate) fn release_render_result(&mut self, source: SourceId) {
        if let Some(r) = self.sources.get_mut(source) {
            r.render_result = None;
            r.gpu = None;
            r.state = LoadState::Idle;
        }
    }

    pub fn used_texels(&self) -> u64 {
        self.stats.used_texels
    }

    pub fn is_full(&self) -> bool {
        self.stats.used_texels >= self.max_texels
    }

    /// Register `node` as a consumer of `texture`, starting a load or upload as needed.
    pub(crate) fn add_consumer<B: RenderBackend + ?Sized>(
        &mut self,
        texture: TextureId,
        node: NodeId,
        backend: &mut B,
    ) -> DemandOutcome {
        let Some(t) = self.textures.get_mut(texture) else {
            return DemandOutcome::Pending;
        };
        t.nodes.insert(node);
        let source = t.source;
        let Some(res) = self.sources.get_mut(source) else {
            return DemandOutcome::Pending;
        };
        res.consumers.insert(texture);

        let needs_load = match &res.state {
            LoadState::Failed(e) => return DemandOutcome::Failed(e.clone()),
            LoadState::Loading { .. } => return DemandOutcome::Pending,
            LoadState::Idle => res.render_result.is_none() && res.data.is_none(),
            LoadState::Loaded => false,
        };
        if needs_load {
            self.start_load(source);
            return DemandOutcome::Pending;
        }

        match self.ensure_uploaded(source, backend) {
            Ok(Some(_)) => DemandOutcome::Ready,
            Ok(None) => DemandOutcome::Pending,
            Err(e) => {
                tracing::warn!(error = %e, "texture upload failed");
                DemandOutcome::Pending
            }
        }
    }

    /// Remove `node` from `texture`'s consumers. Cancels an in-flight load once nobody is left.
    pub(crate) fn remove_consumer(&mut self, texture: TextureId, node: NodeId) {
        let Some(t) = self.textures.get_mut(texture) else {
            return;
        };
        t.nodes.remove(&node);
        if !t.nodes.is_empty() {
            return;
        }
        let source = t.source;
        let Some(res) = self.sources.get_mut(source) else {
            return;
        };
        res.consumers.remove(&texture);
        if !res.consumers.is_empty() {
            return;
        }
        if matches!(res.state, LoadState::Loading { .. }) {
            let prev = std::mem::replace(&mut res.state, LoadState::Idle);
            if let LoadState::Loading {
                cancel: Some(cancel),
                ..
            } = prev
            {
                cancel();
            }
            self.stats.loads_cancelled = self.stats.loads_cancelled.saturating_add(1);
        }
    }

    fn start_load(&mut self, source: SourceId) {
        let Some(res) = self.sources.get_mut(source) else {
            return;
        };
        let Some(loader) = res.loader.clone() else {
            return;
        };
        self.next_generation += 1;
        let generation = self.next_generation;
        res.state = LoadState::Loading {
            since: Instant::now(),
            generation,
            cancel: None,
        };
        self.stats.loads_started = self.stats.loads_started.saturating_add(1);

        let cancel = loader.load(LoadTicket::new(source, generation, self.tx.clone()));
        if let Some(res) = self.sources.get_mut(source)
            && let LoadState::Loading { cancel: slot, .. } = &mut res.state
        {
            *slot = cancel;
        }
    }

    /// Start loading `source` without waiting for a consumer.
    pub fn preload(&mut self, source: SourceId) {
        if self
            .sources
            .get(source)
            .is_some_and(|r| matches!(r.state, LoadState::Idle) && r.data.is_none())
        {
            self.start_load(source);
        }
    }

    /// Clear a cached error (or stale pixels) and load `source` again if it has consumers.
    pub fn reload(&mut self, source: SourceId) -> StageResult<()> {
        let Some(res) = self.sources.get_mut(source) else {
            return Err(StageError::validation("unknown texture source"));
        };
        if res.render_result.is_some() {
            return Ok(());
        }
        if let LoadState::Loading {
            cancel: Some(cancel),
            ..
        } = std::mem::replace(&mut res.state, LoadState::Idle)
        {
            cancel();
        }
        if !res.consumers.is_empty() {
            self.start_load(source);
        }
        Ok(())
    }

    /// Merge loader results that arrived since the last call.
    ///
    /// Results for freed, superseded or abandoned loads are dropped. Successful loads with
    /// consumers (or permanent ones) are uploaded right away.
    pub(crate) fn drain_loads<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Vec<LoadOutcome> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            let Some(res) = self.sources.get_mut(msg.source) else {
                tracing::trace!(source = ?msg.source, "load result for freed texture ignored");
                continue;
            };
            let current = matches!(
                res.state,
                LoadState::Loading { generation, .. } if generation == msg.generation
            );
            if !current {
                tracing::trace!(
                    source = ?msg.source,
                    generation = msg.generation,
                    "stale load result ignored"
                );
                continue;
            }

            match msg.result {
                Ok(data) => {
                    res.size = Some((data.width, data.height));
                    res.data = Some(data);
                    res.state = LoadState::Loaded;
                    if let Some(old) = res.gpu.take() {
                        backend.free_texture(old);
                        self.stats.used_texels =
                            self.stats.used_texels.saturating_sub(res.charged_texels);
                        res.charged_texels = 0;
                    }
                    if let Err(e) = self.ensure_uploaded(msg.source, backend) {
                        tracing::warn!(error = %e, "texture upload failed");
                    }
                    out.push(LoadOutcome {
                        source: msg.source,
                        result: Ok(()),
                    });
                }
                Err(e) => {
                    res.state = LoadState::Failed(e.clone());
                    out.push(LoadOutcome {
                        source: msg.source,
                        result: Err(e),
                    });
                }
            }
        }
        out
    }

    /// Upload loaded pixels of `source` if it has consumers (or is permanent).
    ///
    /// A full budget triggers a sweep first; a backend `CapacityExceeded` triggers a sweep and
    /// one retry. If the budget still does not fit, the upload proceeds with a warning.
    pub(crate) fn ensure_uploaded<B: RenderBackend + ?Sized>(
        &mut self,
        source: SourceId,
        backend: &mut B,
    ) -> StageResult<Option<GpuHandle>> {
        let Some(res) = self.sources.get(source) else {
            return Ok(None);
        };
        if let Some(h) = res.gpu {
            return Ok(Some(h));
        }
        if res.consumers.is_empty() && !res.permanent {
            return Ok(None);
        }
        let Some(data) = res.data.clone() else {
            return Ok(None);
        };

        let texels = data.texels();
        if self.stats.used_texels.saturating_add(texels) > self.max_texels {
            self.free_unused(backend);
        }
        let handle = match backend.upload_texture(&data) {
            Ok(h) => h,
            Err(StageError::CapacityExceeded(_)) => {
                self.free_unused(backend);
                backend.upload_texture(&data)?
            }
            Err(e) => return Err(e),
        };
        if self.stats.used_texels.saturating_add(texels) > self.max_texels {
            self.stats.over_budget_uploads = self.stats.over_budget_uploads.saturating_add(1);
            tracing::warn!(
                texels,
                used_texels = self.stats.used_texels,
                max_texels = self.max_texels,
                "texture memory over budget"
            );
        }

        self.stats.used_texels = self.stats.used_texels.saturating_add(texels);
        self.stats.uploads = self.stats.uploads.saturating_add(1);
        if let Some(res) = self.sources.get_mut(source) {
            res.gpu = Some(handle);
            res.charged_texels = texels;
        }
        Ok(Some(handle))
    }

    /// Evict every resource with no consumers that is neither permanent nor a render result.
    ///
    /// Returns the texels reclaimed. Evicted resources reload when demanded again.
    pub fn free_unused<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> u64 {
        let mut reclaimed = 0u64;
        let mut count = 0u64;
        for (_, res) in self.sources.iter_mut().filter(|(_, r)| r.is_evictable()) {
            if let Some(h) = res.gpu.take() {
                backend.free_texture(h);
            }
            reclaimed = reclaimed.saturating_add(res.charged_texels);
            res.charged_texels = 0;
            res.data = None;
            res.state = LoadState::Idle;
            count += 1;
        }
        self.stats.used_texels = self.stats.used_texels.saturating_sub(reclaimed);
        self.stats.evicted_resources = self.stats.evicted_resources.saturating_add(count);
        self.stats.evicted_texels = self.stats.evicted_texels.saturating_add(reclaimed);
        if count > 0 {
            tracing::debug!(
                resources = count,
                texels = reclaimed,
                used_texels = self.stats.used_texels,
                "freed unused textures"
            );
        }
        reclaimed
    }

    /// Handle and texture coordinates for drawing `texture`, if uploaded.
    pub(crate) fn drawable(&self, texture: TextureId) -> Option<Drawable> {
        let t = self.textures.get(texture)?;
        let res = self.sources.get(t.source)?;
        let handle = res.gpu?;
        let (w, h) = res.size?;
        let (coords, _) = t.coords_and_size(w, h);
        Some(Drawable { handle, coords })
    }

    /// Natural size of `texture`: its region, or the source dimensions once known.
    pub fn natural_size(&self, texture: TextureId) -> Option<(f64, f64)> {
        let t = self.textures.get(texture)?;
        let (w, h) = self.sources.get(t.source)?.size?;
        Some(t.coords_and_size(w, h).1)
    }

    pub fn is_ready(&self, texture: TextureId) -> bool {
        self.drawable(texture).is_some()
    }

    /// Active nodes currently demanding `texture`.
    pub(crate) fn consumer_nodes(&self, texture: TextureId) -> Vec<NodeId> {
        self.textures
            .get(texture)
            .map(|t| t.nodes.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn textures_of(&self, source: SourceId) -> Vec<TextureId> {
        self.sources
            .get(source)
            .map(|r| r.textures.clone())
            .unwrap_or_default()
    }

    /// Free every uploaded texture this manager owns.
    pub fn clear<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for (_, res) in self.sources.iter_mut() {
            if res.render_result.is_some() {
                res.gpu = None;
                continue;
            }
            if let Some(h) = res.gpu.take() {
                backend.free_texture(h);
            }
            res.charged_texels = 0;
        }
        self.stats.used_texels = 0;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/texture/manager.rs"]
mod tests;
