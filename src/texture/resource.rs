use crate::foundation::core::Rect;
use crate::foundation::error::LoadError;
use crate::foundation::ids::{GpuHandle, NodeId, SourceId, TextureId};
use crate::texture::source::{CancelFn, SourceLoader, TextureSourceData};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Instant;

/// Load lifecycle of a [`TextureResource`].
pub enum LoadState {
    Idle,
    Loading {
        since: Instant,
        generation: u64,
        cancel: Option<CancelFn>,
    },
    Loaded,
    Failed(LoadError),
}

impl std::fmt::Debug for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Idle => f.write_str("Idle"),
            LoadState::Loading {
                since, generation, ..
            } => f
                .debug_struct("Loading")
                .field("since", since)
                .field("generation", generation)
                .finish_non_exhaustive(),
            LoadState::Loaded => f.write_str("Loaded"),
            LoadState::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

/// Unique image in the manager's table, backing any number of [`Texture`] handles.
pub struct TextureResource {
    pub(crate) key: Option<String>,
    pub(crate) loader: Option<Rc<dyn SourceLoader>>,
    /// Texture handles with at least one active node.
    pub(crate) consumers: HashSet<TextureId>,
    pub(crate) textures: Vec<TextureId>,
    pub(crate) permanent: bool,
    /// Node whose texturizer output this resource exposes.
    pub(crate) render_result: Option<NodeId>,
    pub(crate) state: LoadState,
    pub(crate) data: Option<TextureSourceData>,
    pub(crate) size: Option<(u32, u32)>,
    pub(crate) gpu: Option<GpuHandle>,
    /// Texels charged against the manager budget; zero for borrowed handles.
    pub(crate) charged_texels: u64,
}

impl TextureResource {
    pub(crate) fn new(key: Option<String>, loader: Option<Rc<dyn SourceLoader>>) -> Self {
        Self {
            key,
            loader,
            consumers: HashSet::new(),
            textures: Vec::new(),
            permanent: false,
            render_result: None,
            state: LoadState::Idle,
            data: None,
            size: None,
            gpu: None,
            charged_texels: 0,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    pub fn is_render_result(&self) -> bool {
        self.render_result.is_some()
    }

    pub fn is_uploaded(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn loading_since(&self) -> Option<Instant> {
        match self.state {
            LoadState::Loading { since, .. } => Some(since),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match &self.state {
            LoadState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Evictable: no consumers, not permanent, not a render result, and holding memory.
    pub fn is_evictable(&self) -> bool {
        self.consumers.is_empty()
            && !self.permanent
            && self.render_result.is_none()
            && (self.gpu.is_some() || self.data.is_some())
    }
}

/// Consumer handle on a resource, optionally cropping it.
pub struct Texture {
    pub(crate) source: SourceId,
    pub(crate) region: Option<Rect>,
    /// Active nodes demanding this texture.
    pub(crate) nodes: HashSet<NodeId>,
}

impl Texture {
    pub(crate) fn new(source: SourceId) -> Self {
        Self {
            source,
            region: None,
            nodes: HashSet::new(),
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn region(&self) -> Option<Rect> {
        self.region
    }

    /// Texture coordinates `[u0, v0, u1, v1]` and natural size for a `w x h` source.
    pub(crate) fn coords_and_size(&self, w: u32, h: u32) -> ([f32; 4], (f64, f64)) {
        let (fw, fh) = (f64::from(w.max(1)), f64::from(h.max(1)));
        match self.region {
            Some(r) => (
                [
                    (r.x0 / fw) as f32,
                    (r.y0 / fh) as f32,
                    (r.x1 / fw) as f32,
                    (r.y1 / fh) as f32,
                ],
                (r.width(), r.height()),
            ),
            None => ([0.0, 0.0, 1.0, 1.0], (f64::from(w), f64::from(h))),
        }
    }
}
