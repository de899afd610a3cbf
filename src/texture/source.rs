use crate::foundation::error::{LoadError, StageError, StageResult};
use crate::foundation::ids::SourceId;
use std::sync::{Arc, mpsc};

/// Decoded pixels ready for upload: premultiplied RGBA8, row-major, tightly packed.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureSourceData {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<Vec<u8>>,
}

impl TextureSourceData {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> StageResult<Self> {
        if width == 0 || height == 0 {
            return Err(StageError::validation("texture dimensions must be > 0"));
        }
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if pixels.len() != expected {
            return Err(StageError::validation(format!(
                "texture byte len mismatch: expected {expected}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels: Arc::new(pixels),
        })
    }

    /// A `width x height` block of one premultiplied colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> StageResult<Self> {
        let n = (width as usize).saturating_mul(height as usize);
        Self::new(width, height, rgba.repeat(n))
    }

    pub fn texels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Premultiplied RGBA8 at `(x, y)`, if in range.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = self.pixels.get(i..i + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}

pub type LoadResult = Result<TextureSourceData, LoadError>;

/// Invoked when every consumer leaves before a load completes.
pub type CancelFn = Box<dyn FnOnce()>;

pub(crate) struct LoadMessage {
    pub(crate) source: SourceId,
    pub(crate) generation: u64,
    pub(crate) result: LoadResult,
}

/// One-shot handle a loader resolves when its load finishes.
///
/// Tickets are `Send`: a loader may resolve from a worker thread. Results are merged at the
/// start of the next frame.
pub struct LoadTicket {
    source: SourceId,
    generation: u64,
    tx: mpsc::Sender<LoadMessage>,
}

impl LoadTicket {
    pub(crate) fn new(source: SourceId, generation: u64, tx: mpsc::Sender<LoadMessage>) -> Self {
        Self {
            source,
            generation,
            tx,
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn resolve(self, result: LoadResult) {
        // The stage may already be gone; nothing is waiting for the result then.
        let _ = self.tx.send(LoadMessage {
            source: self.source,
            generation: self.generation,
            result,
        });
    }
}

/// Produces pixels for a texture resource.
pub trait SourceLoader {
    /// Start loading; resolve `ticket` now or later. The returned callback cancels the load.
    fn load(&self, ticket: LoadTicket) -> Option<CancelFn>;
}

impl<F> SourceLoader for F
where
    F: Fn(LoadTicket) -> Option<CancelFn>,
{
    fn load(&self, ticket: LoadTicket) -> Option<CancelFn> {
        self(ticket)
    }
}

/// Loader that resolves immediately with fixed pixels.
pub struct StaticLoader(pub TextureSourceData);

impl SourceLoader for StaticLoader {
    fn load(&self, ticket: LoadTicket) -> Option<CancelFn> {
        ticket.resolve(Ok(self.0.clone()));
        None
    }
}
