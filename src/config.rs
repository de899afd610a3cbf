use crate::foundation::error::{StageError, StageResult};

/// Options controlling a [`crate::Stage`].
///
/// Every field has a default, so a partial JSON object is a valid configuration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StageOpts {
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8 screen clear colour. `None` clears to transparent black.
    pub clear_rgba: Option<[u8; 4]>,
    /// Texel budget for uploaded textures before unused ones are swept.
    pub texture_memory_texels: u64,
    /// Texel budget for pooled render targets.
    pub render_target_memory_texels: u64,
    /// Frames an idle pooled render target survives before it is destroyed.
    pub render_target_idle_frames: u64,
    /// Maximum idle targets retained per `(width, height)` bucket.
    pub max_targets_per_bucket: usize,
    /// Default bounds margin `[left, top, right, bottom]` in pixels.
    pub bounds_margin: [f64; 4],
    /// Maximum quads batched per frame.
    pub quad_buffer_capacity: usize,
}

impl Default for StageOpts {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            clear_rgba: None,
            texture_memory_texels: 18_000_000,
            render_target_memory_texels: 12_000_000,
            render_target_idle_frames: 60,
            max_targets_per_bucket: 8,
            bounds_margin: [100.0; 4],
            quad_buffer_capacity: 25_000,
        }
    }
}

impl StageOpts {
    pub fn validate(&self) -> StageResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StageError::validation("viewport width/height must be > 0"));
        }
        if self.quad_buffer_capacity == 0 {
            return Err(StageError::validation("quad_buffer_capacity must be > 0"));
        }
        if self.bounds_margin.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(StageError::validation(
                "bounds_margin entries must be finite and >= 0",
            ));
        }
        Ok(())
    }

    /// Parse options from a JSON document and validate them.
    pub fn from_json_str(s: &str) -> StageResult<Self> {
        let opts: Self = serde_json::from_str(s)
            .map_err(|e| StageError::validation(format!("invalid stage options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }
}
