use crate::foundation::core::Rect;
use crate::foundation::error::StageResult;
use crate::foundation::ids::{GpuHandle, NodeId, ShaderId};
use crate::render::quads::QuadBatch;
use crate::texture::source::TextureSourceData;
use std::ops::Range;

/// A rendered frame as RGBA8 pixels.
///
/// Frames are premultiplied alpha; the flag keeps that explicit at API boundaries.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

/// Integer scissor rectangle in surface pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    /// Round `r` to whole pixels.
    pub fn from_rect(r: Rect) -> Self {
        let x0 = r.x0.round();
        let y0 = r.y0.round();
        let x1 = r.x1.round().max(x0);
        let y1 = r.y1.round().max(y0);
        Self {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && (x - self.x) < self.width as i32
            && (y - self.y) < self.height as i32
    }
}

/// Drawing primitives the frame executor and resource managers call into.
///
/// Bind calls are state changes: they stay in effect until the next call of the same kind.
/// Draw calls read the currently bound target, scissor, shader and texture.
pub trait RenderBackend {
    fn create_render_target(&mut self, width: u32, height: u32) -> StageResult<GpuHandle>;

    fn free_render_target(&mut self, target: GpuHandle);

    /// Upload premultiplied pixels. `CapacityExceeded` asks the caller to evict and retry.
    fn upload_texture(&mut self, data: &TextureSourceData) -> StageResult<GpuHandle>;

    fn free_texture(&mut self, texture: GpuHandle);

    fn begin_frame(&mut self) -> StageResult<()> {
        Ok(())
    }

    fn end_frame(&mut self) -> StageResult<()> {
        Ok(())
    }

    /// Bind an offscreen target, or the screen for `None`.
    fn bind_render_target(&mut self, target: Option<GpuHandle>) -> StageResult<()>;

    /// Clear the bound target to a premultiplied RGBA8 colour, ignoring the scissor.
    fn clear(&mut self, rgba: [u8; 4]) -> StageResult<()>;

    fn set_scissor(&mut self, scissor: Option<ScissorRect>) -> StageResult<()>;

    fn bind_shader(&mut self, shader: ShaderId, owner: Option<NodeId>) -> StageResult<()>;

    fn bind_texture(&mut self, texture: GpuHandle) -> StageResult<()>;

    /// Draw `quads` from `batch` with the bound state.
    fn draw_quads(&mut self, batch: &QuadBatch, quads: Range<usize>) -> StageResult<()>;

    /// Read back the screen, if the backend keeps it in memory.
    fn readback_rgba8(&mut self) -> StageResult<Option<FrameRGBA>> {
        Ok(None)
    }
}

impl<B: RenderBackend + ?Sized> RenderBackend for Box<B> {
    fn create_render_target(&mut self, width: u32, height: u32) -> StageResult<GpuHandle> {
        (**self).create_render_target(width, height)
    }

    fn free_render_target(&mut self, target: GpuHandle) {
        (**self).free_render_target(target)
    }

    fn upload_texture(&mut self, data: &TextureSourceData) -> StageResult<GpuHandle> {
        (**self).upload_texture(data)
    }

    fn free_texture(&mut self, texture: GpuHandle) {
        (**self).free_texture(texture)
    }

    fn begin_frame(&mut self) -> StageResult<()> {
        (**self).begin_frame()
    }

    fn end_frame(&mut self) -> StageResult<()> {
        (**self).end_frame()
    }

    fn bind_render_target(&mut self, target: Option<GpuHandle>) -> StageResult<()> {
        (**self).bind_render_target(target)
    }

    fn clear(&mut self, rgba: [u8; 4]) -> StageResult<()> {
        (**self).clear(rgba)
    }

    fn set_scissor(&mut self, scissor: Option<ScissorRect>) -> StageResult<()> {
        (**self).set_scissor(scissor)
    }

    fn bind_shader(&mut self, shader: ShaderId, owner: Option<NodeId>) -> StageResult<()> {
        (**self).bind_shader(shader, owner)
    }

    fn bind_texture(&mut self, texture: GpuHandle) -> StageResult<()> {
        (**self).bind_texture(texture)
    }

    fn draw_quads(&mut self, batch: &QuadBatch, quads: Range<usize>) -> StageResult<()> {
        (**self).draw_quads(batch, quads)
    }

    fn readback_rgba8(&mut self) -> StageResult<Option<FrameRGBA>> {
        (**self).readback_rgba8()
    }
}

/// Available backend kinds.
///
/// - `Recording` keeps a command log and no pixels; used headless and in tests.
/// - `Cpu` rasterizes with `vello_cpu`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Recording,
    Cpu,
}

/// Backend-agnostic settings.
#[derive(Clone, Debug)]
pub struct BackendSettings {
    pub width: u32,
    pub height: u32,
    /// Texel ceiling for uploaded textures; `None` is unbounded.
    pub texture_limit_texels: Option<u64>,
}

/// Create a rendering backend implementation.
pub fn create_backend(
    kind: BackendKind,
    settings: &BackendSettings,
) -> StageResult<Box<dyn RenderBackend>> {
    match kind {
        BackendKind::Recording => Ok(Box::new(
            crate::render::recording::RecordingBackend::new()
                .with_texture_limit(settings.texture_limit_texels),
        )),
        BackendKind::Cpu => Ok(Box::new(crate::render::cpu::CpuBackend::new(
            settings.width,
            settings.height,
        )?)),
    }
}
