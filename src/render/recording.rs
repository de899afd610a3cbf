use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::{GpuHandle, NodeId, ShaderId};
use crate::render::backend::{RenderBackend, ScissorRect};
use crate::render::quads::QuadBatch;
use crate::texture::source::TextureSourceData;
use std::collections::HashMap;
use std::ops::Range;

/// One backend call as seen by [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCommand {
    CreateTarget {
        handle: GpuHandle,
        width: u32,
        height: u32,
    },
    FreeTarget(GpuHandle),
    Upload {
        handle: GpuHandle,
        width: u32,
        height: u32,
    },
    FreeTexture(GpuHandle),
    BeginFrame,
    EndFrame,
    BindTarget(Option<GpuHandle>),
    Clear([u8; 4]),
    Scissor(Option<ScissorRect>),
    BindShader {
        shader: ShaderId,
        owner: Option<NodeId>,
    },
    BindTexture(GpuHandle),
    Draw {
        quads: Range<usize>,
    },
}

/// Backend that keeps a command log and no pixels.
///
/// Handles are allocated from one counter so targets and textures never collide.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<BackendCommand>,
    next_handle: u64,
    targets: HashMap<GpuHandle, (u32, u32)>,
    textures: HashMap<GpuHandle, (u32, u32)>,
    texture_limit: Option<u64>,
    texture_texels: u64,
    target_limit: Option<usize>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail uploads with `CapacityExceeded` once `limit` texels are live.
    pub fn with_texture_limit(mut self, limit: Option<u64>) -> Self {
        self.texture_limit = limit;
        self
    }

    /// Fail target creation with `CapacityExceeded` once `limit` targets are live.
    pub fn with_target_limit(mut self, limit: Option<usize>) -> Self {
        self.target_limit = limit;
        self
    }

    pub fn commands(&self) -> &[BackendCommand] {
        &self.commands
    }

    /// Return and clear the log.
    pub fn take_commands(&mut self) -> Vec<BackendCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_texels(&self) -> u64 {
        self.texture_texels
    }

    pub fn is_live(&self, handle: GpuHandle) -> bool {
        self.targets.contains_key(&handle) || self.textures.contains_key(&handle)
    }

    /// Number of `Draw` commands in the log.
    pub fn draw_calls(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, BackendCommand::Draw { .. }))
            .count()
    }

    fn alloc(&mut self) -> GpuHandle {
        self.next_handle += 1;
        GpuHandle(self.next_handle)
    }
}

impl RenderBackend for RecordingBackend {
    fn create_render_target(&mut self, width: u32, height: u32) -> StageResult<GpuHandle> {
        if width == 0 || height == 0 {
            return Err(StageError::validation("render target dimensions must be > 0"));
        }
        if self.target_limit.is_some_and(|limit| self.targets.len() >= limit) {
            return Err(StageError::capacity(format!(
                "render target {width}x{height} exceeds the live target limit"
            )));
        }
        let handle = self.alloc();
        self.targets.insert(handle, (width, height));
        self.commands.push(BackendCommand::CreateTarget {
            handle,
            width,
            height,
        });
        Ok(handle)
    }

    fn free_render_target(&mut self, target: GpuHandle) {
        if self.targets.remove(&target).is_some() {
            self.commands.push(BackendCommand::FreeTarget(target));
        }
    }

    fn upload_texture(&mut self, data: &TextureSourceData) -> StageResult<GpuHandle> {
        let texels = data.texels();
        if let Some(limit) = self.texture_limit
            && self.texture_texels.saturating_add(texels) > limit
        {
            return Err(StageError::capacity(format!(
                "texture upload of {texels} texels exceeds limit {limit}"
            )));
        }
        let handle = self.alloc();
        self.textures.insert(handle, (data.width, data.height));
        self.texture_texels = self.texture_texels.saturating_add(texels);
        self.commands.push(BackendCommand::Upload {
            handle,
            width: data.width,
            height: data.height,
        });
        Ok(handle)
    }

    fn free_texture(&mut self, texture: GpuHandle) {
        if let Some((w, h)) = self.textures.remove(&texture) {
            self.texture_texels = self
                .texture_texels
                .saturating_sub(u64::from(w) * u64::from(h));
            self.commands.push(BackendCommand::FreeTexture(texture));
        }
    }

    fn begin_frame(&mut self) -> StageResult<()> {
        self.commands.push(BackendCommand::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> StageResult<()> {
        self.commands.push(BackendCommand::EndFrame);
        Ok(())
    }

    fn bind_render_target(&mut self, target: Option<GpuHandle>) -> StageResult<()> {
        if let Some(t) = target
            && !self.targets.contains_key(&t)
        {
            return Err(StageError::backend(format!("unknown render target {t:?}")));
        }
        self.commands.push(BackendCommand::BindTarget(target));
        Ok(())
    }

    fn clear(&mut self, rgba: [u8; 4]) -> StageResult<()> {
        self.commands.push(BackendCommand::Clear(rgba));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Option<ScissorRect>) -> StageResult<()> {
        self.commands.push(BackendCommand::Scissor(scissor));
        Ok(())
    }

    fn bind_shader(&mut self, shader: ShaderId, owner: Option<NodeId>) -> StageResult<()> {
        self.commands.push(BackendCommand::BindShader { shader, owner });
        Ok(())
    }

    fn bind_texture(&mut self, texture: GpuHandle) -> StageResult<()> {
        if !self.is_live(texture) {
            return Err(StageError::backend(format!("unknown texture {texture:?}")));
        }
        self.commands.push(BackendCommand::BindTexture(texture));
        Ok(())
    }

    fn draw_quads(&mut self, batch: &QuadBatch, quads: Range<usize>) -> StageResult<()> {
        if quads.end > batch.quad_count() {
            return Err(StageError::backend("draw range past end of quad batch"));
        }
        self.commands.push(BackendCommand::Draw { quads });
        Ok(())
    }
}
