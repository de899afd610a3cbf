//! Stagelight is a retained-mode 2D scene-graph renderer.
//!
//! Applications build a tree of positioned, textured nodes and call [`Stage::frame`] once per
//! frame. The stage:
//!
//! - propagates dirty transforms, alpha and bounds through changed branches only
//! - culls nodes outside the viewport (with a pre-activation margin)
//! - orders z-indexed nodes within their z-context
//! - renders texturized subtrees into pooled offscreen targets, caching them while static
//! - batches quads and replays them against a [`RenderBackend`] with minimal state changes
//! - loads, uploads and evicts textures on demand under a texel budget
#![forbid(unsafe_code)]

mod foundation;

/// Property transitions driven once per frame.
pub mod anim;
/// Stage configuration.
pub mod config;
/// Backends, batching and offscreen targets.
pub mod render;
/// Scene tree and the update pass.
pub mod scene;
/// Per-frame orchestration.
pub mod stage;
/// Texture resources, loaders and the texel budget.
pub mod texture;

pub use crate::foundation::core::{Affine, Argb, Point, Rect, Vec2, WHITE};
pub use crate::foundation::error::{LoadError, StageError, StageResult};
pub use crate::foundation::ids::{GpuHandle, NodeId, ShaderId, SourceId, TextureId};

pub use crate::anim::{Ease, Timing, TransitionSet, TransitionSettings};
pub use crate::config::StageOpts;
pub use crate::render::backend::{
    BackendKind, BackendSettings, FrameRGBA, RenderBackend, ScissorRect, create_backend,
};
pub use crate::render::cpu::CpuBackend;
pub use crate::render::executor::{ExecutorStats, FrameExecutor};
pub use crate::render::quads::{BatchOperation, QuadBatch, QuadParams, QuadRecord};
pub use crate::render::recording::{BackendCommand, RecordingBackend};
pub use crate::render::target_pool::{RenderTarget, RenderTargetPoolStats};
pub use crate::scene::bounds::OutOfBounds;
pub use crate::scene::context::AffineContext;
pub use crate::scene::tree::{NodeMut, NodeProperty, NodeRef, SceneTree};
pub use crate::stage::{FrameStats, Stage, StageEvent};
pub use crate::texture::manager::{TextureManager, TextureStats};
pub use crate::texture::source::{
    CancelFn, LoadResult, LoadTicket, SourceLoader, StaticLoader, TextureSourceData,
};
