slotmap::new_key_type! {
    /// Key of a node in the scene arena.
    pub struct NodeId;
    /// Key of a consumer texture handle.
    pub struct TextureId;
    /// Key of a deduplicated texture resource.
    pub struct SourceId;
}

/// Backend-owned handle to an uploaded texture or a render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuHandle(pub u64);

/// Identity of a shader program known to the backend.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ShaderId(pub u32);

impl ShaderId {
    /// The pass-through textured-quad shader.
    pub const DEFAULT: ShaderId = ShaderId(0);

    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

impl Default for ShaderId {
    fn default() -> Self {
        Self::DEFAULT
    }
}
