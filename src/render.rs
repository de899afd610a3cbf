pub mod backend;
pub mod cpu;
pub mod executor;
pub(crate) mod pass;
pub mod quads;
pub mod recording;
pub mod target_pool;
pub(crate) mod texturizer;
