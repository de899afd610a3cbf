pub mod bounds;
pub mod context;
pub(crate) mod node;
pub mod tree;
pub(crate) mod update;
pub(crate) mod zorder;
