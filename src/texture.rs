pub mod manager;
pub mod resource;
pub mod source;
