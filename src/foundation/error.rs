pub type StageResult<T> = Result<T, StageError>;

/// Failure reported by a texture loader.
///
/// Cloneable so a resource can cache it and re-surface it to consumers that re-activate later.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LoadError {
    message: String,
}

impl LoadError {
    /// Create a load error with a human readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The loader supplied message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("invalid tree operation: {0}")]
    InvalidTreeOperation(String),

    #[error("texture load error: {0}")]
    Load(#[from] LoadError),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    pub fn invalid_tree(msg: impl Into<String>) -> Self {
        Self::InvalidTreeOperation(msg.into())
    }

    pub fn capacity(msg: impl Into<String>) -> Self {
        Self::CapacityExceeded(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
