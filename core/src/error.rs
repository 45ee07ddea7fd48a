use thiserror::Error;

/// Failures surfaced by store, import and generation operations.
///
/// None of these are fatal: every variant leaves the previously persisted
/// state intact.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad or missing required input.
    #[error("{0}")]
    Validation(String),

    /// The target record no longer exists.
    #[error("Recipe '{0}' not found")]
    NotFound(String),

    /// An import document could not be recognized as a recipe collection.
    #[error("Invalid import data: {0}")]
    ImportFormat(String),

    /// The generation call failed or returned unusable content.
    #[error("{0}")]
    Generation(String),

    /// The persistence backend failed to read or write.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl StoreError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn import_format(msg: impl Into<String>) -> Self {
        Self::ImportFormat(msg.into())
    }

    pub(crate) fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
