use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced by the persistence layer.
///
/// Nothing in `db` retries or recovers; callers decide what the user sees.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database directory or file could not be created.
    #[error("storage unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    TaskJoin(String),

    /// A stored timestamp could not be parsed as ISO-8601.
    #[error("invalid stored timestamp: '{0}'")]
    InvalidTimestamp(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
