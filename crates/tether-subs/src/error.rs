use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by lifecycle operations.
///
/// Channels the resolver cannot find are not errors here: they are handled by
/// cascading deletes or logged and skipped.
#[derive(Debug, Error)]
pub enum Error {
    /// The store rejected or failed a primitive. Not retried.
    #[error(transparent)]
    Store(#[from] anyhow::Error),

    #[error("storage worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
