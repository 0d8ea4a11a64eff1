use common_redis::CustomRedisError;
use thiserror::Error;

/// Terminal failures of the caching layer.
///
/// Every variant aborts the call it occurred in; nothing is swallowed or
/// retried. Host error types absorb these via `From` so producer errors and
/// cache errors travel the same channel.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache store is not available")]
    StoreUnavailable,

    #[error("cached entry for {0} was not saved")]
    StoreWriteFailed(String),

    #[error("cached entry for {0} was not deleted")]
    StoreDeleteFailed(String),

    #[error("no cached entry for {0}")]
    KeyNotFound(String),

    #[error("unsupported result shape: {0}")]
    UnsupportedResultShape(String),

    #[error("cached entry could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level store failure, as opposed to a command the store
    /// acknowledged but did not apply.
    #[error(transparent)]
    Store(#[from] CustomRedisError),
}
