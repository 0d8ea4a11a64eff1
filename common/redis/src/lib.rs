use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// Re-export ErrorKind so consumers can construct CustomRedisError in tests
pub use redis::ErrorKind as RedisErrorKind;

#[derive(Error, Debug, Clone)]
pub enum CustomRedisError {
    #[error("Not found in redis")]
    NotFound,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout error")]
    Timeout,
    #[error(transparent)]
    Redis(#[from] Arc<redis::RedisError>),
}

impl From<redis::RedisError> for CustomRedisError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CustomRedisError::Timeout
        } else {
            CustomRedisError::Redis(Arc::new(err))
        }
    }
}

impl From<std::string::FromUtf8Error> for CustomRedisError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        CustomRedisError::ParseError(err.to_string())
    }
}

impl CustomRedisError {
    /// Create a Redis error from an ErrorKind (primarily for testing)
    pub fn from_redis_kind(kind: redis::ErrorKind, description: &'static str) -> Self {
        CustomRedisError::Redis(Arc::new(redis::RedisError::from((kind, description))))
    }
}

/// The key-value commands the caching layer relies on.
///
/// `set` and `del` report whether the store actually applied the command, so
/// callers can distinguish an acknowledged no-op from a transport failure.
#[async_trait]
pub trait Client {
    /// Point-in-time probe of the underlying connection. Any state that
    /// cannot be confirmed open reports `false`.
    async fn is_connection_open(&self) -> bool;

    async fn exists(&self, k: String) -> Result<bool, CustomRedisError>;

    /// Returns `NotFound` for absent keys.
    async fn get(&self, k: String) -> Result<String, CustomRedisError>;

    /// Returns whether the store acknowledged the write as applied.
    async fn set(&self, k: String, v: String) -> Result<bool, CustomRedisError>;

    /// Returns whether a value was actually removed.
    async fn del(&self, k: String) -> Result<bool, CustomRedisError>;
}

// Module declarations
mod client;
mod mock;

// Re-export public APIs
pub use client::RedisClient;
pub use mock::{MockRedisCall, MockRedisClient, MockRedisValue};
