use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tracing::debug;

use common_redis::{Client, RedisClient};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::gate::ConnectionGate;
use crate::key::CacheKey;
use crate::metrics::{CACHE_EVICTION_COUNTER, STORE_UNAVAILABLE_COUNTER};

/// Removes previously stored entries.
///
/// Eviction is pure cache maintenance: the wrapped operation is never
/// invoked from here, whatever its own outcome was. Callers that want
/// "mutate, then invalidate" ordering sequence the two themselves.
pub struct Invalidator {
    store: Arc<dyn Client + Send + Sync>,
    gate: ConnectionGate,
    namespace: String,
}

impl Invalidator {
    pub fn new(store: Arc<dyn Client + Send + Sync>, namespace: impl Into<String>) -> Self {
        let gate = ConnectionGate::new(Arc::clone(&store));
        Self {
            store,
            gate,
            namespace: namespace.into(),
        }
    }

    /// Connects a production store client and wires the invalidator from
    /// configuration.
    pub async fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = RedisClient::with_config(
            config.redis_url.clone(),
            config.response_timeout(),
            config.connection_timeout(),
        )
        .await?;
        Ok(Self::new(
            Arc::new(client),
            config.application_name.clone(),
        ))
    }

    /// Removes the entry stored for an operation/argument pair.
    ///
    /// Fails with [`CacheError::KeyNotFound`] when nothing was stored under
    /// the derived key, and with [`CacheError::StoreDeleteFailed`] when the
    /// store acknowledged the delete without removing anything.
    pub async fn evict(&self, operation: &str, args: &[Value]) -> Result<(), CacheError> {
        let key = CacheKey::derive(&self.namespace, operation, args);

        if !self.gate.is_open().await {
            counter!(STORE_UNAVAILABLE_COUNTER, "operation" => operation.to_owned()).increment(1);
            return Err(CacheError::StoreUnavailable);
        }

        if !self.store.exists(key.to_string()).await? {
            return Err(CacheError::KeyNotFound(key.to_string()));
        }

        let removed = self.store.del(key.to_string()).await?;
        if !removed {
            return Err(CacheError::StoreDeleteFailed(key.to_string()));
        }

        debug!(key = %key, operation, "cache entry evicted");
        counter!(CACHE_EVICTION_COUNTER, "operation" => operation.to_owned()).increment(1);
        Ok(())
    }
}
