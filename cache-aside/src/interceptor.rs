//! Cache-aside interception for async producer operations
//!
//! This module provides the main [`CacheAside`] type. It wraps calls to
//! data-producing operations and routes them through the store:
//! 1. Check the store health gate (closed store fails the call)
//! 2. Check whether an entry exists for the derived key
//! 3. On a hit, decode and return the stored value(s) without invoking
//!    the producer
//! 4. On a miss, invoke the producer exactly once, return its output
//!    unchanged, and persist it under the key
//!
//! The store is a hard dependency here: when it is unreachable the call
//! fails with [`CacheError::StoreUnavailable`] rather than silently falling
//! through to the producer, so an outage cannot invisibly change the latency
//! profile of wrapped operations. Hosts that prefer graceful degradation
//! handle that error at their own layer.
//!
//! Concurrent calls for the same key are not coordinated: two simultaneous
//! misses both invoke the producer and both write, last write wins.

use std::future::Future;
use std::sync::Arc;

use async_stream::stream;
use futures::pin_mut;
use futures::{Stream, StreamExt};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use common_redis::{Client, RedisClient};

use crate::config::{CacheConfig, Operation, ResultShape};
use crate::error::CacheError;
use crate::gate::ConnectionGate;
use crate::key::CacheKey;
use crate::metrics::{
    CACHE_HIT_COUNTER, CACHE_MISS_COUNTER, CACHE_WRITE_FAILURE_COUNTER, STORE_UNAVAILABLE_COUNTER,
};

/// Wraps async producer operations with cache-aside reads and writes.
///
/// Producers are deferred closures: nothing runs until the store has been
/// consulted, and on a hit nothing runs at all. Cached entries are the
/// serde_json encoding of the produced value (or of the full produced
/// sequence) and live under keys derived from
/// `{namespace}:{operation}:{argument fingerprint}`.
pub struct CacheAside {
    store: Arc<dyn Client + Send + Sync>,
    gate: ConnectionGate,
    namespace: String,
}

impl CacheAside {
    pub fn new(store: Arc<dyn Client + Send + Sync>, namespace: impl Into<String>) -> Self {
        let gate = ConnectionGate::new(Arc::clone(&store));
        Self {
            store,
            gate,
            namespace: namespace.into(),
        }
    }

    /// Connects a production store client and wires the layer from
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

    /// Serve a single-valued operation through the cache.
    ///
    /// On a hit the stored entry is decoded and returned; the producer is
    /// dropped uninvoked. On a miss the producer runs exactly once, its value
    /// is written to the store and then returned as produced (no decode
    /// round-trip). A write the store did not apply fails the whole call
    /// with [`CacheError::StoreWriteFailed`].
    ///
    /// Producer errors propagate unchanged; cache failures reach the caller
    /// through `E: From<CacheError>`.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        operation: &Operation,
        args: &[Value],
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + for<'de> Deserialize<'de> + Send + Sync,
        E: From<CacheError> + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if operation.shape() != ResultShape::Single {
            return Err(E::from(CacheError::UnsupportedResultShape(
                operation.shape().to_string(),
            )));
        }

        let key = CacheKey::derive(&self.namespace, operation.name(), args);

        if !self.gate.is_open().await {
            counter!(STORE_UNAVAILABLE_COUNTER, "operation" => operation.name().to_owned())
                .increment(1);
            return Err(E::from(CacheError::StoreUnavailable));
        }

        let cached = self
            .store
            .exists(key.to_string())
            .await
            .map_err(CacheError::from)?;

        if cached {
            let raw = self
                .store
                .get(key.to_string())
                .await
                .map_err(CacheError::from)?;
            let value = serde_json::from_str(&raw).map_err(CacheError::from)?;
            debug!(key = %key, operation = operation.name(), "cache hit");
            counter!(CACHE_HIT_COUNTER, "operation" => operation.name().to_owned()).increment(1);
            return Ok(value);
        }

        debug!(key = %key, operation = operation.name(), "cache miss");
        counter!(CACHE_MISS_COUNTER, "operation" => operation.name().to_owned()).increment(1);

        let value = producer().await?;

        let encoded = serde_json::to_string(&value).map_err(CacheError::from)?;
        let written = self
            .store
            .set(key.to_string(), encoded)
            .await
            .map_err(CacheError::from)?;
        if !written {
            warn!(key = %key, operation = operation.name(), "cached entry was not saved");
            counter!(CACHE_WRITE_FAILURE_COUNTER, "operation" => operation.name().to_owned())
                .increment(1);
            return Err(E::from(CacheError::StoreWriteFailed(key.to_string())));
        }

        Ok(value)
    }

    /// Serve a sequence-valued operation through the cache.
    ///
    /// On a hit the stored sequence is decoded and its elements yielded
    /// lazily in their original order. On a miss each element the producer
    /// emits is forwarded downstream immediately and buffered; once the
    /// producer completes, the full sequence is written as one entry. A
    /// producer error is forwarded as-is, terminates the stream and leaves
    /// nothing cached.
    ///
    /// A write failure after the final element has already been delivered
    /// cannot retract anything, so it is reported as one trailing `Err` item.
    pub fn get_or_stream<T, E, F, S>(
        &self,
        operation: &Operation,
        args: &[Value],
        producer: F,
    ) -> impl Stream<Item = Result<T, E>>
    where
        T: Serialize + for<'de> Deserialize<'de> + Clone,
        E: From<CacheError>,
        F: FnOnce() -> S,
        S: Stream<Item = Result<T, E>>,
    {
        let shape = operation.shape();
        let name = operation.name().to_owned();
        let key = CacheKey::derive(&self.namespace, operation.name(), args);
        let store = Arc::clone(&self.store);
        let gate = self.gate.clone();

        stream! {
            if shape != ResultShape::Sequence {
                yield Err(E::from(CacheError::UnsupportedResultShape(shape.to_string())));
                return;
            }

            if !gate.is_open().await {
                counter!(STORE_UNAVAILABLE_COUNTER, "operation" => name.clone()).increment(1);
                yield Err(E::from(CacheError::StoreUnavailable));
                return;
            }

            let cached = match store.exists(key.to_string()).await {
                Ok(found) => found,
                Err(err) => {
                    yield Err(E::from(CacheError::from(err)));
                    return;
                }
            };

            if cached {
                let raw = match store.get(key.to_string()).await {
                    Ok(raw) => raw,
                    Err(err) => {
                        yield Err(E::from(CacheError::from(err)));
                        return;
                    }
                };
                let items: Vec<T> = match serde_json::from_str(&raw) {
                    Ok(items) => items,
                    Err(err) => {
                        yield Err(E::from(CacheError::from(err)));
                        return;
                    }
                };
                debug!(key = %key, operation = %name, "cache hit");
                counter!(CACHE_HIT_COUNTER, "operation" => name.clone()).increment(1);
                for item in items {
                    yield Ok(item);
                }
                return;
            }

            debug!(key = %key, operation = %name, "cache miss");
            counter!(CACHE_MISS_COUNTER, "operation" => name.clone()).increment(1);

            let upstream = producer();
            pin_mut!(upstream);

            // Elements go downstream as they arrive; the entry is written once
            // the producer has run to completion.
            let mut buffered: Vec<T> = Vec::new();
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(item) => {
                        buffered.push(item.clone());
                        yield Ok(item);
                    }
                    Err(err) => {
                        // Partial sequences are never cached
                        yield Err(err);
                        return;
                    }
                }
            }

            let encoded = match serde_json::to_string(&buffered) {
                Ok(encoded) => encoded,
                Err(err) => {
                    yield Err(E::from(CacheError::from(err)));
                    return;
                }
            };
            match store.set(key.to_string(), encoded).await {
                Ok(true) => {}
                Ok(false) => {
                    error!(key = %key, operation = %name, "cached entry was not saved");
                    counter!(CACHE_WRITE_FAILURE_COUNTER, "operation" => name.clone())
                        .increment(1);
                    yield Err(E::from(CacheError::StoreWriteFailed(key.to_string())));
                }
                Err(err) => {
                    warn!(key = %key, operation = %name, "store write failed: {err}");
                    counter!(CACHE_WRITE_FAILURE_COUNTER, "operation" => name.clone())
                        .increment(1);
                    yield Err(E::from(CacheError::from(err)));
                }
            }
        }
    }
}
