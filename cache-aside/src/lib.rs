//! Transparent cache-aside layer for async producer operations
//!
//! Wraps calls to data-producing operations and routes them through a remote
//! key-value store: results are keyed by
//! `{application}:{operation}:{argument fingerprint}`, misses invoke the
//! wrapped producer exactly once and persist its output, hits skip the
//! producer entirely, and previously stored entries can be evicted
//! explicitly. Operations producing a stream of values keep their streaming
//! contract on the miss path: elements are forwarded downstream as the
//! producer emits them, and the store write happens once, after completion.
//!
//! Two policy decisions worth knowing up front:
//! - The store is a hard dependency. When its connection is not open, wrapped
//!   calls and evictions fail with [`CacheError::StoreUnavailable`] instead
//!   of falling through to the producer. Hosts that want to degrade
//!   gracefully catch that error themselves.
//! - Concurrent misses for the same key are not coordinated. Each invokes
//!   the producer and writes the store; the last write wins. Entries never
//!   change shape, so the race costs duplicate work, not correctness.
//!
//! # Example
//! ```rust,ignore
//! use cache_aside::{CacheAside, Invalidator, Operation};
//! use serde_json::json;
//!
//! let cache = CacheAside::new(store.clone(), "billing");
//! let op = Operation::single("find_invoice");
//!
//! let invoice: Invoice = cache
//!     .get_or_load(&op, &[json!(42)], || async { db.find_invoice(42).await })
//!     .await?;
//!
//! // After a mutation, drop the stale entry
//! let invalidator = Invalidator::new(store, "billing");
//! invalidator.evict("find_invoice", &[json!(42)]).await?;
//! ```

mod config;
mod error;
mod evict;
mod gate;
mod interceptor;
mod key;
mod metrics;

pub use config::{CacheConfig, Operation, ResultShape};
pub use error::CacheError;
pub use evict::Invalidator;
pub use gate::ConnectionGate;
pub use interceptor::CacheAside;
pub use key::CacheKey;
