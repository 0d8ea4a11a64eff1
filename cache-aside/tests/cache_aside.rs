use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{pin_mut, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use cache_aside::{CacheAside, CacheError, CacheKey, Invalidator, Operation};
use common_redis::{CustomRedisError, MockRedisClient, RedisErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Invoice {
    id: i32,
    total: i64,
}

/// The kind of error enum a host application wraps this layer with.
#[derive(Debug, Error)]
enum HostError {
    #[error("invoice backend failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

fn invoice(id: i32) -> Invoice {
    Invoice {
        id,
        total: i64::from(id) * 100,
    }
}

#[tokio::test]
async fn full_lifecycle_miss_then_hit_then_evict() {
    let store = MockRedisClient::new();
    let cache = CacheAside::new(Arc::new(store.clone()), "billing");
    let invalidator = Invalidator::new(Arc::new(store.clone()), "billing");
    let op = Operation::single("find_invoice");
    let args = vec![json!(42)];

    let producer_runs = Arc::new(AtomicUsize::new(0));

    let load = |expected: Invoice| {
        let runs = Arc::clone(&producer_runs);
        move || async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok::<_, HostError>(expected)
        }
    };

    // Miss: the producer runs and the result is stored
    let first: Invoice = cache
        .get_or_load(&op, &args, load(invoice(42)))
        .await
        .unwrap();
    assert_eq!(first, invoice(42));
    assert_eq!(producer_runs.load(Ordering::SeqCst), 1);

    // Hit: the stored entry is served, the producer stays idle
    let second: Invoice = cache
        .get_or_load(&op, &args, load(invoice(42)))
        .await
        .unwrap();
    assert_eq!(second, invoice(42));
    assert_eq!(producer_runs.load(Ordering::SeqCst), 1);

    // Evict, then the next call misses again
    invalidator.evict("find_invoice", &args).await.unwrap();

    let third: Invoice = cache
        .get_or_load(&op, &args, load(invoice(42)))
        .await
        .unwrap();
    assert_eq!(third, invoice(42));
    assert_eq!(producer_runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn sequence_round_trips_in_order() {
    let store = MockRedisClient::new();
    let cache = CacheAside::new(Arc::new(store.clone()), "billing");
    let op = Operation::sequence("find_invoices");
    let args = vec![json!("acme")];

    let produced = vec![invoice(1), invoice(2), invoice(3)];
    let upstream = futures::stream::iter(
        produced
            .clone()
            .into_iter()
            .map(Ok::<_, HostError>)
            .collect::<Vec<_>>(),
    );

    // Miss: elements come through in producer order
    let miss = cache.get_or_stream(&op, &args, move || upstream);
    let streamed: Vec<Invoice> = miss.map(|item| item.unwrap()).collect().await;
    assert_eq!(streamed, produced);

    // Hit: the stored sequence replays in the same order, producer untouched
    let hit = cache.get_or_stream(&op, &args, || {
        panic!("producer must not run on a cache hit");
        #[allow(unreachable_code)]
        futures::stream::iter(Vec::<Result<Invoice, HostError>>::new())
    });
    let replayed: Vec<Invoice> = hit.map(|item| item.unwrap()).collect().await;
    assert_eq!(replayed, produced);

    // Exactly one write for the whole sequence
    let set_calls = store
        .get_calls()
        .into_iter()
        .filter(|call| call.op == "set")
        .count();
    assert_eq!(set_calls, 1);
}

#[tokio::test]
async fn closed_store_aborts_every_entry_point() {
    let store = MockRedisClient::new().connection_open_ret(false);
    let cache = CacheAside::new(Arc::new(store.clone()), "billing");
    let invalidator = Invalidator::new(Arc::new(store.clone()), "billing");

    let single = Operation::single("find_invoice");
    let result: Result<Invoice, HostError> = cache
        .get_or_load(&single, &[], || async {
            panic!("producer must not run when the store is unavailable");
            #[allow(unreachable_code)]
            Ok::<_, HostError>(invoice(0))
        })
        .await;
    assert!(matches!(
        result,
        Err(HostError::Cache(CacheError::StoreUnavailable))
    ));

    let sequence = Operation::sequence("find_invoices");
    let stream = cache.get_or_stream(&sequence, &[], || {
        panic!("producer must not run when the store is unavailable");
        #[allow(unreachable_code)]
        futures::stream::iter(Vec::<Result<Invoice, HostError>>::new())
    });
    let items: Vec<Result<Invoice, HostError>> = stream.collect().await;
    assert_eq!(items.len(), 1);
    assert!(matches!(
        items[0],
        Err(HostError::Cache(CacheError::StoreUnavailable))
    ));

    let evicted = invalidator.evict("find_invoice", &[]).await;
    assert!(matches!(evicted, Err(CacheError::StoreUnavailable)));

    // None of the three reached the store
    assert!(store.get_calls().is_empty());
}

#[tokio::test]
async fn producer_errors_pass_through_the_host_error_type() {
    let store = MockRedisClient::new();
    let cache = CacheAside::new(Arc::new(store.clone()), "billing");
    let op = Operation::single("find_invoice");

    let result: Result<Invoice, HostError> = cache
        .get_or_load(&op, &[], || async {
            Err(HostError::Backend("connection pool exhausted".to_string()))
        })
        .await;

    match result {
        Err(HostError::Backend(message)) => {
            assert_eq!(message, "connection pool exhausted");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    // The failed call left nothing behind
    let set_calls = store
        .get_calls()
        .into_iter()
        .filter(|call| call.op == "set")
        .count();
    assert_eq!(set_calls, 0);
}

#[tokio::test]
async fn transport_errors_surface_unchanged() {
    let op = Operation::single("find_invoice");
    let args = vec![json!(42)];
    let key = CacheKey::derive("billing", "find_invoice", &args);

    // Existence check fails outright
    let mut store = MockRedisClient::new();
    let store = store.exists_ret(
        key.as_str(),
        Err(CustomRedisError::from_redis_kind(
            RedisErrorKind::IoError,
            "connection reset",
        )),
    );
    let cache = CacheAside::new(Arc::new(store), "billing");

    let result: Result<Invoice, HostError> = cache
        .get_or_load(&op, &args, || async { Ok(invoice(42)) })
        .await;
    assert!(matches!(
        result,
        Err(HostError::Cache(CacheError::Store(CustomRedisError::Redis(_))))
    ));

    // Read of an existing entry times out
    let mut store = MockRedisClient::new();
    let store = store
        .with_entry(key.as_str(), "{\"id\":42,\"total\":4200}")
        .get_ret(key.as_str(), Err(CustomRedisError::Timeout));
    let cache = CacheAside::new(Arc::new(store), "billing");

    let result: Result<Invoice, HostError> = cache
        .get_or_load(&op, &args, || async { Ok(invoice(42)) })
        .await;
    assert!(matches!(
        result,
        Err(HostError::Cache(CacheError::Store(CustomRedisError::Timeout)))
    ));
}

#[tokio::test]
async fn corrupt_entries_fail_decoding() {
    let op = Operation::single("find_invoice");
    let args = vec![json!(42)];
    let key = CacheKey::derive("billing", "find_invoice", &args);

    let mut store = MockRedisClient::new();
    let store = store.with_entry(key.as_str(), "not json{");
    let cache = CacheAside::new(Arc::new(store), "billing");

    let result: Result<Invoice, HostError> = cache
        .get_or_load(&op, &args, || async { Ok(invoice(42)) })
        .await;

    assert!(matches!(
        result,
        Err(HostError::Cache(CacheError::Serialization(_)))
    ));
}

#[tokio::test]
async fn namespaces_partition_the_store() {
    let store = MockRedisClient::new();
    let billing = CacheAside::new(Arc::new(store.clone()), "billing");
    let shipping = CacheAside::new(Arc::new(store.clone()), "shipping");
    let op = Operation::single("find_invoice");
    let args = vec![json!(42)];

    let _: Invoice = billing
        .get_or_load(&op, &args, || async { Ok::<_, CacheError>(invoice(1)) })
        .await
        .unwrap();
    let _: Invoice = shipping
        .get_or_load(&op, &args, || async { Ok::<_, CacheError>(invoice(2)) })
        .await
        .unwrap();

    let set_keys: Vec<String> = store
        .get_calls()
        .into_iter()
        .filter(|call| call.op == "set")
        .map(|call| call.key)
        .collect();
    assert_eq!(set_keys.len(), 2);
    assert!(set_keys[0].starts_with("billing:"));
    assert!(set_keys[1].starts_with("shipping:"));
}

#[tokio::test]
async fn declared_shapes_drive_the_entry_points() {
    // The kind of operation table a configuration-driven host builds
    let declarations = vec![("find_invoice", "single"), ("find_invoices", "sequence")];
    let operations: Vec<Operation> = declarations
        .into_iter()
        .map(|(name, shape)| Operation::from_declaration(name, shape).unwrap())
        .collect();

    assert!(Operation::from_declaration("find_invoice", "flux").is_err());

    let store = MockRedisClient::new();
    let cache = CacheAside::new(Arc::new(store.clone()), "billing");

    // A sequence-declared operation cannot be served by the single entry point
    let result: Result<Invoice, CacheError> = cache
        .get_or_load(&operations[1], &[], || async {
            Ok::<_, CacheError>(invoice(0))
        })
        .await;
    assert!(matches!(
        result,
        Err(CacheError::UnsupportedResultShape(_))
    ));
    assert!(store.get_calls().is_empty());

    // The matching entry point works
    let value: Invoice = cache
        .get_or_load(&operations[0], &[], || async {
            Ok::<_, CacheError>(invoice(9))
        })
        .await
        .unwrap();
    assert_eq!(value, invoice(9));
}

#[tokio::test]
async fn null_arguments_key_deterministically() {
    let store = MockRedisClient::new();
    let cache = CacheAside::new(Arc::new(store.clone()), "billing");
    let op = Operation::single("find_invoice");
    let args = vec![Value::Null, json!("acme")];

    let producer_runs = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let runs = Arc::clone(&producer_runs);
        let _: Invoice = cache
            .get_or_load(&op, &args, move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(invoice(5))
            })
            .await
            .unwrap();
    }

    // The second call was a hit on the same derived key
    assert_eq!(producer_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sequence_write_is_deferred_until_completion() {
    let store = MockRedisClient::new();
    let cache = CacheAside::new(Arc::new(store.clone()), "billing");
    let op = Operation::sequence("find_invoices");
    let args = vec![json!("acme")];
    let key = CacheKey::derive("billing", "find_invoices", &args);

    let upstream = futures::stream::iter(vec![
        Ok::<_, HostError>(invoice(1)),
        Ok::<_, HostError>(invoice(2)),
    ]);

    let stream = cache.get_or_stream(&op, &args, move || upstream);
    pin_mut!(stream);

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first, invoice(1));
    // One element delivered, nothing stored yet
    assert_eq!(store.stored_value(key.as_str()), None);

    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second, invoice(2));

    // Draining the stream past the last element triggers the write
    assert!(stream.next().await.is_none());
    assert!(store.stored_value(key.as_str()).is_some());
}
