//! Node proxy behaviour against an in-process processor.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Addressed, FakeProcessor, CACHE_EXISTS, INJECTED};
use gridwire::{ClusterGroupOp, GridwireError, NodeProxy, ProcessorOp};

#[tokio::test]
async fn test_create_then_get_returns_same_handle() {
    let processor = FakeProcessor::new();
    let node = processor.node();

    for name in ["orders", "", "кэш", "名前-🙂", "with spaces\tand\ttabs"] {
        let created = node.create_cache(name).await.unwrap().unwrap();
        let found = node.get_cache(name).await.unwrap().unwrap();

        assert_eq!(created.handle(), found.handle());
        assert_eq!(found.name(), name);
    }
}

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    let processor = FakeProcessor::new();
    let node = processor.node();

    let first = node.get_or_create_cache("orders").await.unwrap().unwrap();
    let second = node.get_or_create_cache("orders").await.unwrap().unwrap();

    assert_eq!(first.handle(), second.handle());
    assert_eq!(processor.processor_calls(ProcessorOp::GetOrCreateCache), 2);
}

#[tokio::test]
async fn test_get_missing_cache_is_not_an_error() {
    let processor = FakeProcessor::new();
    let node = processor.node();

    let result = node.get_cache("missing").await;
    assert!(matches!(result, Ok(None)));
    assert_eq!(processor.processor_calls(ProcessorOp::GetCache), 1);
}

#[tokio::test]
async fn test_get_failure_is_distinct_from_missing() {
    let processor = FakeProcessor::new();
    let node = processor.node();
    processor.fail_next(Addressed::Processor, ProcessorOp::GetCache.code(), 1);

    let result = node.get_cache("orders").await;
    assert!(matches!(
        result,
        Err(GridwireError::Remote { code: INJECTED, .. })
    ));
}

#[tokio::test]
async fn test_create_existing_cache_surfaces_remote_error() {
    let processor = FakeProcessor::new();
    let node = processor.node();

    node.create_cache("orders").await.unwrap();
    let result = node.create_cache("orders").await;

    match result {
        Err(GridwireError::Remote { code, message }) => {
            assert_eq!(code, CACHE_EXISTS);
            assert!(message.contains("orders"));
        }
        other => panic!("expected remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_destroy_cache() {
    let processor = FakeProcessor::new();
    let node = processor.node();

    node.create_cache("orders").await.unwrap();
    node.destroy_cache("orders").await.unwrap();

    assert!(node.get_cache("orders").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cache_names_reach_processor_intact() {
    let processor = FakeProcessor::new();
    let node = processor.node();
    let long = "x".repeat(10_000);

    for name in ["", "a", "Ünïcödé", "日本語のキャッシュ", long.as_str()] {
        node.get_cache(name).await.unwrap();
    }

    assert_eq!(
        processor.names(),
        vec!["", "a", "Ünïcödé", "日本語のキャッシュ", long.as_str()]
    );
}

#[tokio::test]
async fn test_transactions_cached() {
    let processor = FakeProcessor::new();
    let node = processor.node();

    let first = node.transactions().await.unwrap();
    let second = node.transactions().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(processor.processor_calls(ProcessorOp::GetTransactions), 1);
}

#[tokio::test]
async fn test_projection_cached() {
    let processor = FakeProcessor::new();
    let node = processor.node();

    let first = node.projection().await.unwrap();
    let second = node.projection().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(processor.processor_calls(ProcessorOp::GetClusterGroup), 1);
}

#[tokio::test]
async fn test_concurrent_first_callers_share_one_fetch() {
    let processor = FakeProcessor::with_delay(Duration::from_millis(20));
    let node = processor.node();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let node = node.clone();
            tokio::spawn(async move { node.transactions().await })
        })
        .collect();

    let mut proxies = Vec::new();
    for task in tasks {
        proxies.push(task.await.unwrap().unwrap());
    }

    assert_eq!(processor.processor_calls(ProcessorOp::GetTransactions), 1);
    assert!(proxies.iter().all(|p| Arc::ptr_eq(p, &proxies[0])));
}

#[tokio::test]
async fn test_failed_fetch_leaves_slot_empty() {
    let processor = FakeProcessor::new();
    let node = processor.node();
    processor.fail_next(Addressed::Processor, ProcessorOp::GetTransactions.code(), 1);

    let result = node.transactions().await;
    assert!(matches!(
        result,
        Err(GridwireError::Remote { code: INJECTED, .. })
    ));

    let proxy = node.transactions().await.unwrap();
    assert_eq!(processor.processor_calls(ProcessorOp::GetTransactions), 2);
    assert!(Arc::ptr_eq(&proxy, &node.transactions().await.unwrap()));
}

#[tokio::test]
async fn test_null_singleton_is_missing_object_and_retried() {
    let processor = FakeProcessor::new();
    let node = processor.node();
    processor.null_next(Addressed::Processor, ProcessorOp::GetClusterGroup.code());

    let result = node.projection().await;
    assert!(matches!(result, Err(GridwireError::MissingObject(10))));

    node.projection().await.unwrap();
    assert_eq!(processor.processor_calls(ProcessorOp::GetClusterGroup), 2);
}

#[tokio::test]
async fn test_compute_goes_through_projection() {
    let processor = FakeProcessor::new();
    let node = processor.node();

    let compute = node.compute().await.unwrap();
    let again = node.compute().await.unwrap();

    assert!(Arc::ptr_eq(&compute, &again));
    assert_eq!(processor.processor_calls(ProcessorOp::GetClusterGroup), 1);
    assert_eq!(
        processor.calls(Addressed::Object, ClusterGroupOp::GetCompute.code()),
        1
    );
}

#[tokio::test]
async fn test_failed_projection_leaves_both_slots_empty() {
    let processor = FakeProcessor::new();
    let node = processor.node();
    processor.fail_next(Addressed::Processor, ProcessorOp::GetClusterGroup.code(), 1);

    assert!(node.compute().await.is_err());
    assert_eq!(
        processor.calls(Addressed::Object, ClusterGroupOp::GetCompute.code()),
        0
    );

    node.compute().await.unwrap();
    assert_eq!(processor.processor_calls(ProcessorOp::GetClusterGroup), 2);
    assert_eq!(
        processor.calls(Addressed::Object, ClusterGroupOp::GetCompute.code()),
        1
    );
}

#[tokio::test]
async fn test_failed_compute_keeps_projection() {
    let processor = FakeProcessor::new();
    let node = processor.node();
    processor.fail_next(Addressed::Object, ClusterGroupOp::GetCompute.code(), 1);

    assert!(node.compute().await.is_err());
    node.compute().await.unwrap();

    assert_eq!(processor.processor_calls(ProcessorOp::GetClusterGroup), 1);
    assert_eq!(
        processor.calls(Addressed::Object, ClusterGroupOp::GetCompute.code()),
        2
    );
}

#[tokio::test]
async fn test_handles_released_when_proxies_drop() {
    let processor = FakeProcessor::new();
    let node = processor.node();

    let cache = node.get_or_create_cache("orders").await.unwrap().unwrap();
    let raw = cache.handle().get();
    node.compute().await.unwrap();
    assert_eq!(processor.live(), 3);

    drop(cache);
    assert_eq!(processor.released(), vec![raw]);

    // Node owns the cached projection and compute facade
    drop(node);
    assert_eq!(processor.live(), 0);
}

#[tokio::test]
async fn test_buffers_return_to_pool() {
    let processor = FakeProcessor::new();
    let node = processor.node();

    for i in 0..8 {
        node.get_or_create_cache(&format!("cache-{}", i)).await.unwrap();
    }
    node.transactions().await.unwrap();

    let env = NodeProxy::from_wrapper(&node).environment();
    assert_eq!(env.memory().leased(), 0);
    assert_eq!(env.memory().pooled(), 1);
}
