//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 单飞标记集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{fast_lock_options, local_service, service_with_gate, setup_logging, FakeSource};
use futures::future::join_all;
use sheetcache::backend::{CacheAdapter, MemoryBackend};
use sheetcache::lock::RefreshGate;
use sheetcache::{MessagesQuery, SheetSelector};
use std::sync::Arc;
use std::time::Duration;

fn web_query() -> MessagesQuery {
    MessagesQuery::new("acme", SheetSelector::Named("web".to_string()))
}

#[tokio::test]
async fn test_concurrent_hits_trigger_one_refresh() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let service = local_service(source.clone(), Arc::new(MemoryBackend::new(100)));

    service.get_messages_swr(&web_query()).await.unwrap();
    assert_eq!(source.row_fetches(), 1);

    source.set_token("v2");
    source.set_fetch_delay(Duration::from_millis(100));

    let query = web_query();
    let reads = (0..20).map(|_| service.get_messages_swr(&query));
    for result in join_all(reads).await {
        assert_eq!(result.unwrap()["en"]["hello"], "Hello");
    }
    service.drain_background().await;

    assert_eq!(source.row_fetches(), 2);
    // 初始读取一次，后台刷新一次
    assert_eq!(source.token_fetches(), 2);
}

#[tokio::test]
async fn test_existing_marker_suppresses_trigger() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let cache = Arc::new(MemoryBackend::new(100));
    let service = local_service(source.clone(), cache.clone());

    service.get_messages_swr(&web_query()).await.unwrap();
    cache
        .set("i18n:acme:revalidating", "1", Some(Duration::from_secs(60)))
        .await
        .unwrap();

    source.set_token("v2");
    service.get_messages_swr(&web_query()).await.unwrap();
    service.drain_background().await;

    assert_eq!(source.token_fetches(), 1);
    assert_eq!(source.row_fetches(), 1);
}

#[tokio::test]
async fn test_marker_is_per_tenant() {
    setup_logging();
    let source = FakeSource::new(&["acme", "globex"]);
    let service = local_service(source.clone(), Arc::new(MemoryBackend::new(100)));

    let acme = web_query();
    let globex = MessagesQuery::new("globex", SheetSelector::Named("web".to_string()));
    service.get_messages_swr(&acme).await.unwrap();
    service.get_messages_swr(&globex).await.unwrap();
    assert_eq!(source.token_fetches(), 2);

    service.get_messages_swr(&acme).await.unwrap();
    service.get_messages_swr(&globex).await.unwrap();
    service.drain_background().await;

    // 每个租户各触发一次后台探测
    assert_eq!(source.token_fetches(), 4);
}

#[tokio::test]
async fn test_marker_expiry_allows_next_check() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let cache = Arc::new(MemoryBackend::new(100));
    let service = service_with_gate(
        source.clone(),
        cache.clone(),
        RefreshGate::local(fast_lock_options()),
        Duration::from_millis(300),
    );

    service.get_messages_swr(&web_query()).await.unwrap();
    service.get_messages_swr(&web_query()).await.unwrap();
    service.drain_background().await;
    assert_eq!(source.token_fetches(), 2);

    // 标记仍在：不触发
    service.get_messages_swr(&web_query()).await.unwrap();
    service.drain_background().await;
    assert_eq!(source.token_fetches(), 2);

    tokio::time::sleep(Duration::from_millis(400)).await;
    service.get_messages_swr(&web_query()).await.unwrap();
    service.drain_background().await;
    assert_eq!(source.token_fetches(), 3);
    assert_eq!(source.row_fetches(), 1);
}
