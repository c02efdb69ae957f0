//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 分布式锁与刷新互斥集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{fast_lock_options, greeting_rows, local_service, setup_logging, shared_service, FakeSource};
use sheetcache::backend::{CacheAdapter, MemoryBackend};
use sheetcache::lock::{DistributedLock, LockOptions};
use sheetcache::{I18nError, MessagesQuery, RefreshOutcome, SheetSelector};
use std::sync::Arc;
use std::time::Duration;

fn web() -> SheetSelector {
    SheetSelector::Named("web".to_string())
}

fn impatient() -> LockOptions {
    LockOptions {
        lease: Duration::from_secs(5),
        acquire_timeout: Duration::from_millis(60),
        retry_interval: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn test_shared_backend_refreshes_never_overlap() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    source.set_fetch_delay(Duration::from_millis(100));
    let cache = Arc::new(MemoryBackend::new(100));

    // 两个“进程”共享同一个后端
    let worker_a = shared_service(source.clone(), cache.clone(), fast_lock_options());
    let worker_b = shared_service(source.clone(), cache.clone(), fast_lock_options());

    let sheet = web();
    let (a, b) = tokio::join!(
        worker_a.refresh("acme", &sheet),
        worker_b.refresh("acme", &sheet)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(source.row_fetches(), 1);
    let mut outcomes = vec![a.outcome, b.outcome];
    outcomes.sort_by_key(|o| format!("{:?}", o));
    assert_eq!(
        outcomes,
        vec![RefreshOutcome::Reloaded, RefreshOutcome::RevalidatedByPeer]
    );
    assert_eq!(a.messages, b.messages);
    assert_eq!(cache.get("locks:i18n:acme:web").await.unwrap(), None);
}

#[tokio::test]
async fn test_local_gate_serializes_within_process() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    source.set_fetch_delay(Duration::from_millis(100));
    let service = local_service(source.clone(), Arc::new(MemoryBackend::new(100)));
    let other = service.clone();

    let sheet = web();
    let (a, b) = tokio::join!(service.refresh("acme", &sheet), other.refresh("acme", &sheet));
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(source.row_fetches(), 1);
}

#[tokio::test]
async fn test_inline_lock_timeout_surfaces() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let cache = Arc::new(MemoryBackend::new(100));
    let service = shared_service(source.clone(), cache.clone(), impatient());

    let holder = DistributedLock::new(cache.clone());
    let held = holder
        .acquire("locks:i18n:acme:web", &fast_lock_options())
        .await
        .unwrap();

    let query = MessagesQuery::new("acme", web());
    assert!(matches!(
        service.get_messages_swr(&query).await,
        Err(I18nError::LockTimeout { .. })
    ));
    assert_eq!(source.row_fetches(), 0);

    holder.release(&held).await;
    assert!(service.get_messages_swr(&query).await.is_ok());
}

#[tokio::test]
async fn test_background_lock_timeout_keeps_stale_value() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let cache = Arc::new(MemoryBackend::new(100));
    let service = shared_service(source.clone(), cache.clone(), impatient());

    let query = MessagesQuery::new("acme", web());
    let original = service.get_messages_swr(&query).await.unwrap();

    let holder = DistributedLock::new(cache.clone());
    let held = holder
        .acquire("locks:i18n:acme:web", &fast_lock_options())
        .await
        .unwrap();

    source.set_token("v2");
    source.set_rows(greeting_rows("Hi", "Salut", "Servus"));
    let served = service.get_messages_swr(&query).await.unwrap();
    assert_eq!(served, original);
    service.drain_background().await;

    assert_eq!(source.row_fetches(), 1);
    assert_eq!(cache.get("i18n:acme:revalidating").await.unwrap(), None);
    assert_eq!(service.get_messages_swr(&query).await.unwrap(), original);
    holder.release(&held).await;
}

#[tokio::test]
async fn test_lock_scoped_per_sheet() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let cache = Arc::new(MemoryBackend::new(100));
    let service = shared_service(source.clone(), cache.clone(), impatient());

    let holder = DistributedLock::new(cache.clone());
    let held = holder
        .acquire("locks:i18n:acme:web", &fast_lock_options())
        .await
        .unwrap();

    let mobile = MessagesQuery::new("acme", SheetSelector::Named("mobile".to_string()));
    assert!(service.get_messages_swr(&mobile).await.is_ok());
    holder.release(&held).await;
}
