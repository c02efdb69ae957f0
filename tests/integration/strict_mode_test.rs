//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 严格模式读取集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{greeting_rows, local_service, setup_logging, FakeSource};
use sheetcache::backend::{CacheAdapter, MemoryBackend};
use sheetcache::{I18nError, MessagesQuery, SheetSelector};
use std::sync::Arc;

fn web_query() -> MessagesQuery {
    MessagesQuery::new("acme", SheetSelector::Named("web".to_string()))
}

#[tokio::test]
async fn test_hit_skips_token_check() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let cache = Arc::new(MemoryBackend::new(100));
    let service = local_service(source.clone(), cache.clone());

    let first = service.get_messages(&web_query()).await.unwrap();
    assert_eq!(first["en"]["hello"], "Hello");

    source.set_token("v2");
    source.set_rows(greeting_rows("Hi", "Salut", "Servus"));
    let second = service.get_messages(&web_query()).await.unwrap();

    assert_eq!(second, first);
    assert_eq!(source.token_fetches(), 0);
    assert_eq!(source.row_fetches(), 1);
    // 严格模式不创建单飞标记
    assert_eq!(cache.get("i18n:acme:revalidating").await.unwrap(), None);
}

#[tokio::test]
async fn test_forced_read_always_fetches() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let cache = Arc::new(MemoryBackend::new(100));
    let service = local_service(source.clone(), cache.clone());

    service.get_messages(&web_query()).await.unwrap();
    source.set_rows(greeting_rows("Hi", "Salut", "Servus"));

    let forced = web_query().with_revalidate(true).with_langs(["de"]);
    let messages = service.get_messages(&forced).await.unwrap();
    assert_eq!(source.row_fetches(), 2);
    assert_eq!(messages["de"]["hello"], "Servus");
    assert!(!messages.contains_key("fr"));

    // 严格模式不写令牌
    assert_eq!(cache.get("i18n:acme:etag").await.unwrap(), None);
}

#[tokio::test]
async fn test_miss_error_propagates_and_nothing_cached() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let cache = Arc::new(MemoryBackend::new(100));
    let service = local_service(source.clone(), cache.clone());

    source.fail_rows(true);
    assert!(matches!(
        service.get_messages(&web_query()).await,
        Err(I18nError::Source(_))
    ));
    assert_eq!(cache.get("i18n:acme:web").await.unwrap(), None);

    source.fail_rows(false);
    assert!(service.get_messages(&web_query()).await.is_ok());
}

#[tokio::test]
async fn test_strict_and_swr_share_cached_value() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let service = local_service(source.clone(), Arc::new(MemoryBackend::new(100)));

    let strict = service.get_messages(&web_query()).await.unwrap();
    let swr = service.get_messages_swr(&web_query()).await.unwrap();
    assert_eq!(strict, swr);
    service.drain_background().await;

    // 没有存储令牌，后台刷新按不一致处理并重新读取一次
    assert_eq!(source.row_fetches(), 2);
}
