//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 启动预热集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{local_service, setup_logging, FakeSource};
use sheetcache::backend::{CacheAdapter, MemoryBackend};
use sheetcache::config::{WarmupConfig, WarmupTarget};
use sheetcache::WarmupManager;
use std::sync::Arc;
use std::time::Duration;

fn target(issuer: &str, sheet: &str) -> WarmupTarget {
    WarmupTarget {
        issuer: issuer.to_string(),
        sheet: sheet.to_string(),
    }
}

#[tokio::test]
async fn test_disabled_warmup_is_skipped() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let service = local_service(source.clone(), Arc::new(MemoryBackend::new(100)));

    let manager = WarmupManager::new(WarmupConfig {
        enabled: false,
        timeout_seconds: 10,
        targets: vec![target("acme", "web")],
    });
    let result = manager.run(&service).await;

    assert!(result.success);
    assert_eq!(result.skipped, 1);
    assert_eq!(source.row_fetches(), 0);
}

#[tokio::test]
async fn test_partial_failure_is_counted() {
    setup_logging();
    let source = FakeSource::new(&["acme", "globex"]);
    let cache = Arc::new(MemoryBackend::new(100));
    let service = local_service(source.clone(), cache.clone());

    let manager = WarmupManager::new(WarmupConfig {
        enabled: true,
        timeout_seconds: 10,
        targets: vec![
            target("acme", "web"),
            target("globex", "all"),
            target("acme", "missing"),
        ],
    });
    let result = manager.run(&service).await;

    assert_eq!(result.loaded, 2);
    assert_eq!(result.failed, 1);
    assert!(!result.success);
    assert!(cache.get("i18n:acme:web").await.unwrap().is_some());
    assert!(cache.get("i18n:globex:all").await.unwrap().is_some());
}

#[tokio::test]
async fn test_warmup_timeout() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    source.set_fetch_delay(Duration::from_secs(3));
    let service = local_service(source, Arc::new(MemoryBackend::new(100)));

    let manager = WarmupManager::new(WarmupConfig {
        enabled: true,
        timeout_seconds: 1,
        targets: vec![target("acme", "web")],
    });
    let result = manager.run(&service).await;

    assert!(!result.success);
    assert_eq!(result.loaded, 0);
}

#[tokio::test]
async fn test_timeout_keeps_completed_targets() {
    setup_logging();
    let source = FakeSource::new(&["acme"]);
    let cache = Arc::new(MemoryBackend::new(100));
    let service = local_service(source, cache.clone());

    let manager = WarmupManager::new(WarmupConfig {
        enabled: true,
        timeout_seconds: 1,
        targets: vec![target("acme", "web"), target("acme", "slow")],
    });
    let result = manager.run(&service).await;

    assert!(!result.success);
    assert_eq!(result.loaded, 1);
    assert_eq!(result.failed, 1);
    assert!(cache.get("i18n:acme:web").await.unwrap().is_some());
}
