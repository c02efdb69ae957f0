//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和设置。

#![allow(dead_code)]

use async_trait::async_trait;
use sheetcache::backend::{CacheAdapter, MemoryBackend};
use sheetcache::lock::{DistributedLock, LockOptions, RefreshGate};
use sheetcache::{DataSource, I18nError, MessageService, Result, Row, SheetSelector};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn setup_logging() {
    sheetcache::utils::setup_logging("debug");
}

pub fn row(cells: &[&str]) -> Row {
    cells.iter().map(|c| c.to_string()).collect()
}

/// `[key, en, 保留列, fr, de]`
pub fn greeting_rows(en: &str, fr: &str, de: &str) -> Vec<Row> {
    vec![row(&["hello", en, "", fr, de])]
}

pub fn supported_languages() -> Vec<String> {
    vec!["fr".to_string(), "de".to_string()]
}

/// 可控的内存数据源
///
/// 记录调用次数，可注入延迟与失败
pub struct FakeSource {
    tenants: Vec<String>,
    token: Mutex<String>,
    rows: Mutex<Vec<Row>>,
    fetch_delay: Mutex<Duration>,
    fail_rows: AtomicBool,
    fail_token: AtomicBool,
    row_fetches: AtomicUsize,
    token_fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new(tenants: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            tenants: tenants.iter().map(|t| t.to_string()).collect(),
            token: Mutex::new("v1".to_string()),
            rows: Mutex::new(greeting_rows("Hello", "Bonjour", "Hallo")),
            fetch_delay: Mutex::new(Duration::ZERO),
            fail_rows: AtomicBool::new(false),
            fail_token: AtomicBool::new(false),
            row_fetches: AtomicUsize::new(0),
            token_fetches: AtomicUsize::new(0),
        })
    }

    pub fn set_token(&self, token: &str) {
        *self.token.lock().unwrap() = token.to_string();
    }

    pub fn set_rows(&self, rows: Vec<Row>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub fn fail_rows(&self, fail: bool) {
        self.fail_rows.store(fail, Ordering::SeqCst);
    }

    pub fn fail_token(&self, fail: bool) {
        self.fail_token.store(fail, Ordering::SeqCst);
    }

    pub fn row_fetches(&self) -> usize {
        self.row_fetches.load(Ordering::SeqCst)
    }

    pub fn token_fetches(&self) -> usize {
        self.token_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for FakeSource {
    fn tenants(&self) -> Vec<String> {
        let mut tenants = self.tenants.clone();
        tenants.sort();
        tenants
    }

    async fn fetch_rows(&self, tenant: &str, sheet: &SheetSelector) -> Result<Vec<Row>> {
        self.row_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        // "slow" 表固定耗时，用于超时场景
        if sheet.as_str() == "slow" {
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
        if sheet.as_str() == "missing" {
            return Err(I18nError::NotFound(format!(
                "Unable to parse range: {}!C2:T",
                sheet
            )));
        }
        if self.fail_rows.load(Ordering::SeqCst) {
            return Err(I18nError::Source(format!("rows unavailable for {}", tenant)));
        }
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn fetch_change_token(&self, tenant: &str) -> Result<String> {
        self.token_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_token.load(Ordering::SeqCst) {
            return Err(I18nError::Source(format!("etag unavailable for {}", tenant)));
        }
        Ok(self.token.lock().unwrap().clone())
    }
}

/// 测试用的快速锁参数
pub fn fast_lock_options() -> LockOptions {
    LockOptions {
        lease: Duration::from_secs(5),
        acquire_timeout: Duration::from_secs(2),
        retry_interval: Duration::from_millis(20),
    }
}

/// 进程内后端 + 进程内互斥
pub fn local_service(source: Arc<FakeSource>, cache: Arc<MemoryBackend>) -> MessageService {
    service_with_gate(
        source,
        cache,
        RefreshGate::local(fast_lock_options()),
        Duration::from_secs(60),
    )
}

/// 共享同一个后端的“进程”，刷新由该后端上的分布式锁串行化
pub fn shared_service(
    source: Arc<FakeSource>,
    cache: Arc<MemoryBackend>,
    options: LockOptions,
) -> MessageService {
    let lock = DistributedLock::new(cache.clone());
    service_with_gate(
        source,
        cache,
        RefreshGate::new(Some(lock), options),
        Duration::from_secs(60),
    )
}

pub fn service_with_gate(
    source: Arc<FakeSource>,
    cache: Arc<MemoryBackend>,
    gate: RefreshGate,
    marker_ttl: Duration,
) -> MessageService {
    let cache: Arc<dyn CacheAdapter> = cache;
    let source: Arc<dyn DataSource> = source;
    MessageService::new(
        cache,
        source,
        Arc::new(gate),
        supported_languages(),
        marker_ttl,
    )
}
