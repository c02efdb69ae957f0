//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了进程内缓存后端的实现，基于Moka。

use super::{CacheAdapter, LockBackend};
use crate::error::{I18nError, Result};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// 进程内缓存后端
///
/// 过期采用惰性检查：读取时发现过期才删除。
/// 所有写操作经过同一把互斥锁，保证 `set_if_absent` 等复合操作的原子性。
#[derive(Clone)]
pub struct MemoryBackend {
    // 值: (数据, 过期时间)
    cache: Cache<String, (String, Option<Instant>)>,
    write_guard: Arc<Mutex<()>>,
}

impl MemoryBackend {
    /// 创建新的进程内缓存后端
    ///
    /// # 参数
    ///
    /// * `capacity` - 最大条目数
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).build(),
            write_guard: Arc::new(Mutex::new(())),
        }
    }

    fn expires_at(ttl: Option<Duration>) -> Option<Instant> {
        ttl.map(|t| Instant::now() + t)
    }

    fn is_expired(expire_at: Option<Instant>) -> bool {
        matches!(expire_at, Some(t) if Instant::now() >= t)
    }

    /// 读取未过期的条目，调用方需持有写锁
    async fn live_entry(&self, key: &str) -> Option<(String, Option<Instant>)> {
        match self.cache.get(key).await {
            Some((_, expire_at)) if Self::is_expired(expire_at) => {
                self.cache.remove(key).await;
                None
            }
            other => other,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(10000)
    }
}

#[async_trait]
impl CacheAdapter for MemoryBackend {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.cache.get(key).await {
            Some((value, expire_at)) => {
                if !Self::is_expired(expire_at) {
                    debug!("memory get: key={}, found=true", key);
                    return Ok(Some(value));
                }
                // 过期条目在写锁下复查后删除，避免误删并发写入的新值
                let _guard = self.write_guard.lock().await;
                let _ = self.live_entry(key).await;
                debug!("memory get: key={}, expired=true", key);
                Ok(None)
            }
            None => {
                debug!("memory get: key={}, found=false", key);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        self.cache
            .insert(key.to_string(), (value.to_string(), Self::expires_at(ttl)))
            .await;
        debug!("memory set: key={}, value_len={}, ttl={:?}", key, value.len(), ttl);
        Ok(())
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        let _guard = self.write_guard.lock().await;
        if self.live_entry(key).await.is_some() {
            debug!("memory set_if_absent: key={}, created=false", key);
            return Ok(false);
        }
        self.cache
            .insert(key.to_string(), (value.to_string(), Self::expires_at(ttl)))
            .await;
        // 容量已满时准入策略可能拒绝新条目，须确认写入生效
        self.cache.run_pending_tasks().await;
        if !self.cache.contains_key(key) {
            warn!("memory set_if_absent rejected at capacity: key={}", key);
            return Err(I18nError::BackendError(format!(
                "Memory cache at capacity, entry not admitted: {}",
                key
            )));
        }
        debug!("memory set_if_absent: key={}, created=true", key);
        Ok(true)
    }

    #[instrument(skip(self), level = "debug")]
    async fn refresh_expiry(&self, key: &str, ttl: Duration) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        if let Some((value, _)) = self.live_entry(key).await {
            if ttl.is_zero() {
                self.cache.remove(key).await;
            } else {
                self.cache
                    .insert(key.to_string(), (value, Self::expires_at(Some(ttl))))
                    .await;
            }
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        self.cache.remove(key).await;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl LockBackend for MemoryBackend {
    async fn try_lock(&self, key: &str, token: &str, lease: Duration) -> Result<bool> {
        self.set_if_absent(key, token, Some(lease)).await
    }

    async fn unlock(&self, key: &str, token: &str) -> Result<bool> {
        let _guard = self.write_guard.lock().await;
        match self.live_entry(key).await {
            Some((holder, _)) if holder == token => {
                self.cache.remove(key).await;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
