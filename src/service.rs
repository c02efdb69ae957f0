//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了翻译消息的读取与重新验证：严格模式、stale-while-revalidate 模式，
//! 以及基于变更令牌的受锁保护刷新。

use crate::backend::CacheAdapter;
use crate::error::{I18nError, Result};
use crate::keys::CacheKeys;
use crate::lock::RefreshGate;
use crate::messages::{self, Messages};
use crate::metrics::GLOBAL_METRICS;
use crate::query::MessagesQuery;
use crate::source::{DataSource, SheetSelector};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

/// 标记的值无意义，只关心是否存在
const MARKER_VALUE: &str = "1";

/// 一次令牌驱动刷新的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// 令牌未变化，未读取数据源
    Unchanged,
    /// 拿到锁后发现其他进程已完成刷新
    RevalidatedByPeer,
    /// 重新读取并写入了缓存
    Reloaded,
}

#[derive(Debug, Clone)]
pub struct Refresh {
    pub messages: Messages,
    pub outcome: RefreshOutcome,
}

/// 翻译消息服务
///
/// 克隆代价很低，所有克隆共享同一个缓存、数据源、刷新闸门和后台任务集合
#[derive(Clone)]
pub struct MessageService {
    cache: Arc<dyn CacheAdapter>,
    source: Arc<dyn DataSource>,
    gate: Arc<RefreshGate>,
    supported_languages: Arc<Vec<String>>,
    marker_ttl: Duration,
    tracker: TaskTracker,
}

impl MessageService {
    pub fn new(
        cache: Arc<dyn CacheAdapter>,
        source: Arc<dyn DataSource>,
        gate: Arc<RefreshGate>,
        supported_languages: Vec<String>,
        marker_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            source,
            gate,
            supported_languages: Arc::new(supported_languages),
            marker_ttl,
            tracker: TaskTracker::new(),
        }
    }

    /// 可用的租户
    pub fn issuers(&self) -> Vec<String> {
        self.source.tenants()
    }

    pub fn cache(&self) -> &Arc<dyn CacheAdapter> {
        &self.cache
    }

    /// 校验租户，未知租户在任何缓存或锁操作之前被拒绝
    pub fn ensure_known_issuer(&self, issuer: &str) -> Result<()> {
        let available = self.issuers();
        if available.iter().any(|i| i == issuer) {
            Ok(())
        } else {
            Err(I18nError::UnknownIssuer {
                issuer: issuer.to_string(),
                available,
            })
        }
    }

    /// 读取缓存值，损坏的 JSON 按未命中处理
    async fn read_cached(&self, keys: &CacheKeys) -> Result<Option<Messages>> {
        let Some(raw) = self.cache.get(&keys.value).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Messages>(&raw) {
            Ok(messages) => Ok(Some(messages)),
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", keys.value, e);
                Ok(None)
            }
        }
    }

    async fn load_and_store(&self, keys: &CacheKeys) -> Result<Messages> {
        GLOBAL_METRICS.record("source", "fetch");
        let rows = self.source.fetch_rows(&keys.issuer, &keys.sheet).await?;
        let messages = messages::serialize(&rows, &self.supported_languages);
        let json = serde_json::to_string(&messages)?;
        self.cache.set(&keys.value, &json, None).await?;
        info!(
            "Messages cached: key={}, rows={}, bytes={}",
            keys.value,
            rows.len(),
            json.len()
        );
        Ok(messages)
    }

    /// 严格模式读取
    ///
    /// 命中且未强制刷新时直接返回缓存，不检查令牌；否则在刷新闸门内同步读取数据源
    #[instrument(skip(self), level = "info", fields(issuer = %query.issuer, sheet = %query.sheet))]
    pub async fn get_messages(&self, query: &MessagesQuery) -> Result<Messages> {
        self.ensure_known_issuer(&query.issuer)?;
        let keys = CacheKeys::new(&query.issuer, &query.sheet);

        if !query.revalidate {
            if let Some(cached) = self.read_cached(&keys).await? {
                GLOBAL_METRICS.record("cache", "hit");
                return Ok(messages::filter(&cached, query.langs.as_deref()));
            }
        }
        GLOBAL_METRICS.record("cache", "miss");

        let guard = self.gate.enter(&keys.lock).await?;
        let loaded = self.load_and_store(&keys).await;
        self.gate.leave(guard).await;

        Ok(messages::filter(&loaded?, query.langs.as_deref()))
    }

    /// stale-while-revalidate 模式读取
    ///
    /// 命中时立即返回缓存值，并在单飞标记创建成功时启动后台刷新；
    /// 未命中或强制刷新时同步执行令牌驱动刷新
    #[instrument(skip(self), level = "info", fields(issuer = %query.issuer, sheet = %query.sheet))]
    pub async fn get_messages_swr(&self, query: &MessagesQuery) -> Result<Messages> {
        self.ensure_known_issuer(&query.issuer)?;
        let keys = CacheKeys::new(&query.issuer, &query.sheet);

        if !query.revalidate {
            if let Some(cached) = self.read_cached(&keys).await? {
                GLOBAL_METRICS.record("cache", "hit");
                self.trigger_revalidation(&keys).await;
                return Ok(messages::filter(&cached, query.langs.as_deref()));
            }
        }
        GLOBAL_METRICS.record("cache", "miss");

        let refresh = self.refresh_keys(&keys).await?;
        Ok(messages::filter(&refresh.messages, query.langs.as_deref()))
    }

    /// 同步执行令牌驱动刷新
    pub async fn refresh(&self, issuer: &str, sheet: &SheetSelector) -> Result<Refresh> {
        self.ensure_known_issuer(issuer)?;
        self.refresh_keys(&CacheKeys::new(issuer, sheet)).await
    }

    /// 存储的令牌与 `token` 相同且缓存中有值时返回该值
    async fn unchanged(&self, keys: &CacheKeys, token: &str) -> Result<Option<Messages>> {
        let stored = self.cache.get(&keys.etag).await?;
        if stored.as_deref() != Some(token) {
            return Ok(None);
        }
        self.read_cached(keys).await
    }

    #[instrument(skip(self, keys), level = "debug", fields(key = %keys.value))]
    async fn refresh_keys(&self, keys: &CacheKeys) -> Result<Refresh> {
        let token = self.source.fetch_change_token(&keys.issuer).await?;

        if let Some(messages) = self.unchanged(keys, &token).await? {
            GLOBAL_METRICS.record("revalidation", "unchanged");
            debug!("Etag unchanged, skip fetch: key={}, etag={}", keys.value, token);
            return Ok(Refresh {
                messages,
                outcome: RefreshOutcome::Unchanged,
            });
        }

        let guard = self.gate.enter(&keys.lock).await?;
        let result = self.refresh_locked(keys, &token).await;
        self.gate.leave(guard).await;
        result
    }

    /// 持锁期间的刷新：复查令牌，必要时读取并写入值和令牌
    async fn refresh_locked(&self, keys: &CacheKeys, token: &str) -> Result<Refresh> {
        if let Some(messages) = self.unchanged(keys, token).await? {
            GLOBAL_METRICS.record("revalidation", "peer");
            info!("Revalidated by another worker: key={}", keys.value);
            return Ok(Refresh {
                messages,
                outcome: RefreshOutcome::RevalidatedByPeer,
            });
        }

        let messages = self.load_and_store(keys).await?;
        // 先写值后写令牌，中途失败只会导致一次多余的重新读取
        self.cache.set(&keys.etag, token, None).await?;
        GLOBAL_METRICS.record("revalidation", "reloaded");
        info!("Revalidated: key={}, etag={}", keys.value, token);
        Ok(Refresh {
            messages,
            outcome: RefreshOutcome::Reloaded,
        })
    }

    /// 创建单飞标记，成功时启动后台刷新
    async fn trigger_revalidation(&self, keys: &CacheKeys) {
        match self
            .cache
            .set_if_absent(&keys.marker, MARKER_VALUE, Some(self.marker_ttl))
            .await
        {
            Ok(true) => {
                GLOBAL_METRICS.record("revalidation", "triggered");
                self.spawn_revalidation(keys.clone());
            }
            Ok(false) => {
                GLOBAL_METRICS.record("revalidation", "skipped");
                debug!("Revalidation already in flight: marker={}", keys.marker);
            }
            Err(e) => warn!("Failed to set revalidating marker {}: {}", keys.marker, e),
        }
    }

    fn spawn_revalidation(&self, keys: CacheKeys) {
        let service = self.clone();
        self.tracker.spawn(async move {
            service.background_refresh(&keys).await;
        });
    }

    async fn background_refresh(&self, keys: &CacheKeys) {
        match self.refresh_keys(keys).await {
            // 令牌未变化时保留标记，在其TTL内抑制重复探测
            Ok(Refresh {
                outcome: RefreshOutcome::Unchanged,
                ..
            }) => {}
            Ok(_) => self.clear_marker(keys).await,
            Err(e) => {
                GLOBAL_METRICS.record("revalidation", "failed");
                error!("Background revalidation failed: key={}, error={}", keys.value, e);
                self.clear_marker(keys).await;
            }
        }
    }

    async fn clear_marker(&self, keys: &CacheKeys) {
        if let Err(e) = self.cache.refresh_expiry(&keys.marker, Duration::ZERO).await {
            warn!("Failed to clear revalidating marker {}: {}", keys.marker, e);
        }
    }

    /// 等待当前所有后台刷新完成，之后仍可继续启动新的后台刷新
    pub async fn drain_background(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// 关闭服务，等待后台刷新完成或超时
    pub async fn shutdown(&self, timeout: Duration) {
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!(
                "Shutdown timed out with {} background revalidations still running",
                self.tracker.len()
            );
        } else {
            info!("Message service shut down");
        }
    }
}
