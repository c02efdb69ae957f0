//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块负责按配置装配缓存后端、刷新闸门与数据源，构造消息服务。

use crate::backend::{CacheAdapter, MemoryBackend, RedisBackend};
use crate::config::{CacheBackendType, Config};
use crate::error::{I18nError, Result};
use crate::lock::{DistributedLock, RefreshGate};
use crate::service::MessageService;
use crate::source::{DataSource, GoogleSheetsSource};
use std::sync::Arc;
use tracing::{info, instrument};

/// 使用配置中的 Google Sheets 数据源构造服务
#[instrument(skip(config), level = "info", fields(issuers = config.sheets.spreadsheet_ids.len()))]
pub async fn build_service(config: &Config) -> Result<MessageService> {
    let source = GoogleSheetsSource::new(&config.sheets)?;
    build_service_with_source(config, Arc::new(source)).await
}

/// 使用给定数据源构造服务
///
/// 进程内后端不提供分布式锁，刷新只在进程内互斥；Redis 后端同时作为分布式锁
#[instrument(skip(config, source), level = "info", fields(backend = ?config.cache.backend))]
pub async fn build_service_with_source(
    config: &Config,
    source: Arc<dyn DataSource>,
) -> Result<MessageService> {
    config.validate().map_err(I18nError::Config)?;

    let lock_options = config.revalidation.lock_options();
    let (cache, gate): (Arc<dyn CacheAdapter>, RefreshGate) = match config.cache.backend {
        CacheBackendType::Memory => {
            let cache: Arc<dyn CacheAdapter> =
                Arc::new(MemoryBackend::new(config.cache.memory.max_capacity));
            (cache, RefreshGate::local(lock_options))
        }
        CacheBackendType::Redis => {
            let redis_config = config.cache.redis.as_ref().ok_or_else(|| {
                I18nError::Config("Redis backend selected but [cache.redis] is missing".to_string())
            })?;
            let backend = Arc::new(RedisBackend::connect(redis_config).await?);
            let lock = DistributedLock::new(backend.clone());
            let cache: Arc<dyn CacheAdapter> = backend;
            (cache, RefreshGate::new(Some(lock), lock_options))
        }
    };

    info!(
        "Message service ready: version={}, backend={}, distributed_lock={}",
        crate::VERSION,
        cache.backend_name(),
        gate.is_distributed()
    );

    Ok(MessageService::new(
        cache,
        source,
        Arc::new(gate),
        config.sheets.supported_languages.clone(),
        config.revalidation.marker_ttl(),
    ))
}
