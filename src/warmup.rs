//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 启动预热：并发刷新配置的 (issuer, sheet) 组合。

use crate::config::{WarmupConfig, WarmupTarget};
use crate::service::MessageService;
use crate::source::SheetSelector;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupResult {
    pub loaded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub success: bool,
}

impl WarmupResult {
    pub fn skipped(count: usize) -> Self {
        Self {
            loaded: 0,
            failed: 0,
            skipped: count,
            success: true,
        }
    }

    /// 超时结果：已完成的目标计入 `loaded`，其余全部计为失败
    fn timed_out(total: usize, loaded: usize) -> Self {
        Self {
            loaded,
            failed: total.saturating_sub(loaded),
            skipped: 0,
            success: false,
        }
    }
}

pub struct WarmupManager {
    config: WarmupConfig,
}

impl WarmupManager {
    pub fn new(config: WarmupConfig) -> Self {
        Self { config }
    }

    /// 执行预热
    ///
    /// 单个目标失败只计数和记录日志；总超时后返回失败结果，已完成的写入保留
    pub async fn run(&self, service: &MessageService) -> WarmupResult {
        let targets = &self.config.targets;
        info!(
            "Starting cache warmup: enabled={}, targets={}",
            self.config.enabled,
            targets.len()
        );

        if !self.config.enabled {
            info!("Cache warmup is disabled, skipping");
            return WarmupResult::skipped(targets.len());
        }

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let loaded = AtomicUsize::new(0);
        match tokio::time::timeout(timeout, Self::warmup_inner(service, targets, &loaded)).await {
            Ok(result) => {
                info!(
                    "Cache warmup completed: loaded={}, failed={}, skipped={}",
                    result.loaded, result.failed, result.skipped
                );
                result
            }
            Err(_) => {
                warn!(
                    "Cache warmup timed out after {} seconds",
                    self.config.timeout_seconds
                );
                WarmupResult::timed_out(targets.len(), loaded.load(Ordering::SeqCst))
            }
        }
    }

    async fn warmup_inner(
        service: &MessageService,
        targets: &[WarmupTarget],
        loaded: &AtomicUsize,
    ) -> WarmupResult {
        let tasks = targets.iter().map(|target| async move {
            let sheet = SheetSelector::parse(&target.sheet);
            match service.refresh(&target.issuer, &sheet).await {
                Ok(refresh) => {
                    debug!(
                        "Warmed {}:{} ({:?})",
                        target.issuer, target.sheet, refresh.outcome
                    );
                    loaded.fetch_add(1, Ordering::SeqCst);
                    true
                }
                Err(e) => {
                    warn!("Failed to warm {}:{}: {}", target.issuer, target.sheet, e);
                    false
                }
            }
        });

        let failed = join_all(tasks).await.into_iter().filter(|ok| !ok).count();
        WarmupResult {
            loaded: loaded.load(Ordering::SeqCst),
            failed,
            skipped: 0,
            success: failed == 0,
        }
    }
}
