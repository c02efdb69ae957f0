//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 统一工具模块
//!
//! 提供日志初始化与Redis可用性检查等工具函数。

pub mod redaction;

use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 初始化日志
///
/// 优先使用 `RUST_LOG`，未设置时使用传入的过滤表达式。重复调用无效果。
pub fn setup_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(filter)
            .try_init()
            .ok();
    });
}

/// 检查是否跳过Redis相关测试
pub fn is_redis_available() -> bool {
    std::env::var("SHEETCACHE_SKIP_REDIS_TESTS").is_err()
}

/// 检查指定URL的Redis是否可用
pub async fn is_redis_available_url(url: &str) -> bool {
    let client = match redis::Client::open(url) {
        Ok(c) => c,
        Err(_) => return false,
    };

    matches!(
        tokio::time::timeout(
            Duration::from_secs(1),
            client.get_multiplexed_async_connection(),
        )
        .await,
        Ok(Ok(_))
    )
}
