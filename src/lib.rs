//! sheetcache - 基于表格数据源的多租户翻译缓存
//!
//! 提供 stale-while-revalidate 读取、单飞后台刷新与分布式锁保护的重新验证，
//! 支持进程内与 Redis 两种缓存后端。

#![doc(html_root_url = "https://docs.rs/sheetcache/0.1.0")]

pub use serde;
pub use serde_json;
pub use tokio;

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod keys;
pub mod lock;
pub mod manager;
pub mod messages;
pub mod metrics;
pub mod query;
pub mod service;
pub mod source;
pub mod utils;
pub mod warmup;

// Re-export commonly used items
pub use config::Config;
pub use error::{I18nError, Result};
pub use manager::{build_service, build_service_with_source};
pub use messages::Messages;
pub use query::MessagesQuery;
pub use service::{MessageService, Refresh, RefreshOutcome};
pub use source::{DataSource, Row, SheetSelector};
pub use warmup::{WarmupManager, WarmupResult};

/// sheetcache 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
