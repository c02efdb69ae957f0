//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了翻译缓存系统的错误类型和处理机制。

use thiserror::Error;

/// 翻译缓存系统错误类型枚举
///
/// 区分客户端错误（未知租户/工作表）、数据源错误、锁超时和后端故障，
/// 以便调用方决定是直接返回还是仅记录日志
#[derive(Error, Debug)]
pub enum I18nError {
    /// 配置错误，启动阶段致命
    #[error("Configuration error: {0}")]
    Config(String),

    /// 请求参数不合法
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 未知的租户（issuer）
    #[error("Invalid issuer: {issuer}. Available issuers are: {}", .available.join(", "))]
    UnknownIssuer {
        issuer: String,
        available: Vec<String>,
    },

    /// 数据源中不存在的资源（表格或工作表）
    #[error("Not found: {0}")]
    NotFound(String),

    /// 数据源暂时性错误（网络、配额）
    #[error("Data source error: {0}")]
    Source(String),

    /// 数据源认证失败
    #[error("Authentication error: {0}")]
    Auth(String),

    /// 在超时时间内未能获取锁
    #[error("Lock timeout: could not acquire '{name}' within {waited_ms}ms")]
    LockTimeout { name: String, waited_ms: u64 },

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Redis错误
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// 后端错误
    #[error("Backend error: {0}")]
    BackendError(String),

    /// 超时错误
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl I18nError {
    /// 是否为客户端错误（无需重试，直接返回给调用方）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            I18nError::InvalidRequest(_) | I18nError::UnknownIssuer { .. } | I18nError::NotFound(_)
        )
    }
}

impl From<serde_json::Error> for I18nError {
    fn from(e: serde_json::Error) -> Self {
        I18nError::Serialization(e.to_string())
    }
}

/// 操作结果类型别名
pub type Result<T> = std::result::Result<T, I18nError>;
