//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了翻译缓存服务的配置结构和解析逻辑。

use crate::error::{I18nError, Result};
use crate::lock::LockOptions;
use crate::messages::BASE_LANGUAGE;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub revalidation: RevalidationConfig,
    #[serde(default)]
    pub warmup: WarmupConfig,
}

/// 日志配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter 过滤表达式，`RUST_LOG` 优先
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// 服务账号凭据
#[derive(Deserialize, Clone, Debug)]
pub struct CredentialsConfig {
    pub client_email: String,
    pub private_key: SecretString,
}

/// 表格数据源配置
///
/// 每个租户（issuer）映射到一个表格ID
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SheetsConfig {
    /// 服务账号凭据
    pub credentials: Option<CredentialsConfig>,
    /// issuer -> spreadsheet id
    pub spreadsheet_ids: BTreeMap<String, String>,
    /// 除基础语言外支持的语言，顺序与表格列顺序一致
    pub supported_languages: Vec<String>,
    /// 每个工作表读取的单元格范围
    pub range: String,
    /// 读取全部工作表时每批的工作表数量
    pub batch_size: usize,
    /// 单次请求超时（毫秒）
    pub request_timeout_ms: u64,
    /// 暂时性错误的最大重试次数
    pub max_retries: u32,
    /// 重试退避基准时间（毫秒）
    pub retry_backoff_ms: u64,
    pub sheets_base_url: String,
    pub drive_base_url: String,
    pub token_url: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            spreadsheet_ids: BTreeMap::new(),
            supported_languages: Vec::new(),
            range: "C2:T".to_string(),
            batch_size: 5,
            request_timeout_ms: 5000,
            max_retries: 3,
            retry_backoff_ms: 500,
            sheets_base_url: "https://sheets.googleapis.com/v4".to_string(),
            drive_base_url: "https://www.googleapis.com/drive/v2".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

/// 缓存后端类型
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    /// 进程内缓存，不跨进程共享
    #[default]
    Memory,
    /// Redis 共享缓存，启用分布式锁
    Redis,
}

/// 缓存配置
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendType,
    pub memory: MemoryConfig,
    pub redis: Option<RedisConfig>,
}

/// 进程内缓存配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct MemoryConfig {
    /// 最大条目数
    pub max_capacity: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_capacity: 10000 }
    }
}

/// Redis配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis模式
    pub mode: RedisMode,
    /// 连接字符串
    pub connection_string: SecretString,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 命令执行超时时间（毫秒）
    pub command_timeout_ms: u64,
    /// Redis 密码（集群模式使用）
    pub password: Option<SecretString>,
    /// 是否启用 TLS
    pub enable_tls: bool,
    /// 集群配置
    pub cluster: Option<ClusterConfig>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            mode: RedisMode::Standalone,
            connection_string: SecretString::new("redis://localhost:6379".to_string().into()),
            connection_timeout_ms: 5000,
            command_timeout_ms: 3000,
            password: None,
            enable_tls: false,
            cluster: None,
        }
    }
}

/// 集群配置
#[derive(Deserialize, Clone, Debug)]
pub struct ClusterConfig {
    /// 初始节点列表
    pub nodes: Vec<String>,
}

/// Redis模式枚举
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedisMode {
    /// 单机模式
    #[default]
    Standalone,
    /// 集群模式
    Cluster,
}

/// 重新验证与锁的时间参数
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RevalidationConfig {
    /// revalidating 标记的租期（秒）
    pub marker_ttl_secs: u64,
    /// 锁租期（毫秒）
    pub lock_lease_ms: u64,
    /// 获取锁的重试间隔（毫秒）
    pub lock_retry_ms: u64,
    /// 获取锁的总超时（毫秒）
    pub lock_timeout_ms: u64,
}

impl Default for RevalidationConfig {
    fn default() -> Self {
        Self {
            marker_ttl_secs: 60,
            lock_lease_ms: 60_000,
            lock_retry_ms: 10_000,
            lock_timeout_ms: 100_000,
        }
    }
}

impl RevalidationConfig {
    pub fn marker_ttl(&self) -> Duration {
        Duration::from_secs(self.marker_ttl_secs)
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            lease: Duration::from_millis(self.lock_lease_ms),
            acquire_timeout: Duration::from_millis(self.lock_timeout_ms),
            retry_interval: Duration::from_millis(self.lock_retry_ms),
        }
    }
}

/// 预热配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct WarmupConfig {
    /// 是否在启动时预热
    pub enabled: bool,
    /// 预热总超时（秒）
    pub timeout_seconds: u64,
    /// 预热目标
    pub targets: Vec<WarmupTarget>,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_seconds: 120,
            targets: Vec::new(),
        }
    }
}

/// 单个预热目标
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WarmupTarget {
    pub issuer: String,
    pub sheet: String,
}

impl FromStr for Config {
    type Err = I18nError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(s).map_err(|e| I18nError::Config(format!("Invalid TOML: {}", e)))?;
        config.validate().map_err(I18nError::Config)?;
        Ok(config)
    }
}

impl Config {
    /// 从TOML文件加载并验证配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            I18nError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        content.parse()
    }

    /// 可用的 issuer 列表（已排序）
    pub fn issuers(&self) -> Vec<String> {
        self.sheets.spreadsheet_ids.keys().cloned().collect()
    }

    /// 验证配置
    ///
    /// 缺少凭据、issuer 映射为空或选择 Redis 但未提供 Redis 配置时拒绝启动
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        // 数据源
        let credentials = match &self.sheets.credentials {
            Some(c) => c,
            None => return Err("Google Sheet configurations not complete: missing credentials".to_string()),
        };
        if credentials.client_email.trim().is_empty() {
            return Err("credentials.client_email cannot be empty".to_string());
        }
        if credentials.private_key.expose_secret().trim().is_empty() {
            return Err("credentials.private_key cannot be empty".to_string());
        }
        if self.sheets.spreadsheet_ids.is_empty() {
            return Err(
                "Google Sheet configurations not complete: spreadsheet_ids is empty".to_string(),
            );
        }
        for (issuer, id) in &self.sheets.spreadsheet_ids {
            if issuer.is_empty() || issuer.contains(':') {
                return Err(format!("Invalid issuer name '{}'", issuer));
            }
            if id.trim().is_empty() {
                return Err(format!("Spreadsheet ID for issuer '{}' is empty", issuer));
            }
        }

        let mut seen = HashSet::new();
        for lang in &self.sheets.supported_languages {
            if lang.is_empty() {
                return Err("supported_languages cannot contain empty tags".to_string());
            }
            if lang == BASE_LANGUAGE {
                return Err(format!(
                    "supported_languages must not contain the base language '{}'",
                    BASE_LANGUAGE
                ));
            }
            if !seen.insert(lang.as_str()) {
                return Err(format!("Duplicate language '{}' in supported_languages", lang));
            }
        }

        if self.sheets.batch_size == 0 || self.sheets.batch_size > 100 {
            return Err("sheets.batch_size must be between 1 and 100".to_string());
        }
        if !(100..=60000).contains(&self.sheets.request_timeout_ms) {
            return Err("sheets.request_timeout_ms must be between 100 and 60000 ms".to_string());
        }
        if self.sheets.range.trim().is_empty() {
            return Err("sheets.range cannot be empty".to_string());
        }
        if self.sheets.max_retries > 10 {
            return Err("sheets.max_retries must not exceed 10".to_string());
        }
        if self.sheets.retry_backoff_ms > 30000 {
            return Err("sheets.retry_backoff_ms must not exceed 30000 ms".to_string());
        }

        // 缓存后端
        match self.cache.backend {
            CacheBackendType::Memory => {
                if self.cache.memory.max_capacity == 0 {
                    return Err("cache.memory.max_capacity cannot be zero".to_string());
                }
            }
            CacheBackendType::Redis => {
                let redis = match &self.cache.redis {
                    Some(r) => r,
                    None => {
                        return Err(
                            "cache.backend is 'redis' but [cache.redis] is missing".to_string()
                        )
                    }
                };
                if !(100..=30000).contains(&redis.connection_timeout_ms) {
                    return Err(
                        "cache.redis.connection_timeout_ms must be between 100 and 30000 ms"
                            .to_string(),
                    );
                }
                if !(100..=60000).contains(&redis.command_timeout_ms) {
                    return Err(
                        "cache.redis.command_timeout_ms must be between 100 and 60000 ms"
                            .to_string(),
                    );
                }
                if redis.mode == RedisMode::Cluster
                    && redis.cluster.as_ref().map_or(true, |c| c.nodes.is_empty())
                {
                    return Err("Cluster mode requires cache.redis.cluster.nodes".to_string());
                }
            }
        }

        // 重新验证时间参数
        let r = &self.revalidation;
        if r.marker_ttl_secs == 0 {
            return Err("revalidation.marker_ttl_secs cannot be zero".to_string());
        }
        if r.lock_lease_ms == 0 || r.lock_retry_ms == 0 {
            return Err("revalidation lock lease and retry interval must be positive".to_string());
        }
        if r.lock_retry_ms > r.lock_timeout_ms {
            return Err(
                "revalidation.lock_retry_ms must not exceed revalidation.lock_timeout_ms"
                    .to_string(),
            );
        }

        if self.warmup.enabled {
            if self.warmup.timeout_seconds == 0 || self.warmup.timeout_seconds > 3600 {
                return Err("warmup.timeout_seconds must be between 1 and 3600".to_string());
            }
            for target in &self.warmup.targets {
                if !self.sheets.spreadsheet_ids.contains_key(&target.issuer) {
                    return Err(format!(
                        "warmup target references unknown issuer '{}'",
                        target.issuer
                    ));
                }
            }
        }

        Ok(())
    }
}
