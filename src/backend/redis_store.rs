//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Redis的共享缓存后端，同时提供分布式锁原语。

use super::{CacheAdapter, LockBackend};
use crate::config::{RedisConfig, RedisMode};
use crate::error::{I18nError, Result};
use crate::utils::redaction::redact_connection_string;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client, FromRedisValue};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

/// 比较令牌后删除，保证只释放自己持有的锁
const UNLOCK_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Redis缓存后端
#[derive(Clone)]
pub enum RedisBackend {
    Standalone {
        manager: ConnectionManager,
        command_timeout_ms: u64,
    },
    Cluster {
        client: redis::cluster::ClusterClient,
        command_timeout_ms: u64,
    },
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standalone { .. } => write!(f, "RedisBackend::Standalone"),
            Self::Cluster { .. } => write!(f, "RedisBackend::Cluster"),
        }
    }
}

impl RedisBackend {
    /// 根据配置建立连接
    ///
    /// # 参数
    ///
    /// * `config` - Redis配置
    ///
    /// # 返回值
    ///
    /// 返回已验证可用的后端实例或错误
    #[instrument(skip(config), level = "info", name = "init_redis_backend", fields(mode = ?config.mode))]
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let connect_timeout = Duration::from_millis(config.connection_timeout_ms);
        let backend = match config.mode {
            RedisMode::Standalone => {
                let raw = config.connection_string.expose_secret();
                let url = if config.enable_tls && !raw.starts_with("rediss://") {
                    raw.replace("redis://", "rediss://")
                } else {
                    raw.to_string()
                };

                let client = Client::open(url.as_str())?;
                let manager = timeout(connect_timeout, client.get_connection_manager())
                    .await
                    .map_err(|_| {
                        I18nError::BackendError(format!(
                            "Connection timed out after {}ms. Target: {}",
                            config.connection_timeout_ms,
                            redact_connection_string(&url)
                        ))
                    })??;
                RedisBackend::Standalone {
                    manager,
                    command_timeout_ms: config.command_timeout_ms,
                }
            }
            RedisMode::Cluster => {
                let nodes = config
                    .cluster
                    .as_ref()
                    .map(|c| c.nodes.clone())
                    .ok_or_else(|| {
                        I18nError::Config("Cluster configuration is missing".to_string())
                    })?;

                let mut builder = redis::cluster::ClusterClient::builder(nodes);
                if let Some(password) = &config.password {
                    builder = builder.password(password.expose_secret().to_string());
                }
                let client = builder.build()?;

                timeout(connect_timeout, client.get_async_connection())
                    .await
                    .map_err(|_| {
                        I18nError::BackendError(format!(
                            "Cluster connection timed out after {}ms",
                            config.connection_timeout_ms
                        ))
                    })??;
                RedisBackend::Cluster {
                    client,
                    command_timeout_ms: config.command_timeout_ms,
                }
            }
        };

        backend.ping().await?;
        info!("Redis backend ready: {:?}", backend);
        Ok(backend)
    }

    fn command_timeout(&self) -> Duration {
        match self {
            RedisBackend::Standalone {
                command_timeout_ms, ..
            }
            | RedisBackend::Cluster {
                command_timeout_ms, ..
            } => Duration::from_millis(*command_timeout_ms),
        }
    }

    /// 在当前模式的连接上执行命令，受命令超时约束
    async fn query<T: FromRedisValue + Send>(&self, cmd: &redis::Cmd) -> Result<T> {
        let fut = async {
            let res: redis::RedisResult<T> = match self {
                RedisBackend::Standalone { manager, .. } => {
                    let mut conn = manager.clone();
                    cmd.query_async(&mut conn).await
                }
                RedisBackend::Cluster { client, .. } => {
                    let mut conn = client.get_async_connection().await?;
                    cmd.query_async(&mut conn).await
                }
            };
            res
        };
        match timeout(self.command_timeout(), fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(I18nError::Timeout(format!(
                "Redis command timed out after {}ms",
                self.command_timeout().as_millis()
            ))),
        }
    }

    async fn invoke<T: FromRedisValue + Send>(&self, invocation: &redis::ScriptInvocation<'_>) -> Result<T> {
        let fut = async {
            let res: redis::RedisResult<T> = match self {
                RedisBackend::Standalone { manager, .. } => {
                    let mut conn = manager.clone();
                    invocation.invoke_async(&mut conn).await
                }
                RedisBackend::Cluster { client, .. } => {
                    let mut conn = client.get_async_connection().await?;
                    invocation.invoke_async(&mut conn).await
                }
            };
            res
        };
        match timeout(self.command_timeout(), fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(I18nError::Timeout(format!(
                "Redis script timed out after {}ms",
                self.command_timeout().as_millis()
            ))),
        }
    }

    /// 检查连接是否正常
    #[instrument(skip(self), level = "debug")]
    pub async fn ping(&self) -> Result<()> {
        let response: String = self.query(&redis::cmd("PING")).await?;
        debug!("Redis ping response: {}", response);
        Ok(())
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PX 不接受 0，最小按 1ms 处理
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl CacheAdapter for RedisBackend {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    #[instrument(skip(self, value), level = "debug", fields(value_len = value.len()))]
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: Option<String> = self.query(&cmd).await?;
        Ok(())
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let result: Option<String> = self.query(&cmd).await?;
        debug!("set_if_absent: key={}, created={}", key, result.is_some());
        Ok(result.is_some())
    }

    #[instrument(skip(self), level = "debug")]
    async fn refresh_expiry(&self, key: &str, ttl: Duration) -> Result<()> {
        // PEXPIRE 0 会立即删除键；键不存在时返回 0
        let _: bool = self
            .query(redis::cmd("PEXPIRE").arg(key).arg(ttl.as_millis() as u64))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<()> {
        let _: i64 = self.query(redis::cmd("DEL").arg(key)).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[async_trait]
impl LockBackend for RedisBackend {
    /// 使用 SET NX PX 实现
    #[instrument(skip(self), level = "debug")]
    async fn try_lock(&self, key: &str, token: &str, lease: Duration) -> Result<bool> {
        let result: Option<String> = self
            .query(
                redis::cmd("SET")
                    .arg(key)
                    .arg(token)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_millis(lease)),
            )
            .await?;
        debug!("Lock attempt: key={}, acquired={}", key, result.is_some());
        Ok(result.is_some())
    }

    /// 使用 Lua 脚本保证原子性
    #[instrument(skip(self), level = "debug")]
    async fn unlock(&self, key: &str, token: &str) -> Result<bool> {
        let script = redis::Script::new(UNLOCK_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation.key(key).arg(token);
        let result: i32 = self.invoke(&invocation).await?;
        Ok(result == 1)
    }
}
