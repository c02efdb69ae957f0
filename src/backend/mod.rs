//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存适配器接口及其进程内与Redis两种后端实现。

pub mod memory;
pub mod redis_store;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use self::memory::MemoryBackend;
pub use self::redis_store::RedisBackend;

/// 缓存适配器特征
///
/// 进程内后端与共享后端实现完全相同的语义，所有写入都是整体替换
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    /// 获取缓存值，已过期的条目视为不存在
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 无条件写入，`ttl` 为 `None` 表示永不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// 原子地仅在键不存在时写入
    ///
    /// # 返回值
    ///
    /// 本次调用创建了条目时返回 true；已有值时返回 false 且不修改原值
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool>;

    /// 替换已有键的过期时间，不修改值；键不存在时不做任何事。
    /// `ttl` 为零时键立即过期。
    async fn refresh_expiry(&self, key: &str, ttl: Duration) -> Result<()>;

    /// 删除缓存项
    async fn delete(&self, key: &str) -> Result<()>;

    /// 后端名称，用于日志
    fn backend_name(&self) -> &'static str;
}

/// 锁原语特征
///
/// 由共享后端实现，`DistributedLock` 在其上实现重试与超时
#[async_trait]
pub trait LockBackend: Send + Sync {
    /// 尝试获取锁（SET NX PX 语义）
    async fn try_lock(&self, key: &str, token: &str, lease: Duration) -> Result<bool>;

    /// 仅当锁仍由 `token` 持有时释放
    async fn unlock(&self, key: &str, token: &str) -> Result<bool>;
}
