//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了基于共享后端的分布式锁，以及无共享后端时退化使用的进程内按键互斥。

use crate::backend::LockBackend;
use crate::error::{I18nError, Result};
use crate::metrics::GLOBAL_METRICS;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// 锁参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// 租期，持有者崩溃后锁在此时间后自动失效
    pub lease: Duration,
    /// 获取锁的总超时
    pub acquire_timeout: Duration,
    /// 两次尝试之间的间隔
    pub retry_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(100),
            retry_interval: Duration::from_secs(10),
        }
    }
}

/// 已获取的锁
#[derive(Debug, Clone)]
pub struct LockHandle {
    name: String,
    token: String,
    acquired_at: Instant,
    lease: Duration,
}

impl LockHandle {
    /// 租期是否已过（过期后锁可能已被他人持有）
    pub fn is_expired(&self) -> bool {
        self.acquired_at.elapsed() >= self.lease
    }
}

/// 分布式锁
///
/// 每次获取使用唯一令牌，释放时比较令牌，租期过期后的释放是无操作
#[derive(Clone)]
pub struct DistributedLock {
    backend: Arc<dyn LockBackend>,
}

impl DistributedLock {
    pub fn new(backend: Arc<dyn LockBackend>) -> Self {
        Self { backend }
    }

    /// 获取锁
    ///
    /// 失败后按 `retry_interval` 挂起当前任务重试，直到成功或超过 `acquire_timeout`
    ///
    /// # 返回值
    ///
    /// 成功返回锁句柄，超时返回 `I18nError::LockTimeout`
    #[instrument(skip(self, options), level = "debug")]
    pub async fn acquire(&self, name: &str, options: &LockOptions) -> Result<LockHandle> {
        let token = Uuid::new_v4().to_string();
        let started = Instant::now();
        let deadline = started + options.acquire_timeout;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if self.backend.try_lock(name, &token, options.lease).await? {
                debug!("Lock acquired: name={}, attempts={}", name, attempts);
                return Ok(LockHandle {
                    name: name.to_string(),
                    token,
                    acquired_at: Instant::now(),
                    lease: options.lease,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(
                    "Lock acquisition timed out: name={}, attempts={}, waited={}ms",
                    name, attempts, waited_ms
                );
                GLOBAL_METRICS.record("lock", "timeout");
                return Err(I18nError::LockTimeout {
                    name: name.to_string(),
                    waited_ms,
                });
            }

            let wait = options.retry_interval.min(deadline - now);
            debug!("Lock busy: name={}, retry in {:?}", name, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// 释放锁
    ///
    /// 幂等：锁已过期或已被他人持有时什么都不做，后端错误只记录日志
    #[instrument(skip(self, handle), level = "debug", fields(name = %handle.name))]
    pub async fn release(&self, handle: &LockHandle) {
        match self.backend.unlock(&handle.name, &handle.token).await {
            Ok(true) => debug!("Lock released: name={}", handle.name),
            Ok(false) => debug!(
                "Lock already gone on release (lease expired: {}): name={}",
                handle.is_expired(),
                handle.name
            ),
            Err(e) => warn!("Failed to release lock {}: {}", handle.name, e),
        }
    }
}

/// 进程内按键互斥
#[derive(Default)]
pub struct KeyedMutex {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// 按键互斥的守卫
///
/// 释放时若没有其他持有者或等待者，同时移除该键的条目
pub struct KeyedGuard {
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        forget_idle(&self.locks, &self.name);
    }
}

/// 条目只剩映射自身的引用时删除；`remove_if` 持有分片锁，与并发的 `lock` 互斥
fn forget_idle(locks: &DashMap<String, Arc<Mutex<()>>>, name: &str) {
    locks.remove_if(name, |_, mutex| Arc::strong_count(mutex) == 1);
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指定键的互斥锁，超过 `wait` 返回 `LockTimeout`
    pub async fn lock(&self, name: &str, wait: Duration) -> Result<KeyedGuard> {
        let mutex = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let started = Instant::now();
        match tokio::time::timeout(wait, mutex.lock_owned()).await {
            Ok(guard) => Ok(KeyedGuard {
                name: name.to_string(),
                guard: Some(guard),
                locks: self.locks.clone(),
            }),
            Err(_) => {
                forget_idle(&self.locks, name);
                GLOBAL_METRICS.record("lock", "timeout");
                Err(I18nError::LockTimeout {
                    name: name.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    /// 当前跟踪的键数量
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// 刷新临界区的守卫
pub enum GateGuard {
    Distributed(LockHandle),
    Local(KeyedGuard),
}

/// 刷新闸门
///
/// 配置了分布式锁时跨进程串行化刷新；否则退化为进程内按键互斥
pub struct RefreshGate {
    lock: Option<DistributedLock>,
    local: KeyedMutex,
    options: LockOptions,
}

impl RefreshGate {
    pub fn new(lock: Option<DistributedLock>, options: LockOptions) -> Self {
        Self {
            lock,
            local: KeyedMutex::new(),
            options,
        }
    }

    /// 仅进程内互斥
    pub fn local(options: LockOptions) -> Self {
        Self::new(None, options)
    }

    pub fn is_distributed(&self) -> bool {
        self.lock.is_some()
    }

    /// 进入临界区
    pub async fn enter(&self, name: &str) -> Result<GateGuard> {
        match &self.lock {
            Some(lock) => Ok(GateGuard::Distributed(
                lock.acquire(name, &self.options).await?,
            )),
            None => Ok(GateGuard::Local(
                self.local.lock(name, self.options.acquire_timeout).await?,
            )),
        }
    }

    /// 离开临界区
    pub async fn leave(&self, guard: GateGuard) {
        match (guard, &self.lock) {
            (GateGuard::Distributed(handle), Some(lock)) => lock.release(&handle).await,
            (GateGuard::Distributed(handle), None) => {
                warn!("Distributed guard {} released without a lock", handle.name)
            }
            (GateGuard::Local(guard), _) => {
                drop(guard);
                debug!("Local gate released: tracked={}", self.local.len());
            }
        }
    }
}
