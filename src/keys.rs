//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存键布局。

use crate::source::SheetSelector;

/// 一个 (issuer, sheet) 组合涉及的全部键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    pub issuer: String,
    pub sheet: SheetSelector,
    /// 消息字典：`i18n:{issuer}:{sheet}`
    pub value: String,
    /// 最近一次的变更令牌：`i18n:{issuer}:etag`
    pub etag: String,
    /// 单飞标记：`i18n:{issuer}:revalidating`
    pub marker: String,
    /// 分布式锁：`locks:i18n:{issuer}:{sheet}`
    pub lock: String,
}

impl CacheKeys {
    pub fn new(issuer: &str, sheet: &SheetSelector) -> Self {
        Self {
            issuer: issuer.to_string(),
            sheet: sheet.clone(),
            value: format!("i18n:{}:{}", issuer, sheet),
            etag: format!("i18n:{}:etag", issuer),
            marker: format!("i18n:{}:revalidating", issuer),
            lock: format!("locks:i18n:{}:{}", issuer, sheet),
        }
    }
}
