//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了表格数据源接口。

pub mod auth;
pub mod google;

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

pub use self::google::GoogleSheetsSource;

/// 表格中的一行：`[key, en, 保留列, 各支持语言...]`
pub type Row = Vec<String>;

/// 工作表选择器
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SheetSelector {
    /// 全部工作表拼接
    All,
    Named(String),
}

impl SheetSelector {
    pub const ALL: &'static str = "all";

    pub fn parse(raw: &str) -> Self {
        if raw == Self::ALL {
            SheetSelector::All
        } else {
            SheetSelector::Named(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SheetSelector::All => Self::ALL,
            SheetSelector::Named(name) => name,
        }
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 数据源特征
///
/// 重试与退避由实现负责，调用方不重试。
/// 未知的租户或工作表返回 `I18nError::NotFound`，暂时性故障返回 `I18nError::Source`。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataSource: Send + Sync {
    /// 已配置的租户，已排序
    fn tenants(&self) -> Vec<String>;

    /// 读取原始行
    async fn fetch_rows(&self, tenant: &str, sheet: &SheetSelector) -> Result<Vec<Row>>;

    /// 读取租户的变更令牌
    async fn fetch_change_token(&self, tenant: &str) -> Result<String>;
}
