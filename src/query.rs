//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 消息查询参数的解析与校验。

use crate::error::{I18nError, Result};
use crate::source::SheetSelector;

/// 与辅助键冲突的工作表名
const RESERVED_SHEET_NAMES: &[&str] = &["etag", "revalidating"];

/// 一次消息读取请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagesQuery {
    pub issuer: String,
    pub sheet: SheetSelector,
    /// 需要的语言子集，`None` 表示全部
    pub langs: Option<Vec<String>>,
    /// 强制刷新
    pub revalidate: bool,
}

impl MessagesQuery {
    pub fn new(issuer: impl Into<String>, sheet: SheetSelector) -> Self {
        Self {
            issuer: issuer.into(),
            sheet,
            langs: None,
            revalidate: false,
        }
    }

    pub fn with_langs<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.langs = Some(langs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_revalidate(mut self, revalidate: bool) -> Self {
        self.revalidate = revalidate;
        self
    }

    /// 从原始查询字符串参数解析
    ///
    /// # 参数
    ///
    /// * `issuer` - 租户，必填
    /// * `sheet_name` - 工作表名或 `all`，必填
    /// * `langs` - 逗号分隔的语言列表
    /// * `revalidate` - `true`/`1`/`yes` 视为真（不区分大小写）
    pub fn parse(
        issuer: Option<&str>,
        sheet_name: Option<&str>,
        langs: Option<&str>,
        revalidate: Option<&str>,
    ) -> Result<Self> {
        let issuer = required("issuer", issuer)?;
        let sheet_name = required("sheetName", sheet_name)?;
        if RESERVED_SHEET_NAMES.contains(&sheet_name) {
            return Err(I18nError::InvalidRequest(format!(
                "sheetName '{}' is reserved",
                sheet_name
            )));
        }

        let langs = langs.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        Ok(Self {
            issuer: issuer.to_string(),
            sheet: SheetSelector::parse(sheet_name),
            langs,
            revalidate: revalidate.map(parse_flag).unwrap_or(false),
        })
    }
}

fn required<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(I18nError::InvalidRequest(format!("{} is required", name))),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}
