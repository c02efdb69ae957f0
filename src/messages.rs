//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了表格行到多语言消息字典的转换以及按语言过滤。

use crate::source::Row;
use std::collections::BTreeMap;

/// 基础（参考）语言
pub const BASE_LANGUAGE: &str = "en";

/// 语言 -> (消息键 -> 译文)
pub type Messages = BTreeMap<String, BTreeMap<String, String>>;

/// 将表格行转换为多语言字典
///
/// 行布局：`[key, en, <保留列>, lang_0, lang_1, ...]`，语言顺序与
/// `supported_languages` 一致。首列为空的行被忽略，空单元格不写入。
pub fn serialize(rows: &[Row], supported_languages: &[String]) -> Messages {
    let mut res: Messages = std::iter::once(BASE_LANGUAGE.to_string())
        .chain(supported_languages.iter().cloned())
        .map(|lang| (lang, BTreeMap::new()))
        .collect();

    for row in rows {
        let key = match row.first() {
            Some(k) if !k.is_empty() => k,
            _ => continue,
        };

        if let Some(base) = row.get(1).filter(|v| !v.is_empty()) {
            insert(&mut res, BASE_LANGUAGE, key, base);
        }
        for (i, lang) in supported_languages.iter().enumerate() {
            if let Some(value) = row.get(3 + i).filter(|v| !v.is_empty()) {
                insert(&mut res, lang, key, value);
            }
        }
    }

    res
}

fn insert(messages: &mut Messages, lang: &str, key: &str, value: &str) {
    if let Some(dict) = messages.get_mut(lang) {
        dict.insert(key.to_string(), value.to_string());
    }
}

/// 按请求的语言过滤
///
/// `None` 时原样返回；否则返回基础语言加上请求的语言。
/// 请求了不存在的语言时结果中只是缺少该语言，不视为错误。
pub fn filter(messages: &Messages, langs: Option<&[String]>) -> Messages {
    let langs = match langs {
        Some(l) => l,
        None => return messages.clone(),
    };

    std::iter::once(BASE_LANGUAGE)
        .chain(langs.iter().map(String::as_str))
        .filter_map(|lang| {
            messages
                .get(lang)
                .map(|dict| (lang.to_string(), dict.clone()))
        })
        .collect()
}
