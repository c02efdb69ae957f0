//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了翻译缓存的运行时计数指标。

use lazy_static::lazy_static;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// 指标收集器
///
/// key: "category:event"，例如 "cache:hit"、"revalidation:triggered"
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub counters: Arc<Mutex<BTreeMap<String, u64>>>,
}

lazy_static! {
    /// 全局指标实例
    pub static ref GLOBAL_METRICS: Metrics = Metrics::default();
}

impl Metrics {
    /// 计数加一
    ///
    /// # 参数
    ///
    /// * `category` - 类别（cache/revalidation/source/lock）
    /// * `event` - 事件（hit/miss/triggered/skipped/fetch/timeout 等）
    pub fn record(&self, category: &str, event: &str) {
        let key = format!("{}:{}", category, event);
        // 指标写入不应让调用方失败，锁中毒时沿用内部数据
        let mut map = match self.counters.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        *map.entry(key).or_insert(0) += 1;
    }

    /// 读取单个计数
    pub fn get(&self, category: &str, event: &str) -> u64 {
        let key = format!("{}:{}", category, event);
        match self.counters.lock() {
            Ok(map) => map.get(&key).copied().unwrap_or(0),
            Err(poisoned) => poisoned.into_inner().get(&key).copied().unwrap_or(0),
        }
    }

    /// 当前全部计数的快照
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        match self.counters.lock() {
            Ok(map) => map.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// 获取指标字符串
///
/// 每行一条，格式与 Prometheus 文本格式兼容
pub fn get_metrics_string() -> String {
    let mut output = String::new();
    for (key, value) in GLOBAL_METRICS.snapshot() {
        let (category, event) = key.split_once(':').unwrap_or((key.as_str(), ""));
        output.push_str(&format!(
            "i18n_events_total{{category=\"{}\", event=\"{}\"}} {}\n",
            category, event, value
        ));
    }
    output
}
