//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了消息读取命令的实现。

use crate::cli::{MessagesArgs, ReadMode};
use crate::config::Config;
use crate::manager::build_service;
use crate::query::MessagesQuery;
use anyhow::{Context, Result};

pub async fn execute(config: &Config, args: &MessagesArgs) -> Result<()> {
    let query = MessagesQuery::parse(
        args.issuer.as_deref(),
        args.sheet.as_deref(),
        args.langs.as_deref(),
        args.revalidate.as_deref(),
    )?;
    let service = build_service(config).await?;

    let result = match args.mode {
        ReadMode::Strict => service.get_messages(&query).await,
        ReadMode::Swr => service.get_messages_swr(&query).await,
    };
    // 让已触发的后台刷新在退出前完成
    service
        .shutdown(config.revalidation.lock_options().acquire_timeout)
        .await;

    let messages = result?;
    let output = serde_json::to_string_pretty(&messages).context("Failed to render messages")?;
    println!("{}", output);

    if args.metrics {
        eprint!("{}", crate::metrics::get_metrics_string());
    }
    Ok(())
}
