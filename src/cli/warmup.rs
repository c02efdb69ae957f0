//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了预热命令的实现。

use crate::cli::WarmupArgs;
use crate::config::Config;
use crate::manager::build_service;
use crate::warmup::WarmupManager;
use anyhow::{bail, Result};

pub async fn execute(config: &Config, args: &WarmupArgs) -> Result<()> {
    let mut warmup_config = config.warmup.clone();
    if args.force {
        warmup_config.enabled = true;
    }

    let service = build_service(config).await?;
    println!(
        "Warming {} target(s)...",
        warmup_config.targets.len()
    );
    let result = WarmupManager::new(warmup_config).run(&service).await;
    service
        .shutdown(config.revalidation.lock_options().acquire_timeout)
        .await;

    println!("Loaded:  {}", result.loaded);
    println!("Failed:  {}", result.failed);
    println!("Skipped: {}", result.skipped);
    if !result.success {
        bail!("Warmup finished with {} failure(s)", result.failed);
    }
    Ok(())
}
