//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 列出已配置的租户。

use crate::config::Config;
use anyhow::Result;

pub fn execute(config: &Config) -> Result<()> {
    let issuers = config.issuers();
    if issuers.is_empty() {
        println!("No issuers configured");
        return Ok(());
    }
    for issuer in issuers {
        println!("{}", issuer);
    }
    Ok(())
}
