//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::config::Config;
use crate::utils::setup_logging;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sheetcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        default_value = "sheetcache.toml",
        help = "Path to the TOML configuration file"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "messages", about = "Read translated messages for an issuer and sheet")]
    Messages(MessagesArgs),

    #[command(name = "issuers", about = "List configured issuers")]
    Issuers,

    #[command(name = "warmup", about = "Refresh the configured warmup targets")]
    Warmup(WarmupArgs),
}

/// 读取模式
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// 命中即返回，不检查变更令牌
    Strict,
    /// 命中即返回，并在后台按令牌重新验证
    #[default]
    Swr,
}

#[derive(Parser, Debug)]
pub struct MessagesArgs {
    #[arg(short, long, help = "Issuer (tenant)")]
    pub issuer: Option<String>,

    #[arg(short, long, help = "Sheet name, or 'all'")]
    pub sheet: Option<String>,

    #[arg(short, long, help = "Comma-separated language subset")]
    pub langs: Option<String>,

    #[arg(short, long, help = "Force a refresh (true/1/yes)")]
    pub revalidate: Option<String>,

    #[arg(short, long, value_enum, default_value_t = ReadMode::Swr)]
    pub mode: ReadMode,

    #[arg(long, help = "Print the counters recorded during the read to stderr")]
    pub metrics: bool,
}

#[derive(Parser, Debug)]
pub struct WarmupArgs {
    #[arg(long, help = "Run even if warmup is disabled in the configuration")]
    pub force: bool,
}

mod issuers;
mod messages;
mod warmup;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    setup_logging(&config.logging.filter);

    match &cli.command {
        Commands::Messages(args) => messages::execute(&config, args).await,
        Commands::Issuers => issuers::execute(&config),
        Commands::Warmup(args) => warmup::execute(&config, args).await,
    }
}
