use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use srg_remap::cli::{self, Command};

/// Legacy Namespace Remapper
///
/// SRG 映射驱动的 Java 源码迁移工具，默认输出人类可读格式
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// 输出 JSON 格式 (默认输出人类可读格式)
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./srg-remap.yml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志 (stderr only, stdout carries the command output)
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    cli::handle_command(args.command, args.json, args.config.as_deref())
}
