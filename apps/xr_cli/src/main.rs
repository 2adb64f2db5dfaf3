// apps/xr_cli/src/main.rs

//! XR 命令行界面
//!
//! 对同一组合成数据依次运行普通 IEEE 归约与全部可复现模式，
//! 检查可复现结果逐位一致并报告耗时。
//!
//! # 架构层级
//!
//! 本模块属于 **Layer 6: Application**：
//! - 通过 `ReductionConfig` 获取布局、并行策略与线程数
//! - 通过 `AlgorithmChoice` 选择算法，模式到累加器类型的分发在驱动内部完成

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// 可复现浮点归约命令行工具
#[derive(Parser)]
#[command(name = "xr_cli")]
#[command(author = "XR Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reproducible, correctly rounded floating-point reductions", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// 归约配置文件 (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 专用线程池线程数，覆盖配置文件
    #[arg(short, long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 向量求和
    Sum(commands::sum::SumArgs),
    /// 点积
    Dot(commands::dot::DotArgs),
    /// 三角求解
    Trsv(commands::trsv::TrsvArgs),
    /// 矩阵乘累加
    Gemm(commands::gemm::GemmArgs),
    /// 显示布局、模式与系统信息
    Info(commands::info::InfoArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ctx = commands::common::RunContext::load(cli.config.as_deref(), cli.threads)?;

    match cli.command {
        Commands::Sum(args) => commands::sum::execute(args, &ctx),
        Commands::Dot(args) => commands::dot::execute(args, &ctx),
        Commands::Trsv(args) => commands::trsv::execute(args, &ctx),
        Commands::Gemm(args) => commands::gemm::execute(args, &ctx),
        Commands::Info(args) => commands::info::execute(args, &ctx),
    }
}
