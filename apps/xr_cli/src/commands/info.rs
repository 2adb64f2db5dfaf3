// apps/xr_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示系统、布局、可用模式和生效配置。

use super::common::RunContext;
use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use xr_blas::{exsum, DataGenerator, VectorView};
use xr_core::fpe::DISTILL_INTERVAL;
use xr_core::superacc::{CARRY_FREE_BUDGET, DIGITS};
use xr_core::ReductionMode;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 显示系统信息
    #[arg(long)]
    pub system: bool,

    /// 显示生效配置 (JSON)
    #[arg(long)]
    pub config: bool,

    /// 用每个模式对一小组数据求和，输出驱动指标
    #[arg(long)]
    pub check: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs, ctx: &RunContext) -> Result<()> {
    info!("=== XR 信息 ===");

    let show_all = !args.system && !args.config && !args.check;
    if args.system || show_all {
        print_system_info();
        println!();
        print_layout(ctx)?;
    }
    if args.config || show_all {
        println!();
        println!("=== 生效配置 ===");
        println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    }
    if args.check {
        run_check(ctx)?;
    }
    Ok(())
}

fn print_system_info() {
    println!("=== 系统信息 ===");
    println!("XR CLI 版本: {}", env!("CARGO_PKG_VERSION"));
    println!("目标平台: {}", std::env::consts::ARCH);
    println!("操作系统: {}", std::env::consts::OS);
    println!("rayon 全局线程数: {}", rayon::current_num_threads());

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("fma") {
            println!("CPU 特性: FMA 可用");
        } else {
            println!("CPU 特性: 无硬件 FMA，two_product_fma 走软件路径");
        }
    }
}

fn print_layout(ctx: &RunContext) -> Result<()> {
    let layout = ctx.config.layout.build()?;
    println!("=== 超累加器布局 ===");
    println!("指数范围: [{}, {}]", layout.floor(), layout.ceiling());
    println!("bin 数: {} (每 bin {} 位数字)", layout.bins(), DIGITS);
    let products = layout.widened_for_products();
    println!(
        "乘积布局: [{}, {}]，{} 个 bin",
        products.floor(),
        products.ceiling(),
        products.bins()
    );
    println!("免进位累加次数: {}", CARRY_FREE_BUDGET);
    println!("浮点展开蒸馏间隔: {}", DISTILL_INTERVAL);
    println!();
    println!("=== 可用模式 ===");
    for mode in ReductionMode::all() {
        let marker = if mode == ReductionMode::default() { " (默认)" } else { "" };
        println!("  {}{}", mode, marker);
    }
    Ok(())
}

fn run_check(ctx: &RunContext) -> Result<()> {
    let data = DataGenerator::new(7).fp_uniform(1 << 16, 200, 100);
    let x = VectorView::contiguous(&data);
    println!("=== 自检 ===");
    let mut reference = None;
    for mode in ReductionMode::all() {
        let driver = ctx.config.driver(mode)?;
        let value = exsum(&driver, &x).with_context(|| format!("模式 {} 求和失败", mode))?;
        let first = *reference.get_or_insert(value);
        anyhow::ensure!(
            value.to_bits() == first.to_bits(),
            "模式 {} 的结果 {:e} 与 {:e} 不一致",
            mode,
            value,
            first
        );
        println!(
            "  {:<8} {:+.17e}  {}",
            mode.to_string(),
            value,
            serde_json::to_string(&driver.metrics().snapshot())?
        );
    }
    Ok(())
}
