// apps/xr_cli/src/commands/dot.rs

//! 点积命令

use super::common::{check_agreement, describe_f64, report_timing, time_min, DataArgs, Outcome, RunContext};
use anyhow::Result;
use clap::Args;
use tracing::info;
use xr_blas::{exdot, reference, DataGenerator, VectorView};
use xr_config::AlgorithmChoice;

/// 点积参数
#[derive(Args)]
pub struct DotArgs {
    /// 向量长度的以 2 为底的对数
    #[arg(short = 'n', long = "log2n", default_value_t = 20)]
    pub log2n: u32,

    /// 只运行指定算法
    #[arg(short, long)]
    pub algorithm: Option<String>,

    /// 计时迭代次数
    #[arg(short, long, default_value_t = 1)]
    pub iterations: usize,

    #[command(flatten)]
    pub data: DataArgs,
}

/// 执行点积命令
pub fn execute(args: DotArgs, ctx: &RunContext) -> Result<()> {
    let n = 1usize << args.log2n;
    info!(n, dist = ?args.data.dist, range = args.data.range, "=== exdot ===");
    let mut gen = DataGenerator::new(args.data.seed);
    let a = args.data.generate(&mut gen, n);
    let b = args.data.generate(&mut gen, n);
    let (x, y) = (VectorView::contiguous(&a), VectorView::contiguous(&b));

    let mut outcomes = Vec::new();
    for algorithm in ctx.algorithms(args.algorithm.as_deref())? {
        let (value, time) = match algorithm {
            AlgorithmChoice::Standard => time_min(args.iterations, || Ok(reference::dot(&a, &b)))?,
            AlgorithmChoice::Exact(mode) => {
                let driver = ctx.config.driver(mode)?;
                time_min(args.iterations, || Ok(exdot(&driver, &x, &y)?))?
            }
        };
        outcomes.push(Outcome { algorithm, value, time });
    }

    report_timing(&outcomes, 2 * n * std::mem::size_of::<f64>(), describe_f64);
    check_agreement(&outcomes)
}
