// apps/xr_cli/src/commands/sum.rs

//! 求和命令

use super::common::{check_agreement, describe_f64, report_timing, time_min, DataArgs, Outcome, RunContext};
use anyhow::Result;
use clap::Args;
use tracing::info;
use xr_blas::{exsum, reference, DataGenerator, VectorView};
use xr_config::AlgorithmChoice;

/// 求和参数
#[derive(Args)]
pub struct SumArgs {
    /// 数据量的以 2 为底的对数
    #[arg(short = 'n', long = "log2n", default_value_t = 20)]
    pub log2n: u32,

    /// 只运行指定算法（如 standard, superacc, fpe4ee）
    #[arg(short, long)]
    pub algorithm: Option<String>,

    /// 计时迭代次数
    #[arg(short, long, default_value_t = 1)]
    pub iterations: usize,

    #[command(flatten)]
    pub data: DataArgs,
}

/// 执行求和命令
pub fn execute(args: SumArgs, ctx: &RunContext) -> Result<()> {
    let n = 1usize << args.log2n;
    info!(n, dist = ?args.data.dist, range = args.data.range, "=== exsum ===");
    let data = args.data.generate(&mut DataGenerator::new(args.data.seed), n);
    let x = VectorView::contiguous(&data);

    let mut outcomes = Vec::new();
    for algorithm in ctx.algorithms(args.algorithm.as_deref())? {
        let (value, time) = match algorithm {
            AlgorithmChoice::Standard => time_min(args.iterations, || Ok(reference::sum(&data)))?,
            AlgorithmChoice::Exact(mode) => {
                let driver = ctx.config.driver(mode)?;
                time_min(args.iterations, || Ok(exsum(&driver, &x)?))?
            }
        };
        outcomes.push(Outcome { algorithm, value, time });
    }

    report_timing(&outcomes, n * std::mem::size_of::<f64>(), describe_f64);
    check_agreement(&outcomes)
}
