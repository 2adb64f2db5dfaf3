// apps/xr_cli/src/commands/gemm.rs

//! 矩阵乘累加命令

use super::common::{check_agreement, report_timing, time_min, Outcome, RunContext};
use anyhow::Result;
use clap::Args;
use tracing::info;
use xr_blas::{exgemm, reference, verify, DataGenerator, MatrixView, MatrixViewMut};
use xr_config::AlgorithmChoice;

/// 矩阵乘参数
#[derive(Args)]
pub struct GemmArgs {
    /// A 与 C 的行数
    #[arg(short, default_value_t = 128)]
    pub m: usize,

    /// B 与 C 的列数
    #[arg(short, default_value_t = 128)]
    pub n: usize,

    /// A 的列数（B 的行数）
    #[arg(short, default_value_t = 128)]
    pub k: usize,

    /// 元素的指数跨度
    #[arg(long, default_value_t = 40)]
    pub range: i32,

    /// 只运行指定算法
    #[arg(short, long)]
    pub algorithm: Option<String>,

    /// 计时迭代次数
    #[arg(short, long, default_value_t = 1)]
    pub iterations: usize,

    /// 随机种子
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
}

/// 执行矩阵乘命令
pub fn execute(args: GemmArgs, ctx: &RunContext) -> Result<()> {
    let (m, n, k) = (args.m, args.n, args.k);
    info!(m, n, k, "=== exgemm ===");

    let mut gen = DataGenerator::new(args.seed);
    let a = gen.fp_uniform(m * k, args.range, 0);
    let b = gen.fp_uniform(k * n, args.range, 0);
    let c0 = gen.fp_uniform(m * n, args.range, 0);
    let a_view = MatrixView::row_major(&a, m, k)?;
    let b_view = MatrixView::row_major(&b, k, n)?;

    let mut outcomes = Vec::new();
    for algorithm in ctx.algorithms(args.algorithm.as_deref())? {
        let (value, time) = match algorithm {
            AlgorithmChoice::Standard => time_min(args.iterations, || {
                let mut c = c0.to_vec();
                reference::gemm(m, n, k, &a, &b, &mut c);
                Ok(c)
            })?,
            AlgorithmChoice::Exact(mode) => {
                let driver = ctx.config.driver(mode)?;
                time_min(args.iterations, || {
                    let mut c = c0.to_vec();
                    exgemm(&driver, &a_view, &b_view, &mut MatrixViewMut::row_major(&mut c, m, n)?)?;
                    Ok(c)
                })?
            }
        };
        outcomes.push(Outcome { algorithm, value, time });
    }

    // 以第一个可复现结果为基准报告普通实现的偏差
    let baseline = outcomes
        .iter()
        .find(|o| o.algorithm.is_exact())
        .map(|o| o.value.clone());
    let bytes = (m * k + k * n + 2 * m * n) * std::mem::size_of::<f64>();
    report_timing(&outcomes, bytes, |c: &Vec<f64>| match &baseline {
        Some(base) => format!(
            "相对误差 {:.3e}",
            verify::relative_inf_error(c, base).unwrap_or(f64::NAN)
        ),
        None => String::from("-"),
    });
    check_agreement(&outcomes)
}
