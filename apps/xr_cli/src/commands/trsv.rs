// apps/xr_cli/src/commands/trsv.rs

//! 三角求解命令

use super::common::{check_agreement, report_timing, time_min, Outcome, RunContext};
use anyhow::Result;
use clap::{Args, ValueEnum};
use tracing::info;
use xr_blas::{
    extrsv, extrsv_refined, reference, verify, DataGenerator, Diag, MatrixView, Transpose, Uplo,
    VectorViewMut,
};
use xr_config::AlgorithmChoice;

/// 三角部分
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UploArg {
    /// 上三角
    #[value(name = "U", alias = "u")]
    Upper,
    /// 下三角
    #[value(name = "L", alias = "l")]
    Lower,
}

impl From<UploArg> for Uplo {
    fn from(arg: UploArg) -> Self {
        match arg {
            UploArg::Upper => Uplo::Upper,
            UploArg::Lower => Uplo::Lower,
        }
    }
}

/// 三角求解参数
#[derive(Args)]
pub struct TrsvArgs {
    /// 三角部分
    #[arg(long, value_enum, default_value = "U")]
    pub uplo: UploArg,

    /// 矩阵阶数
    #[arg(short = 'n', long, default_value_t = 256)]
    pub n: usize,

    /// 右端项的指数跨度
    #[arg(long, default_value_t = 30)]
    pub range: i32,

    /// 可复现求解后再做一步迭代精化
    #[arg(long)]
    pub refine: bool,

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

/// 执行三角求解命令
pub fn execute(args: TrsvArgs, ctx: &RunContext) -> Result<()> {
    let n = args.n;
    let uplo = Uplo::from(args.uplo);
    info!(n, ?uplo, refine = args.refine, "=== extrsv ===");

    let mut gen = DataGenerator::new(args.seed);
    // 对角占优，避免随机三角矩阵的指数级病态
    let a = gen.triangular_matrix(uplo, n, n as f64);
    let b = gen.fp_uniform(n, args.range, 0);
    let view = MatrixView::row_major(&a, n, n)?;
    info!(cond = verify::triangular_condition(uplo, &view)?, "无穷范数条件数");

    let mut outcomes = Vec::new();
    for algorithm in ctx.algorithms(args.algorithm.as_deref())? {
        let (value, time) = match algorithm {
            AlgorithmChoice::Standard => {
                time_min(args.iterations, || Ok(reference::trsv(uplo, n, &a, &b)))?
            }
            AlgorithmChoice::Exact(mode) => {
                let driver = ctx.config.driver(mode)?;
                time_min(args.iterations, || {
                    let mut x = b.to_vec();
                    let mut xv = VectorViewMut::contiguous(&mut x);
                    if args.refine {
                        extrsv_refined(&driver, uplo, Transpose::No, Diag::NonUnit, &view, &mut xv)?;
                    } else {
                        extrsv(&driver, uplo, Transpose::No, Diag::NonUnit, &view, &mut xv)?;
                    }
                    Ok(x)
                })?
            }
        };
        outcomes.push(Outcome { algorithm, value, time });
    }

    let bytes = (n * (n + 1) / 2 + 2 * n) * std::mem::size_of::<f64>();
    report_timing(&outcomes, bytes, |x: &Vec<f64>| {
        let r = verify::residual_norm(&view, x, &b).unwrap_or(f64::NAN);
        format!("‖b − Ax‖∞ = {:.3e}", r)
    });
    check_agreement(&outcomes)
}
