// apps/xr_cli/src/commands/common.rs

//! 子命令共用的上下文、数据分布与计时报告

use anyhow::{ensure, Context, Result};
use clap::{Args, ValueEnum};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use xr_blas::DataGenerator;
use xr_config::{AlgorithmChoice, ReductionConfig};
use xr_foundation::memory::AlignedVec;
use xr_runtime::WallClock;

/// 运行上下文
pub struct RunContext {
    /// 生效的配置（已合并命令行覆盖）
    pub config: ReductionConfig,
}

impl RunContext {
    /// 加载配置文件（可选）并应用 `--threads`
    pub fn load(path: Option<&Path>, threads: Option<usize>) -> Result<Self> {
        let mut config = match path {
            Some(path) => ReductionConfig::from_file(path)
                .with_context(|| format!("无法加载配置文件 {}", path.display()))?,
            None => ReductionConfig::default(),
        };
        if threads.is_some() {
            config.threads = threads;
        }
        config.validate().context("配置无效")?;
        Ok(Self { config })
    }

    /// 待运行的算法：命令行指定的一个，或者全部
    pub fn algorithms(&self, selected: Option<&str>) -> Result<Vec<AlgorithmChoice>> {
        match selected {
            Some(s) => Ok(vec![s.parse().with_context(|| format!("无效算法 '{}'", s))?]),
            None => Ok(AlgorithmChoice::all()),
        }
    }
}

/// 数据分布
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Distribution {
    /// 全部为 0.1
    Naive,
    /// 浮点均匀（随机尾数与指数）
    Uniform,
    /// 成对抵消的病态数据
    Ill,
    /// 对数正态
    Lognormal,
}

/// 向量数据参数
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// 数据分布
    #[arg(long, value_enum, default_value = "uniform")]
    pub dist: Distribution,

    /// 指数跨度
    #[arg(long, default_value_t = 100)]
    pub range: i32,

    /// 最大指数
    #[arg(long, default_value_t = 0)]
    pub emax: i32,

    /// 对数正态均值
    #[arg(long, default_value_t = 0.0)]
    pub mean: f64,

    /// 对数正态标准差
    #[arg(long, default_value_t = 1.0)]
    pub stddev: f64,

    /// 随机种子
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
}

impl DataArgs {
    /// 按分布生成 `n` 个值
    pub fn generate(&self, gen: &mut DataGenerator, n: usize) -> AlignedVec<f64> {
        match self.dist {
            Distribution::Naive => gen.naive(n),
            Distribution::Uniform => gen.fp_uniform(n, self.range, self.emax),
            Distribution::Ill => gen.ill_conditioned(n, self.range),
            Distribution::Lognormal => gen.lognormal(n, self.mean, self.stddev),
        }
    }
}

/// 重复 `iterations` 次，返回最后一次的结果与最短耗时
pub fn time_min<T>(iterations: usize, mut f: impl FnMut() -> Result<T>) -> Result<(T, Duration)> {
    ensure!(iterations > 0, "迭代次数必须大于 0");
    let clock = WallClock::new();
    let mut last = None;
    for _ in 0..iterations {
        last = Some(clock.measure(&mut f)?);
    }
    let value = last.context("没有任何迭代结果")?;
    Ok((value, clock.fastest()))
}

/// 一个算法的运行结果
pub struct Outcome<T> {
    /// 算法
    pub algorithm: AlgorithmChoice,
    /// 结果
    pub value: T,
    /// 最短耗时
    pub time: Duration,
}

/// 打印计时表，`bytes` 为一次运行读取的字节数
pub fn report_timing<T>(outcomes: &[Outcome<T>], bytes: usize, describe: impl Fn(&T) -> String) {
    println!("{:<10} {:>12} {:>10}  {}", "algorithm", "time [ms]", "GB/s", "result");
    for o in outcomes {
        let secs = o.time.as_secs_f64();
        let gbps = if secs > 0.0 { bytes as f64 / secs / 1e9 } else { 0.0 };
        println!(
            "{:<10} {:>12.3} {:>10.2}  {}",
            o.algorithm.to_string(),
            secs * 1e3,
            gbps,
            describe(&o.value)
        );
    }
}

/// 检查全部可复现结果逐位一致
pub fn check_agreement<T: PartialEq>(outcomes: &[Outcome<T>]) -> Result<()> {
    let mut exact = outcomes.iter().filter(|o| o.algorithm.is_exact());
    let Some(first) = exact.next() else {
        return Ok(());
    };
    let mismatched: Vec<String> = exact
        .filter(|o| o.value != first.value)
        .map(|o| o.algorithm.to_string())
        .collect();
    if mismatched.is_empty() {
        info!(reference = %first.algorithm, "全部可复现模式结果逐位一致");
        Ok(())
    } else {
        warn!(reference = %first.algorithm, ?mismatched, "可复现模式结果不一致");
        anyhow::bail!("{} 与 {:?} 的结果不一致", first.algorithm, mismatched)
    }
}

/// 十六进制位模式与十进制值
pub fn describe_f64(v: &f64) -> String {
    format!("{:+.17e} (0x{:016x})", v, v.to_bits())
}

#[cfg(test)]
mod tests {
    use super::*;
    use xr_core::ReductionMode;

    fn outcome(algorithm: AlgorithmChoice, value: f64) -> Outcome<f64> {
        Outcome {
            algorithm,
            value,
            time: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_agreement_ignores_standard() {
        let outcomes = vec![
            outcome(AlgorithmChoice::Standard, 1.5),
            outcome(ReductionMode::Superaccumulator.into(), 1.0),
            outcome(ReductionMode::default().into(), 1.0),
        ];
        assert!(check_agreement(&outcomes).is_ok());
    }

    #[test]
    fn test_disagreement_is_error() {
        let outcomes = vec![
            outcome(ReductionMode::Superaccumulator.into(), 1.0),
            outcome(ReductionMode::default().into(), 1.0 + f64::EPSILON),
        ];
        assert!(check_agreement(&outcomes).is_err());
    }

    #[test]
    fn test_time_min() {
        let mut calls = 0;
        let (v, _) = time_min(3, || {
            calls += 1;
            Ok(calls)
        })
        .unwrap();
        assert_eq!(v, 3);
        assert!(time_min(0, || Ok(())).is_err());
    }
}
