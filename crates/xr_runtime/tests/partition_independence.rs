// crates/xr_runtime/tests/partition_independence.rs
//!
//! 分区无关性测试
//!
//! 同一组输入在任意 worker 数、分区方式、合并策略、归约模式与执行后端下
//! 都必须得到逐位相同的结果，并与大整数参照一致。

use rand::prelude::*;
use std::ops::Range;
use xr_core::{ExactAccumulator, ReductionMode, SuperaccLayout};
use xr_runtime::prelude::*;

/// 指数跨度大、符号随机的数据
fn wide_data(seed: u64, n: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let m: f64 = rng.gen_range(-1.0..1.0);
            m * 2f64.powi(rng.gen_range(-400..400))
        })
        .collect()
}

/// 乘积项
struct Products<'a> {
    x: &'a [f64],
    y: &'a [f64],
}

impl TermSource for Products<'_> {
    fn len(&self) -> usize {
        self.x.len()
    }

    fn has_products(&self) -> bool {
        true
    }

    fn feed<A: ExactAccumulator>(&self, index: usize, acc: &mut A) {
        acc.accumulate_product(self.x[index], self.y[index]);
    }
}

fn config(workers: usize, partitioning: Partitioning, merge: MergeStrategy) -> ParallelConfig {
    ParallelConfig::default()
        .with_min_work_items(0)
        .with_min_items_per_thread(1)
        .with_max_workers(workers)
        .with_partitioning(partitioning)
        .with_merge_strategy(merge)
}

#[test]
fn test_worker_count_independence() {
    let data = wide_data(1, 30_000);
    let expected = xr_oracle::exact_sum(&data);

    for workers in [1, 2, 3, 7, 16, 64] {
        for partitioning in [Partitioning::Contiguous, Partitioning::RoundRobin] {
            for merge in [MergeStrategy::Sequential, MergeStrategy::Tree] {
                let driver = ReductionDriver::new(
                    RayonBackend::global(),
                    ReductionMode::default(),
                    SuperaccLayout::ieee_f64(),
                    config(workers, partitioning, merge),
                );
                let result = driver.round(data.as_slice()).unwrap();
                assert_eq!(
                    result.to_bits(),
                    expected.to_bits(),
                    "workers={} {:?} {:?}",
                    workers,
                    partitioning,
                    merge
                );
            }
        }
    }
}

#[test]
fn test_mode_independence() {
    let data = wide_data(2, 20_000);
    let expected = xr_oracle::exact_sum(&data);
    for mode in ReductionMode::all() {
        let driver = ReductionDriver::new(
            RayonBackend::global(),
            mode,
            SuperaccLayout::ieee_f64(),
            config(8, Partitioning::Contiguous, MergeStrategy::Tree),
        );
        assert_eq!(driver.round(data.as_slice()).unwrap(), expected, "mode={}", mode);
    }
}

#[test]
fn test_random_partitions() {
    let data = wide_data(3, 5_000);
    let expected = xr_oracle::exact_sum(&data);
    let driver = ReductionDriver::new(
        RayonBackend::with_threads(3).unwrap(),
        ReductionMode::from_nbfpe(2, false).unwrap(),
        SuperaccLayout::ieee_f64(),
        ParallelConfig::default(),
    );

    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..20 {
        let mut cuts: Vec<usize> = (0..rng.gen_range(1..30))
            .map(|_| rng.gen_range(0..=data.len()))
            .collect();
        cuts.push(0);
        cuts.push(data.len());
        cuts.sort_unstable();
        let mut ranges: Vec<Range<usize>> = cuts.windows(2).map(|w| w[0]..w[1]).collect();
        ranges.shuffle(&mut rng);

        let mut acc = driver.reduce_partitioned(data.as_slice(), &ranges).unwrap();
        assert_eq!(acc.round(), expected);
    }
}

#[test]
fn test_serial_and_rayon_bitwise_equal_bins() {
    let x = wide_data(5, 12_345);
    let y = wide_data(6, 12_345);
    let terms = Products { x: &x, y: &y };

    let serial = ReductionDriver::serial(ReductionMode::from_nbfpe(8, true).unwrap());
    let pooled = ReductionDriver::new(
        RayonBackend::with_threads(4).unwrap(),
        ReductionMode::Superaccumulator,
        SuperaccLayout::ieee_f64(),
        config(13, Partitioning::RoundRobin, MergeStrategy::Tree),
    );

    let a = serial.reduce(&terms).unwrap();
    let b = pooled.reduce(&terms).unwrap();
    assert_eq!(a.bins(), b.bins());
    assert_eq!(a.to_f64(), xr_oracle::exact_dot(&x, &y));
}

#[test]
fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let driver = ReductionDriver::new(
        RayonBackend::global(),
        ReductionMode::default(),
        SuperaccLayout::ieee_f64(),
        config(4, Partitioning::Contiguous, MergeStrategy::Tree),
    )
    .with_cancellation(token);
    let data = wide_data(7, 1000);
    assert!(matches!(driver.reduce(data.as_slice()), Err(RuntimeError::Cancelled)));
}
