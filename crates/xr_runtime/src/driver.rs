// crates/xr_runtime/src/driver.rs

//! 归约驱动
//!
//! 把 N 个输入项分给 P 个 worker，每个 worker 独占一个按模式选定的累加器，
//! 消费完自己的分片后转成超累加器交回；驱动在所有 worker 完成后合并
//! （顺序或树形），最后只舍入一次。
//!
//! ```text
//! terms ─partition─> [w0] [w1] ... [wP-1]     (执行后端，互不共享状态)
//!                      │    │          │
//!                      └──merge (Sequential | Tree)──> Superaccumulator ─round─> f64
//! ```
//!
//! 分区方式、worker 数、合并顺序都不影响舍入结果。

use crate::backend::{ExecutionBackend, RayonBackend, SerialBackend};
use crate::cancel::CancellationToken;
use crate::error::{RuntimeError, RuntimeResult};
use crate::metrics::DriverMetrics;
use crate::parallel::{MergeStrategy, ParallelConfig, WorkerSlice};
use std::ops::Range;
use tracing::{debug, trace, warn};
use xr_core::{ExactAccumulator, ModeVisitor, ReductionMode, SuperaccLayout, Superaccumulator};
use xr_foundation::error::XrError;

// =============================================================================
// 输入项
// =============================================================================

/// 可被精确归约的一组项
///
/// `feed(i, acc)` 把第 `i` 项（一个值或一个乘积）精确送入累加器。
/// 实现必须是纯的：同一下标总是送入相同的量。
///
/// 送入乘积的实现应让 [`has_products`](Self::has_products) 返回 `true`，
/// 驱动据此把布局扩展到乘积范围，下溢或上溢的乘积也能精确累加。
pub trait TermSource: Sync {
    /// 项数
    fn len(&self) -> usize;

    /// 是否为空
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 是否通过 `accumulate_product` 送入乘积
    fn has_products(&self) -> bool {
        false
    }

    /// 把第 `index` 项送入累加器
    fn feed<A: ExactAccumulator>(&self, index: usize, acc: &mut A);
}

impl TermSource for [f64] {
    fn len(&self) -> usize {
        <[f64]>::len(self)
    }

    #[inline]
    fn feed<A: ExactAccumulator>(&self, index: usize, acc: &mut A) {
        acc.accumulate(self[index]);
    }
}

// =============================================================================
// 驱动
// =============================================================================

/// 归约驱动
#[derive(Debug)]
pub struct ReductionDriver<B: ExecutionBackend = RayonBackend> {
    backend: B,
    mode: ReductionMode,
    layout: SuperaccLayout,
    parallel: ParallelConfig,
    cancel: Option<CancellationToken>,
    metrics: DriverMetrics,
}

impl ReductionDriver<SerialBackend> {
    /// 单线程驱动（默认布局，单 worker）
    pub fn serial(mode: ReductionMode) -> Self {
        Self::new(
            SerialBackend,
            mode,
            SuperaccLayout::ieee_f64(),
            ParallelConfig::for_testing(),
        )
    }
}

impl ReductionDriver<RayonBackend> {
    /// 使用 rayon 全局线程池与默认并行配置
    pub fn rayon(mode: ReductionMode) -> Self {
        Self::new(
            RayonBackend::global(),
            mode,
            SuperaccLayout::ieee_f64(),
            ParallelConfig::default(),
        )
    }
}

impl<B: ExecutionBackend> ReductionDriver<B> {
    /// 创建驱动
    pub fn new(backend: B, mode: ReductionMode, layout: SuperaccLayout, parallel: ParallelConfig) -> Self {
        Self {
            backend,
            mode,
            layout,
            parallel,
            cancel: None,
            metrics: DriverMetrics::new(),
        }
    }

    /// 绑定取消令牌
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 执行后端
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 归约模式
    pub fn mode(&self) -> ReductionMode {
        self.mode
    }

    /// 超累加器布局
    pub fn layout(&self) -> &SuperaccLayout {
        &self.layout
    }

    /// 归约 `terms` 实际使用的布局：含乘积时扩展到乘积范围
    pub fn layout_for<T: TermSource + ?Sized>(&self, terms: &T) -> SuperaccLayout {
        if terms.has_products() {
            self.layout.widened_for_products()
        } else {
            self.layout
        }
    }

    /// 并行配置
    pub fn parallel(&self) -> &ParallelConfig {
        &self.parallel
    }

    /// 指标
    pub fn metrics(&self) -> &DriverMetrics {
        &self.metrics
    }

    /// 归约并合并，不舍入
    pub fn reduce<T: TermSource + ?Sized>(&self, terms: &T) -> RuntimeResult<Superaccumulator> {
        let slices = self.parallel.partition(terms.len());
        self.reduce_slices(terms, &slices)
    }

    /// 按调用方给定的区间分区归约
    ///
    /// 区间必须恰好覆盖 `0..terms.len()` 一次（顺序任意），每个区间一个 worker。
    pub fn reduce_partitioned<T: TermSource + ?Sized>(
        &self,
        terms: &T,
        ranges: &[Range<usize>],
    ) -> RuntimeResult<Superaccumulator> {
        let len = terms.len();
        let mut sorted: Vec<&Range<usize>> = ranges.iter().collect();
        sorted.sort_by_key(|r| r.start);
        let mut next = 0;
        for range in sorted {
            if range.start != next || range.end < range.start {
                return Err(XrError::invalid_argument(
                    "ranges",
                    format!("区间 {:?} 与前一区间不衔接（期望从 {} 开始）", range, next),
                )
                .into());
            }
            next = range.end;
        }
        if next != len {
            return Err(XrError::invalid_argument(
                "ranges",
                format!("区间覆盖到 {}, 但共有 {} 项", next, len),
            )
            .into());
        }

        let slices: Vec<WorkerSlice> = ranges
            .iter()
            .map(|r| WorkerSlice::contiguous(r.start, r.end))
            .collect();
        self.reduce_slices(terms, &slices)
    }

    /// 归约并舍入
    pub fn round<T: TermSource + ?Sized>(&self, terms: &T) -> RuntimeResult<f64> {
        let mut acc = self.reduce(terms)?;
        Ok(acc.round())
    }

    /// 在当前线程用单个累加器归约，不经过执行后端
    ///
    /// 用于已经处在 worker 内部的细粒度归约（三角求解的行、矩阵乘的元素）。
    pub fn reduce_local<T: TermSource + ?Sized>(&self, terms: &T) -> Superaccumulator {
        self.mode.dispatch(LocalVisitor {
            terms,
            layout: self.layout_for(terms),
        })
    }

    /// [`reduce_local`](Self::reduce_local) 并舍入
    pub fn round_local<T: TermSource + ?Sized>(&self, terms: &T) -> f64 {
        self.reduce_local(terms).round()
    }

    fn reduce_slices<T: TermSource + ?Sized>(
        &self,
        terms: &T,
        slices: &[WorkerSlice],
    ) -> RuntimeResult<Superaccumulator> {
        let _guard = self.metrics.wall.start();
        self.metrics.reductions.inc();
        let layout = self.layout_for(terms);
        debug!(
            mode = %self.mode,
            backend = self.backend.name(),
            terms = terms.len(),
            workers = slices.len(),
            bins = layout.bins(),
            merge = ?self.parallel.merge_strategy,
            "开始归约"
        );

        let partials = self.mode.dispatch(WorkerVisitor {
            driver: self,
            terms,
            slices,
            layout,
        })?;
        self.metrics.workers.add(partials.len() as u64);
        self.metrics
            .merges
            .add(partials.len().saturating_sub(1) as u64);

        let mut merged = match self.parallel.merge_strategy {
            MergeStrategy::Sequential => self.merge_sequential(partials, layout)?,
            MergeStrategy::Tree => self.merge_tree(partials, layout)?,
        };
        merged.renormalize();
        Ok(merged)
    }

    fn run_worker<A: ExactAccumulator, T: TermSource + ?Sized>(
        &self,
        terms: &T,
        layout: SuperaccLayout,
        slice: WorkerSlice,
        worker: usize,
    ) -> RuntimeResult<Superaccumulator> {
        if let Some(token) = &self.cancel {
            if token.is_cancelled() {
                warn!(worker, "归约已取消，worker 未启动");
                return Err(RuntimeError::Cancelled);
            }
        }

        let mut acc = A::with_layout(layout);
        for index in slice.indices() {
            terms.feed(index, &mut acc);
        }
        let spills = acc.spills();
        self.metrics.spills.add(spills);
        trace!(worker, accumulator = A::NAME, terms = slice.len(), spills, "worker 完成");
        Ok(acc.into_superacc())
    }

    fn merge_sequential(
        &self,
        partials: Vec<Superaccumulator>,
        layout: SuperaccLayout,
    ) -> RuntimeResult<Superaccumulator> {
        let mut iter = partials.into_iter();
        let mut acc = iter.next().unwrap_or_else(|| Superaccumulator::new(layout));
        for partial in iter {
            acc.merge_from(&partial)?;
        }
        Ok(acc)
    }

    fn merge_tree(
        &self,
        mut partials: Vec<Superaccumulator>,
        layout: SuperaccLayout,
    ) -> RuntimeResult<Superaccumulator> {
        if partials.len() <= 1 {
            return Ok(partials.pop().unwrap_or_else(|| Superaccumulator::new(layout)));
        }
        let right = partials.split_off(partials.len() / 2);
        let (left, right) = self.backend.join(
            || self.merge_tree(partials, layout),
            || self.merge_tree(right, layout),
        );
        Ok(left?.merge(right?)?)
    }
}

// =============================================================================
// 单态化访问者
// =============================================================================

struct WorkerVisitor<'a, B: ExecutionBackend, T: TermSource + ?Sized> {
    driver: &'a ReductionDriver<B>,
    terms: &'a T,
    slices: &'a [WorkerSlice],
    layout: SuperaccLayout,
}

impl<B: ExecutionBackend, T: TermSource + ?Sized> ModeVisitor for WorkerVisitor<'_, B, T> {
    type Output = RuntimeResult<Vec<Superaccumulator>>;

    fn visit<A: ExactAccumulator>(self) -> Self::Output {
        let Self {
            driver,
            terms,
            slices,
            layout,
        } = self;
        driver
            .backend
            .run_tasks(slices.len(), |w| {
                driver.run_worker::<A, T>(terms, layout, slices[w], w)
            })
            .map_err(|e| {
                if !matches!(e, RuntimeError::Cancelled) {
                    warn!(backend = driver.backend.name(), error = %e, "执行后端失败");
                }
                e
            })
    }
}

struct LocalVisitor<'a, T: TermSource + ?Sized> {
    terms: &'a T,
    layout: SuperaccLayout,
}

impl<T: TermSource + ?Sized> ModeVisitor for LocalVisitor<'_, T> {
    type Output = Superaccumulator;

    fn visit<A: ExactAccumulator>(self) -> Superaccumulator {
        let mut acc = A::with_layout(self.layout);
        for index in 0..self.terms.len() {
            self.terms.feed(index, &mut acc);
        }
        acc.into_superacc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::Partitioning;

    fn values(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                sign * (i as f64 + 0.1) * 2f64.powi((i % 61) as i32 - 30)
            })
            .collect()
    }

    fn parallel(workers: usize) -> ParallelConfig {
        ParallelConfig::default()
            .with_min_work_items(0)
            .with_min_items_per_thread(1)
            .with_max_workers(workers)
    }

    #[test]
    fn test_serial_matches_local() {
        let data = values(10_000);
        let driver = ReductionDriver::serial(ReductionMode::default());
        let expected = driver.round_local(data.as_slice());
        assert_eq!(driver.round(data.as_slice()).unwrap(), expected);
    }

    #[test]
    fn test_rayon_workers_and_metrics() {
        let data = values(50_000);
        let driver = ReductionDriver::new(
            RayonBackend::with_threads(4).unwrap(),
            ReductionMode::Superaccumulator,
            SuperaccLayout::ieee_f64(),
            parallel(7),
        );
        let expected = ReductionDriver::serial(ReductionMode::Superaccumulator)
            .round(data.as_slice())
            .unwrap();
        assert_eq!(driver.round(data.as_slice()).unwrap(), expected);

        let snap = driver.metrics().snapshot();
        assert_eq!(snap.reductions, 1);
        assert_eq!(snap.workers, 7);
        assert_eq!(snap.merges, 6);
    }

    #[test]
    fn test_merge_strategies_agree() {
        let data = values(9_999);
        let mut results = Vec::new();
        for strategy in [MergeStrategy::Sequential, MergeStrategy::Tree] {
            for partitioning in [Partitioning::Contiguous, Partitioning::RoundRobin] {
                let driver = ReductionDriver::new(
                    SerialBackend,
                    ReductionMode::from_nbfpe(3, true).unwrap(),
                    SuperaccLayout::ieee_f64(),
                    parallel(5)
                        .with_merge_strategy(strategy)
                        .with_partitioning(partitioning),
                );
                let acc = driver.reduce(data.as_slice()).unwrap();
                results.push(acc.bins().to_vec());
            }
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_reduce_partitioned_validation() {
        let data = values(100);
        let driver = ReductionDriver::serial(ReductionMode::Superaccumulator);
        let expected = driver.round(data.as_slice()).unwrap();

        let mut acc = driver
            .reduce_partitioned(data.as_slice(), &[50..100, 0..10, 10..50])
            .unwrap();
        assert_eq!(acc.round(), expected);

        let gap = driver.reduce_partitioned(data.as_slice(), &[0..10, 20..100]);
        assert!(matches!(gap, Err(RuntimeError::Core(XrError::InvalidArgument { .. }))));
        let short = driver.reduce_partitioned(data.as_slice(), &[0..99]);
        assert!(short.is_err());
    }

    #[test]
    fn test_empty_input() {
        let driver = ReductionDriver::rayon(ReductionMode::Superaccumulator);
        let empty: [f64; 0] = [];
        assert_eq!(driver.round(&empty[..]).unwrap(), 0.0);
        assert_eq!(driver.round_local(&empty[..]), 0.0);
    }

    /// 乘积项：下溢的乘积与上溢后抵消的乘积
    struct Products(Vec<(f64, f64)>);

    impl TermSource for Products {
        fn len(&self) -> usize {
            self.0.len()
        }

        fn has_products(&self) -> bool {
            true
        }

        fn feed<A: ExactAccumulator>(&self, index: usize, acc: &mut A) {
            let (a, b) = self.0[index];
            acc.accumulate_product(a, b);
        }
    }

    #[test]
    fn test_products_use_wide_layout() {
        let tiny = (3.0 * 2f64.powi(-576), 2f64.powi(-500));
        let mut pairs = vec![(1e200, 1e200), (1e200, -1e200)];
        pairs.extend(std::iter::repeat(tiny).take(1000));
        let terms = Products(pairs);

        for mode in ReductionMode::all() {
            let driver = ReductionDriver::new(
                SerialBackend,
                mode,
                SuperaccLayout::ieee_f64(),
                parallel(3),
            );
            assert!(driver.layout_for(&terms).covers_products());
            let plain: &[f64] = &[1.0, 2.0];
            assert_eq!(driver.layout_for(plain), SuperaccLayout::ieee_f64());
            // 1000 · 3·2^-1076 = 750·2^-1074
            assert_eq!(driver.round(&terms).unwrap(), f64::from_bits(750), "mode={}", mode);
            assert_eq!(driver.round_local(&terms), f64::from_bits(750), "mode={}", mode);
        }
    }

    #[test]
    fn test_cancellation() {
        let token = CancellationToken::new();
        let driver = ReductionDriver::serial(ReductionMode::default()).with_cancellation(token.clone());
        let data = values(10);
        assert!(driver.round(data.as_slice()).is_ok());
        token.cancel();
        assert_eq!(driver.round(data.as_slice()), Err(RuntimeError::Cancelled));
    }
}
