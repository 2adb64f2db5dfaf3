// crates/xr_runtime/src/parallel.rs

//! 并行配置与分区
//!
//! 决定一次归约拆成多少个 worker、每个 worker 负责哪些下标、以及 worker
//! 结果按什么顺序合并。所有选择都不影响最终舍入结果，只影响性能。

use serde::{Deserialize, Serialize};
use xr_foundation::error::{XrError, XrResult};

/// 分区方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partitioning {
    /// 连续分块
    #[default]
    Contiguous,
    /// 轮转（worker k 处理 k, k+P, k+2P, ...）
    RoundRobin,
}

/// 合并方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// 顺序折叠
    Sequential,
    /// 两两树形合并（对数深度，可并行）
    #[default]
    Tree,
}

/// 单个 worker 的下标集合：`start, start+step, ...`（不含 `end`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSlice {
    /// 起始下标
    pub start: usize,
    /// 结束下标（不含）
    pub end: usize,
    /// 步长
    pub step: usize,
}

impl WorkerSlice {
    /// 连续区间
    pub fn contiguous(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            step: 1,
        }
    }

    /// 下标迭代器
    pub fn indices(&self) -> std::iter::StepBy<std::ops::Range<usize>> {
        (self.start..self.end).step_by(self.step.max(1))
    }

    /// 下标数量
    pub fn len(&self) -> usize {
        if self.end <= self.start {
            0
        } else {
            (self.end - self.start + self.step.max(1) - 1) / self.step.max(1)
        }
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 把 `len` 个下标分给 `workers` 个 worker
///
/// 至少返回一个分片；worker 数不超过 `len`。
pub fn partition(len: usize, workers: usize, partitioning: Partitioning) -> Vec<WorkerSlice> {
    let workers = workers.min(len).max(1);
    match partitioning {
        Partitioning::Contiguous => {
            let base = len / workers;
            let extra = len % workers;
            let mut start = 0;
            (0..workers)
                .map(|w| {
                    let size = base + usize::from(w < extra);
                    let slice = WorkerSlice::contiguous(start, start + size);
                    start += size;
                    slice
                })
                .collect()
        }
        Partitioning::RoundRobin => (0..workers)
            .map(|w| WorkerSlice {
                start: w,
                end: len,
                step: workers,
            })
            .collect(),
    }
}

/// 并行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// 是否启用并行
    pub enabled: bool,
    /// 最小并行化项数（小于此数用单个 worker）
    pub min_work_items: usize,
    /// 每个 worker 的最小项数
    pub min_items_per_thread: usize,
    /// 最大 worker 数
    pub max_workers: usize,
    /// 分区方式
    pub partitioning: Partitioning,
    /// 合并方式
    pub merge_strategy: MergeStrategy,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_work_items: 4096,
            min_items_per_thread: 1024,
            max_workers: rayon::current_num_threads(),
            partitioning: Partitioning::Contiguous,
            merge_strategy: MergeStrategy::Tree,
        }
    }
}

impl ParallelConfig {
    /// 测试用配置（单 worker）
    pub fn for_testing() -> Self {
        Self {
            enabled: false,
            min_work_items: usize::MAX,
            ..Default::default()
        }
    }

    /// 决定是否对给定工作量并行化
    #[inline]
    pub fn should_parallelize(&self, work_items: usize) -> bool {
        self.enabled && work_items >= self.min_work_items
    }

    /// 有效 worker 数
    #[inline]
    pub fn effective_workers(&self, work_items: usize) -> usize {
        if !self.should_parallelize(work_items) {
            return 1;
        }
        let ideal = work_items / self.min_items_per_thread.max(1);
        ideal.clamp(1, self.max_workers.max(1))
    }

    /// 推荐的块大小
    #[inline]
    pub fn recommended_chunk_size(&self, work_items: usize) -> usize {
        (work_items / self.effective_workers(work_items)).max(1)
    }

    /// 按配置对 `work_items` 个下标分区
    pub fn partition(&self, work_items: usize) -> Vec<WorkerSlice> {
        partition(work_items, self.effective_workers(work_items), self.partitioning)
    }

    /// 校验
    pub fn validate(&self) -> XrResult<()> {
        if self.min_items_per_thread == 0 {
            return Err(XrError::invalid_argument("min_items_per_thread", "必须大于 0"));
        }
        if self.max_workers == 0 {
            return Err(XrError::invalid_argument("max_workers", "必须大于 0"));
        }
        Ok(())
    }
}

/// 构建器模式
impl ParallelConfig {
    /// 设置是否启用并行
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 设置最小并行化项数
    pub fn with_min_work_items(mut self, min: usize) -> Self {
        self.min_work_items = min;
        self
    }

    /// 设置每个 worker 的最小项数
    pub fn with_min_items_per_thread(mut self, min: usize) -> Self {
        self.min_items_per_thread = min.max(1);
        self
    }

    /// 设置最大 worker 数
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = max.max(1);
        self
    }

    /// 设置分区方式
    pub fn with_partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }

    /// 设置合并方式
    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covered(slices: &[WorkerSlice], len: usize) -> bool {
        let mut seen = vec![0u32; len];
        for s in slices {
            for i in s.indices() {
                seen[i] += 1;
            }
        }
        seen.iter().all(|&c| c == 1)
    }

    #[test]
    fn test_should_parallelize() {
        let config = ParallelConfig::default().with_min_work_items(1000);
        assert!(!config.should_parallelize(100));
        assert!(config.should_parallelize(2000));
        assert!(!ParallelConfig::for_testing().should_parallelize(1 << 30));
    }

    #[test]
    fn test_effective_workers() {
        let config = ParallelConfig {
            enabled: true,
            min_work_items: 0,
            min_items_per_thread: 100,
            max_workers: 8,
            ..Default::default()
        };
        assert_eq!(config.effective_workers(1000), 8);
        assert_eq!(config.effective_workers(200), 2);
        assert_eq!(config.effective_workers(50), 1);
        assert_eq!(config.recommended_chunk_size(200), 100);
    }

    #[test]
    fn test_contiguous_partition() {
        let slices = partition(10, 3, Partitioning::Contiguous);
        assert_eq!(
            slices,
            vec![
                WorkerSlice::contiguous(0, 4),
                WorkerSlice::contiguous(4, 7),
                WorkerSlice::contiguous(7, 10)
            ]
        );
        assert!(covered(&slices, 10));
    }

    #[test]
    fn test_round_robin_partition() {
        let slices = partition(11, 4, Partitioning::RoundRobin);
        assert_eq!(slices.len(), 4);
        assert_eq!(slices[1].indices().collect::<Vec<_>>(), vec![1, 5, 9]);
        assert_eq!(slices[3].len(), 2);
        assert!(covered(&slices, 11));
    }

    #[test]
    fn test_partition_edge_cases() {
        assert_eq!(partition(0, 8, Partitioning::Contiguous), vec![WorkerSlice::contiguous(0, 0)]);
        assert!(partition(0, 8, Partitioning::RoundRobin)[0].is_empty());
        assert_eq!(partition(3, 8, Partitioning::Contiguous).len(), 3);
    }

    #[test]
    fn test_validate_and_serde() {
        let mut config = ParallelConfig::default();
        assert!(config.validate().is_ok());
        config.max_workers = 0;
        assert!(config.validate().is_err());

        let parsed: ParallelConfig =
            serde_json::from_str(r#"{"partitioning": "round_robin", "merge_strategy": "sequential"}"#)
                .unwrap();
        assert_eq!(parsed.partitioning, Partitioning::RoundRobin);
        assert_eq!(parsed.merge_strategy, MergeStrategy::Sequential);
        assert!(parsed.enabled);
    }
}
