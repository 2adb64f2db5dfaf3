// crates/xr_runtime/src/metrics.rs

//! 归约驱动的性能指标
//!
//! 所有字段都是原子量，worker 可以在不加锁的情况下并发更新。

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 原子计数器
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// 零值计数器
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// 加一
    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    /// 加 `n`
    #[inline]
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// 当前值
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// 清零
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

// =============================================================================
// 墙钟
// =============================================================================

/// 墙钟统计：次数、总耗时与最短耗时
///
/// ```rust
/// use xr_runtime::metrics::WallClock;
///
/// let clock = WallClock::new();
/// let v = clock.measure(|| 40 + 2);
/// assert_eq!(v, 42);
/// assert_eq!(clock.count(), 1);
/// assert!(clock.fastest() <= clock.total());
/// ```
#[derive(Debug)]
pub struct WallClock {
    count: AtomicU64,
    total_ns: AtomicU64,
    fastest_ns: AtomicU64,
}

impl WallClock {
    /// 空统计
    pub const fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            total_ns: AtomicU64::new(0),
            fastest_ns: AtomicU64::new(u64::MAX),
        }
    }

    /// 开始一次计时，守卫 drop 时记录
    pub fn start(&self) -> WallClockGuard<'_> {
        WallClockGuard {
            clock: self,
            started: Instant::now(),
        }
    }

    /// 计时执行 `f`
    pub fn measure<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.start();
        f()
    }

    /// 记录一次耗时
    pub fn record(&self, elapsed: Duration) {
        let ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ns.fetch_add(ns, Ordering::Relaxed);
        self.fastest_ns.fetch_min(ns, Ordering::Relaxed);
    }

    /// 记录次数
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// 总耗时
    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_ns.load(Ordering::Relaxed))
    }

    /// 最短一次耗时；尚无记录时为零
    pub fn fastest(&self) -> Duration {
        match self.fastest_ns.load(Ordering::Relaxed) {
            u64::MAX => Duration::ZERO,
            ns => Duration::from_nanos(ns),
        }
    }

    /// 平均耗时
    pub fn mean(&self) -> Duration {
        match self.count() {
            0 => Duration::ZERO,
            c => self.total() / c as u32,
        }
    }

    /// 清零
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.total_ns.store(0, Ordering::Relaxed);
        self.fastest_ns.store(u64::MAX, Ordering::Relaxed);
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

/// [`WallClock::start`] 返回的守卫
pub struct WallClockGuard<'a> {
    clock: &'a WallClock,
    started: Instant,
}

impl Drop for WallClockGuard<'_> {
    fn drop(&mut self) {
        self.clock.record(self.started.elapsed());
    }
}

// =============================================================================
// 驱动指标
// =============================================================================

/// 归约驱动指标
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// 归约次数
    pub reductions: Counter,
    /// 累计 worker 数
    pub workers: Counter,
    /// 合并次数
    pub merges: Counter,
    /// 浮点展开溢出到超累加器的次数
    pub spills: Counter,
    /// 每次归约的墙钟时间
    pub wall: WallClock,
}

impl DriverMetrics {
    /// 创建
    pub fn new() -> Self {
        Self::default()
    }

    /// 快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reductions: self.reductions.get(),
            workers: self.workers.get(),
            merges: self.merges.get(),
            spills: self.spills.get(),
            wall_total_sec: self.wall.total().as_secs_f64(),
            wall_fastest_sec: self.wall.fastest().as_secs_f64(),
        }
    }

    /// 全部清零
    pub fn reset(&self) {
        self.reductions.reset();
        self.workers.reset();
        self.merges.reset();
        self.spills.reset();
        self.wall.reset();
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// 归约次数
    pub reductions: u64,
    /// 累计 worker 数
    pub workers: u64,
    /// 合并次数
    pub merges: u64,
    /// 溢出次数
    pub spills: u64,
    /// 总墙钟时间（秒）
    pub wall_total_sec: f64,
    /// 最短一次归约（秒）
    pub wall_fastest_sec: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let c = Counter::new();
        c.inc();
        c.add(4);
        assert_eq!(c.get(), 5);
        c.reset();
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn test_wall_clock_tracks_fastest() {
        let clock = WallClock::new();
        assert_eq!(clock.fastest(), Duration::ZERO);
        clock.record(Duration::from_millis(5));
        clock.record(Duration::from_millis(2));
        clock.record(Duration::from_millis(9));
        assert_eq!(clock.count(), 3);
        assert_eq!(clock.fastest(), Duration::from_millis(2));
        assert_eq!(clock.total(), Duration::from_millis(16));
        assert_eq!(clock.mean(), Duration::from_nanos(16_000_000 / 3));
        clock.reset();
        assert_eq!(clock.count(), 0);
    }

    #[test]
    fn test_guard_records() {
        let clock = WallClock::new();
        {
            let _guard = clock.start();
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(clock.count(), 1);
        assert!(clock.fastest() >= Duration::from_millis(2));
    }

    #[test]
    fn test_snapshot() {
        let metrics = DriverMetrics::new();
        metrics.reductions.inc();
        metrics.workers.add(4);
        metrics.merges.add(3);
        let snap = metrics.snapshot();
        assert_eq!(snap.workers, 4);
        assert_eq!(snap.merges, 3);
        assert_eq!(snap.wall_fastest_sec, 0.0);
        metrics.reset();
        assert_eq!(metrics.snapshot().reductions, 0);
    }
}
