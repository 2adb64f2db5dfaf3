// crates/xr_runtime/src/lib.rs

//! XR Runtime Layer (Layer 3)
//!
//! 运行时层：执行后端、分区策略与归约驱动。
//!
//! # 模块概览
//!
//! - [`backend`]: `ExecutionBackend` trait，`SerialBackend` 与 `RayonBackend`
//! - [`parallel`]: `ParallelConfig`、分区与合并策略
//! - [`driver`]: `ReductionDriver` 与 `TermSource`
//! - [`cancel`]: worker 粒度的取消令牌
//! - [`metrics`]: 计数器、墙钟与驱动指标
//! - [`error`]: 运行时错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 4: xr_blas       ─> exsum / exdot / extrsv / exgemm
//! Layer 3: xr_runtime    ─> ExecutionBackend, ReductionDriver (本层)
//! Layer 2: xr_core       ─> EFT, Superaccumulator, FloatExpansion
//! Layer 1: xr_foundation ─> XrError, float, AlignedVec
//! ```
//!
//! # 设计原则
//!
//! 1. **独占所有权**: 每个 worker 独占一个累加器，合并阶段之前无任何同步
//! 2. **屏障后合并**: 所有 worker 完成后再合并，只舍入一次
//! 3. **结果与调度无关**: worker 数、分区、合并顺序都不改变结果的任何一位
//!
//! # 示例
//!
//! ```
//! use xr_core::ReductionMode;
//! use xr_runtime::ReductionDriver;
//!
//! let data = vec![1e100, 1.0, -1e100, 2.0];
//! let driver = ReductionDriver::rayon(ReductionMode::Superaccumulator);
//! assert_eq!(driver.round(data.as_slice()).unwrap(), 3.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod cancel;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod parallel;

/// 层级标识
pub const LAYER: u8 = 3;

// 重导出核心类型
pub use backend::{ExecutionBackend, RayonBackend, SerialBackend};
pub use cancel::CancellationToken;
pub use driver::{ReductionDriver, TermSource};
pub use error::{RuntimeError, RuntimeResult};
pub use metrics::{DriverMetrics, MetricsSnapshot, WallClock};
pub use parallel::{MergeStrategy, ParallelConfig, Partitioning, WorkerSlice};

/// Prelude 模块
pub mod prelude {
    //! 常用类型预导入
    pub use crate::{
        CancellationToken, ExecutionBackend, MergeStrategy, ParallelConfig, Partitioning,
        RayonBackend, ReductionDriver, RuntimeError, RuntimeResult, SerialBackend, TermSource,
    };
}
