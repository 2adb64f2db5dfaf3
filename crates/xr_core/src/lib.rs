// crates/xr_core/src/lib.rs

//! XR Core Layer (Layer 2)
//!
//! 精确规约核心：给定任意顺序、任意分组的双精度输入，得到与数学精确和
//! 正确舍入（偶数优先）一致、逐位可复现的结果。
//!
//! # 模块概览
//!
//! - [`eft`]: 无误差变换 TwoSum / TwoProduct
//! - [`superacc`]: 超累加器 `Superaccumulator` 与布局 `SuperaccLayout`
//! - [`fpe`]: 浮点展开 `FloatExpansion<N, EARLY_EXIT>`
//! - [`accumulator`]: 累加器抽象 `ExactAccumulator`
//! - [`mode`]: 归约模式 `ReductionMode` 与单态化分派
//!
//! # 层级架构
//!
//! ```text
//! Layer 4: xr_blas       ─> exsum / exdot / extrsv / exgemm
//! Layer 3: xr_runtime    ─> ExecutionBackend, ReductionDriver
//! Layer 2: xr_core       ─> EFT, Superaccumulator, FloatExpansion (本层)
//! Layer 1: xr_foundation ─> XrError, float, AlignedVec
//! ```
//!
//! # 设计原则
//!
//! 1. **只舍入一次**: 中间状态全部精确，只在最后读取时舍入
//! 2. **值语义**: 累加器按所有权传递，按值合并，无共享可变状态
//! 3. **构造时选型**: 归约模式在构造时确定，热循环单态化
//!
//! # 示例
//!
//! ```
//! use xr_core::prelude::*;
//!
//! let mut left = Superaccumulator::default();
//! left.accumulate(1e100);
//! left.accumulate(1.0);
//! let mut right = Superaccumulator::default();
//! right.accumulate(-1e100);
//!
//! let mut total = left.merge(right).unwrap();
//! assert_eq!(total.round(), 1.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accumulator;
pub mod eft;
pub mod fpe;
pub mod mode;
pub mod superacc;

/// 层级标识
pub const LAYER: u8 = 2;

// 重导出核心类型
pub use accumulator::ExactAccumulator;
pub use eft::Eft;
pub use fpe::FloatExpansion;
pub use mode::{ExpansionSlots, ModeVisitor, ReductionMode};
pub use superacc::{AccumulatorState, SuperaccLayout, Superaccumulator};

/// Prelude 模块
pub mod prelude {
    //! 常用类型预导入
    pub use crate::accumulator::ExactAccumulator;
    pub use crate::eft::{two_product_fma, two_sum, Eft};
    pub use crate::fpe::FloatExpansion;
    pub use crate::mode::{ExpansionSlots, ModeVisitor, ReductionMode};
    pub use crate::superacc::{AccumulatorState, SuperaccLayout, Superaccumulator};
}
