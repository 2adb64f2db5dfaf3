// crates/xr_foundation/src/lib.rs

//! XR Foundation Layer (Layer 1)
//!
//! 基础层，为精确规约引擎提供与算法无关的底层设施。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `XrError` 与 `XrResult`
//! - [`float`]: IEEE-754 双精度位级分解、缩放与常量
//! - [`memory`]: 缓存行对齐的连续缓冲区 `AlignedVec`
//!
//! # 层级架构
//!
//! ```text
//! Layer 6: xr_cli        ─> 命令行驱动
//! Layer 5: xr_config     ─> ReductionConfig（JSON）
//! Layer 4: xr_blas       ─> exsum / exdot / extrsv / exgemm
//! Layer 3: xr_runtime    ─> ExecutionBackend, ReductionDriver
//! Layer 2: xr_core       ─> EFT, Superaccumulator, FloatExpansion
//! Layer 1: xr_foundation ─> XrError, float, AlignedVec (本层)
//! ```
//!
//! # 示例
//!
//! ```
//! use xr_foundation::float::{decompose, scalbn};
//!
//! let d = decompose(-0.75).unwrap();
//! assert!(d.negative);
//! assert_eq!(scalbn(d.mantissa as f64, d.exponent), 0.75);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod float;
pub mod memory;

/// 层级标识
pub const LAYER: u8 = 1;

// 重导出常用类型
pub use error::{XrError, XrResult};
pub use float::Decomposed;
pub use memory::{AlignedVec, CpuAlign};

/// Prelude 模块
pub mod prelude {
    //! 常用类型预导入
    pub use crate::error::{XrError, XrResult};
    pub use crate::float::{decompose, scalbn, ulp, Decomposed};
    pub use crate::memory::{AlignedVec, CpuAlign};
}
