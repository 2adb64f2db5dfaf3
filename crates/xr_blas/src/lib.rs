// crates/xr_blas/src/lib.rs

//! XR BLAS Layer (Layer 4)
//!
//! BLAS 风格的可复现例程：每个结果都是精确数学值的正确舍入，
//! 与线程数、分区和归约模式无关。
//!
//! # 模块概览
//!
//! - [`view`]: 跨步向量与行/列主序矩阵视图
//! - [`sum`]: `exsum`
//! - [`dot`]: `exdot`
//! - [`trsv`]: `extrsv`、`extrsv_refined`
//! - [`gemm`]: `exgemm`
//! - [`reference`]: 普通 IEEE 对照实现
//! - [`verify`]: 误差范数与条件数估计
//! - [`datagen`]: 带种子的合成数据
//!
//! # 示例
//!
//! ```
//! use xr_blas::prelude::*;
//! use xr_core::ReductionMode;
//! use xr_runtime::ReductionDriver;
//!
//! let x = [1.0, 1e-30, -1.0];
//! let y = [2.0, 2.0, 2.0];
//! let driver = ReductionDriver::rayon(ReductionMode::default());
//! let d = exdot(&driver, &VectorView::contiguous(&x), &VectorView::contiguous(&y)).unwrap();
//! assert_eq!(d, 2.0 * 1e-30);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod datagen;
pub mod dot;
pub mod gemm;
pub mod reference;
pub mod sum;
pub mod trsv;
pub mod verify;
pub mod view;

/// 层级标识
pub const LAYER: u8 = 4;

pub use datagen::DataGenerator;
pub use dot::{exdot, DotTerms};
pub use gemm::{exgemm, GEMM_BLOCK};
pub use sum::exsum;
pub use trsv::{extrsv, extrsv_refined, residual};
pub use view::{Diag, MatrixView, MatrixViewMut, Order, Transpose, Uplo, VectorView, VectorViewMut};

/// Prelude 模块
pub mod prelude {
    //! 常用类型预导入
    pub use crate::{
        exdot, exgemm, exsum, extrsv, extrsv_refined, Diag, MatrixView, MatrixViewMut, Order,
        Transpose, Uplo, VectorView, VectorViewMut,
    };
}
