// crates/xr_config/src/lib.rs

//! XR Config Layer (Layer 5)
//!
//! 配置层：归约算法选择、超累加器布局、并行策略与线程数。
//!
//! # 模块概览
//!
//! - [`algorithm`]: `AlgorithmChoice`（`standard` 或某个可复现模式）
//! - [`reduction_config`]: `ReductionConfig` JSON 配置文件
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 6: xr_cli        ─> uses ReductionConfig
//! Layer 5: xr_config     ─> AlgorithmChoice, ReductionConfig (本层)
//! Layer 4: xr_blas
//! Layer 3: xr_runtime    ─> ParallelConfig, ReductionDriver
//! Layer 2: xr_core       ─> ReductionMode, SuperaccLayout
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithm;
pub mod error;
pub mod reduction_config;

/// 层级标识
pub const LAYER: u8 = 5;

pub use algorithm::AlgorithmChoice;
pub use error::ConfigError;
pub use reduction_config::{LayoutConfig, ReductionConfig};
