// apps/xr_cli/src/commands/mod.rs

//! 子命令

pub mod common;
pub mod dot;
pub mod gemm;
pub mod info;
pub mod sum;
pub mod trsv;
