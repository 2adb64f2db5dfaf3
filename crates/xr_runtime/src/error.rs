// crates/xr_runtime/src/error.rs

//! 运行时错误类型
//!
//! 执行后端的失败（线程池无法创建、worker panic）原样上报，不做重试。

use thiserror::Error;
use xr_foundation::error::XrError;

/// 运行时错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// 执行后端失败
    #[error("执行后端 '{backend}' 失败: {message}")]
    Backend {
        /// 后端名称
        backend: &'static str,
        /// 失败描述
        message: String,
    },

    /// 归约在 worker 开始前被取消，没有部分结果
    #[error("归约已取消")]
    Cancelled,

    /// 核心层错误
    #[error(transparent)]
    Core(#[from] XrError),
}

impl RuntimeError {
    /// 后端错误
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }
}

/// 运行时结果类型
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_core_error() {
        let err: RuntimeError = XrError::size_mismatch("y", 4, 3).into();
        assert!(matches!(err, RuntimeError::Core(XrError::SizeMismatch { .. })));
        assert!(err.to_string().contains("期望4"));
    }

    #[test]
    fn test_backend_display() {
        let err = RuntimeError::backend("rayon", "线程池创建失败");
        assert_eq!(err.to_string(), "执行后端 'rayon' 失败: 线程池创建失败");
    }
}
