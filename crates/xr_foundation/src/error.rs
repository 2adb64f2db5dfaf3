// crates/xr_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `XrError` 枚举和 `XrResult` 类型别名。累加、合并、舍入在有限输入上
//! 都是全函数，不会返回错误；错误只来自参数校验（布局、形状、越界）。
//!
//! # 示例
//!
//! ```
//! use xr_foundation::error::{XrError, XrResult};
//!
//! fn check(n: usize) -> XrResult<()> {
//!     XrError::check_size("x", 4, n)
//! }
//! assert!(check(3).is_err());
//! ```

use thiserror::Error;

/// 统一结果类型
pub type XrResult<T> = Result<T, XrError>;

/// XR 错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XrError {
    // ========================================================================
    // 累加器布局
    // ========================================================================
    /// 超累加器布局不合法
    #[error("无效的超累加器布局: floor={floor}, ceiling={ceiling}: {reason}")]
    InvalidLayout {
        /// 最低位指数
        floor: i32,
        /// 最高位指数（不含）
        ceiling: i32,
        /// 原因
        reason: &'static str,
    },

    /// 两个累加器的布局不一致，无法合并
    #[error("超累加器布局不一致: 左侧 {left_bins} 个 bin, 右侧 {right_bins} 个 bin")]
    LayoutMismatch {
        /// 左侧 bin 数
        left_bins: usize,
        /// 右侧 bin 数
        right_bins: usize,
    },

    // ========================================================================
    // 参数校验
    // ========================================================================
    /// 无效参数
    #[error("无效参数 '{name}': {reason}")]
    InvalidArgument {
        /// 参数名
        name: &'static str,
        /// 原因
        reason: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 越界访问
    #[error("越界: {name} 需要访问下标 {required}, 但缓冲区长度为 {len}")]
    OutOfBounds {
        /// 数据名称
        name: &'static str,
        /// 需要的最大下标
        required: usize,
        /// 缓冲区长度
        len: usize,
    },

    /// 三角矩阵对角元为零
    #[error("奇异矩阵: 第 {row} 行对角元为零")]
    SingularMatrix {
        /// 行号
        row: usize,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl XrError {
    /// 无效参数
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    fn out_of_bounds(name: &'static str, required: usize, len: usize) -> Self {
        Self::OutOfBounds {
            name,
            required,
            len,
        }
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl XrError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> XrResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查下标 `required` 是否落在长度为 `len` 的缓冲区内
    #[inline]
    pub fn check_bounds(name: &'static str, required: usize, len: usize) -> XrResult<()> {
        if required >= len {
            Err(Self::out_of_bounds(name, required, len))
        } else {
            Ok(())
        }
    }
}
