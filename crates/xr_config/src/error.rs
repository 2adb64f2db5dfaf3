// crates/xr_config/src/error.rs

//! 配置层错误类型

use xr_foundation::error::XrError;
use xr_runtime::RuntimeError;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    /// 按配置构建执行后端失败
    #[error("构建错误: {0}")]
    Build(#[from] RuntimeError),
}

impl ConfigError {
    /// 无效值
    pub fn invalid(key: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// 把核心层的校验错误归到某个配置键下
    pub fn from_core(key: &str, value: impl ToString, err: XrError) -> Self {
        Self::invalid(key, value, err.to_string())
    }
}
