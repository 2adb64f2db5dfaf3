// crates/xr_config/src/reduction_config.rs

//! ReductionConfig - 归约配置文件
//!
//! JSON 格式，所有字段都有默认值：
//!
//! ```json
//! {
//!   "algorithm": "fpe4",
//!   "layout": { "floor": -1074, "ceiling": 1088 },
//!   "parallel": { "max_workers": 8, "merge_strategy": "tree" },
//!   "threads": 8
//! }
//! ```

use crate::algorithm::AlgorithmChoice;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use xr_core::{ReductionMode, SuperaccLayout};
use xr_runtime::{ParallelConfig, RayonBackend, ReductionDriver};

/// 超累加器布局配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// 最低 bin 的指数
    pub floor: i32,
    /// 可表示量级的上界指数（含进位余量）
    pub ceiling: i32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let layout = SuperaccLayout::ieee_f64();
        Self {
            floor: layout.floor(),
            ceiling: layout.ceiling(),
        }
    }
}

impl LayoutConfig {
    /// 构建布局
    pub fn build(&self) -> Result<SuperaccLayout, ConfigError> {
        SuperaccLayout::new(self.floor, self.ceiling).map_err(|e| {
            ConfigError::from_core("layout", format!("[{}, {}]", self.floor, self.ceiling), e)
        })
    }
}

/// 归约配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReductionConfig {
    /// 归约算法
    #[serde(default)]
    pub algorithm: AlgorithmChoice,

    /// 超累加器布局
    #[serde(default)]
    pub layout: LayoutConfig,

    /// 并行配置
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// 专用线程池的线程数；缺省时使用 rayon 全局线程池
    #[serde(default)]
    pub threads: Option<usize>,
}

impl ReductionConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        let config: ReductionConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        info!(path = %path.as_ref().display(), algorithm = %config.algorithm, "已加载归约配置");
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.build()?;
        self.parallel.validate().map_err(|e| {
            ConfigError::from_core("parallel", format!("{:?}", self.parallel), e)
        })?;
        if self.threads == Some(0) {
            return Err(ConfigError::invalid("threads", 0, "线程数必须大于 0"));
        }
        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 按配置构建执行后端
    pub fn backend(&self) -> Result<RayonBackend, ConfigError> {
        match self.threads {
            Some(threads) => Ok(RayonBackend::with_threads(threads)?),
            None => Ok(RayonBackend::global()),
        }
    }

    /// 以给定模式构建驱动，布局、并行配置与线程数取自本配置
    pub fn driver(&self, mode: ReductionMode) -> Result<ReductionDriver, ConfigError> {
        let mut parallel = self.parallel.clone();
        if let Some(threads) = self.threads {
            parallel.max_workers = parallel.max_workers.min(threads).max(1);
        }
        Ok(ReductionDriver::new(
            self.backend()?,
            mode,
            self.layout.build()?,
            parallel,
        ))
    }
}
