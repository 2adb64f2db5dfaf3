// crates/xr_config/src/algorithm.rs

//! 归约算法选择
//!
//! 在可复现模式之外多出一个 `standard`：普通 IEEE 顺序归约，
//! 仅用作对照。

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use xr_core::ReductionMode;

/// 算法选择
///
/// # 示例
///
/// ```rust
/// use xr_config::AlgorithmChoice;
///
/// let algo: AlgorithmChoice = "fpe8ee".parse().unwrap();
/// assert!(algo.is_exact());
/// assert_eq!(algo.to_string(), "fpe8ee");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AlgorithmChoice {
    /// 普通 IEEE 双精度
    Standard,
    /// 可复现归约
    Exact(ReductionMode),
}

impl AlgorithmChoice {
    /// 全部选择：`standard` 在前，之后是全部可复现模式
    pub fn all() -> Vec<AlgorithmChoice> {
        std::iter::once(Self::Standard)
            .chain(ReductionMode::all().into_iter().map(Self::Exact))
            .collect()
    }

    /// 是否为可复现归约
    #[inline]
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }

    /// 可复现模式
    pub fn mode(&self) -> Option<ReductionMode> {
        match self {
            Self::Standard => None,
            Self::Exact(mode) => Some(*mode),
        }
    }
}

impl Default for AlgorithmChoice {
    fn default() -> Self {
        Self::Exact(ReductionMode::default())
    }
}

impl fmt::Display for AlgorithmChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Exact(mode) => write!(f, "{}", mode),
        }
    }
}

impl FromStr for AlgorithmChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "ieee" | "naive" => Ok(Self::Standard),
            other => other
                .parse::<ReductionMode>()
                .map(Self::Exact)
                .map_err(|e| ConfigError::from_core("algorithm", s, e)),
        }
    }
}

impl TryFrom<String> for AlgorithmChoice {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AlgorithmChoice> for String {
    fn from(choice: AlgorithmChoice) -> String {
        choice.to_string()
    }
}

impl From<ReductionMode> for AlgorithmChoice {
    fn from(mode: ReductionMode) -> Self {
        Self::Exact(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("standard".parse::<AlgorithmChoice>().unwrap(), AlgorithmChoice::Standard);
        assert_eq!(
            "SUPERACC".parse::<AlgorithmChoice>().unwrap(),
            AlgorithmChoice::Exact(ReductionMode::Superaccumulator)
        );
        assert!("fpe5".parse::<AlgorithmChoice>().is_err());
        assert!("quad".parse::<AlgorithmChoice>().is_err());
    }

    #[test]
    fn test_all_round_trips_through_display() {
        let all = AlgorithmChoice::all();
        assert_eq!(all.len(), 12);
        for choice in all {
            assert_eq!(choice.to_string().parse::<AlgorithmChoice>().unwrap(), choice);
        }
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&AlgorithmChoice::Standard).unwrap();
        assert_eq!(json, "\"standard\"");
        let parsed: AlgorithmChoice = serde_json::from_str("\"fpe3\"").unwrap();
        assert_eq!(parsed.mode(), Some(ReductionMode::from_nbfpe(3, false).unwrap()));
        assert!(serde_json::from_str::<AlgorithmChoice>("\"fpe7\"").is_err());
    }
}
