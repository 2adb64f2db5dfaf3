// crates/xr_core/src/mode.rs

//! 归约模式
//!
//! 归约所用的累加器在构造时一次性选定：超累加器，或 `K` 槽位浮点展开
//! （可选提前退出）。运行期通过 [`ModeVisitor`] 分派到单态化的累加器类型，
//! 热循环里没有任何动态分派。
//!
//! 文本形式：`superacc`、`fpe2`…`fpe8`、`fpe2ee`…`fpe8ee`。

use crate::accumulator::ExactAccumulator;
use crate::fpe::FloatExpansion;
use crate::superacc::Superaccumulator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use xr_foundation::error::{XrError, XrResult};

/// 展开槽位数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum ExpansionSlots {
    /// 2 个槽位
    Two,
    /// 3 个槽位
    Three,
    /// 4 个槽位
    Four,
    /// 6 个槽位
    Six,
    /// 8 个槽位
    Eight,
}

impl ExpansionSlots {
    /// 所有支持的宽度
    pub const ALL: [ExpansionSlots; 5] = [Self::Two, Self::Three, Self::Four, Self::Six, Self::Eight];

    /// 槽位数
    pub fn count(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Six => 6,
            Self::Eight => 8,
        }
    }

    /// 从槽位数构造
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            4 => Some(Self::Four),
            6 => Some(Self::Six),
            8 => Some(Self::Eight),
            _ => None,
        }
    }
}

impl TryFrom<usize> for ExpansionSlots {
    type Error = XrError;

    fn try_from(count: usize) -> XrResult<Self> {
        Self::from_count(count).ok_or_else(|| {
            XrError::invalid_argument("slots", format!("不支持 {} 个槽位，可选 2/3/4/6/8", count))
        })
    }
}

impl From<ExpansionSlots> for usize {
    fn from(slots: ExpansionSlots) -> usize {
        slots.count()
    }
}

/// 归约模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReductionMode {
    /// 只用超累加器
    Superaccumulator,
    /// 浮点展开 + 超累加器
    Expansion {
        /// 槽位数
        slots: ExpansionSlots,
        /// 是否提前退出
        early_exit: bool,
    },
}

impl ReductionMode {
    /// 从旧式整数参数构造：0 表示只用超累加器，其余为槽位数
    pub fn from_nbfpe(nbfpe: usize, early_exit: bool) -> XrResult<Self> {
        if nbfpe == 0 {
            return Ok(Self::Superaccumulator);
        }
        let slots = ExpansionSlots::try_from(nbfpe)?;
        Ok(Self::Expansion { slots, early_exit })
    }

    /// 旧式整数参数
    pub fn nbfpe(&self) -> usize {
        match self {
            Self::Superaccumulator => 0,
            Self::Expansion { slots, .. } => slots.count(),
        }
    }

    /// 是否提前退出
    pub fn early_exit(&self) -> bool {
        matches!(self, Self::Expansion { early_exit: true, .. })
    }

    /// 所有模式
    pub fn all() -> Vec<ReductionMode> {
        let mut modes = vec![Self::Superaccumulator];
        for early_exit in [false, true] {
            for slots in ExpansionSlots::ALL {
                modes.push(Self::Expansion { slots, early_exit });
            }
        }
        modes
    }

    /// 分派到单态化的累加器类型
    pub fn dispatch<V: ModeVisitor>(self, visitor: V) -> V::Output {
        use ExpansionSlots::*;
        match self {
            Self::Superaccumulator => visitor.visit::<Superaccumulator>(),
            Self::Expansion { slots, early_exit } => match (slots, early_exit) {
                (Two, false) => visitor.visit::<FloatExpansion<2, false>>(),
                (Three, false) => visitor.visit::<FloatExpansion<3, false>>(),
                (Four, false) => visitor.visit::<FloatExpansion<4, false>>(),
                (Six, false) => visitor.visit::<FloatExpansion<6, false>>(),
                (Eight, false) => visitor.visit::<FloatExpansion<8, false>>(),
                (Two, true) => visitor.visit::<FloatExpansion<2, true>>(),
                (Three, true) => visitor.visit::<FloatExpansion<3, true>>(),
                (Four, true) => visitor.visit::<FloatExpansion<4, true>>(),
                (Six, true) => visitor.visit::<FloatExpansion<6, true>>(),
                (Eight, true) => visitor.visit::<FloatExpansion<8, true>>(),
            },
        }
    }
}

impl Default for ReductionMode {
    fn default() -> Self {
        Self::Expansion {
            slots: ExpansionSlots::Four,
            early_exit: false,
        }
    }
}

impl fmt::Display for ReductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Superaccumulator => write!(f, "superacc"),
            Self::Expansion { slots, early_exit } => {
                write!(f, "fpe{}", slots.count())?;
                if *early_exit {
                    write!(f, "ee")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for ReductionMode {
    type Err = XrError;

    fn from_str(s: &str) -> XrResult<Self> {
        let lower = s.trim().to_lowercase();
        if matches!(lower.as_str(), "superacc" | "kulisch" | "fpe0") {
            return Ok(Self::Superaccumulator);
        }
        let invalid = || {
            XrError::invalid_argument(
                "mode",
                format!("无法识别 '{}'，可选 superacc, fpe<K>, fpe<K>ee", s),
            )
        };
        let rest = lower.strip_prefix("fpe").ok_or_else(invalid)?;
        let (digits, early_exit) = match rest.strip_suffix("ee") {
            Some(digits) => (digits, true),
            None => (rest, false),
        };
        let nbfpe: usize = digits.parse().map_err(|_| invalid())?;
        if nbfpe == 0 {
            return Err(invalid());
        }
        Self::from_nbfpe(nbfpe, early_exit)
    }
}

impl TryFrom<String> for ReductionMode {
    type Error = XrError;

    fn try_from(s: String) -> XrResult<Self> {
        s.parse()
    }
}

impl From<ReductionMode> for String {
    fn from(mode: ReductionMode) -> String {
        mode.to_string()
    }
}

/// 按累加器类型单态化的访问者
pub trait ModeVisitor {
    /// 返回类型
    type Output;

    /// 以选定的累加器类型执行
    fn visit<A: ExactAccumulator>(self) -> Self::Output;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for mode in ReductionMode::all() {
            let text = mode.to_string();
            assert_eq!(text.parse::<ReductionMode>().unwrap(), mode);
        }
        assert_eq!("FPE8EE".parse::<ReductionMode>().unwrap().nbfpe(), 8);
        assert_eq!(
            "kulisch".parse::<ReductionMode>().unwrap(),
            ReductionMode::Superaccumulator
        );
        assert!("fpe5".parse::<ReductionMode>().is_err());
        assert!("fpe0ee".parse::<ReductionMode>().is_err());
        assert!("dot".parse::<ReductionMode>().is_err());
    }

    #[test]
    fn test_from_nbfpe() {
        assert_eq!(
            ReductionMode::from_nbfpe(0, false).unwrap(),
            ReductionMode::Superaccumulator
        );
        let mode = ReductionMode::from_nbfpe(6, true).unwrap();
        assert!(mode.early_exit());
        assert_eq!(mode.nbfpe(), 6);
        assert!(ReductionMode::from_nbfpe(7, false).is_err());
        assert_eq!(ReductionMode::all().len(), 11);
    }

    #[test]
    fn test_serde() {
        let mode = ReductionMode::from_nbfpe(4, true).unwrap();
        let json = serde_json::to_string(&mode).unwrap();
        assert_eq!(json, "\"fpe4ee\"");
        let back: ReductionMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mode);
        assert!(serde_json::from_str::<ReductionMode>("\"fpe9\"").is_err());

        let slots: ExpansionSlots = serde_json::from_str("3").unwrap();
        assert_eq!(slots, ExpansionSlots::Three);
    }

    struct NameOf;

    impl ModeVisitor for NameOf {
        type Output = &'static str;

        fn visit<A: ExactAccumulator>(self) -> &'static str {
            A::NAME
        }
    }

    #[test]
    fn test_dispatch() {
        assert_eq!(ReductionMode::Superaccumulator.dispatch(NameOf), "superacc");
        assert_eq!(ReductionMode::default().dispatch(NameOf), "fpe");
    }
}
