// crates/xr_core/src/eft.rs

//! 无误差变换（Error-Free Transformations）
//!
//! 把一次浮点加法或乘法拆成 `(舍入结果, 精确误差)`，两者之和在实数意义下
//! 精确等于原运算的数学结果。所有函数都是纯函数。
//!
//! # 适用范围
//!
//! 精确性只对有限操作数成立：
//! - 加法要求结果不溢出
//! - 乘法还要求乘积不落入下溢区间（误差项需要可表示）
//!
//! NaN/Inf 按 IEEE 规则透传，不保证精确。

use xr_foundation::float::{decompose, MIN_EXPONENT};

/// 无误差变换结果
///
/// `value + error`（无穷精度）等于原运算的精确结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eft {
    /// 舍入后的结果
    pub value: f64,
    /// 精确舍入误差
    pub error: f64,
}

impl Eft {
    /// 误差是否为零（原运算本身精确）
    #[inline]
    pub fn is_exact(&self) -> bool {
        self.error == 0.0
    }

    /// 拆成元组
    #[inline]
    pub fn into_parts(self) -> (f64, f64) {
        (self.value, self.error)
    }
}

/// [`two_product_fma`] 的误差项是否精确
///
/// 乘积不溢出，且精确乘积最低位的权重不低于 2^-1074（否则误差项落入下溢区间被舍入）。
/// 任一操作数为零时乘积本身精确。
#[inline]
pub fn two_product_is_exact(a: f64, b: f64) -> bool {
    match (decompose(a), decompose(b)) {
        (Some(da), Some(db)) => {
            da.is_zero()
                || db.is_zero()
                || ((a * b).is_finite() && da.exponent + db.exponent >= MIN_EXPONENT)
        }
        _ => false,
    }
}

/// Veltkamp 拆分常数 2^27 + 1
const SPLIT_FACTOR: f64 = 134_217_729.0;

/// Knuth TwoSum：不依赖操作数大小顺序
#[inline]
pub fn two_sum(a: f64, b: f64) -> Eft {
    let s = a + b;
    let bb = s - a;
    let error = (a - (s - bb)) + (b - bb);
    Eft { value: s, error }
}

/// Dekker FastTwoSum
///
/// 前提：`|a| >= |b|`（或 `a` 的指数不小于 `b`）。不满足前提时误差项不精确。
#[inline]
pub fn fast_two_sum(a: f64, b: f64) -> Eft {
    let s = a + b;
    let error = b - (s - a);
    Eft { value: s, error }
}

/// 按绝对值排序后调用 [`fast_two_sum`]
///
/// 比 [`two_sum`] 少三次浮点运算，多一次分支。
#[inline]
pub fn two_sum_ordered(a: f64, b: f64) -> Eft {
    if a.abs() >= b.abs() {
        fast_two_sum(a, b)
    } else {
        fast_two_sum(b, a)
    }
}

/// 基于 FMA 的 TwoProduct
///
/// `f64::mul_add` 保证只舍入一次，因此误差项 `fma(a, b, -p)` 是精确的。
#[inline]
pub fn two_product_fma(a: f64, b: f64) -> Eft {
    let p = a * b;
    let error = a.mul_add(b, -p);
    Eft { value: p, error }
}

/// Veltkamp 拆分：`a = hi + lo`，两部分各不超过 26 位有效数字
#[inline]
pub fn split(a: f64) -> (f64, f64) {
    let c = SPLIT_FACTOR * a;
    let hi = c - (c - a);
    let lo = a - hi;
    (hi, lo)
}

/// Dekker TwoProduct（无 FMA 时的回退实现）
///
/// 要求 `|a|`、`|b|` 小于 2^996，否则拆分会溢出。
#[inline]
pub fn two_product_dekker(a: f64, b: f64) -> Eft {
    let p = a * b;
    let (ah, al) = split(a);
    let (bh, bl) = split(b);
    let error = al * bl - (((p - ah * bh) - al * bh) - ah * bl);
    Eft { value: p, error }
}
