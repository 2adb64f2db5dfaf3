// crates/xr_foundation/src/float.rs

//! IEEE-754 双精度位级工具
//!
//! 将有限双精度数分解为 `(-1)^s · m · 2^e` 的整数形式，并提供精确的
//! 2 的幂缩放。超累加器与测试中的精确参照都建立在这两个操作之上。
//!
//! # 表示约定
//!
//! - `mantissa` 为不超过 53 位的整数（规格化数含隐含位）
//! - `exponent` 为 `mantissa` 最低位的权重指数，最小为 [`MIN_EXPONENT`]

// ============================================================================
// 数值常量
// ============================================================================

/// 显式尾数位数
pub const MANTISSA_BITS: u32 = 52;

/// 指数偏置
pub const EXPONENT_BIAS: i32 = 1023;

/// 最小次正规数最低位的权重指数 (2^-1074)
pub const MIN_EXPONENT: i32 = -1074;

/// 有限双精度数的指数上界（不含），所有有限值满足 |x| < 2^1024
pub const MAX_EXPONENT: i32 = 1024;

const FRACTION_MASK: u64 = (1 << MANTISSA_BITS) - 1;
const IMPLICIT_BIT: u64 = 1 << MANTISSA_BITS;

// ============================================================================
// 分解
// ============================================================================

/// 有限双精度数的整数分解
///
/// 值等于 `(-1)^negative · mantissa · 2^exponent`，且没有舍入。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decomposed {
    /// 符号位
    pub negative: bool,
    /// 整数尾数（0 表示 ±0）
    pub mantissa: u64,
    /// 尾数最低位的权重指数
    pub exponent: i32,
}

impl Decomposed {
    /// 是否为零
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }
}

/// 分解有限双精度数；NaN 与 ±Inf 返回 `None`
#[inline]
pub fn decompose(x: f64) -> Option<Decomposed> {
    if !x.is_finite() {
        return None;
    }
    let bits = x.to_bits();
    let negative = bits >> 63 == 1;
    let biased = ((bits >> MANTISSA_BITS) & 0x7ff) as i32;
    let fraction = bits & FRACTION_MASK;

    let (mantissa, exponent) = if biased == 0 {
        // 次正规数与零
        (fraction, MIN_EXPONENT)
    } else {
        (
            fraction | IMPLICIT_BIT,
            biased - EXPONENT_BIAS - MANTISSA_BITS as i32,
        )
    };

    Some(Decomposed {
        negative,
        mantissa,
        exponent,
    })
}

// ============================================================================
// 缩放
// ============================================================================

/// 计算 `x · 2^n`
///
/// 分步缩放，中间结果不会提前溢出或下溢；当最终结果可表示时不产生任何舍入。
pub fn scalbn(x: f64, mut n: i32) -> f64 {
    let x1p1023 = f64::from_bits(0x7fe0_0000_0000_0000); // 2^1023
    let x1p53 = f64::from_bits(0x4340_0000_0000_0000); // 2^53
    let x1p_1022 = f64::from_bits(0x0010_0000_0000_0000); // 2^-1022

    let mut y = x;
    if n > 1023 {
        y *= x1p1023;
        n -= 1023;
        if n > 1023 {
            y *= x1p1023;
            n -= 1023;
            if n > 1023 {
                n = 1023;
            }
        }
    } else if n < -1022 {
        // 先缩到 2^-969，保证最终一步 n < -53 以外不会二次舍入
        y *= x1p_1022 * x1p53;
        n += 1022 - 53;
        if n < -1022 {
            y *= x1p_1022 * x1p53;
            n += 1022 - 53;
            if n < -1022 {
                n = -1022;
            }
        }
    }
    y * f64::from_bits(((EXPONENT_BIAS + n) as u64) << MANTISSA_BITS)
}

/// 最后一位单位（ulp），即 `x` 所在区间相邻双精度数的间距
///
/// 零与次正规数返回 2^-1074；非有限值返回 NaN。
pub fn ulp(x: f64) -> f64 {
    match decompose(x) {
        Some(d) => scalbn(1.0, d.exponent),
        None => f64::NAN,
    }
}
