// crates/xr_oracle/src/lib.rs

//! XR 测试参照（仅用于测试）
//!
//! 用任意精度整数表示双精度数与双精度乘积的精确和，并独立实现
//! 最近偶数舍入。与核心的超累加器不共享任何累加或舍入代码，
//! 只共享 `xr_foundation::float` 的位分解与缩放。
//!
//! # 表示
//!
//! 所有量都以 `2^-2148` 为单位存成整数：两个最小次正规数之积为 `2^-2148`，
//! 因此任意有限双精度数及其两两乘积都是该单位的整数倍。
//!
//! 三角求解的精确解一般不是二进制有限小数，[`rational_trsv`] 用有理数
//! （`num_rational::BigRational`）做回代，最后才舍入到双精度。

#![warn(missing_docs)]
#![warn(clippy::all)]

use num_bigint::{BigInt, BigUint, Sign};
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};
use xr_foundation::float::{decompose, scalbn, Decomposed, MANTISSA_BITS, MIN_EXPONENT};

/// 整数单位的指数（2^-2148）
const SCALE: i32 = 2 * -MIN_EXPONENT;

fn decomposed(x: f64) -> Decomposed {
    match decompose(x) {
        Some(d) => d,
        None => panic!("精确参照只接受有限值, 得到 {}", x),
    }
}

fn signed(negative: bool, magnitude: BigInt) -> BigInt {
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// 精确和
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExactSum {
    value: BigInt,
}

impl ExactSum {
    /// 空和
    pub fn new() -> Self {
        Self::default()
    }

    /// 加一个有限双精度数
    ///
    /// # Panics
    ///
    /// `x` 为 NaN 或无穷时 panic。
    pub fn add(&mut self, x: f64) {
        let d = decomposed(x);
        let shift = (d.exponent + SCALE) as usize;
        self.value += signed(d.negative, BigInt::from(d.mantissa) << shift);
    }

    /// 加精确乘积 `a·b`
    pub fn add_product(&mut self, a: f64, b: f64) {
        let da = decomposed(a);
        let db = decomposed(b);
        let shift = (da.exponent + db.exponent + SCALE) as usize;
        let magnitude = (BigInt::from(da.mantissa) * BigInt::from(db.mantissa)) << shift;
        self.value += signed(da.negative != db.negative, magnitude);
    }

    /// 减去精确乘积 `a·b`
    pub fn sub_product(&mut self, a: f64, b: f64) {
        self.add_product(-a, b);
    }

    /// 合并另一个精确和
    pub fn merge(&mut self, other: &ExactSum) {
        self.value += &other.value;
    }

    /// 是否为零
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// 精确值的符号：-1、0、1
    pub fn signum(&self) -> i32 {
        match self.value.sign() {
            Sign::Minus => -1,
            Sign::NoSign => 0,
            Sign::Plus => 1,
        }
    }

    /// 最近偶数舍入
    pub fn to_f64(&self) -> f64 {
        round_scaled(self.value.sign() == Sign::Minus, self.value.magnitude())
    }
}

/// 把 `magnitude · 2^-2148` 舍入到最近的双精度数（偶数优先）
///
/// 最低位同时充当粘滞位：它远低于任何双精度数的舍入位。
fn round_scaled(negative: bool, magnitude: &BigUint) -> f64 {
    if magnitude.is_zero() {
        return 0.0;
    }
    let msb = magnitude.bits() - 1;
    // 次正规数的最低位 2^-1074
    let subnormal_lsb = (SCALE + MIN_EXPONENT) as u64;
    let lsb = msb.saturating_sub(MANTISSA_BITS as u64).max(subnormal_lsb);

    let mut mantissa = (magnitude >> lsb as usize).to_u64().unwrap_or(u64::MAX);
    let below = lsb as usize - 1;
    let round_bit = !((magnitude >> below) & BigUint::from(1u8)).is_zero();
    let sticky = !(magnitude - ((magnitude >> below) << below)).is_zero();
    if round_bit && (sticky || mantissa & 1 == 1) {
        mantissa += 1;
    }

    let value = scalbn(mantissa as f64, lsb as i32 - SCALE);
    if negative {
        -value
    } else {
        value
    }
}

/// 有限双精度数的精确有理值
pub fn to_rational(x: f64) -> BigRational {
    let d = decomposed(x);
    let mantissa = signed(d.negative, BigInt::from(d.mantissa));
    if d.exponent >= 0 {
        BigRational::from_integer(mantissa << d.exponent as usize)
    } else {
        BigRational::new(mantissa, BigInt::one() << (-d.exponent) as usize)
    }
}

/// 有理数的正确舍入（偶数优先）
pub fn round_rational(q: &BigRational) -> f64 {
    let numer = q.numer().magnitude();
    let denom = q.denom().magnitude();
    let scaled = numer << SCALE as usize;
    let mut quotient = &scaled / denom;
    if !(&scaled % denom).is_zero() {
        quotient |= BigUint::one();
    }
    // 分母恒为正
    round_scaled(q.numer().sign() == Sign::Minus, &quotient)
}

/// 一组双精度数的正确舍入和
pub fn exact_sum(values: &[f64]) -> f64 {
    let mut sum = ExactSum::new();
    for &x in values {
        sum.add(x);
    }
    sum.to_f64()
}

/// 正确舍入点积
pub fn exact_dot(x: &[f64], y: &[f64]) -> f64 {
    assert_eq!(x.len(), y.len(), "点积长度不一致");
    let mut sum = ExactSum::new();
    for (&a, &b) in x.iter().zip(y) {
        sum.add_product(a, b);
    }
    sum.to_f64()
}

/// 逐行舍入的三角求解参照（行主序，非单位对角）
///
/// 每行 `x_i = RN(b_i - Σ a_ij·x_j) / a_ii`，`x_j` 取之前已舍入的值：行内和精确舍入
/// 一次，再做一次 IEEE 除法。这是逐行精确求解器应当逐位复现的结果，不是方程的精确解；
/// 精确解见 [`rational_trsv`]。
pub fn rowwise_trsv(upper: bool, n: usize, a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), n * n, "矩阵尺寸不一致");
    assert_eq!(b.len(), n, "右端项长度不一致");
    let mut x = vec![0.0; n];
    for i in substitution_order(upper, n) {
        let mut sum = ExactSum::new();
        sum.add(b[i]);
        for j in off_diagonal(upper, n, i) {
            sum.sub_product(a[i * n + j], x[j]);
        }
        x[i] = sum.to_f64() / a[i * n + i];
    }
    x
}

/// 三角方程组 `A·x = b` 的精确解，逐分量正确舍入（行主序，非单位对角）
///
/// 回代全程使用有理数，`x_j` 不做中间舍入。
///
/// # Panics
///
/// 尺寸不一致、对角元为零或输入含非有限值时 panic。
pub fn rational_trsv(upper: bool, n: usize, a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), n * n, "矩阵尺寸不一致");
    assert_eq!(b.len(), n, "右端项长度不一致");
    let mut x: Vec<BigRational> = vec![BigRational::zero(); n];
    for i in substitution_order(upper, n) {
        let mut s = to_rational(b[i]);
        for j in off_diagonal(upper, n, i) {
            if a[i * n + j] != 0.0 {
                s -= to_rational(a[i * n + j]) * &x[j];
            }
        }
        let diagonal = a[i * n + i];
        assert!(diagonal != 0.0, "第 {} 行对角元为零", i);
        x[i] = s / to_rational(diagonal);
    }
    x.iter().map(round_rational).collect()
}

fn substitution_order(upper: bool, n: usize) -> Vec<usize> {
    if upper {
        (0..n).rev().collect()
    } else {
        (0..n).collect()
    }
}

fn off_diagonal(upper: bool, n: usize, i: usize) -> std::ops::Range<usize> {
    if upper {
        i + 1..n
    } else {
        0..i
    }
}

/// 矩阵乘参照：`C + A·B`（行主序，A 为 m×k，B 为 k×n）
pub fn exact_gemm(m: usize, n: usize, k: usize, a: &[f64], b: &[f64], c: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), m * k, "A 尺寸不一致");
    assert_eq!(b.len(), k * n, "B 尺寸不一致");
    assert_eq!(c.len(), m * n, "C 尺寸不一致");
    let mut out = vec![0.0; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = ExactSum::new();
            sum.add(c[i * n + j]);
            for p in 0..k {
                sum.add_product(a[i * k + p], b[p * n + j]);
            }
            out[i * n + j] = sum.to_f64();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_sum_simple() {
        assert_eq!(exact_sum(&[]), 0.0);
        assert_eq!(exact_sum(&[1.0, 2.0]), 3.0);
        assert_eq!(exact_sum(&[0.1, 0.2, -0.3]), 2f64.powi(-55));
        assert_eq!(exact_sum(&[1e300, 1.0, -1e300]), 1.0);
    }

    #[test]
    fn test_rounding() {
        let half_ulp = 2f64.powi(-53);
        assert_eq!(exact_sum(&[1.0, half_ulp]), 1.0);
        assert_eq!(exact_sum(&[1.0 + f64::EPSILON, half_ulp]), 1.0 + 2.0 * f64::EPSILON);
        assert_eq!(exact_sum(&[1.0, half_ulp, 2f64.powi(-300)]), 1.0 + f64::EPSILON);
        assert_eq!(exact_sum(&[-1.0, -half_ulp, -2f64.powi(-300)]), -1.0 - f64::EPSILON);
    }

    #[test]
    fn test_subnormal_and_overflow() {
        let tiny = f64::from_bits(1);
        assert_eq!(exact_sum(&[tiny, tiny]), f64::from_bits(2));
        assert_eq!(exact_sum(&[f64::MAX, f64::MAX]), f64::INFINITY);
        // 乘积落在 2^-1074 以下
        assert_eq!(exact_dot(&[tiny], &[0.25]), 0.0);
        assert_eq!(exact_dot(&[tiny], &[0.75]), tiny);
    }

    #[test]
    fn test_exact_dot() {
        let a = 1.0 + 2f64.powi(-30);
        let b = 1.0 - 2f64.powi(-30);
        let mut sum = ExactSum::new();
        sum.add_product(a, b);
        sum.add(-1.0);
        assert_eq!(sum.to_f64(), -(2f64.powi(-60)));
        assert_eq!(sum.signum(), -1);
    }

    #[test]
    fn test_rowwise_trsv_identity() {
        let a = [2.0, 0.0, 0.0, 4.0];
        assert_eq!(rowwise_trsv(true, 2, &a, &[1.0, 2.0]), vec![0.5, 0.5]);
        let lower = [1.0, 0.0, 1.0, 1.0];
        assert_eq!(rowwise_trsv(false, 2, &lower, &[3.0, 5.0]), vec![3.0, 2.0]);
    }

    #[test]
    fn test_round_rational() {
        assert_eq!(round_rational(&to_rational(0.1)), 0.1);
        assert_eq!(round_rational(&to_rational(-f64::MAX)), -f64::MAX);
        assert_eq!(round_rational(&to_rational(f64::from_bits(1))), f64::from_bits(1));
        let third = BigRational::new(BigInt::from(1), BigInt::from(3));
        assert_eq!(round_rational(&third), 1.0 / 3.0);
        assert_eq!(round_rational(&-third), -1.0 / 3.0);
        // 1 + 2^-53 + 2^-2200：中点之上，粘滞位决定进位
        let above = to_rational(1.0)
            + BigRational::new(BigInt::one(), BigInt::one() << 53usize)
            + BigRational::new(BigInt::one(), BigInt::one() << 2200usize);
        assert_eq!(round_rational(&above), 1.0 + f64::EPSILON);
    }

    #[test]
    fn test_rational_trsv_keeps_intermediates_exact() {
        // x1 = 1/3 不可表示；逐行舍入把误差带进 x0，精确回代不会
        let a = [1.0, 3.0, 0.0, 3.0];
        let b = [1.0, 1.0];
        assert_eq!(rational_trsv(true, 2, &a, &b), vec![0.0, 1.0 / 3.0]);
        let rowwise = rowwise_trsv(true, 2, &a, &b);
        assert_eq!(rowwise[1], 1.0 / 3.0);
        assert_ne!(rowwise[0], 0.0);

        let lower = [2.0, 0.0, 1.0, 4.0];
        assert_eq!(rational_trsv(false, 2, &lower, &[2.0, 5.0]), vec![1.0, 1.0]);
    }

    #[test]
    fn test_exact_gemm() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let c = [1.0, 0.0, 0.0, 1.0];
        assert_eq!(exact_gemm(2, 2, 2, &a, &b, &c), vec![20.0, 22.0, 43.0, 51.0]);
    }
}
