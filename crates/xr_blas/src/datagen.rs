// crates/xr_blas/src/datagen.rs

//! 合成测试数据
//!
//! 所有生成器使用带种子的 `StdRng`，同一种子总是给出同一组数据；
//! 结果放在 64 字节对齐的 [`AlignedVec`] 中。

use crate::view::Uplo;
use rand::prelude::*;
use std::f64::consts::PI;
use xr_foundation::float::scalbn;
use xr_foundation::memory::AlignedVec;

/// 数据生成器
#[derive(Debug, Clone)]
pub struct DataGenerator {
    rng: StdRng,
}

impl DataGenerator {
    /// 以给定种子创建
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn sign(&mut self) -> f64 {
        if self.rng.gen_bool(0.5) {
            1.0
        } else {
            -1.0
        }
    }

    /// 尾数均匀、指数在 `[emax − range, emax]` 内均匀、符号随机的单个值
    fn fp_value(&mut self, range: i32, emax: i32) -> f64 {
        let mantissa: f64 = self.rng.gen_range(1.0..2.0);
        let exponent = self.rng.gen_range(emax - range.max(0)..=emax);
        self.sign() * scalbn(mantissa, exponent)
    }

    /// 全部为 0.1
    pub fn naive(&mut self, n: usize) -> AlignedVec<f64> {
        std::iter::repeat(0.1).take(n).collect()
    }

    /// `[lo, hi)` 内均匀分布
    pub fn uniform_in(&mut self, n: usize, lo: f64, hi: f64) -> AlignedVec<f64> {
        (0..n).map(|_| self.rng.gen_range(lo..hi)).collect()
    }

    /// 浮点均匀分布：随机尾数、`[emax − range, emax]` 内随机指数、随机符号
    pub fn fp_uniform(&mut self, n: usize, range: i32, emax: i32) -> AlignedVec<f64> {
        (0..n).map(|_| self.fp_value(range, emax)).collect()
    }

    /// 病态数据：成对出现的 `x` 与 `−x + δ`，`δ` 比 `x` 小约 `2^range`
    ///
    /// 大项两两抵消，精确和由各 `δ` 决定，朴素求和的相对误差随 `range` 增长。
    pub fn ill_conditioned(&mut self, n: usize, range: i32) -> AlignedVec<f64> {
        let mut out = Vec::with_capacity(n);
        while out.len() + 1 < n {
            let x = self.fp_value(range / 2, range / 2);
            let delta = self.fp_value(range / 2, -(range / 2));
            out.push(x);
            out.push(-x + delta);
        }
        if out.len() < n {
            let tail = self.fp_value(range / 2, -(range / 2));
            out.push(tail);
        }
        out.shuffle(&mut self.rng);
        out.into_iter().collect()
    }

    /// 对数正态分布（Box-Muller 生成正态量）
    pub fn lognormal(&mut self, n: usize, mean: f64, stddev: f64) -> AlignedVec<f64> {
        (0..n)
            .map(|_| {
                // 1 - u ∈ (0, 1]，避免 ln(0)
                let u1: f64 = 1.0 - self.rng.gen::<f64>();
                let u2: f64 = self.rng.gen();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
                (mean + stddev * z).exp()
            })
            .collect()
    }

    /// 紧凑行主序的 n×n 三角矩阵
    ///
    /// 非对角元在 `[-1, 1)` 内均匀，对角元为 `±[1, 2)·diag_scale`，三角外为零。
    pub fn triangular_matrix(&mut self, uplo: Uplo, n: usize, diag_scale: f64) -> AlignedVec<f64> {
        let mut a = AlignedVec::zeros(n * n);
        for i in 0..n {
            let cols = match uplo {
                Uplo::Upper => i..n,
                Uplo::Lower => 0..i + 1,
            };
            for j in cols {
                a[i * n + j] = if i == j {
                    self.sign() * self.rng.gen_range(1.0..2.0) * diag_scale
                } else {
                    self.rng.gen_range(-1.0..1.0)
                };
            }
        }
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_generators_are_deterministic() {
        let a = DataGenerator::new(42).fp_uniform(100, 50, 10);
        let b = DataGenerator::new(42).fp_uniform(100, 50, 10);
        assert_eq!(a.as_slice(), b.as_slice());
        assert_eq!(a.as_ptr() as usize % 64, 0);
    }

    #[test]
    fn test_fp_uniform_exponent_range() {
        let data = DataGenerator::new(1).fp_uniform(10_000, 20, 5);
        for &v in data.iter() {
            let m = v.abs();
            assert!(m >= 2f64.powi(-15) && m < 2f64.powi(6), "{}", v);
        }
    }

    #[test]
    fn test_ill_conditioned_cancels() {
        let data = DataGenerator::new(3).ill_conditioned(1001, 60);
        assert_eq!(data.len(), 1001);
        let total_abs: f64 = data.iter().map(|v| v.abs()).sum();
        let exact = xr_oracle::exact_sum(&data);
        assert!(exact.abs() < total_abs * 1e-6);
    }

    #[test]
    fn test_lognormal_positive() {
        let data = DataGenerator::new(5).lognormal(1000, 0.0, 2.0);
        assert!(data.iter().all(|&v| v > 0.0 && v.is_finite()));
    }

    #[test]
    fn test_triangular_shape() {
        let n = 5;
        let a = DataGenerator::new(9).triangular_matrix(Uplo::Lower, n, 4.0);
        for i in 0..n {
            for j in 0..n {
                let v = a[i * n + j];
                if j > i {
                    assert_eq!(v, 0.0);
                } else if i == j {
                    assert!(v.abs() >= 4.0 && v.abs() < 8.0);
                }
            }
        }
        assert_eq!(DataGenerator::new(0).naive(3).as_slice(), &[0.1, 0.1, 0.1]);
    }
}
