// crates/xr_blas/src/reference.rs

//! 普通 IEEE 双精度参考实现
//!
//! 按下标顺序逐次舍入，不做任何补偿，用作精度与性能的对照。
//! 矩阵均为紧凑行主序。

use crate::view::Uplo;

/// 顺序求和
pub fn sum(x: &[f64]) -> f64 {
    x.iter().fold(0.0, |acc, &v| acc + v)
}

/// 顺序点积（先乘后加，不使用 FMA）
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).fold(0.0, |acc, (&a, &b)| acc + a * b)
}

/// 回代 / 前代求解 `A·x = b`
pub fn trsv(uplo: Uplo, n: usize, a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut x = b[..n].to_vec();
    for step in 0..n {
        let i = match uplo {
            Uplo::Upper => n - 1 - step,
            Uplo::Lower => step,
        };
        let cols = match uplo {
            Uplo::Upper => i + 1..n,
            Uplo::Lower => 0..i,
        };
        let mut s = x[i];
        for j in cols {
            s -= a[i * n + j] * x[j];
        }
        x[i] = s / a[i * n + i];
    }
    x
}

/// `C ← C + A·B`，A 为 m×k，B 为 k×n
pub fn gemm(m: usize, n: usize, k: usize, a: &[f64], b: &[f64], c: &mut [f64]) {
    for i in 0..m {
        for j in 0..n {
            let mut s = c[i * n + j];
            for p in 0..k {
                s += a[i * k + p] * b[p * n + j];
            }
            c[i * n + j] = s;
        }
    }
}
