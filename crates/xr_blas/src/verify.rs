// crates/xr_blas/src/verify.rs

//! 误差范数与求解验证

use crate::view::{MatrixView, Uplo};
use xr_foundation::error::{XrError, XrResult};

/// 标量相对误差 `|computed − exact| / |exact|`
///
/// `exact` 为零时返回绝对误差。
pub fn relative_error(computed: f64, exact: f64) -> f64 {
    let diff = (computed - exact).abs();
    if exact == 0.0 {
        diff
    } else {
        diff / exact.abs()
    }
}

/// 无穷范数相对误差 `‖c − e‖∞ / ‖e‖∞`
pub fn relative_inf_error(computed: &[f64], exact: &[f64]) -> XrResult<f64> {
    XrError::check_size("computed", exact.len(), computed.len())?;
    let diff = computed
        .iter()
        .zip(exact)
        .fold(0.0f64, |m, (&c, &e)| m.max((c - e).abs()));
    let norm = exact.iter().fold(0.0f64, |m, &e| m.max(e.abs()));
    Ok(if norm == 0.0 { diff } else { diff / norm })
}

/// 二范数相对误差 `‖c − e‖₂ / ‖e‖₂`
pub fn relative_l2_error(computed: &[f64], exact: &[f64]) -> XrResult<f64> {
    XrError::check_size("computed", exact.len(), computed.len())?;
    let diff: f64 = computed
        .iter()
        .zip(exact)
        .map(|(&c, &e)| (c - e) * (c - e))
        .sum::<f64>()
        .sqrt();
    let norm: f64 = exact.iter().map(|&e| e * e).sum::<f64>().sqrt();
    Ok(if norm == 0.0 { diff } else { diff / norm })
}

/// 残差无穷范数 `‖b − A·x‖∞`（普通双精度）
pub fn residual_norm(a: &MatrixView<'_>, x: &[f64], b: &[f64]) -> XrResult<f64> {
    XrError::check_size("x", a.cols(), x.len())?;
    XrError::check_size("b", a.rows(), b.len())?;
    Ok((0..a.rows())
        .map(|i| {
            let ax = (0..a.cols()).fold(0.0, |s, j| s + a.get(i, j) * x[j]);
            (b[i] - ax).abs()
        })
        .fold(0.0f64, f64::max))
}

/// 三角矩阵的无穷范数条件数 `‖A‖∞ · ‖A⁻¹‖∞`
///
/// 逐列代入求出 `A⁻¹`（普通双精度）。有零对角元时返回 `+∞`；空矩阵返回 1。
pub fn triangular_condition(uplo: Uplo, a: &MatrixView<'_>) -> XrResult<f64> {
    let n = a.rows();
    XrError::check_size("cols", n, a.cols())?;
    if n == 0 {
        return Ok(1.0);
    }
    if (0..n).any(|i| a.get(i, i) == 0.0) {
        return Ok(f64::INFINITY);
    }

    let in_triangle = |i: usize, j: usize| match uplo {
        Uplo::Upper => j >= i,
        Uplo::Lower => j <= i,
    };
    let norm = (0..n)
        .map(|i| (0..n).filter(|&j| in_triangle(i, j)).map(|j| a.get(i, j).abs()).sum::<f64>())
        .fold(0.0f64, f64::max);

    // 第 k 列 z 满足 A·z = e_k
    let mut inverse_rows = vec![0.0f64; n];
    let mut z = vec![0.0f64; n];
    for k in 0..n {
        for step in 0..n {
            let i = match uplo {
                Uplo::Upper => n - 1 - step,
                Uplo::Lower => step,
            };
            let mut s = if i == k { 1.0 } else { 0.0 };
            for j in (0..n).filter(|&j| j != i && in_triangle(i, j)) {
                s -= a.get(i, j) * z[j];
            }
            z[i] = s / a.get(i, i);
        }
        for (row, &v) in inverse_rows.iter_mut().zip(&z) {
            *row += v.abs();
        }
    }
    Ok(norm * inverse_rows.iter().fold(0.0f64, |m, &v| m.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_errors() {
        assert_eq!(relative_error(1.5, 1.0), 0.5);
        assert_eq!(relative_error(1e-3, 0.0), 1e-3);
        assert_eq!(relative_inf_error(&[1.0, 2.5], &[1.0, 2.0]).unwrap(), 0.25);
        assert_eq!(relative_l2_error(&[3.0, 4.0], &[0.0, 0.0]).unwrap(), 5.0);
        assert!(relative_inf_error(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_residual_and_condition() {
        let a = [2.0, 1.0, 0.0, 1e-3];
        let view = MatrixView::row_major(&a, 2, 2).unwrap();
        assert_eq!(residual_norm(&view, &[1.0, 1000.0], &[1002.0, 1.0]).unwrap(), 0.0);

        let a = [2.0, 1.0, 0.0, 0.125];
        let view = MatrixView::row_major(&a, 2, 2).unwrap();
        // A⁻¹ = [[0.5, -4], [0, 8]]，‖A‖∞ = 3，‖A⁻¹‖∞ = 8
        assert_eq!(triangular_condition(Uplo::Upper, &view).unwrap(), 24.0);

        let identity = [1.0, 0.0, 0.0, 1.0];
        let view = MatrixView::row_major(&identity, 2, 2).unwrap();
        assert_eq!(triangular_condition(Uplo::Lower, &view).unwrap(), 1.0);

        let singular = [1.0, 1.0, 0.0, 0.0];
        let view = MatrixView::row_major(&singular, 2, 2).unwrap();
        assert_eq!(triangular_condition(Uplo::Upper, &view).unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_condition_ignores_other_triangle() {
        // 下三角部分的垃圾值不参与上三角条件数
        let a = [1.0, 0.5, 9.0, 1.0];
        let view = MatrixView::row_major(&a, 2, 2).unwrap();
        assert_eq!(triangular_condition(Uplo::Upper, &view).unwrap(), 2.25);
    }
}
