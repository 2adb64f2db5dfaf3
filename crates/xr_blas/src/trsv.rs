// crates/xr_blas/src/trsv.rs

//! extrsv：可复现三角求解
//!
//! 求解 `op(A)·x = b`，`b` 由 `x` 传入并被解覆盖。第 `i` 行的
//!
//! ```text
//! x_i = RN(b_i − Σ_j op(A)_ij · x_j) / op(A)_ii
//! ```
//!
//! 括号内的整行归约（右端项与全部已解分量的乘积）经驱动精确累加、只舍入一次；
//! 行之间严格按依赖顺序求解。

use crate::view::{Diag, MatrixView, Transpose, Uplo, VectorViewMut};
use std::ops::Range;
use tracing::debug;
use xr_core::ExactAccumulator;
use xr_foundation::error::XrError;
use xr_runtime::{ExecutionBackend, ReductionDriver, RuntimeResult, TermSource};

/// 一行的归约项：`rhs` 加上 `-op(A)_ij · x_j`（`j ∈ cols`）
struct RowTerms<'a> {
    a: MatrixView<'a>,
    trans: Transpose,
    row: usize,
    cols: Range<usize>,
    x: &'a [f64],
    rhs: f64,
}

impl TermSource for RowTerms<'_> {
    fn len(&self) -> usize {
        1 + self.cols.len()
    }

    fn has_products(&self) -> bool {
        true
    }

    #[inline]
    fn feed<A: ExactAccumulator>(&self, index: usize, acc: &mut A) {
        if index == 0 {
            acc.accumulate(self.rhs);
        } else {
            let j = self.cols.start + index - 1;
            acc.accumulate_product(-self.a.get_op(self.trans, self.row, j), self.x[j]);
        }
    }
}

/// op(A) 的有效三角部分
fn effective_upper(uplo: Uplo, trans: Transpose) -> bool {
    (uplo == Uplo::Upper) != (trans == Transpose::Yes)
}

fn check_square(a: &MatrixView<'_>, n: usize) -> Result<(), XrError> {
    if a.rows() != a.cols() {
        return Err(XrError::invalid_argument(
            "a",
            format!("三角矩阵必须是方阵，实际 {}x{}", a.rows(), a.cols()),
        ));
    }
    XrError::check_size("x", a.rows(), n)
}

/// 三角求解，结果写回 `x`
///
/// 对角元为零时返回 [`XrError::SingularMatrix`]，此时 `x` 保持不变。
pub fn extrsv<B: ExecutionBackend>(
    driver: &ReductionDriver<B>,
    uplo: Uplo,
    trans: Transpose,
    diag: Diag,
    a: &MatrixView<'_>,
    x: &mut VectorViewMut<'_>,
) -> RuntimeResult<()> {
    let n = x.len();
    check_square(a, n)?;
    if diag == Diag::NonUnit {
        if let Some(row) = (0..n).find(|&i| a.get(i, i) == 0.0) {
            return Err(XrError::SingularMatrix { row }.into());
        }
    }

    let upper = effective_upper(uplo, trans);
    debug!(n, upper, ?diag, mode = %driver.mode(), "三角求解");

    let mut work = x.to_vec();
    for step in 0..n {
        let i = if upper { n - 1 - step } else { step };
        let cols = if upper { i + 1..n } else { 0..i };
        let row = RowTerms {
            a: *a,
            trans,
            row: i,
            cols,
            x: &work,
            rhs: work[i],
        };
        let rounded = driver.round(&row)?;
        work[i] = match diag {
            Diag::NonUnit => rounded / a.get(i, i),
            Diag::Unit => rounded,
        };
    }

    x.copy_from(&work)?;
    Ok(())
}

/// 残差 `r = b − op(A)·x`，每行精确计算后只舍入一次
pub fn residual<B: ExecutionBackend>(
    driver: &ReductionDriver<B>,
    uplo: Uplo,
    trans: Transpose,
    diag: Diag,
    a: &MatrixView<'_>,
    x: &[f64],
    b: &[f64],
) -> RuntimeResult<Vec<f64>> {
    let n = x.len();
    check_square(a, n)?;
    XrError::check_size("b", n, b.len())?;
    let upper = effective_upper(uplo, trans);

    (0..n)
        .map(|i| {
            // 单位对角时不读取矩阵对角元，单独减去 x_i
            let cols = match (diag, upper) {
                (Diag::NonUnit, true) => i..n,
                (Diag::NonUnit, false) => 0..i + 1,
                (Diag::Unit, true) => i + 1..n,
                (Diag::Unit, false) => 0..i,
            };
            let row = RowTerms {
                a: *a,
                trans,
                row: i,
                cols,
                x,
                rhs: b[i],
            };
            match diag {
                Diag::NonUnit => driver.round(&row),
                Diag::Unit => {
                    let mut acc = driver.reduce(&row)?;
                    acc.accumulate(-x[i]);
                    Ok(acc.round())
                }
            }
        })
        .collect()
}

/// 带一步迭代精化的三角求解
///
/// 先用 [`extrsv`] 求出 `x`，再求解 `op(A)·d = b − op(A)·x` 并令 `x ← x + d`。
pub fn extrsv_refined<B: ExecutionBackend>(
    driver: &ReductionDriver<B>,
    uplo: Uplo,
    trans: Transpose,
    diag: Diag,
    a: &MatrixView<'_>,
    x: &mut VectorViewMut<'_>,
) -> RuntimeResult<()> {
    let b = x.to_vec();
    extrsv(driver, uplo, trans, diag, a, x)?;
    let solved = x.to_vec();

    let mut d = residual(driver, uplo, trans, diag, a, &solved, &b)?;
    let mut d_view = VectorViewMut::contiguous(&mut d);
    extrsv(driver, uplo, trans, diag, a, &mut d_view)?;

    for (i, (&xi, &di)) in solved.iter().zip(d.iter()).enumerate() {
        x.set(i, xi + di);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Order;
    use xr_core::ReductionMode;
    use xr_runtime::RuntimeError;

    fn solve(uplo: Uplo, trans: Transpose, diag: Diag, a: &[f64], order: Order, b: &[f64]) -> Vec<f64> {
        let n = b.len();
        let view = MatrixView::new(a, n, n, n, order).unwrap();
        let mut x = b.to_vec();
        let driver = ReductionDriver::serial(ReductionMode::default());
        extrsv(&driver, uplo, trans, diag, &view, &mut VectorViewMut::contiguous(&mut x)).unwrap();
        x
    }

    #[test]
    fn test_upper_and_lower() {
        // [2 1 1; 0 4 2; 0 0 8] x = [4, 6, 8] → x = [1, 1, 1]
        let upper = [2.0, 1.0, 1.0, 0.0, 4.0, 2.0, 0.0, 0.0, 8.0];
        let x = solve(Uplo::Upper, Transpose::No, Diag::NonUnit, &upper, Order::RowMajor, &[4.0, 6.0, 8.0]);
        assert_eq!(x, vec![1.0, 1.0, 1.0]);

        // 同一存储按列主序解释就是它的转置（下三角）
        let x = solve(Uplo::Lower, Transpose::No, Diag::NonUnit, &upper, Order::ColMajor, &[2.0, 5.0, 11.0]);
        assert_eq!(x, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_transpose_matches_col_major() {
        let upper = [2.0, 1.0, 1.0, 0.0, 4.0, 2.0, 0.0, 0.0, 8.0];
        let b = [2.0, 5.0, 11.0];
        let via_trans = solve(Uplo::Upper, Transpose::Yes, Diag::NonUnit, &upper, Order::RowMajor, &b);
        let via_order = solve(Uplo::Lower, Transpose::No, Diag::NonUnit, &upper, Order::ColMajor, &b);
        assert_eq!(via_trans, via_order);
    }

    #[test]
    fn test_unit_diagonal_ignores_stored_diagonal() {
        let a = [0.0, 2.0, 0.0, 0.0];
        let x = solve(Uplo::Upper, Transpose::No, Diag::Unit, &a, Order::RowMajor, &[5.0, 1.0]);
        assert_eq!(x, vec![3.0, 1.0]);
    }

    #[test]
    fn test_singular_matrix() {
        let a = [1.0, 1.0, 0.0, 0.0];
        let view = MatrixView::row_major(&a, 2, 2).unwrap();
        let mut x = vec![1.0, 1.0];
        let driver = ReductionDriver::serial(ReductionMode::Superaccumulator);
        let r = extrsv(
            &driver,
            Uplo::Upper,
            Transpose::No,
            Diag::NonUnit,
            &view,
            &mut VectorViewMut::contiguous(&mut x),
        );
        assert!(matches!(r, Err(RuntimeError::Core(XrError::SingularMatrix { row: 1 }))));
        assert_eq!(x, vec![1.0, 1.0]);
    }

    #[test]
    fn test_non_square_rejected() {
        let a = [1.0; 6];
        let view = MatrixView::row_major(&a, 2, 3).unwrap();
        let mut x = vec![1.0, 1.0];
        let driver = ReductionDriver::serial(ReductionMode::Superaccumulator);
        let r = extrsv(
            &driver,
            Uplo::Lower,
            Transpose::No,
            Diag::NonUnit,
            &view,
            &mut VectorViewMut::contiguous(&mut x),
        );
        assert!(r.is_err());
    }

    #[test]
    fn test_residual_of_exact_solution_is_zero() {
        let upper = [2.0, 1.0, 1.0, 0.0, 4.0, 2.0, 0.0, 0.0, 8.0];
        let view = MatrixView::row_major(&upper, 3, 3).unwrap();
        let driver = ReductionDriver::serial(ReductionMode::default());
        let r = residual(
            &driver,
            Uplo::Upper,
            Transpose::No,
            Diag::NonUnit,
            &view,
            &[1.0, 1.0, 1.0],
            &[4.0, 6.0, 9.0],
        )
        .unwrap();
        assert_eq!(r, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_refined_on_exact_system() {
        let upper = [3.0, 1.0, 0.0, 7.0];
        let view = MatrixView::row_major(&upper, 2, 2).unwrap();
        let mut x = vec![1.0, 1.0];
        let driver = ReductionDriver::serial(ReductionMode::default());
        extrsv_refined(
            &driver,
            Uplo::Upper,
            Transpose::No,
            Diag::NonUnit,
            &view,
            &mut VectorViewMut::contiguous(&mut x),
        )
        .unwrap();
        // x1 = 1/7，x0 = (1 - x1)/3
        assert_eq!(x[1], 1.0 / 7.0);
        assert!((x[0] - 2.0 / 7.0).abs() <= f64::EPSILON);
    }
}
