// crates/xr_blas/src/dot.rs

//! exdot：可复现点积
//!
//! 每个乘积的整数尾数直接进入超累加器（浮点展开模式下先用 FMA 拆成 `(p, e)`），
//! 驱动为乘积项把布局扩展到 `2^-2148 .. 2^2048`，因此对任意有限输入，
//! 包括乘积下溢到次正规区间或上溢后又抵消的情形，结果都是精确 Σ xᵢ·yᵢ 的正确舍入。

use crate::view::VectorView;
use xr_core::ExactAccumulator;
use xr_foundation::error::XrError;
use xr_runtime::{ExecutionBackend, ReductionDriver, RuntimeResult, TermSource};

/// 逐元素乘积项
#[derive(Debug, Clone, Copy)]
pub struct DotTerms<'a> {
    x: VectorView<'a>,
    y: VectorView<'a>,
}

impl<'a> DotTerms<'a> {
    /// 创建，长度不同时报错
    pub fn new(x: VectorView<'a>, y: VectorView<'a>) -> Result<Self, XrError> {
        XrError::check_size("y", x.len(), y.len())?;
        Ok(Self { x, y })
    }
}

impl TermSource for DotTerms<'_> {
    fn len(&self) -> usize {
        self.x.len()
    }

    fn has_products(&self) -> bool {
        true
    }

    #[inline]
    fn feed<A: ExactAccumulator>(&self, index: usize, acc: &mut A) {
        acc.accumulate_product(self.x.get(index), self.y.get(index));
    }
}

/// 正确舍入的 Σ xᵢ·yᵢ
pub fn exdot<B: ExecutionBackend>(
    driver: &ReductionDriver<B>,
    x: &VectorView<'_>,
    y: &VectorView<'_>,
) -> RuntimeResult<f64> {
    let terms = DotTerms::new(*x, *y)?;
    driver.round(&terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xr_core::ReductionMode;
    use xr_runtime::RuntimeError;

    #[test]
    fn test_product_error_is_kept() {
        // (1 + 2⁻³⁰)(1 - 2⁻³⁰) = 1 - 2⁻⁶⁰，减去 1 只剩误差项
        let e = 2f64.powi(-30);
        let x = [1.0 + e, 1.0];
        let y = [1.0 - e, -1.0];
        for mode in ReductionMode::all() {
            let driver = ReductionDriver::serial(mode);
            let r = exdot(&driver, &VectorView::contiguous(&x), &VectorView::contiguous(&y)).unwrap();
            assert_eq!(r, -(2f64.powi(-60)), "mode={}", mode);
        }
    }

    #[test]
    fn test_underflowing_and_overflowing_products() {
        let x = vec![3e-160; 1000];
        let y = vec![7e-161; 1000];
        // 每个乘积约 2.1e-320，FMA 误差项落在次正规区间以下
        let tiny = xr_oracle::exact_dot(&x, &y);
        assert!(tiny > 0.0 && tiny < f64::MIN_POSITIVE);

        let big_x = [1e200, 1e200, 2.0];
        let big_y = [1e200, -1e200, 0.25];
        for mode in ReductionMode::all() {
            let driver = ReductionDriver::serial(mode);
            let r = exdot(&driver, &VectorView::contiguous(&x), &VectorView::contiguous(&y)).unwrap();
            assert_eq!(r.to_bits(), tiny.to_bits(), "mode={}", mode);
            let r = exdot(&driver, &VectorView::contiguous(&big_x), &VectorView::contiguous(&big_y))
                .unwrap();
            assert_eq!(r, 0.5, "mode={}", mode);
        }
    }

    #[test]
    fn test_length_mismatch() {
        let driver = ReductionDriver::serial(ReductionMode::default());
        let r = exdot(
            &driver,
            &VectorView::contiguous(&[1.0, 2.0]),
            &VectorView::contiguous(&[1.0]),
        );
        assert!(matches!(r, Err(RuntimeError::Core(XrError::SizeMismatch { .. }))));
    }

    #[test]
    fn test_strided_operands() {
        let xs = [1.0, 0.0, 2.0, 0.0, 3.0];
        let ys = [4.0, 5.0, 6.0];
        let x = VectorView::new(&xs, 3, 0, 2).unwrap();
        let y = VectorView::contiguous(&ys);
        let driver = ReductionDriver::serial(ReductionMode::Superaccumulator);
        assert_eq!(exdot(&driver, &x, &y).unwrap(), 32.0);
    }
}
