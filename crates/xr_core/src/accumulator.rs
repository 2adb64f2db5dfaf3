// crates/xr_core/src/accumulator.rs

//! 精确累加器抽象
//!
//! 归约驱动只依赖本 trait；具体类型（超累加器或某个展开宽度）在归约开始时
//! 由 [`ReductionMode`](crate::mode::ReductionMode) 一次性选定并单态化。

use crate::fpe::FloatExpansion;
use crate::superacc::{SuperaccLayout, Superaccumulator};

/// 精确累加器
///
/// 实现者必须保证：累加顺序不影响 [`into_superacc`](Self::into_superacc)
/// 之后舍入得到的值。
pub trait ExactAccumulator: Send + Sized + 'static {
    /// 累加器名称（日志用）
    const NAME: &'static str;

    /// 以给定布局创建空累加器
    fn with_layout(layout: SuperaccLayout) -> Self;

    /// 累加一个值
    fn accumulate(&mut self, x: f64);

    /// 精确累加乘积 `a·b`
    ///
    /// 布局覆盖乘积范围时（见 [`SuperaccLayout::covers_products`]）对任意有限操作数精确。
    fn accumulate_product(&mut self, a: f64, b: f64);

    /// 转成可合并的超累加器
    fn into_superacc(self) -> Superaccumulator;

    /// 溢出到超累加器的次数
    fn spills(&self) -> u64 {
        0
    }

    /// 消耗累加器，舍入到最近的双精度数
    fn finish(self) -> f64 {
        let mut acc = self.into_superacc();
        Superaccumulator::round(&mut acc)
    }
}

impl ExactAccumulator for Superaccumulator {
    const NAME: &'static str = "superacc";

    fn with_layout(layout: SuperaccLayout) -> Self {
        Superaccumulator::new(layout)
    }

    #[inline]
    fn accumulate(&mut self, x: f64) {
        Superaccumulator::accumulate(self, x);
    }

    #[inline]
    fn accumulate_product(&mut self, a: f64, b: f64) {
        Superaccumulator::accumulate_product(self, a, b);
    }

    fn into_superacc(self) -> Superaccumulator {
        self
    }
}

impl<const N: usize, const EARLY_EXIT: bool> ExactAccumulator for FloatExpansion<N, EARLY_EXIT> {
    const NAME: &'static str = "fpe";

    fn with_layout(layout: SuperaccLayout) -> Self {
        FloatExpansion::new(layout)
    }

    #[inline]
    fn accumulate(&mut self, x: f64) {
        FloatExpansion::accumulate(self, x);
    }

    #[inline]
    fn accumulate_product(&mut self, a: f64, b: f64) {
        FloatExpansion::accumulate_product(self, a, b);
    }

    fn into_superacc(self) -> Superaccumulator {
        FloatExpansion::into_superacc(self)
    }

    fn spills(&self) -> u64 {
        FloatExpansion::spills(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fpe::{Fpe3, Fpe8Ee};

    fn dot<A: ExactAccumulator>(x: &[f64], y: &[f64]) -> f64 {
        dot_in::<A>(SuperaccLayout::ieee_f64(), x, y)
    }

    fn dot_in<A: ExactAccumulator>(layout: SuperaccLayout, x: &[f64], y: &[f64]) -> f64 {
        let mut acc = A::with_layout(layout);
        for (&a, &b) in x.iter().zip(y) {
            acc.accumulate_product(a, b);
        }
        acc.finish()
    }

    #[test]
    fn test_generic_dot_agrees() {
        let x = [1e16, 1.0 + 2f64.powi(-30), -1e16, 3.0];
        let y = [1.0, 1.0 - 2f64.powi(-30), 1.0, 0.5];
        let expected = 2.5 - 2f64.powi(-60);
        assert_eq!(dot::<Superaccumulator>(&x, &y), expected);
        assert_eq!(dot::<Fpe3>(&x, &y), expected);
        assert_eq!(dot::<Fpe8Ee>(&x, &y), expected);
    }

    #[test]
    fn test_product_overflow() {
        assert_eq!(dot::<Fpe3>(&[1e300], &[-1e300]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_out_of_range_products_in_wide_layout() {
        let layout = SuperaccLayout::ieee_f64_products();
        let x = [1e200, 1e200, 3.0 * 2f64.powi(-576), 3.0 * 2f64.powi(-576)];
        let y = [1e200, -1e200, 2f64.powi(-500), 2f64.powi(-500)];
        // 3·2^-1076 · 2 = 1.5·2^-1074，舍入到偶数 2·2^-1074
        let expected = f64::from_bits(2);
        assert_eq!(dot_in::<Superaccumulator>(layout, &x, &y), expected);
        assert_eq!(dot_in::<Fpe3>(layout, &x, &y), expected);
        assert_eq!(dot_in::<Fpe8Ee>(layout, &x, &y), expected);

        let mut fpe = Fpe3::with_layout(layout);
        fpe.accumulate_product(1e200, 1e200);
        assert_eq!(fpe.spills(), 1);
    }
}
