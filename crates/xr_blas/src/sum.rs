// crates/xr_blas/src/sum.rs

//! exsum：可复现求和

use crate::view::VectorView;
use xr_core::ExactAccumulator;
use xr_runtime::{ExecutionBackend, ReductionDriver, RuntimeResult, TermSource};

impl TermSource for VectorView<'_> {
    fn len(&self) -> usize {
        VectorView::len(self)
    }

    #[inline]
    fn feed<A: ExactAccumulator>(&self, index: usize, acc: &mut A) {
        acc.accumulate(self.get(index));
    }
}

/// 正确舍入的 Σ xᵢ
///
/// 结果与 worker 数、分区方式和归约模式无关；空向量返回 +0。
pub fn exsum<B: ExecutionBackend>(driver: &ReductionDriver<B>, x: &VectorView<'_>) -> RuntimeResult<f64> {
    driver.round(x)
}
