// crates/xr_blas/src/gemm.rs

//! exgemm：可复现矩阵乘累加 `C ← C + A·B`
//!
//! 每个输出元素是以 `c_ij` 为初值的一次独立精确点积。输出按
//! `GEMM_BLOCK × GEMM_BLOCK` 分块，块作为任务交给执行后端；块内元素在
//! worker 线程上各自用单个累加器归约。

use crate::view::{MatrixView, MatrixViewMut};
use tracing::debug;
use xr_core::ExactAccumulator;
use xr_foundation::error::XrError;
use xr_runtime::{ExecutionBackend, ReductionDriver, RuntimeResult, TermSource};

/// 输出分块边长
pub const GEMM_BLOCK: usize = 32;

/// 单个输出元素的归约项：`c_ij + Σ_p a_ip · b_pj`
struct ElementTerms<'a> {
    a: MatrixView<'a>,
    b: MatrixView<'a>,
    i: usize,
    j: usize,
    seed: f64,
}

impl TermSource for ElementTerms<'_> {
    fn len(&self) -> usize {
        1 + self.a.cols()
    }

    fn has_products(&self) -> bool {
        true
    }

    #[inline]
    fn feed<A: ExactAccumulator>(&self, index: usize, acc: &mut A) {
        if index == 0 {
            acc.accumulate(self.seed);
        } else {
            let p = index - 1;
            acc.accumulate_product(self.a.get(self.i, p), self.b.get(p, self.j));
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Tile {
    rows: (usize, usize),
    cols: (usize, usize),
}

fn tiles(m: usize, n: usize) -> Vec<Tile> {
    let mut out = Vec::new();
    for r in (0..m).step_by(GEMM_BLOCK) {
        for c in (0..n).step_by(GEMM_BLOCK) {
            out.push(Tile {
                rows: (r, (r + GEMM_BLOCK).min(m)),
                cols: (c, (c + GEMM_BLOCK).min(n)),
            });
        }
    }
    out
}

/// `C ← C + A·B`，每个元素正确舍入
pub fn exgemm<B: ExecutionBackend>(
    driver: &ReductionDriver<B>,
    a: &MatrixView<'_>,
    b: &MatrixView<'_>,
    c: &mut MatrixViewMut<'_>,
) -> RuntimeResult<()> {
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    XrError::check_size("b.rows", k, b.rows())?;
    XrError::check_size("c.rows", m, c.rows())?;
    XrError::check_size("c.cols", n, c.cols())?;

    let tiles = tiles(m, n);
    debug!(m, n, k, tiles = tiles.len(), mode = %driver.mode(), "矩阵乘");

    let results = {
        let seed = c.as_view();
        driver.backend().run_tasks(tiles.len(), |t| {
            let tile = tiles[t];
            let mut values = Vec::with_capacity((tile.rows.1 - tile.rows.0) * (tile.cols.1 - tile.cols.0));
            for i in tile.rows.0..tile.rows.1 {
                for j in tile.cols.0..tile.cols.1 {
                    let terms = ElementTerms {
                        a: *a,
                        b: *b,
                        i,
                        j,
                        seed: seed.get(i, j),
                    };
                    values.push(driver.round_local(&terms));
                }
            }
            Ok(values)
        })?
    };

    for (tile, values) in tiles.iter().zip(results) {
        let mut it = values.into_iter();
        for i in tile.rows.0..tile.rows.1 {
            for j in tile.cols.0..tile.cols.1 {
                if let Some(v) = it.next() {
                    c.set(i, j, v);
                }
            }
        }
    }
    Ok(())
}
