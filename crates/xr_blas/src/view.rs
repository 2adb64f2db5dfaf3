// crates/xr_blas/src/view.rs

//! BLAS 风格的向量与矩阵视图
//!
//! 向量元素 `i` 位于 `data[offset + i·inc]`；矩阵元素 `(i, j)` 在行主序下位于
//! `data[i·ld + j]`，列主序下位于 `data[j·ld + i]`。构造时一次性检查边界，
//! 之后的访问不再返回错误。

use xr_foundation::error::{XrError, XrResult};

/// 存储顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// 行主序
    #[default]
    RowMajor,
    /// 列主序
    ColMajor,
}

/// 三角部分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uplo {
    /// 上三角
    Upper,
    /// 下三角
    Lower,
}

/// 是否转置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transpose {
    /// 不转置
    #[default]
    No,
    /// 转置
    Yes,
}

/// 对角元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Diag {
    /// 使用矩阵中的对角元
    #[default]
    NonUnit,
    /// 对角元视为 1，不读取
    Unit,
}

fn check_stride(name: &'static str, data_len: usize, len: usize, offset: usize, inc: usize) -> XrResult<()> {
    if inc == 0 {
        return Err(XrError::invalid_argument(name, "步长必须大于 0"));
    }
    if len > 0 {
        let last = (len - 1)
            .checked_mul(inc)
            .and_then(|v| v.checked_add(offset))
            .ok_or_else(|| XrError::invalid_argument(name, "下标溢出"))?;
        XrError::check_bounds(name, last, data_len)?;
    }
    Ok(())
}

// =============================================================================
// 向量
// =============================================================================

/// 只读跨步向量视图
#[derive(Debug, Clone, Copy)]
pub struct VectorView<'a> {
    data: &'a [f64],
    len: usize,
    offset: usize,
    inc: usize,
}

impl<'a> VectorView<'a> {
    /// 创建视图
    pub fn new(data: &'a [f64], len: usize, offset: usize, inc: usize) -> XrResult<Self> {
        check_stride("x", data.len(), len, offset, inc)?;
        Ok(Self {
            data,
            len,
            offset,
            inc,
        })
    }

    /// 整个切片
    pub fn contiguous(data: &'a [f64]) -> Self {
        Self {
            data,
            len: data.len(),
            offset: 0,
            inc: 1,
        }
    }

    /// 长度
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 第 `i` 个元素
    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        self.data[self.offset + i * self.inc]
    }

    /// 元素迭代器
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// 复制为连续 Vec
    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }
}

impl<'a> From<&'a [f64]> for VectorView<'a> {
    fn from(data: &'a [f64]) -> Self {
        Self::contiguous(data)
    }
}

/// 可写跨步向量视图
#[derive(Debug)]
pub struct VectorViewMut<'a> {
    data: &'a mut [f64],
    len: usize,
    offset: usize,
    inc: usize,
}

impl<'a> VectorViewMut<'a> {
    /// 创建视图
    pub fn new(data: &'a mut [f64], len: usize, offset: usize, inc: usize) -> XrResult<Self> {
        check_stride("x", data.len(), len, offset, inc)?;
        Ok(Self {
            data,
            len,
            offset,
            inc,
        })
    }

    /// 整个切片
    pub fn contiguous(data: &'a mut [f64]) -> Self {
        let len = data.len();
        Self {
            data,
            len,
            offset: 0,
            inc: 1,
        }
    }

    /// 长度
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 第 `i` 个元素
    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        self.data[self.offset + i * self.inc]
    }

    /// 写入第 `i` 个元素
    #[inline]
    pub fn set(&mut self, i: usize, value: f64) {
        self.data[self.offset + i * self.inc] = value;
    }

    /// 只读视图
    pub fn as_view(&self) -> VectorView<'_> {
        VectorView {
            data: self.data,
            len: self.len,
            offset: self.offset,
            inc: self.inc,
        }
    }

    /// 复制为连续 Vec
    pub fn to_vec(&self) -> Vec<f64> {
        (0..self.len).map(|i| self.get(i)).collect()
    }

    /// 从连续切片写回
    pub fn copy_from(&mut self, values: &[f64]) -> XrResult<()> {
        XrError::check_size("x", self.len, values.len())?;
        for (i, &v) in values.iter().enumerate() {
            self.set(i, v);
        }
        Ok(())
    }
}

// =============================================================================
// 矩阵
// =============================================================================

fn check_matrix(
    name: &'static str,
    data_len: usize,
    rows: usize,
    cols: usize,
    ld: usize,
    order: Order,
) -> XrResult<()> {
    let (outer, inner) = match order {
        Order::RowMajor => (rows, cols),
        Order::ColMajor => (cols, rows),
    };
    if ld < inner.max(1) {
        return Err(XrError::invalid_argument(
            name,
            format!("主维 ld={} 小于 {}", ld, inner),
        ));
    }
    if outer > 0 && inner > 0 {
        let last = (outer - 1)
            .checked_mul(ld)
            .and_then(|v| v.checked_add(inner - 1))
            .ok_or_else(|| XrError::invalid_argument(name, "下标溢出"))?;
        XrError::check_bounds(name, last, data_len)?;
    }
    Ok(())
}

#[inline]
fn matrix_index(order: Order, ld: usize, i: usize, j: usize) -> usize {
    match order {
        Order::RowMajor => i * ld + j,
        Order::ColMajor => j * ld + i,
    }
}

/// 只读矩阵视图
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a> {
    data: &'a [f64],
    rows: usize,
    cols: usize,
    ld: usize,
    order: Order,
}

impl<'a> MatrixView<'a> {
    /// 创建视图
    pub fn new(data: &'a [f64], rows: usize, cols: usize, ld: usize, order: Order) -> XrResult<Self> {
        check_matrix("a", data.len(), rows, cols, ld, order)?;
        Ok(Self {
            data,
            rows,
            cols,
            ld,
            order,
        })
    }

    /// 紧凑行主序矩阵
    pub fn row_major(data: &'a [f64], rows: usize, cols: usize) -> XrResult<Self> {
        Self::new(data, rows, cols, cols.max(1), Order::RowMajor)
    }

    /// 行数
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// 列数
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// 存储顺序
    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    /// 元素 `(i, j)`
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[matrix_index(self.order, self.ld, i, j)]
    }

    /// `op(A)` 的元素 `(i, j)`
    #[inline]
    pub fn get_op(&self, trans: Transpose, i: usize, j: usize) -> f64 {
        match trans {
            Transpose::No => self.get(i, j),
            Transpose::Yes => self.get(j, i),
        }
    }
}

/// 可写矩阵视图
#[derive(Debug)]
pub struct MatrixViewMut<'a> {
    data: &'a mut [f64],
    rows: usize,
    cols: usize,
    ld: usize,
    order: Order,
}

impl<'a> MatrixViewMut<'a> {
    /// 创建视图
    pub fn new(data: &'a mut [f64], rows: usize, cols: usize, ld: usize, order: Order) -> XrResult<Self> {
        check_matrix("c", data.len(), rows, cols, ld, order)?;
        Ok(Self {
            data,
            rows,
            cols,
            ld,
            order,
        })
    }

    /// 紧凑行主序矩阵
    pub fn row_major(data: &'a mut [f64], rows: usize, cols: usize) -> XrResult<Self> {
        Self::new(data, rows, cols, cols.max(1), Order::RowMajor)
    }

    /// 行数
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// 列数
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// 元素 `(i, j)`
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[matrix_index(self.order, self.ld, i, j)]
    }

    /// 写入元素 `(i, j)`
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[matrix_index(self.order, self.ld, i, j)] = value;
    }

    /// 只读视图
    pub fn as_view(&self) -> MatrixView<'_> {
        MatrixView {
            data: self.data,
            rows: self.rows,
            cols: self.cols,
            ld: self.ld,
            order: self.order,
        }
    }
}
