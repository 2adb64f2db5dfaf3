// crates/xr_foundation/src/memory.rs

//! 对齐内存缓冲区
//!
//! 提供基于 `std::alloc` 的真正对齐的 `AlignedVec`，用于输入暂存区和超累加器
//! 的 bin 存储。分配失败是致命错误：直接调用 `handle_alloc_error` 终止，
//! 不提供降级路径。

use bytemuck::Pod;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// 对齐要求
pub trait Alignment: 'static {
    /// 字节对齐值
    const ALIGN: usize;
}

/// CPU 对齐（64 字节缓存行）
#[derive(Debug, Clone, Copy)]
pub struct CpuAlign;
impl Alignment for CpuAlign {
    const ALIGN: usize = 64;
}

/// 定长对齐连续缓冲区
///
/// 长度在构造后固定；元素类型必须是 `Pod`，因此零初始化总是合法值。
pub struct AlignedVec<T: Pod, A: Alignment = CpuAlign> {
    ptr: *mut T,
    len: usize,
    _align: PhantomData<A>,
}

unsafe impl<T: Pod + Send, A: Alignment> Send for AlignedVec<T, A> {}
unsafe impl<T: Pod + Sync, A: Alignment> Sync for AlignedVec<T, A> {}

impl<T: Pod, A: Alignment> AlignedVec<T, A> {
    /// 创建长度为 `len` 的零初始化缓冲区
    pub fn zeros(len: usize) -> Self {
        if len == 0 || std::mem::size_of::<T>() == 0 {
            return Self::empty();
        }

        let layout = Self::layout_for(len);
        // SAFETY: layout 大小非零；返回空指针时立即终止
        let ptr = unsafe { alloc_zeroed(layout) as *mut T };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }
        debug_assert_eq!((ptr as usize) % layout.align(), 0, "对齐保证被破坏");

        Self {
            ptr,
            len,
            _align: PhantomData,
        }
    }

    fn from_slice(data: &[T]) -> Self {
        let mut aligned = Self::zeros(data.len());
        aligned.as_mut_slice().copy_from_slice(data);
        aligned
    }

    /// 填充为同一个值
    pub fn fill(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }

    /// 原始指针
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr
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

    /// 只读切片视图
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        if self.ptr.is_null() {
            &[]
        } else {
            // SAFETY: ptr 指向 len 个已初始化元素
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    /// 可变切片视图
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.ptr.is_null() {
            &mut []
        } else {
            // SAFETY: ptr 指向 len 个已初始化元素，且 &mut self 保证独占
            unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
        }
    }

    fn empty() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            len: 0,
            _align: PhantomData,
        }
    }

    #[inline]
    fn layout_for(len: usize) -> Layout {
        match Layout::array::<T>(len).and_then(|l| l.align_to(A::ALIGN)) {
            Ok(layout) => layout,
            // 与 Vec 一致：容量溢出直接 panic
            Err(_) => panic!("AlignedVec 容量溢出: {} 个元素", len),
        }
    }
}

impl<T: Pod, A: Alignment> Deref for AlignedVec<T, A> {
    type Target = [T];
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T: Pod, A: Alignment> DerefMut for AlignedVec<T, A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T: Pod, A: Alignment> Clone for AlignedVec<T, A> {
    fn clone(&self) -> Self {
        Self::from_slice(self.as_slice())
    }
}

impl<T: Pod, A: Alignment> Default for AlignedVec<T, A> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Pod + PartialEq, A: Alignment> PartialEq for AlignedVec<T, A> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Pod + fmt::Debug, A: Alignment> fmt::Debug for AlignedVec<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: Pod, A: Alignment> Drop for AlignedVec<T, A> {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        let layout = Self::layout_for(self.len);
        // SAFETY: ptr 由同一 layout 分配；Pod 类型无需逐个 drop
        unsafe { dealloc(self.ptr as *mut u8, layout) };
    }
}

impl<T: Pod, A: Alignment> FromIterator<T> for AlignedVec<T, A> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let vec: Vec<T> = iter.into_iter().collect();
        Self::from_slice(&vec)
    }
}

impl<T: Pod + Serialize, A: Alignment> Serialize for AlignedVec<T, A> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.as_slice().serialize(serializer)
    }
}

impl<'de, T: Pod + Deserialize<'de>, A: Alignment> Deserialize<'de> for AlignedVec<T, A> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<T>::deserialize(deserializer)?;
        Ok(Self::from_slice(&vec))
    }
}
