// crates/xr_runtime/src/backend.rs

//! 执行后端抽象
//!
//! 归约驱动把执行后端当作一个服务："运行这 N 个相互独立的累加任务，
//! 按任务顺序交回结果"。后端可以是当前线程，也可以是 rayon 线程池。

use crate::error::{RuntimeError, RuntimeResult};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// 执行后端 Trait
pub trait ExecutionBackend: Send + Sync {
    /// 后端名称
    fn name(&self) -> &'static str;

    /// 最大并发数
    fn max_concurrency(&self) -> usize;

    /// 运行 `count` 个独立任务，结果按任务编号排列
    ///
    /// 任一任务失败时返回其中一个错误，其余结果被丢弃。
    fn run_tasks<T, F>(&self, count: usize, task: F) -> RuntimeResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> RuntimeResult<T> + Sync + Send;

    /// 执行两个闭包（可能并行），用于树形合并
    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        (a(), b())
    }
}

// =============================================================================
// 串行后端
// =============================================================================

/// 在当前线程依次执行
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl SerialBackend {
    /// 创建串行后端
    pub fn new() -> Self {
        Self
    }
}

impl ExecutionBackend for SerialBackend {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn max_concurrency(&self) -> usize {
        1
    }

    fn run_tasks<T, F>(&self, count: usize, task: F) -> RuntimeResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> RuntimeResult<T> + Sync + Send,
    {
        (0..count).map(task).collect()
    }
}

// =============================================================================
// rayon 后端
// =============================================================================

/// rayon 线程池后端
///
/// 默认使用全局线程池；[`with_threads`](Self::with_threads) 创建独占线程池。
/// worker panic 会被捕获并转成 [`RuntimeError::Backend`]。
#[derive(Debug, Clone, Default)]
pub struct RayonBackend {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl RayonBackend {
    /// 使用全局线程池
    pub fn global() -> Self {
        Self { pool: None }
    }

    /// 创建固定线程数的独占线程池
    pub fn with_threads(threads: usize) -> RuntimeResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("xr-worker-{}", i))
            .build()
            .map_err(|e| RuntimeError::backend("rayon", e.to_string()))?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知 panic".to_string()
    }
}

impl ExecutionBackend for RayonBackend {
    fn name(&self) -> &'static str {
        "rayon"
    }

    fn max_concurrency(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn run_tasks<T, F>(&self, count: usize, task: F) -> RuntimeResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> RuntimeResult<T> + Sync + Send,
    {
        let task = &task;
        self.install(|| {
            (0..count)
                .into_par_iter()
                .map(|i| {
                    catch_unwind(AssertUnwindSafe(|| task(i))).unwrap_or_else(|payload| {
                        Err(RuntimeError::backend(
                            "rayon",
                            format!("任务 {} panic: {}", i, panic_message(payload)),
                        ))
                    })
                })
                .collect()
        })
    }

    fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        match &self.pool {
            Some(pool) => pool.join(a, b),
            None => rayon::join(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_order() {
        let out = SerialBackend::new().run_tasks(5, |i| Ok(i * 10)).unwrap();
        assert_eq!(out, vec![0, 10, 20, 30, 40]);
    }

    #[test]
    fn test_rayon_order() {
        let backend = RayonBackend::with_threads(3).unwrap();
        assert_eq!(backend.max_concurrency(), 3);
        let out = backend.run_tasks(100, |i| Ok(i as u64 * i as u64)).unwrap();
        assert_eq!(out.len(), 100);
        assert!(out.iter().enumerate().all(|(i, &v)| v == (i * i) as u64));
    }

    #[test]
    fn test_error_propagates() {
        let result: RuntimeResult<Vec<usize>> = RayonBackend::global().run_tasks(8, |i| {
            if i == 5 {
                Err(RuntimeError::Cancelled)
            } else {
                Ok(i)
            }
        });
        assert_eq!(result, Err(RuntimeError::Cancelled));
    }

    #[test]
    fn test_panic_is_reported() {
        let result: RuntimeResult<Vec<usize>> = RayonBackend::global().run_tasks(4, |i| {
            if i == 2 {
                panic!("worker 故障");
            }
            Ok(i)
        });
        match result {
            Err(RuntimeError::Backend { backend, message }) => {
                assert_eq!(backend, "rayon");
                assert!(message.contains("worker 故障"));
            }
            other => panic!("期望后端错误, 得到 {:?}", other),
        }
    }

    #[test]
    fn test_join() {
        let (a, b) = SerialBackend.join(|| 1, || 2);
        assert_eq!((a, b), (1, 2));
        let (a, b) = RayonBackend::global().join(|| "左", || "右");
        assert_eq!((a, b), ("左", "右"));
    }
}
