// crates/xr_core/src/fpe.rs

//! 浮点展开（Floating-Point Expansion）
//!
//! `N` 个双精度槽位组成的未求值和，作为超累加器前面的快速缓存：大部分输入
//! 只经过一串 TwoSum 就被槽位吸收，只有最低槽位仍放不下的残差才溢出到超累加器。
//!
//! # 精确性
//!
//! 槽位之和加上超累加器的值始终精确等于已累加输入之和，
//! 任何路径都不丢弃残差。提前退出（`EARLY_EXIT = true`）只缩短 TwoSum 链和
//! 压缩扫描，不改变最终舍入结果。
//!
//! # 溢出
//!
//! 若某一步 TwoSum 会溢出，剩余的量直接进入超累加器；非有限输入同样直接交给
//! 超累加器的粘滞标志。

use crate::eft::{two_product_fma, two_product_is_exact, two_sum};
use crate::superacc::{SuperaccLayout, Superaccumulator};

/// 每累加多少次做一次蒸馏
pub const DISTILL_INTERVAL: u32 = 256;

/// 浮点展开 + 后备超累加器
#[derive(Debug, Clone)]
pub struct FloatExpansion<const N: usize, const EARLY_EXIT: bool> {
    slots: [f64; N],
    superacc: Superaccumulator,
    since_distill: u32,
    spills: u64,
}

impl<const N: usize, const EARLY_EXIT: bool> FloatExpansion<N, EARLY_EXIT> {
    /// 以给定布局创建空展开
    pub fn new(layout: SuperaccLayout) -> Self {
        Self {
            slots: [0.0; N],
            superacc: Superaccumulator::new(layout),
            since_distill: 0,
            spills: 0,
        }
    }

    /// 槽位数
    pub const fn capacity() -> usize {
        N
    }

    /// 是否启用提前退出
    pub const fn early_exit() -> bool {
        EARLY_EXIT
    }

    /// 当前槽位（按量级从大到小，仅在蒸馏后严格成立）
    #[inline]
    pub fn slots(&self) -> &[f64] {
        &self.slots
    }

    /// 后备超累加器
    #[inline]
    pub fn superacc(&self) -> &Superaccumulator {
        &self.superacc
    }

    /// 溢出到超累加器的次数
    #[inline]
    pub fn spills(&self) -> u64 {
        self.spills
    }

    /// 累加一个值
    pub fn accumulate(&mut self, x: f64) {
        if !x.is_finite() {
            self.superacc.accumulate(x);
            return;
        }

        let mut carry = x;
        for slot in self.slots.iter_mut() {
            let eft = two_sum(*slot, carry);
            if !(eft.value.is_finite() && eft.error.is_finite()) {
                break;
            }
            *slot = eft.value;
            carry = eft.error;
            if EARLY_EXIT && carry == 0.0 {
                break;
            }
        }
        if carry != 0.0 {
            self.superacc.accumulate(carry);
            self.spills += 1;
        }

        self.since_distill += 1;
        if self.since_distill >= DISTILL_INTERVAL {
            self.distill();
        }
    }

    /// 精确累加乘积 `a·b`
    ///
    /// FMA 拆分精确时 `(p, e)` 两部分进入槽位；乘积下溢、上溢或含非有限操作数时
    /// 整个乘积交给后备超累加器，计为一次溢出。
    pub fn accumulate_product(&mut self, a: f64, b: f64) {
        if two_product_is_exact(a, b) {
            let eft = two_product_fma(a, b);
            self.accumulate(eft.value);
            if eft.error != 0.0 {
                self.accumulate(eft.error);
            }
        } else {
            self.superacc.accumulate_product(a, b);
            self.spills += 1;
        }
    }

    /// 蒸馏：恢复槽位互不重叠、从大到小排列
    ///
    /// 先自底向上做一遍 TwoSum 把量级推到顶部，再自顶向下压缩掉零与重叠。
    pub fn distill(&mut self) {
        self.since_distill = 0;
        if N < 2 {
            return;
        }

        // 自底向上
        let mut running = self.slots[N - 1];
        for i in (0..N - 1).rev() {
            let eft = two_sum(self.slots[i], running);
            if !(eft.value.is_finite() && eft.error.is_finite()) {
                self.flush();
                return;
            }
            self.slots[i + 1] = eft.error;
            running = eft.value;
        }
        self.slots[0] = running;

        // 自顶向下压缩
        let mut out = [0.0; N];
        let mut k = 0;
        let mut acc = self.slots[0];
        let mut i = 1;
        while i < N {
            let next = self.slots[i];
            if EARLY_EXIT && next.abs() <= f64::EPSILON * acc.abs() {
                break;
            }
            let eft = two_sum(acc, next);
            if eft.error != 0.0 {
                out[k] = eft.value;
                k += 1;
                acc = eft.error;
            } else {
                acc = eft.value;
            }
            i += 1;
        }
        out[k] = acc;
        k += 1;
        // 提前退出时剩余槽位原样保留
        out[k..k + (N - i)].copy_from_slice(&self.slots[i..]);
        self.slots = out;
    }

    /// 把所有槽位移入超累加器
    fn flush(&mut self) {
        for slot in self.slots.iter_mut() {
            if *slot != 0.0 {
                self.superacc.accumulate(*slot);
                *slot = 0.0;
            }
        }
    }

    /// 近似值：槽位之和
    ///
    /// 不包含已溢出到超累加器的部分；`spills() == 0` 时误差不超过最大槽位的 `N` 个 ulp。
    pub fn estimate(&self) -> f64 {
        self.slots.iter().rev().sum()
    }

    /// 正确舍入的最终值
    pub fn round(&self) -> f64 {
        let mut acc = self.superacc.clone();
        fold_slots(&self.slots, &mut acc);
        acc.round()
    }

    /// 把槽位并入超累加器并返回它
    pub fn into_superacc(self) -> Superaccumulator {
        let mut acc = self.superacc;
        fold_slots(&self.slots, &mut acc);
        acc
    }

    /// 清零
    pub fn reset(&mut self) {
        self.slots = [0.0; N];
        self.superacc.reset();
        self.since_distill = 0;
        self.spills = 0;
    }
}

impl<const N: usize, const EARLY_EXIT: bool> Default for FloatExpansion<N, EARLY_EXIT> {
    fn default() -> Self {
        Self::new(SuperaccLayout::ieee_f64())
    }
}

fn fold_slots(slots: &[f64], acc: &mut Superaccumulator) {
    for &slot in slots {
        if slot != 0.0 {
            acc.accumulate(slot);
        }
    }
}

/// 2 槽位展开
pub type Fpe2 = FloatExpansion<2, false>;
/// 3 槽位展开
pub type Fpe3 = FloatExpansion<3, false>;
/// 4 槽位展开
pub type Fpe4 = FloatExpansion<4, false>;
/// 6 槽位展开
pub type Fpe6 = FloatExpansion<6, false>;
/// 8 槽位展开
pub type Fpe8 = FloatExpansion<8, false>;
/// 2 槽位展开，提前退出
pub type Fpe2Ee = FloatExpansion<2, true>;
/// 3 槽位展开，提前退出
pub type Fpe3Ee = FloatExpansion<3, true>;
/// 4 槽位展开，提前退出
pub type Fpe4Ee = FloatExpansion<4, true>;
/// 6 槽位展开，提前退出
pub type Fpe6Ee = FloatExpansion<6, true>;
/// 8 槽位展开，提前退出
pub type Fpe8Ee = FloatExpansion<8, true>;
