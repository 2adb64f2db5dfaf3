// crates/xr_core/src/superacc.rs

//! 超累加器（Kulisch 长累加器）
//!
//! 用一组定宽整数 bin 精确表示任意多个双精度数的和，最终只舍入一次。
//!
//! # 表示
//!
//! 第 `i` 个 bin 的权重为 `2^(floor + 56·i)`，每个 bin 是一个 `i64`：
//! 低 56 位为数字位，高 7 位为进位余量。规格化后除最高 bin 外每个 bin 都落在
//! `[0, 2^56)`，最高 bin 带符号。
//!
//! 一个有限双精度数的尾数不超过 53 位，左移 `< 56` 位后最多跨两个相邻 bin，
//! 因此单次累加只改动两个 bin；连续累加 [`CARRY_FREE_BUDGET`] 次之内不会
//! 溢出，到达上限时自动规格化。
//!
//! # 乘积
//!
//! 两个尾数之积是不超过 106 位的整数，拆成两段 53 位分别累加，不经过浮点舍入。
//! 只有当乘积的全部位都落在布局范围内时才能这样做：
//! [`SuperaccLayout::ieee_f64_products`] 覆盖任意两个有限双精度数之积
//! （`2^-2148` 到 `2^2048`）；较窄的布局对超出范围的乘积退回 FMA 拆分，
//! 乘积下溢时误差项被舍入，乘积上溢时记为无穷。
//!
//! # 状态
//!
//! ```text
//! Empty --accumulate--> Dirty --renormalize--> Normalized
//!   ^                     ^                        |
//!   |                     +------accumulate--------+
//!   +---------------- reset (任意状态) ------------+
//! ```
//!
//! `merge` 接受任意状态的两侧，结果为 `Normalized`；`round` 先规格化再读取。

use crate::eft::{two_product_fma, Eft};
use std::fmt;
use xr_foundation::error::{XrError, XrResult};
use xr_foundation::float::{decompose, scalbn, MANTISSA_BITS, MAX_EXPONENT, MIN_EXPONENT};
use xr_foundation::memory::AlignedVec;

// ============================================================================
// 常量
// ============================================================================

/// 每个 bin 的数字位数
pub const DIGITS: u32 = 56;

/// 两次规格化之间允许的最大累加次数
///
/// 规格化 bin 小于 `2^56`，再加上 127 个绝对值小于 `2^56` 的量仍小于 `2^63`。
pub const CARRY_FREE_BUDGET: u32 = 127;

/// 默认进位余量（ceiling 高出 2^1024 的位数）
pub const DEFAULT_HEADROOM: i32 = 64;

/// 两个有限双精度数之积最低位的最小权重指数 (2^-2148)
pub const PRODUCT_MIN_EXPONENT: i32 = 2 * MIN_EXPONENT;

/// 两个有限双精度数之积的指数上界 (2^2048)
pub const PRODUCT_MAX_EXPONENT: i32 = 2 * MAX_EXPONENT;

/// 两个尾数之积的最大位数
const PRODUCT_BITS: i32 = 2 * (MANTISSA_BITS as i32 + 1);

/// 布局允许的最大指数跨度
const MAX_SPAN: i64 = 1 << 16;

const DIGIT_MASK: i64 = (1i64 << DIGITS) - 1;

const PRODUCT_CHUNK_BITS: u32 = MANTISSA_BITS + 1;
const PRODUCT_CHUNK_MASK: u64 = (1u64 << PRODUCT_CHUNK_BITS) - 1;

// ============================================================================
// 布局
// ============================================================================

/// 超累加器的 bin 布局
///
/// 由指数下界 `floor` 与上界 `ceiling` 推导 bin 数：
/// `ceil((ceiling - floor) / 56) + 1`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SuperaccLayout {
    floor: i32,
    ceiling: i32,
    bins: usize,
}

impl SuperaccLayout {
    /// 创建布局
    ///
    /// # 错误
    ///
    /// - `floor > -1074`：无法表示最小次正规数的最低位
    /// - `ceiling < 1024`：无法容纳最大有限值
    /// - 跨度超过 65536 位
    pub fn new(floor: i32, ceiling: i32) -> XrResult<Self> {
        let invalid = |reason| XrError::InvalidLayout {
            floor,
            ceiling,
            reason,
        };
        if floor > MIN_EXPONENT {
            return Err(invalid("floor 必须不高于 -1074"));
        }
        if ceiling < MAX_EXPONENT {
            return Err(invalid("ceiling 必须不低于 1024"));
        }
        let span = ceiling as i64 - floor as i64;
        if span > MAX_SPAN {
            return Err(invalid("指数跨度过大"));
        }
        Ok(Self::from_span(floor, ceiling, span as usize))
    }

    /// IEEE-754 双精度默认布局：floor = -1074，ceiling = 1024 + 64
    pub fn ieee_f64() -> Self {
        let ceiling = MAX_EXPONENT + DEFAULT_HEADROOM;
        Self::from_span(MIN_EXPONENT, ceiling, (ceiling - MIN_EXPONENT) as usize)
    }

    /// 覆盖全部有限乘积的布局：floor = -2148，ceiling = 2048 + 64
    pub fn ieee_f64_products() -> Self {
        Self::ieee_f64().widened_for_products()
    }

    /// 向下扩展到 -2148、向上扩展到 2048 并保留原有进位余量
    ///
    /// 已经覆盖乘积范围的布局原样返回。
    pub fn widened_for_products(&self) -> Self {
        if self.covers_products() {
            return *self;
        }
        let floor = self.floor.min(PRODUCT_MIN_EXPONENT);
        let headroom = self.ceiling - MAX_EXPONENT;
        let ceiling = self.ceiling.max(PRODUCT_MAX_EXPONENT + headroom);
        Self::from_span(floor, ceiling, (ceiling as i64 - floor as i64) as usize)
    }

    /// 是否能精确容纳任意两个有限双精度数之积
    #[inline]
    pub fn covers_products(&self) -> bool {
        self.floor <= PRODUCT_MIN_EXPONENT && self.ceiling >= PRODUCT_MAX_EXPONENT
    }

    /// 以 `2^exponent` 为最低位权重、不超过 `bits` 位的整数是否完全落在布局内
    #[inline]
    fn holds(&self, exponent: i32, bits: i32) -> bool {
        exponent >= self.floor && exponent as i64 + bits as i64 <= self.ceiling as i64
    }

    fn from_span(floor: i32, ceiling: i32, span: usize) -> Self {
        let digits = DIGITS as usize;
        Self {
            floor,
            ceiling,
            bins: (span + digits - 1) / digits + 1,
        }
    }

    /// 最低 bin 最低位的权重指数
    #[inline]
    pub fn floor(&self) -> i32 {
        self.floor
    }

    /// 指数上界
    #[inline]
    pub fn ceiling(&self) -> i32 {
        self.ceiling
    }

    /// bin 数量
    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// 第 `index` 个 bin 的权重指数
    #[inline]
    pub fn bin_exponent(&self, index: usize) -> i64 {
        self.floor as i64 + DIGITS as i64 * index as i64
    }
}

impl Default for SuperaccLayout {
    fn default() -> Self {
        Self::ieee_f64()
    }
}

// ============================================================================
// 状态
// ============================================================================

/// 累加器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccumulatorState {
    /// 初始或重置后，未累加任何值
    Empty,
    /// 有未规格化的累加
    Dirty,
    /// 所有 bin 都在无进位范围内
    Normalized,
}

const FLAG_NAN: u8 = 1;
const FLAG_POS_INF: u8 = 2;
const FLAG_NEG_INF: u8 = 4;

// ============================================================================
// 超累加器
// ============================================================================

/// 超累加器
///
/// 值类型：每个 worker 独占一个实例，归约边界上按值合并。
#[derive(Clone)]
pub struct Superaccumulator {
    layout: SuperaccLayout,
    bins: AlignedVec<i64>,
    pending: u32,
    state: AccumulatorState,
    non_finite: u8,
}

impl Superaccumulator {
    /// 以给定布局创建空累加器
    pub fn new(layout: SuperaccLayout) -> Self {
        Self {
            layout,
            bins: AlignedVec::zeros(layout.bins()),
            pending: 0,
            state: AccumulatorState::Empty,
            non_finite: 0,
        }
    }

    /// 布局
    #[inline]
    pub fn layout(&self) -> &SuperaccLayout {
        &self.layout
    }

    /// 当前状态
    #[inline]
    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// 只读 bin 视图（低位在前）
    ///
    /// 状态为 `Dirty` 时 bin 可能超出无进位范围，但表示的值仍然精确。
    #[inline]
    pub fn bins(&self) -> &[i64] {
        self.bins.as_slice()
    }

    /// 是否累加过 NaN 或无穷
    #[inline]
    pub fn has_non_finite(&self) -> bool {
        self.non_finite != 0
    }

    /// 精确累加一个双精度数
    ///
    /// NaN 与 ±Inf 只记录为粘滞标志，不进入 bin。
    pub fn accumulate(&mut self, x: f64) {
        let d = match decompose(x) {
            Some(d) => d,
            None => {
                self.record_non_finite(x);
                return;
            }
        };
        self.state = AccumulatorState::Dirty;
        if !d.is_zero() {
            // exponent >= -1074 >= floor
            self.add_digits(d.negative, d.mantissa, d.exponent);
        }
    }

    /// 把 `(-1)^negative · mantissa · 2^exponent` 加入 bin
    ///
    /// `mantissa < 2^53`，且调用方保证整段落在布局内。
    fn add_digits(&mut self, negative: bool, mantissa: u64, exponent: i32) {
        if self.pending >= CARRY_FREE_BUDGET {
            self.propagate();
        }

        let pos = (exponent as i64 - self.layout.floor as i64) as u64;
        let index = (pos / DIGITS as u64) as usize;
        let shift = (pos % DIGITS as u64) as u32;
        let wide = (mantissa as u128) << shift;
        let low = (wide as i64) & DIGIT_MASK;
        let high = (wide >> DIGITS) as i64;

        let bins = self.bins.as_mut_slice();
        if negative {
            bins[index] -= low;
            bins[index + 1] -= high;
        } else {
            bins[index] += low;
            bins[index + 1] += high;
        }
        self.pending += 1;
    }

    /// 累加一组值
    pub fn accumulate_slice(&mut self, values: &[f64]) {
        for &x in values {
            self.accumulate(x);
        }
    }

    /// 累加无误差变换结果：值与非零误差都进入累加器
    #[inline]
    pub fn accumulate_eft(&mut self, eft: Eft) {
        self.accumulate(eft.value);
        if eft.error != 0.0 {
            self.accumulate(eft.error);
        }
    }

    /// 精确累加乘积 `a·b`
    ///
    /// 乘积的整数尾数落在布局内时逐位精确；否则退回 FMA 拆分（见模块文档）。
    /// 任一操作数非有限时按 IEEE 乘积记录粘滞标志（`∞·0` 为 NaN）。
    pub fn accumulate_product(&mut self, a: f64, b: f64) {
        let (da, db) = match (decompose(a), decompose(b)) {
            (Some(da), Some(db)) => (da, db),
            _ => {
                self.record_non_finite(a * b);
                return;
            }
        };
        if da.is_zero() || db.is_zero() {
            self.state = AccumulatorState::Dirty;
            return;
        }

        let exponent = da.exponent + db.exponent;
        if self.layout.holds(exponent, PRODUCT_BITS) {
            self.state = AccumulatorState::Dirty;
            let negative = da.negative != db.negative;
            let product = da.mantissa as u128 * db.mantissa as u128;
            let low = (product as u64) & PRODUCT_CHUNK_MASK;
            let high = (product >> PRODUCT_CHUNK_BITS) as u64;
            if low != 0 {
                self.add_digits(negative, low, exponent);
            }
            if high != 0 {
                self.add_digits(negative, high, exponent + PRODUCT_CHUNK_BITS as i32);
            }
            return;
        }

        let eft = two_product_fma(a, b);
        if eft.value.is_finite() {
            self.accumulate_eft(eft);
        } else {
            self.accumulate(eft.value);
        }
    }

    /// 规格化：把每个 bin 的进位传到相邻高位 bin
    ///
    /// 幂等；`Empty` 与 `Normalized` 状态下不做任何事。
    pub fn renormalize(&mut self) {
        if self.state == AccumulatorState::Dirty {
            self.propagate();
            self.state = AccumulatorState::Normalized;
        }
    }

    fn propagate(&mut self) {
        propagate_carries(self.bins.as_mut_slice());
        self.pending = 0;
    }

    /// 规格化后舍入到最近的双精度数（偶数优先）
    pub fn round(&mut self) -> f64 {
        self.renormalize();
        self.to_f64()
    }

    /// 不修改自身的舍入读取
    ///
    /// 在内部副本上传播进位，任意状态下结果都与 [`round`](Self::round) 相同。
    pub fn to_f64(&self) -> f64 {
        if let Some(special) = self.special_value() {
            return special;
        }
        round_bins(self.bins.as_slice(), self.layout.floor)
    }

    /// 表示的精确值是否为零（且未见过非有限值）
    pub fn is_zero(&self) -> bool {
        if self.non_finite != 0 {
            return false;
        }
        if self.state == AccumulatorState::Dirty {
            let mut work = self.bins.clone();
            propagate_carries(work.as_mut_slice());
            work.iter().all(|&b| b == 0)
        } else {
            self.bins.iter().all(|&b| b == 0)
        }
    }

    /// 按值合并
    pub fn merge(mut self, other: Self) -> XrResult<Self> {
        self.merge_from(&other)?;
        Ok(self)
    }

    /// 把 `other` 加入自身
    ///
    /// 逐 bin 整数加法，满足交换律与结合律。结果为 `Normalized`（两侧都为空时保持 `Empty`）。
    pub fn merge_from(&mut self, other: &Self) -> XrResult<()> {
        if self.layout != other.layout {
            return Err(XrError::LayoutMismatch {
                left_bins: self.layout.bins(),
                right_bins: other.layout.bins(),
            });
        }
        if other.state == AccumulatorState::Empty {
            return Ok(());
        }

        self.renormalize();
        let normalized;
        let source: &[i64] = if other.state == AccumulatorState::Dirty {
            let mut work = other.bins.clone();
            propagate_carries(work.as_mut_slice());
            normalized = work;
            normalized.as_slice()
        } else {
            other.bins.as_slice()
        };

        for (dst, &src) in self.bins.iter_mut().zip(source) {
            *dst += src;
        }
        self.non_finite |= other.non_finite;
        self.state = AccumulatorState::Dirty;
        self.renormalize();
        Ok(())
    }

    /// 清零，回到 `Empty`
    pub fn reset(&mut self) {
        self.bins.fill(0);
        self.pending = 0;
        self.non_finite = 0;
        self.state = AccumulatorState::Empty;
    }

    fn record_non_finite(&mut self, x: f64) {
        self.non_finite |= if x.is_nan() {
            FLAG_NAN
        } else if x > 0.0 {
            FLAG_POS_INF
        } else {
            FLAG_NEG_INF
        };
        self.state = AccumulatorState::Dirty;
    }

    fn special_value(&self) -> Option<f64> {
        let flags = self.non_finite;
        if flags & FLAG_NAN != 0 || (flags & FLAG_POS_INF != 0 && flags & FLAG_NEG_INF != 0) {
            Some(f64::NAN)
        } else if flags & FLAG_POS_INF != 0 {
            Some(f64::INFINITY)
        } else if flags & FLAG_NEG_INF != 0 {
            Some(f64::NEG_INFINITY)
        } else {
            None
        }
    }
}

impl Default for Superaccumulator {
    fn default() -> Self {
        Self::new(SuperaccLayout::ieee_f64())
    }
}

impl fmt::Debug for Superaccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nonzero = self.bins.iter().filter(|&&b| b != 0).count();
        f.debug_struct("Superaccumulator")
            .field("layout", &self.layout)
            .field("state", &self.state)
            .field("nonzero_bins", &nonzero)
            .field("pending", &self.pending)
            .field("value", &self.to_f64())
            .finish()
    }
}

// ============================================================================
// bin 运算
// ============================================================================

fn propagate_carries(bins: &mut [i64]) {
    for i in 1..bins.len() {
        let carry = bins[i - 1] >> DIGITS;
        bins[i - 1] &= DIGIT_MASK;
        bins[i] += carry;
    }
}

/// 第 `bit` 位（以 floor 为 0）是否为 1
#[inline]
fn bit_at(work: &[i64], bit: usize) -> bool {
    let digits = DIGITS as usize;
    (work[bit / digits] >> (bit % digits)) & 1 == 1
}

/// 低于 `bit` 的位中是否有 1
fn any_below(work: &[i64], bit: usize) -> bool {
    let digits = DIGITS as usize;
    let index = bit / digits;
    let mask = (1i64 << (bit % digits)) - 1;
    work[..index].iter().any(|&w| w != 0) || work[index] & mask != 0
}

/// 从 `lsb` 起取 `width`（<= 53）位
fn extract_bits(work: &[i64], lsb: usize, width: usize) -> u64 {
    let digits = DIGITS as usize;
    let index = lsb / digits;
    let low = work[index] as u128;
    let high = work.get(index + 1).copied().unwrap_or(0) as u128;
    let window = (low | (high << DIGITS)) >> (lsb % digits);
    (window as u64) & ((1u64 << width) - 1)
}

/// 正确舍入（偶数优先）
fn round_bins(bins: &[i64], floor: i32) -> f64 {
    // 多出的一个 bin 容纳最高 bin 的进位与符号
    let mut work = Vec::with_capacity(bins.len() + 1);
    work.extend_from_slice(bins);
    work.push(0);
    propagate_carries(&mut work);

    let negative = work[work.len() - 1] < 0;
    if negative {
        for w in work.iter_mut() {
            *w = -*w;
        }
        propagate_carries(&mut work);
    }

    let top = match work.iter().rposition(|&w| w != 0) {
        Some(top) => top,
        None => return 0.0,
    };
    let digits = DIGITS as usize;
    let msb = top * digits + (63 - work[top].leading_zeros() as usize);
    // 次正规数的最低位对应 2^-1074
    let subnormal_lsb = (MIN_EXPONENT - floor) as usize;
    let lsb = msb.saturating_sub(MANTISSA_BITS as usize).max(subnormal_lsb);

    let mut mantissa = extract_bits(&work, lsb, msb - lsb + 1);
    if lsb > 0 {
        let round_bit = bit_at(&work, lsb - 1);
        let sticky = any_below(&work, lsb - 1);
        if round_bit && (sticky || mantissa & 1 == 1) {
            mantissa += 1;
        }
    }

    let magnitude = scalbn(mantissa as f64, floor + lsb as i32);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}
