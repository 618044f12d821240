//! 基于直方图的自动阈值.
//!
//! 阈值 `t` 把直方图划分为 `≤ t` 和 `> t` 两类.

use crate::histogram::Histogram;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 自动阈值服务.
pub trait AutoThresholder {
    /// 根据直方图给出阈值. 直方图为空时返回 `None`.
    fn threshold(&self, hist: &Histogram) -> Option<u32>;
}

/// 内置的自动阈值方法.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThresholdMethod {
    /// 类间方差最大化.
    #[default]
    Otsu,

    /// 迭代类均值 (intermeans).
    IsoData,
}

impl AutoThresholder for ThresholdMethod {
    #[inline]
    fn threshold(&self, hist: &Histogram) -> Option<u32> {
        match self {
            ThresholdMethod::Otsu => otsu(hist),
            ThresholdMethod::IsoData => iso_data(hist),
        }
    }
}

/// Otsu 阈值.
///
/// 在所有使两类均非空的划分中选择类间方差 `w0 * w1 * (m0 - m1)²` 最大者.
/// 若最大值在一段连续阈值上取得 (两峰之间的空白区), 返回第一段这样的平台的中点.
/// 只有一个取值时返回该取值.
pub fn otsu(hist: &Histogram) -> Option<u32> {
    let max = hist.max_key()?;
    let bins = hist.dense(max as usize + 1);
    let total: f64 = hist.total() as f64;
    let sum_all: f64 = bins
        .iter()
        .enumerate()
        .map(|(k, &c)| k as f64 * c as f64)
        .sum();

    let mut w0 = 0.0;
    let mut sum0 = 0.0;
    let mut best = f64::NEG_INFINITY;
    let mut plateau: Option<(usize, usize)> = None;

    for (k, &c) in bins.iter().enumerate() {
        w0 += c as f64;
        sum0 += k as f64 * c as f64;
        if w0 == 0.0 {
            continue;
        }
        let w1 = total - w0;
        if w1 <= 0.0 {
            break;
        }
        let m0 = sum0 / w0;
        let m1 = (sum_all - sum0) / w1;
        let var = w0 * w1 * (m0 - m1).powi(2);

        if var > best {
            best = var;
            plateau = Some((k, k));
        } else if var == best {
            if let Some((start, end)) = plateau {
                if end + 1 == k {
                    plateau = Some((start, k));
                }
            }
        }
    }

    match plateau {
        Some((start, end)) => Some(((start + end) / 2) as u32),
        None => hist.min_key(),
    }
}

/// IsoData 阈值: 从总体均值出发, 反复取两类均值的中点, 直到收敛.
pub fn iso_data(hist: &Histogram) -> Option<u32> {
    let mut t = hist.mean()?.floor() as u32;
    for _ in 0..1024 {
        let (mut lo_w, mut lo_s, mut hi_w, mut hi_s) = (0.0, 0.0, 0.0, 0.0);
        for (&k, &c) in hist.table().iter() {
            if k <= t {
                lo_w += c as f64;
                lo_s += k as f64 * c as f64;
            } else {
                hi_w += c as f64;
                hi_s += k as f64 * c as f64;
            }
        }
        if lo_w == 0.0 || hi_w == 0.0 {
            break;
        }
        let next = ((lo_s / lo_w + hi_s / hi_w) / 2.0).floor() as u32;
        if next == t {
            break;
        }
        t = next;
    }
    Some(t)
}
