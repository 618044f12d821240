//! 强度 / 标签直方图与基于直方图的统计量.

use std::collections::BTreeMap;

use crate::consts::gray::is_marked;
use crate::{NucleusMask, RawStack};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 有序直方图: 取值 -> 出现次数.
///
/// 所有计数之和恒等于被扫描的体素个数.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Histogram {
    table: BTreeMap<u32, u64>,
}

impl Histogram {
    /// 空直方图.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 统计 `it` 给出的全部取值.
    pub fn from_values<I: IntoIterator<Item = u32>>(it: I) -> Self {
        let mut hist = Self::new();
        for v in it.into_iter() {
            hist.add(v);
        }
        hist
    }

    /// 统计原图强度. `foreground_only` 时跳过强度为 0 的体素.
    pub fn from_stack(raw: &RawStack, foreground_only: bool) -> Self {
        Self::from_values(
            raw.data()
                .iter()
                .filter(|v| !foreground_only || **v != 0)
                .map(|v| u32::from(*v)),
        )
    }

    /// 统计掩膜标签. `foreground_only` 时跳过背景体素.
    pub fn from_mask(mask: &NucleusMask, foreground_only: bool) -> Self {
        Self::from_values(
            mask.data()
                .iter()
                .filter(|v| !foreground_only || is_marked(**v))
                .map(|v| u32::from(*v)),
        )
    }

    /// 计数一次 `key`.
    #[inline]
    pub fn add(&mut self, key: u32) {
        self.add_n(key, 1);
    }

    /// 计数 `n` 次 `key`.
    #[inline]
    pub fn add_n(&mut self, key: u32, n: u64) {
        if n != 0 {
            *self.table.entry(key).or_insert(0) += n;
        }
    }

    /// 升序迭代所有出现过的取值.
    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.table.keys().copied()
    }

    /// 最大取值. 空直方图返回 `None`.
    #[inline]
    pub fn max_key(&self) -> Option<u32> {
        self.table.keys().next_back().copied()
    }

    /// 最小取值. 空直方图返回 `None`.
    #[inline]
    pub fn min_key(&self) -> Option<u32> {
        self.table.keys().next().copied()
    }

    /// 不同取值的个数.
    #[inline]
    pub fn nb_labels(&self) -> usize {
        self.table.len()
    }

    /// 底层有序表.
    #[inline]
    pub fn table(&self) -> &BTreeMap<u32, u64> {
        &self.table
    }

    /// `key` 出现的次数.
    #[inline]
    pub fn count(&self, key: u32) -> u64 {
        self.table.get(&key).copied().unwrap_or(0)
    }

    /// 计数总和.
    #[inline]
    pub fn total(&self) -> u64 {
        self.table.values().sum()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// 稠密计数表, 下标即取值, 长度为 `len`. 不小于 `len` 的取值被忽略.
    pub fn dense(&self, len: usize) -> Vec<u64> {
        let mut ans = vec![0; len];
        for (&k, &c) in self.table.range(..len.min(u32::MAX as usize) as u32) {
            ans[k as usize] = c;
        }
        ans
    }

    /// 均值.
    pub fn mean(&self) -> Option<f64> {
        let total = self.total();
        (total != 0).then(|| {
            self.table
                .iter()
                .map(|(&k, &c)| k as f64 * c as f64)
                .sum::<f64>()
                / total as f64
        })
    }

    /// 总体标准差 (除以 `n`).
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let total = self.total() as f64;
        let var = self
            .table
            .iter()
            .map(|(&k, &c)| (k as f64 - mean).powi(2) * c as f64)
            .sum::<f64>()
            / total;
        Some(var.sqrt())
    }

    /// 中位数. 计数总和为偶数时取中间两个值的平均.
    pub fn median(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        // 第 `rank` 个值 (从 0 开始计).
        let nth = |rank: u64| -> u32 {
            let mut seen = 0u64;
            for (&k, &c) in self.table.iter() {
                seen += c;
                if seen > rank {
                    return k;
                }
            }
            unreachable!("rank 不会超过计数总和")
        };
        Some(if total % 2 == 1 {
            nth(total / 2) as f64
        } else {
            (nth(total / 2 - 1) as f64 + nth(total / 2) as f64) / 2.0
        })
    }

    /// 汇总统计量. 空直方图返回 `None`.
    pub fn stats(&self) -> Option<IntensityStats> {
        Some(IntensityStats {
            count: self.total(),
            mean: self.mean()?,
            std_dev: self.std_dev()?,
            min: self.min_key()?,
            max: self.max_key()?,
            median: self.median()?,
        })
    }
}

/// 一组体素强度的汇总统计量.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntensityStats {
    /// 体素个数.
    pub count: u64,
    /// 均值.
    pub mean: f64,
    /// 总体标准差.
    pub std_dev: f64,
    /// 最小值.
    pub min: u32,
    /// 最大值.
    pub max: u32,
    /// 中位数.
    pub median: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Calibration;
    use ndarray::Array3;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_basic_counts() {
        let h = Histogram::from_values([3, 1, 3, 7, 3]);
        assert_eq!(h.keys().collect::<Vec<_>>(), vec![1, 3, 7]);
        assert_eq!(h.count(3), 3);
        assert_eq!(h.count(2), 0);
        assert_eq!(h.total(), 5);
        assert_eq!(h.nb_labels(), 3);
        assert_eq!(h.max_key(), Some(7));
        assert_eq!(h.dense(5), vec![0, 1, 0, 3, 0]);
    }

    #[test]
    fn test_empty() {
        let h = Histogram::new();
        assert_eq!(h.max_key(), None);
        assert!(h.mean().is_none());
        assert!(h.median().is_none());
        assert!(h.stats().is_none());
    }

    #[test]
    fn test_stats() {
        let h = Histogram::from_values([2, 4, 4, 4, 5, 5, 7, 9]);
        let s = h.stats().unwrap();
        assert_eq!(s.count, 8);
        assert!(f64_eq(s.mean, 5.0));
        assert!(f64_eq(s.std_dev, 2.0));
        assert_eq!((s.min, s.max), (2, 9));
        assert!(f64_eq(s.median, 4.5));

        let odd = Histogram::from_values([9, 1, 4]);
        assert!(f64_eq(odd.median().unwrap(), 4.0));
    }

    #[test]
    fn test_from_stack_foreground_only() {
        let mut data = Array3::zeros((2, 2, 2));
        data[(1, 1, 1)] = 40u16;
        data[(0, 1, 0)] = 20;
        let raw = RawStack::new("t", data, Calibration::unit());
        assert_eq!(Histogram::from_stack(&raw, false).total(), 8);
        let fg = Histogram::from_stack(&raw, true);
        assert_eq!(fg.total(), 2);
        assert_eq!(fg.min_key(), Some(20));
    }
}
