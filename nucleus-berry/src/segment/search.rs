use std::ops::RangeInclusive;
use std::sync::OnceLock;

use log::debug;
use ordered_float::OrderedFloat;

use super::SegmentationParams;
use crate::consts::gray::FOREGROUND;
use crate::gradient::GradientField;
use crate::labeling::Connectivity;
use crate::measure::{sphericity, surface::gradient_weighted};
use crate::{NucleusMask, RawStack, StackAttr};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 候选阈值的判定结果. 除 `Accepted` 外均为拒绝原因, 按检查顺序排列.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Verdict {
    /// 通过全部检查, 已计算球形度.
    Accepted,
    /// 二值化后没有前景.
    Empty,
    /// 前景体积占整幅图像的比例过高.
    FillsFrame,
    /// 前景体积不在可接受区间内.
    VolumeOutOfRange,
    /// 首末 z 切片上的前景过多, 物体被截断.
    TouchesBorder,
    /// 表面积不是正数, 无法计算球形度.
    Unmeasurable,
}

/// 单个候选阈值的评估结果.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThresholdCandidate {
    /// 阈值.
    pub threshold: u32,
    /// 保留的最大连通域的物理体积.
    pub volume: f64,
    /// 梯度加权球形度. 只有被接受的候选才有.
    pub sphericity: Option<f64>,
    /// 判定结果.
    pub verdict: Verdict,
}

impl ThresholdCandidate {
    /// 是否被接受?
    #[inline]
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }

    /// 排序键: 球形度越高越好, 相同时阈值越低越好.
    #[inline]
    fn rank(&self) -> (OrderedFloat<f64>, std::cmp::Reverse<u32>) {
        (
            OrderedFloat(self.sphericity.unwrap_or(f64::NEG_INFINITY)),
            std::cmp::Reverse(self.threshold),
        )
    }
}

/// 扫描过程中的最优候选. 只保留被接受的候选及其掩膜.
///
/// 合并结果与候选的提交顺序无关, 因此可以分块并行扫描后再归约.
#[derive(Debug, Default)]
pub(super) struct BestSoFar {
    best: Option<(ThresholdCandidate, NucleusMask)>,
}

impl BestSoFar {
    /// 提交一个候选.
    pub fn offer(self, candidate: ThresholdCandidate, mask: Option<NucleusMask>) -> Self {
        match mask {
            Some(mask) if candidate.is_accepted() => self.merge(Self {
                best: Some((candidate, mask)),
            }),
            _ => self,
        }
    }

    /// 合并两个部分结果.
    pub fn merge(self, other: Self) -> Self {
        match (self.best, other.best) {
            (Some(a), Some(b)) => Self {
                best: Some(if b.0.rank() > a.0.rank() { b } else { a }),
            },
            (a, b) => Self { best: a.or(b) },
        }
    }

    /// 取出最优候选.
    #[inline]
    pub fn into_inner(self) -> Option<(ThresholdCandidate, NucleusMask)> {
        self.best
    }
}

/// 单幅原图上的一次阈值扫描.
///
/// 原图梯度场在第一个需要计算球形度的候选出现时计算, 之后所有候选共用.
pub(super) struct ThresholdSearch<'a> {
    raw: &'a RawStack,
    params: &'a SegmentationParams,
    gradient: OnceLock<GradientField>,
}

impl<'a> ThresholdSearch<'a> {
    pub fn new(raw: &'a RawStack, params: &'a SegmentationParams) -> Self {
        Self {
            raw,
            params,
            gradient: OnceLock::new(),
        }
    }

    /// 评估阈值 `threshold`. 被接受时一并返回候选掩膜.
    pub fn evaluate(&self, threshold: u32) -> (ThresholdCandidate, Option<NucleusMask>) {
        let params = self.params;
        let mut mask = self.raw.binarize(threshold);
        let voxels = mask.keep_largest_component(Connectivity::Full);
        let volume = voxels as f64 * self.raw.voxel();

        let verdict = if voxels == 0 {
            Verdict::Empty
        } else if volume / self.raw.frame_volume() >= params.max_frame_fraction() {
            Verdict::FillsFrame
        } else if volume < params.volume_min() || volume > params.volume_max() {
            Verdict::VolumeOutOfRange
        } else {
            let (first, last) = mask.z_border_counts(FOREGROUND);
            if first >= params.border_voxels() || last >= params.border_voxels() {
                Verdict::TouchesBorder
            } else {
                Verdict::Accepted
            }
        };

        let mut candidate = ThresholdCandidate {
            threshold,
            volume,
            sphericity: None,
            verdict,
        };
        if candidate.is_accepted() {
            let gradient = self
                .gradient
                .get_or_init(|| GradientField::compute(self.raw));
            let surface = gradient_weighted(mask.data(), FOREGROUND, mask.calibration(), gradient);
            match sphericity(volume, surface) {
                Ok(s) => candidate.sphericity = Some(s),
                Err(_) => candidate.verdict = Verdict::Unmeasurable,
            }
        }

        debug!(
            "[{}] t = {threshold}: {:?}, volume = {volume:.3}, sphericity = {:?}",
            self.raw.name(),
            candidate.verdict,
            candidate.sphericity
        );
        let mask = candidate.is_accepted().then_some(mask);
        (candidate, mask)
    }

    /// 扫描 `range` 中的全部阈值, 返回最优候选.
    pub fn run(&self, range: RangeInclusive<u32>) -> BestSoFar {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                range
                    .into_par_iter()
                    .fold(BestSoFar::default, |acc, t| {
                        let (c, m) = self.evaluate(t);
                        acc.offer(c, m)
                    })
                    .reduce(BestSoFar::default, BestSoFar::merge)
            } else {
                range.fold(BestSoFar::default(), |acc, t| {
                    let (c, m) = self.evaluate(t);
                    acc.offer(c, m)
                })
            }
        }
    }

    /// 评估 `range` 中的全部阈值, 按阈值升序返回所有候选 (不保留掩膜).
    pub fn trace(&self, range: RangeInclusive<u32>) -> Vec<ThresholdCandidate> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                range.into_par_iter().map(|t| self.evaluate(t).0).collect()
            } else {
                range.map(|t| self.evaluate(t).0).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Calibration;

    fn candidate(threshold: u32, sphericity: f64) -> ThresholdCandidate {
        ThresholdCandidate {
            threshold,
            volume: 1.0,
            sphericity: Some(sphericity),
            verdict: Verdict::Accepted,
        }
    }

    fn dummy_mask() -> NucleusMask {
        NucleusMask::from_fn((1, 1, 1), Calibration::unit(), |_| FOREGROUND)
    }

    #[test]
    fn test_best_so_far_order_independent() {
        let cands = [candidate(10, 0.8), candidate(12, 0.9), candidate(11, 0.9), candidate(13, 0.7)];
        let forward = cands
            .iter()
            .fold(BestSoFar::default(), |acc, c| acc.offer(*c, Some(dummy_mask())));
        let backward = cands
            .iter()
            .rev()
            .fold(BestSoFar::default(), |acc, c| acc.offer(*c, Some(dummy_mask())));
        let (f, _) = forward.into_inner().unwrap();
        let (b, _) = backward.into_inner().unwrap();
        assert_eq!(f, b);
        assert_eq!(f.threshold, 11);
    }

    #[test]
    fn test_best_so_far_ignores_rejected() {
        let rejected = ThresholdCandidate {
            threshold: 3,
            volume: 0.0,
            sphericity: None,
            verdict: Verdict::Empty,
        };
        let acc = BestSoFar::default().offer(rejected, None);
        assert!(acc.into_inner().is_none());

        let split = BestSoFar::default()
            .offer(candidate(20, 0.5), Some(dummy_mask()))
            .merge(BestSoFar::default());
        assert_eq!(split.into_inner().unwrap().0.threshold, 20);
    }

    #[test]
    fn test_run_matches_sequential_fold() {
        // 强度随到中心的距离线性下降, 不同阈值得到半径不同的球, 球形度互不相同.
        let raw = RawStack::from_fn("blob", (32, 32, 32), Calibration::unit(), |(z, h, w)| {
            let d = [z, h, w]
                .iter()
                .map(|v| (*v as f64 - 15.5).powi(2))
                .sum::<f64>()
                .sqrt();
            (250.0 - 12.0 * d).max(10.0) as u16
        });
        let params = SegmentationParams::new(10.0, 20000.0).unwrap();
        let search = ThresholdSearch::new(&raw, &params);

        let run = search.run(60..=160).into_inner().unwrap();
        let sequential = (60..=160)
            .fold(BestSoFar::default(), |acc, t| {
                let (c, m) = search.evaluate(t);
                acc.offer(c, m)
            })
            .into_inner()
            .unwrap();
        assert!(run.0.is_accepted());
        assert_eq!(run.0, sequential.0);
        assert_eq!(run.1, sequential.1);
    }
}
