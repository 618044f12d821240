//! 自适应阈值搜索分割.
//!
//! 以自动阈值 `t0` 和原图强度标准差 `σ` 确定扫描区间 `[max(下限, t0 − 2σ), t0 + σ/2]`,
//! 对区间内每个阈值二值化并保留最大 26-连通域, 依次检查体积和截断条件,
//! 在通过检查的候选中选择梯度加权球形度最高者. 最优掩膜再经过开/闭运算、
//! 逐切片填洞和最大连通域重选.

mod params;
mod search;

pub use params::SegmentationParams;
pub use search::{ThresholdCandidate, Verdict};

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::ops::RangeInclusive;
use std::path::Path;

use log::{debug, error, info, warn};

use self::search::ThresholdSearch;
use crate::histogram::Histogram;
use crate::host::MorphologyService;
use crate::labeling::Connectivity;
use crate::morph_3d::{Morphology3d, StructElem};
use crate::threshold::{AutoThresholder, ThresholdMethod};
use crate::{NucleusMask, RawStack};

/// 分割的最终结果.
#[derive(Clone, Debug, PartialEq)]
pub enum Segmentation {
    /// 找到了可接受的阈值.
    Accepted {
        /// 最优阈值.
        threshold: u32,
        /// 最优阈值下 (后处理之前) 的梯度加权球形度.
        sphericity: f64,
        /// 后处理之后的单连通域掩膜.
        mask: NucleusMask,
    },

    /// 扫描区间内没有可接受的阈值.
    Rejected {
        /// 全背景掩膜.
        mask: NucleusMask,
    },
}

impl Segmentation {
    /// 是否成功分割?
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Segmentation::Accepted { .. })
    }

    /// 最优阈值. 分割失败时为 -1.
    #[inline]
    pub fn best_threshold(&self) -> i64 {
        match self {
            Segmentation::Accepted { threshold, .. } => i64::from(*threshold),
            Segmentation::Rejected { .. } => -1,
        }
    }

    /// 最优球形度. 分割失败时为 `None`.
    #[inline]
    pub fn sphericity(&self) -> Option<f64> {
        match self {
            Segmentation::Accepted { sphericity, .. } => Some(*sphericity),
            Segmentation::Rejected { .. } => None,
        }
    }

    /// 结果掩膜.
    #[inline]
    pub fn mask(&self) -> &NucleusMask {
        match self {
            Segmentation::Accepted { mask, .. } | Segmentation::Rejected { mask } => mask,
        }
    }

    /// 取出结果掩膜.
    #[inline]
    pub fn into_mask(self) -> NucleusMask {
        match self {
            Segmentation::Accepted { mask, .. } | Segmentation::Rejected { mask } => mask,
        }
    }
}

/// 阈值搜索分割器.
#[derive(Clone, Debug)]
pub struct Segmenter<T = ThresholdMethod, M = Morphology3d> {
    params: SegmentationParams,
    thresholder: T,
    morph: M,
}

impl Segmenter {
    /// 使用默认的 Otsu 阈值和默认形态学服务构建.
    #[inline]
    pub fn new(params: SegmentationParams) -> Self {
        Self {
            params,
            thresholder: ThresholdMethod::default(),
            morph: Morphology3d,
        }
    }
}

impl<T: AutoThresholder, M: MorphologyService> Segmenter<T, M> {
    /// 更换自动阈值服务.
    #[inline]
    pub fn with_thresholder<U: AutoThresholder>(self, thresholder: U) -> Segmenter<U, M> {
        Segmenter {
            params: self.params,
            thresholder,
            morph: self.morph,
        }
    }

    /// 更换形态学服务.
    #[inline]
    pub fn with_morphology<N: MorphologyService>(self, morph: N) -> Segmenter<T, N> {
        Segmenter {
            params: self.params,
            thresholder: self.thresholder,
            morph,
        }
    }

    /// 分割参数.
    #[inline]
    pub fn params(&self) -> &SegmentationParams {
        &self.params
    }

    /// 形态学服务.
    #[inline]
    pub fn morphology(&self) -> &M {
        &self.morph
    }

    /// 计算阈值扫描区间. 原图直方图为空或区间为空时返回 `None`.
    pub fn search_range(&self, raw: &RawStack) -> Option<RangeInclusive<u32>> {
        let hist = Histogram::from_stack(raw, false);
        let t0 = self.thresholder.threshold(&hist)? as f64;
        let sigma = hist.std_dev()?;
        let lo = (t0 - 2.0 * sigma)
            .floor()
            .max(f64::from(self.params.min_threshold())) as u32;
        let hi = (t0 + sigma / 2.0).floor() as u32;
        debug!(
            "[{}] t0 = {t0}, σ = {sigma:.3}, range = [{lo}, {hi}]",
            raw.name()
        );
        (lo <= hi).then_some(lo..=hi)
    }

    /// 评估扫描区间内的全部候选阈值, 按阈值升序返回. 用于诊断.
    pub fn candidates(&self, raw: &RawStack) -> Vec<ThresholdCandidate> {
        match self.search_range(raw) {
            Some(range) => ThresholdSearch::new(raw, &self.params).trace(range),
            None => Vec::new(),
        }
    }

    /// 分割原图.
    pub fn segment(&self, raw: &RawStack) -> Segmentation {
        let Some(range) = self.search_range(raw) else {
            return self.reject(raw, "empty threshold range");
        };
        let best = ThresholdSearch::new(raw, &self.params).run(range).into_inner();
        let Some((candidate, mask)) = best else {
            return self.reject(raw, "no acceptable threshold");
        };

        let mask = self.post_process(mask);
        if mask.is_background() {
            return self.reject(raw, "mask vanished after post-processing");
        }
        // 候选被接受时一定有球形度.
        let sphericity = candidate.sphericity.unwrap_or_default();
        info!(
            "[{}] best threshold = {}, sphericity = {sphericity:.4}",
            raw.name(),
            candidate.threshold
        );
        Segmentation::Accepted {
            threshold: candidate.threshold,
            sphericity,
            mask,
        }
    }

    /// 开运算, 闭运算, 逐切片填洞, 重选最大 26-连通域.
    fn post_process(&self, mask: NucleusMask) -> NucleusMask {
        let radius = self.params.morph_radius();
        let mut mask = if radius > 0 {
            let elem = StructElem::Ball(radius);
            let opened = self.morph.open(&mask, elem);
            self.morph.close(&opened, elem)
        } else {
            mask
        };
        self.morph.fill_holes_2d(&mut mask);
        mask.keep_largest_component(Connectivity::Full);
        mask
    }

    /// 记录失败并返回全背景结果.
    fn reject(&self, raw: &RawStack, reason: &str) -> Segmentation {
        warn!("[{}] segmentation rejected: {reason}", raw.name());
        if let Some(path) = self.params.error_log() {
            if let Err(e) = append_error_log(path, raw.name()) {
                error!("cannot append to `{}`: {e}", path.display());
            }
        }
        Segmentation::Rejected {
            mask: NucleusMask::empty_like(raw),
        }
    }
}

/// 将失败的图像名称追加到 `path`.
fn append_error_log(path: &Path, name: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::gray::*;
    use crate::phantom::Ellipsoid;
    use crate::{Calibration, StackAttr};

    const SHAPE: (usize, usize, usize) = (40, 40, 40);

    fn params() -> SegmentationParams {
        SegmentationParams::new(1000.0, 10000.0).unwrap()
    }

    fn sphere_stack(center: [f64; 3]) -> RawStack {
        let s = Ellipsoid::sphere(center, 10.0).unwrap();
        s.stack("sphere", SHAPE, &Calibration::unit(), 200, 20)
    }

    #[test]
    fn test_segment_sphere() {
        let raw = sphere_stack([19.5; 3]);
        let seg = Segmenter::new(params()).segment(&raw);
        assert!(seg.is_accepted());
        let range = Segmenter::new(params()).search_range(&raw).unwrap();
        let t = seg.best_threshold() as u32;
        assert!(range.contains(&t));
        // 全部接受的候选球形度相同, 取最低阈值.
        assert_eq!(t, 21);

        let mask = seg.mask();
        let truth = raw.binarize(t).foreground_count() as f64;
        let got = mask.foreground_count() as f64;
        assert!((got - truth).abs() / truth < 0.05);
        assert!(mask.data().iter().all(|v| *v == BACKGROUND || *v == FOREGROUND));
    }

    #[test]
    fn test_search_range() {
        let raw = sphere_stack([19.5; 3]);
        let range = Segmenter::new(params()).search_range(&raw).unwrap();
        // Otsu 阈值落在两个强度平台的中点附近, 区间下限受 σ 影响不低于 6.
        assert!(*range.start() >= 6);
        assert!(*range.start() <= 109 && *range.end() >= 109);
    }

    #[test]
    fn test_candidates_trace() {
        let raw = sphere_stack([19.5; 3]);
        let seg = Segmenter::new(params());
        let trace = seg.candidates(&raw);
        assert_eq!(trace.len(), seg.search_range(&raw).unwrap().count());
        assert!(trace.windows(2).all(|w| w[0].threshold < w[1].threshold));
        // 不超过背景强度 20 的阈值把整幅图像都视为前景.
        for c in trace.iter() {
            if c.threshold <= 20 {
                assert_eq!(c.verdict, Verdict::FillsFrame);
            } else {
                assert!(c.is_accepted());
                assert!(c.sphericity.unwrap() > 0.0);
            }
        }
    }

    #[test]
    fn test_border_rejection() {
        // 球体跨过 z = 0.
        let raw = sphere_stack([2.0, 19.5, 19.5]);
        let log = std::env::temp_dir().join(format!("nucleus-berry-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&log);
        let seg = Segmenter::new(params().with_error_log(&log)).segment(&raw);
        assert!(!seg.is_accepted());
        assert_eq!(seg.best_threshold(), -1);
        assert!(seg.mask().is_background());
        let logged = std::fs::read_to_string(&log).unwrap();
        assert_eq!(logged.trim(), "sphere");
        let _ = std::fs::remove_file(&log);
    }

    #[test]
    fn test_exhaustion() {
        let raw = RawStack::from_fn("dim", (8, 8, 8), Calibration::unit(), |(z, h, w)| {
            ((z + h + w) % 6) as u16
        });
        let seg = Segmenter::new(params()).segment(&raw);
        assert!(matches!(seg, Segmentation::Rejected { .. }));
        assert_eq!(seg.mask().shape(), raw.shape());
        assert!(seg.into_mask().is_background());
    }

    #[test]
    fn test_volume_bounds_reject() {
        let raw = sphere_stack([19.5; 3]);
        let tight = SegmentationParams::new(1.0, 100.0).unwrap();
        assert!(!Segmenter::new(tight).segment(&raw).is_accepted());
    }

    #[test]
    fn test_determinism() {
        let raw = sphere_stack([19.0, 20.0, 18.5]);
        let seg = Segmenter::new(params()).with_thresholder(ThresholdMethod::IsoData);
        assert_eq!(seg.segment(&raw), seg.segment(&raw));
    }
}
