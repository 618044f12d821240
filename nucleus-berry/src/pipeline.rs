//! 分割 -> (凸包校正) -> 测量 的完整流程.

use log::info;
use thiserror::Error;

use crate::host::{MorphologyService, VoxelGridSource};
use crate::hull::ConvexHullCorrection;
use crate::measure::{Measure3d, MeasureError, ShapeDescriptor, SurfaceEstimator};
use crate::morph_3d::Morphology3d;
use crate::segment::{Segmentation, SegmentationParams, Segmenter};
use crate::threshold::{AutoThresholder, ThresholdMethod};
use crate::{NucleusMask, RawStack};

/// 流程运行时错误.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// 测量失败.
    #[error("measurement of `{name}` failed: {source}")]
    Measure {
        /// 图像名称.
        name: String,
        /// 底层错误.
        #[source]
        source: MeasureError,
    },

    /// 原图来源读取失败.
    #[error("voxel grid source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 单幅原图的分析结果.
#[derive(Clone, Debug)]
pub struct Analysis {
    /// 图像名称.
    pub name: String,
    /// 分割结果.
    pub segmentation: Segmentation,
    /// 凸包校正后的掩膜. 未启用校正或分割失败时为 `None`.
    pub corrected: Option<NucleusMask>,
    /// 形态描述. 分割失败时为 `None`.
    pub descriptor: Option<ShapeDescriptor>,
}

impl Analysis {
    /// 实际用于测量的掩膜.
    #[inline]
    pub fn measured_mask(&self) -> &NucleusMask {
        self.corrected
            .as_ref()
            .unwrap_or_else(|| self.segmentation.mask())
    }
}

/// 完整流程.
#[derive(Clone, Debug)]
pub struct Analyzer<T = ThresholdMethod, M = Morphology3d> {
    segmenter: Segmenter<T, M>,
    correction: Option<ConvexHullCorrection<M>>,
    estimator: SurfaceEstimator,
}

impl Analyzer {
    /// 使用默认服务构建, 不启用凸包校正, 以网格估计表面积.
    #[inline]
    pub fn new(params: SegmentationParams) -> Self {
        Self::from_segmenter(Segmenter::new(params))
    }
}

impl<T: AutoThresholder, M: MorphologyService + Clone> Analyzer<T, M> {
    /// 由分割器构建.
    #[inline]
    pub fn from_segmenter(segmenter: Segmenter<T, M>) -> Self {
        Self {
            segmenter,
            correction: None,
            estimator: SurfaceEstimator::default(),
        }
    }

    /// 启用或关闭凸包校正. 校正使用与分割相同的形态学服务.
    pub fn with_convex_hull(mut self, enable: bool) -> Self {
        self.correction = enable.then(|| ConvexHullCorrection::new(self.segmenter.morphology().clone()));
        self
    }

    /// 更换描述所用的表面积估计方法.
    #[inline]
    pub fn with_estimator(mut self, estimator: SurfaceEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// 分析单幅原图.
    ///
    /// 分割失败不是错误: 结果中的描述为 `None`.
    pub fn analyze(&self, raw: &RawStack) -> Result<Analysis, AnalysisError> {
        let segmentation = self.segmenter.segment(raw);
        if !segmentation.is_accepted() {
            return Ok(Analysis {
                name: raw.name().to_string(),
                segmentation,
                corrected: None,
                descriptor: None,
            });
        }

        let corrected = self
            .correction
            .as_ref()
            .map(|c| c.correct(segmentation.mask()));
        let mask = corrected.as_ref().unwrap_or_else(|| segmentation.mask());
        let descriptor = Measure3d::new(raw, mask)
            .descriptor_with(self.estimator)
            .map_err(|source| AnalysisError::Measure {
                name: raw.name().to_string(),
                source,
            })?;
        info!(
            "[{}] volume = {:.3}, sphericity = {:.4} ({})",
            raw.name(),
            descriptor.volume,
            descriptor.sphericity,
            self.estimator.name()
        );

        Ok(Analysis {
            name: raw.name().to_string(),
            segmentation,
            corrected,
            descriptor: Some(descriptor),
        })
    }

    /// 依次分析 `source` 产出的每幅原图, 直到来源取空.
    pub fn analyze_all<S: VoxelGridSource>(
        &self,
        source: &mut S,
    ) -> Vec<Result<Analysis, AnalysisError>> {
        let mut ans = Vec::new();
        while let Some(next) = source.next_stack() {
            ans.push(match next {
                Ok(raw) => self.analyze(&raw),
                Err(e) => Err(AnalysisError::Source(Box::new(e))),
            });
        }
        ans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemorySource;
    use crate::phantom::Ellipsoid;
    use crate::{Calibration, StackAttr};

    const SHAPE: (usize, usize, usize) = (40, 40, 40);

    fn params() -> SegmentationParams {
        SegmentationParams::new(1000.0, 10000.0).unwrap()
    }

    fn sphere(name: &str, z: f64) -> RawStack {
        Ellipsoid::sphere([z, 19.5, 19.5], 10.0)
            .unwrap()
            .stack(name, SHAPE, &Calibration::unit(), 200, 20)
    }

    #[test]
    fn test_analyze_with_hull() {
        let raw = sphere("ok", 19.5);
        let a = Analyzer::new(params()).with_convex_hull(true).analyze(&raw).unwrap();
        assert!(a.segmentation.is_accepted());
        let corrected = a.corrected.as_ref().unwrap();
        assert_eq!(corrected.shape(), raw.shape());
        let d = a.descriptor.unwrap();
        assert_eq!(d.surface_estimator, SurfaceEstimator::Mesh);
        assert!(d.sphericity > 0.85);
    }

    #[test]
    fn test_analyze_all() {
        let mut src = MemorySource::new([sphere("a", 19.5), sphere("cut", 1.0)]);
        let out = Analyzer::new(params())
            .with_estimator(SurfaceEstimator::FaceCounting)
            .analyze_all(&mut src);
        assert_eq!(out.len(), 2);
        let a = out[0].as_ref().unwrap();
        assert_eq!(a.name, "a");
        assert!(a.corrected.is_none());
        assert_eq!(
            a.descriptor.as_ref().unwrap().surface_estimator,
            SurfaceEstimator::FaceCounting
        );
        let cut = out[1].as_ref().unwrap();
        assert!(cut.descriptor.is_none());
        assert!(cut.measured_mask().is_background());
    }

    #[test]
    fn test_concurrent_analyses() {
        let _ = simple_logger::init_with_level(log::Level::Warn);
        let analyzer = Analyzer::new(params());
        let expected = analyzer.analyze(&sphere("ref", 19.5)).unwrap();

        let pool = threadpool::ThreadPool::new(num_cpus::get().clamp(1, 4));
        let (tx, rx) = std::sync::mpsc::channel();
        for i in 0..4 {
            let (analyzer, tx) = (analyzer.clone(), tx.clone());
            pool.execute(move || {
                let a = analyzer.analyze(&sphere(&format!("s{i}"), 19.5)).unwrap();
                tx.send(a).unwrap();
            });
        }
        drop(tx);

        let got: Vec<Analysis> = rx.iter().collect();
        assert_eq!(got.len(), 4);
        for a in got {
            assert_eq!(a.segmentation, expected.segmentation);
            assert_eq!(a.descriptor.unwrap().volume, expected.descriptor.as_ref().unwrap().volume);
        }
    }
}
