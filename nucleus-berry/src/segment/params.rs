use std::path::{Path, PathBuf};

use crate::consts::search::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 阈值搜索分割的参数.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentationParams {
    volume_min: f64,
    volume_max: f64,
    max_frame_fraction: f64,
    border_voxels: usize,
    min_threshold: u32,
    morph_radius: usize,
    error_log: Option<PathBuf>,
}

impl SegmentationParams {
    /// 以可接受的物理体积区间 `[volume_min, volume_max]` 构建参数, 其余取默认值.
    ///
    /// 区间必须满足 `0 ≤ volume_min ≤ volume_max` 且两端有限, 否则返回 `None`.
    pub fn new(volume_min: f64, volume_max: f64) -> Option<Self> {
        if volume_min.is_finite() && volume_max.is_finite() && 0.0 <= volume_min && volume_min <= volume_max {
            Some(Self {
                volume_min,
                volume_max,
                max_frame_fraction: MAX_FRAME_FRACTION,
                border_voxels: BORDER_VOXELS,
                min_threshold: MIN_THRESHOLD,
                morph_radius: MORPH_RADIUS,
                error_log: None,
            })
        } else {
            None
        }
    }

    /// 设置候选前景体积占整幅图像比例的上限 (不含). 取值必须位于 `(0, 1]`, 否则返回 `None`.
    pub fn with_max_frame_fraction(mut self, fraction: f64) -> Option<Self> {
        (0.0 < fraction && fraction <= 1.0).then(|| {
            self.max_frame_fraction = fraction;
            self
        })
    }

    /// 设置首末 z 切片前景体素数的拒绝阈值.
    #[inline]
    pub fn with_border_voxels(mut self, voxels: usize) -> Self {
        self.border_voxels = voxels;
        self
    }

    /// 设置阈值下限.
    #[inline]
    pub fn with_min_threshold(mut self, threshold: u32) -> Self {
        self.min_threshold = threshold;
        self
    }

    /// 设置后处理开/闭运算的球形结构元半径. 0 表示不做开/闭运算.
    #[inline]
    pub fn with_morph_radius(mut self, radius: usize) -> Self {
        self.morph_radius = radius;
        self
    }

    /// 设置分割失败记录文件. 失败的图像名称会被追加到该文件末尾.
    #[inline]
    pub fn with_error_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_log = Some(path.into());
        self
    }

    /// 可接受体积下限.
    #[inline]
    pub fn volume_min(&self) -> f64 {
        self.volume_min
    }

    /// 可接受体积上限.
    #[inline]
    pub fn volume_max(&self) -> f64 {
        self.volume_max
    }

    /// 体积占比上限 (不含).
    #[inline]
    pub fn max_frame_fraction(&self) -> f64 {
        self.max_frame_fraction
    }

    /// 首末 z 切片前景体素数的拒绝阈值.
    #[inline]
    pub fn border_voxels(&self) -> usize {
        self.border_voxels
    }

    /// 阈值下限.
    #[inline]
    pub fn min_threshold(&self) -> u32 {
        self.min_threshold
    }

    /// 后处理结构元半径.
    #[inline]
    pub fn morph_radius(&self) -> usize {
        self.morph_radius
    }

    /// 分割失败记录文件.
    #[inline]
    pub fn error_log(&self) -> Option<&Path> {
        self.error_log.as_deref()
    }
}
