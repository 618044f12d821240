use ndarray::{Array3, Axis};

use super::{convex_hull, polygon::rasterize};
use crate::consts::gray::*;
use crate::consts::hull::*;
use crate::host::MorphologyService;
use crate::labeling::Connectivity;
use crate::morph_3d::{Morphology3d, StructElem};
use crate::{MaskSlice, NucleusMask, OwnedMaskSlice, StackAttr};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 切片所在的正交平面.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AxisPair {
    /// 水平切片, 沿 z 轴逐张处理.
    Xy,
    /// 沿 h 轴逐张处理的 `(z, w)` 切片.
    Xz,
    /// 沿 w 轴逐张处理的 `(z, h)` 切片.
    Yz,
}

impl AxisPair {
    /// 全部三个平面.
    pub const ALL: [AxisPair; 3] = [AxisPair::Xy, AxisPair::Xz, AxisPair::Yz];

    /// 逐张切片时沿着的轴.
    #[inline]
    pub fn slice_axis(self) -> Axis {
        match self {
            AxisPair::Xy => Axis(0),
            AxisPair::Xz => Axis(1),
            AxisPair::Yz => Axis(2),
        }
    }
}

/// 对一张切片的每个连通域计算凸包并光栅化.
///
/// 连通域按 8-邻接划分; 边缘像素不超过 [`MIN_BOUNDARY_PIXELS`] 或凸包退化的连通域不输出.
pub fn hull_slice(slice: &MaskSlice) -> OwnedMaskSlice {
    let mut out = OwnedMaskSlice::zeros(slice.shape());
    let labeling = slice.components(is_marked, Connectivity::Full);
    for boundary in slice.boundaries(&labeling) {
        if boundary.len() <= MIN_BOUNDARY_PIXELS {
            continue;
        }
        // 退化的凸包 (不足 3 个不同的点) 直接跳过.
        if let Ok(hull) = convex_hull(&boundary) {
            rasterize(&hull, &mut out.as_mutable(), FOREGROUND);
        }
    }
    out
}

/// 凸包校正.
///
/// 分别沿三个正交平面逐张切片做凸包, 与原掩膜取并集后,
/// 用边长 [`OPENING_CUBE_EDGE`] 的立方体结构元做一次开运算.
#[derive(Clone, Debug, Default)]
pub struct ConvexHullCorrection<M = Morphology3d> {
    morph: M,
}

impl<M: MorphologyService> ConvexHullCorrection<M> {
    /// 使用给定的形态学服务构建.
    #[inline]
    pub fn new(morph: M) -> Self {
        Self { morph }
    }

    /// 计算单个平面上的逐切片凸包体数据. 各切片互相独立, 启用 `rayon` 时并行计算.
    pub fn axis_pair(&self, mask: &NucleusMask, pair: AxisPair) -> NucleusMask {
        let axis = pair.slice_axis();
        let data = mask.data();

        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                let planes: Vec<OwnedMaskSlice> = data
                    .axis_iter(axis)
                    .into_par_iter()
                    .map(|v| hull_slice(&MaskSlice::new(v)))
                    .collect();
            } else {
                let planes: Vec<OwnedMaskSlice> = data
                    .axis_iter(axis)
                    .map(|v| hull_slice(&MaskSlice::new(v)))
                    .collect();
            }
        }

        let mut out = Array3::from_elem(mask.shape(), BACKGROUND);
        for (mut dst, src) in out.axis_iter_mut(axis).zip(planes) {
            dst.assign(&src.into_raw());
        }
        NucleusMask::new(out, mask.calibration().clone())
    }

    /// 对掩膜实施凸包校正. 输出中的前景均为 [`FOREGROUND`].
    pub fn correct(&self, mask: &NucleusMask) -> NucleusMask {
        let mut union = NucleusMask::empty_like(mask);
        union.union_with(mask);
        for pair in AxisPair::ALL {
            union.union_with(&self.axis_pair(mask, pair));
        }
        self.morph
            .open(&union, StructElem::Cube(OPENING_CUBE_EDGE))
    }
}
