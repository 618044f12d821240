//! 表面积估计.
//!
//! 三种估计方法对同一物体给出不同的结果: 面计数偏大 (阶梯效应),
//! 梯度加权依赖原图边缘质量, 网格最接近真实表面. 一份报告只使用其中一种.

use ndarray::{ArrayView3, Zip};

use crate::gradient::GradientField;
use crate::mesh::{MeshExtractionService, TriangleMesh};
use crate::{consts::ISO_LEVEL, Calibration, Idx3d};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 表面积估计方法.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SurfaceEstimator {
    /// 统计前景与非前景之间的体素面.
    FaceCounting,

    /// 体素面按原图梯度法向量在面法向上的投影加权.
    GradientWeighted,

    /// 等值面网格的三角形面积之和.
    #[default]
    Mesh,
}

impl SurfaceEstimator {
    /// 全部估计方法.
    pub const ALL: [SurfaceEstimator; 3] = [
        SurfaceEstimator::FaceCounting,
        SurfaceEstimator::GradientWeighted,
        SurfaceEstimator::Mesh,
    ];

    /// 简短名称, 用于报告.
    pub fn name(self) -> &'static str {
        match self {
            SurfaceEstimator::FaceCounting => "face-counting",
            SurfaceEstimator::GradientWeighted => "gradient-weighted",
            SurfaceEstimator::Mesh => "mesh",
        }
    }
}

/// 对 `mask` 中标签为 `label` 的物体的每个表面体素面调用 `visit(体素, 法向轴, 邻居)`.
///
/// 邻居体素越界时为 `None`, 越界邻居视为非物体.
fn for_each_boundary_face<F>(mask: ArrayView3<u8>, label: u8, mut visit: F)
where
    F: FnMut(Idx3d, usize, Option<Idx3d>),
{
    let (z_len, h_len, w_len) = mask.dim();
    let lens = [z_len, h_len, w_len];
    for ((z, h, w), &v) in mask.indexed_iter() {
        if v != label {
            continue;
        }
        let pos = [z, h, w];
        for axis in 0..3 {
            for step in [-1isize, 1] {
                let neigh = pos[axis]
                    .checked_add_signed(step)
                    .filter(|n| *n < lens[axis])
                    .map(|n| {
                        let mut p = pos;
                        p[axis] = n;
                        (p[0], p[1], p[2])
                    });
                match neigh {
                    Some(n) if mask[n] == label => {}
                    _ => visit((z, h, w), axis, neigh),
                }
            }
        }
    }
}

/// 面计数表面积: 每个与非物体体素 (或体数据外部) 相邻的体素面计一次物理面积.
pub fn face_counting(mask: ArrayView3<u8>, label: u8, calib: &Calibration) -> f64 {
    let areas = calib.face_areas();
    let mut total = 0.0;
    for_each_boundary_face(mask, label, |_, axis, _| total += areas[axis]);
    total
}

/// 梯度加权表面积.
///
/// 每个表面体素面的贡献为 `|u[axis]| * 面积`, 其中 `u` 为面两侧体素单位法向量的平均值
/// (不做单位化, 两侧法向量不一致时贡献随之减小). 体数据外部的法向量视为零向量.
pub fn gradient_weighted(
    mask: ArrayView3<u8>,
    label: u8,
    calib: &Calibration,
    gradient: &GradientField,
) -> f64 {
    assert_eq!(mask.dim(), gradient.shape(), "掩膜和梯度场形状不一致");
    let areas = calib.face_areas();
    let mut total = 0.0;
    for_each_boundary_face(mask, label, |pos, axis, neigh| {
        let a = gradient.normal_at(pos);
        let b = neigh.map_or([0.0; 3], |n| gradient.normal_at(n));
        total += ((a[axis] + b[axis]) / 2.0).abs() * areas[axis];
    });
    total
}

/// 提取标签为 `label` 的物体在等值面 [`ISO_LEVEL`] 处的标定网格.
pub fn object_mesh<X: MeshExtractionService + ?Sized>(
    mask: ArrayView3<u8>,
    label: u8,
    calib: &Calibration,
    mesher: &X,
) -> TriangleMesh {
    let mut volume = ndarray::Array3::<f32>::zeros(mask.dim());
    Zip::from(&mut volume)
        .and(mask)
        .for_each(|f, &m| *f = if m == label { 1.0 } else { 0.0 });
    mesher.extract(volume.view(), ISO_LEVEL, calib.pix_dim())
}
