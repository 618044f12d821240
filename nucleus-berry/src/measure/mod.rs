//! 三维形态学测量.
//!
//! [`Measure3d`] 绑定一幅原图和一个掩膜, 计算体积、表面积、形状参数和强度统计量,
//! 并汇总为 [`ShapeDescriptor`].

mod chromatin;
mod error;
pub mod shape;
pub mod surface;

pub use chromatin::Heterochromatin;
pub use error::MeasureError;
pub use shape::{equivalent_radius, sphericity};
pub use surface::SurfaceEstimator;

pub use crate::histogram::IntensityStats;

use ndarray::Zip;

use crate::consts::gray::*;
use crate::data::assert_same_shape;
use crate::gradient::GradientField;
use crate::histogram::Histogram;
use crate::mesh::{MeshExtractionService, SurfaceNets, TriangleMesh};
use crate::{Idx3d, NucleusMask, RawStack, StackAttr, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 测量运行时结果.
pub type MeasureResult<T> = Result<T, MeasureError>;

/// 单个细胞核的形态与强度描述.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeDescriptor {
    /// 体素计数体积.
    pub volume: f64,
    /// 表面积, 由 `surface_estimator` 给出.
    pub surface_area: f64,
    /// 计算表面积所用的方法.
    pub surface_estimator: SurfaceEstimator,
    /// 网格有向体积. 仅在使用网格估计表面积时存在.
    pub mesh_volume: Option<f64>,
    /// 协方差矩阵特征值, 升序.
    pub eigenvalues: Vec3,
    /// `λ1 / λ0`.
    pub flatness: f64,
    /// `λ2 / λ1`.
    pub elongation: f64,
    /// 球形度.
    pub sphericity: f64,
    /// 等效球半径.
    pub equivalent_radius: f64,
    /// 前景 (掩膜值等于标签) 原图强度统计.
    pub foreground: IntensityStats,
    /// 背景 (掩膜值为 0) 原图强度统计. 不存在背景时为默认值.
    pub background: IntensityStats,
    /// 标定重心 `(z, h, w)`.
    pub barycenter: Vec3,
}

impl ShapeDescriptor {
    /// 前景平均强度.
    #[inline]
    pub fn mean_intensity_fg(&self) -> f64 {
        self.foreground.mean
    }

    /// 背景平均强度.
    #[inline]
    pub fn mean_intensity_bg(&self) -> f64 {
        self.background.mean
    }

    /// 前景强度标准差.
    #[inline]
    pub fn std_dev_fg(&self) -> f64 {
        self.foreground.std_dev
    }

    /// 前景最小强度.
    #[inline]
    pub fn min_fg(&self) -> u32 {
        self.foreground.min
    }

    /// 前景最大强度.
    #[inline]
    pub fn max_fg(&self) -> u32 {
        self.foreground.max
    }

    /// 前景强度中位数.
    #[inline]
    pub fn median_fg(&self) -> f64 {
        self.foreground.median
    }

    /// 背景强度中位数.
    #[inline]
    pub fn median_bg(&self) -> f64 {
        self.background.median
    }
}

/// 一幅原图和一个掩膜上的测量.
///
/// 掩膜中值等于 `label` (默认 [`FOREGROUND`]) 的体素构成被测物体.
pub struct Measure3d<'a, X = SurfaceNets> {
    raw: &'a RawStack,
    mask: &'a NucleusMask,
    label: u8,
    mesher: X,
}

impl<'a> Measure3d<'a> {
    /// 绑定原图和掩膜.
    ///
    /// 两者形状不一致时 panic.
    pub fn new(raw: &'a RawStack, mask: &'a NucleusMask) -> Self {
        assert_same_shape(raw, mask);
        Self {
            raw,
            mask,
            label: FOREGROUND,
            mesher: SurfaceNets,
        }
    }
}

impl<'a, X: MeshExtractionService> Measure3d<'a, X> {
    /// 改变被测物体的标签.
    #[inline]
    pub fn with_label(mut self, label: u8) -> Self {
        self.label = label;
        self
    }

    /// 改变网格提取服务.
    #[inline]
    pub fn with_mesher<Y: MeshExtractionService>(self, mesher: Y) -> Measure3d<'a, Y> {
        Measure3d {
            raw: self.raw,
            mask: self.mask,
            label: self.label,
            mesher,
        }
    }

    /// 被测物体的标签.
    #[inline]
    pub fn label(&self) -> u8 {
        self.label
    }

    /// 被测物体的体素个数.
    #[inline]
    pub fn voxel_count(&self) -> usize {
        self.mask.count(self.label)
    }

    /// 体积: 体素个数 × 单个体素体积.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.voxel_count() as f64 * self.mask.voxel()
    }

    /// 掩膜中标签为 `label` 的体素的总体积.
    pub fn volume_of(&self, label: u8) -> f64 {
        Histogram::from_mask(self.mask, false).count(u32::from(label)) as f64 * self.mask.voxel()
    }

    /// 被测物体的全部体素下标.
    #[inline]
    pub fn positions(&self) -> Vec<Idx3d> {
        let label = self.label;
        self.mask.filter_pos(|v| v == label)
    }

    /// 面计数表面积.
    #[inline]
    pub fn surface_face_counting(&self) -> f64 {
        surface::face_counting(self.mask.data(), self.label, self.mask.calibration())
    }

    /// 计算原图的梯度场, 供 [`Self::surface_gradient_weighted`] 使用.
    #[inline]
    pub fn gradient_field(&self) -> GradientField {
        GradientField::compute(self.raw)
    }

    /// 梯度加权表面积.
    ///
    /// `gradient` 必须来自同一幅原图, 至少形状必须一致, 否则 panic.
    #[inline]
    pub fn surface_gradient_weighted(&self, gradient: &GradientField) -> f64 {
        surface::gradient_weighted(
            self.mask.data(),
            self.label,
            self.mask.calibration(),
            gradient,
        )
    }

    /// 被测物体的标定等值面网格.
    #[inline]
    pub fn mesh(&self) -> TriangleMesh {
        surface::object_mesh(
            self.mask.data(),
            self.label,
            self.mask.calibration(),
            &self.mesher,
        )
    }

    /// 网格表面积.
    #[inline]
    pub fn surface_mesh(&self) -> f64 {
        self.mesh().area()
    }

    /// 网格表面积与网格有向体积.
    pub fn mesh_measures(&self) -> (f64, f64) {
        let mesh = self.mesh();
        (mesh.area(), mesh.signed_volume())
    }

    /// 标定体素坐标.
    fn calibrated_positions(&self) -> Vec<Vec3> {
        let [dz, dh, dw] = self.mask.pix_dim();
        self.positions()
            .into_iter()
            .map(|(z, h, w)| [z as f64 * dz, h as f64 * dh, w as f64 * dw])
            .collect()
    }

    /// 标定体素坐标关于重心的协方差矩阵.
    pub fn covariance(&self) -> MeasureResult<nalgebra::Matrix3<f64>> {
        shape::covariance(&self.calibrated_positions()).ok_or(MeasureError::EmptyObject(self.label))
    }

    /// 协方差矩阵特征值, 升序.
    #[inline]
    pub fn eigenvalues(&self) -> MeasureResult<Vec3> {
        self.covariance().map(shape::sorted_eigenvalues)
    }

    /// `(flatness, elongation)`.
    #[inline]
    pub fn flatness_elongation(&self) -> MeasureResult<(f64, f64)> {
        shape::flatness_elongation(self.eigenvalues()?)
    }

    /// 重心. `calibrated` 时为物理坐标, 否则为体素下标坐标.
    pub fn barycenter(&self, calibrated: bool) -> MeasureResult<Vec3> {
        let scale = if calibrated {
            self.mask.pix_dim()
        } else {
            [1.0; 3]
        };
        shape::centroid(self.positions().into_iter().map(|(z, h, w)| {
            [
                z as f64 * scale[0],
                h as f64 * scale[1],
                w as f64 * scale[2],
            ]
        }))
        .ok_or(MeasureError::EmptyObject(self.label))
    }

    /// 前景与背景的原图强度直方图.
    ///
    /// 前景为掩膜值等于标签的体素, 背景为掩膜值为 [`BACKGROUND`] 的体素.
    pub fn intensity_histograms(&self) -> (Histogram, Histogram) {
        let mut fg = Histogram::new();
        let mut bg = Histogram::new();
        let label = self.label;
        Zip::from(self.raw.data())
            .and(self.mask.data())
            .for_each(|&r, &m| {
                if m == label {
                    fg.add(u32::from(r));
                } else if is_background(m) {
                    bg.add(u32::from(r));
                }
            });
        (fg, bg)
    }

    /// 前景与背景的强度统计量. 前景为空时返回 [`MeasureError::EmptyObject`].
    pub fn intensity_stats(&self) -> MeasureResult<(IntensityStats, IntensityStats)> {
        let (fg, bg) = self.intensity_histograms();
        let fg = fg.stats().ok_or(MeasureError::EmptyObject(self.label))?;
        Ok((fg, bg.stats().unwrap_or_default()))
    }

    /// 以指定的表面积估计方法给出的表面积. 返回表面积和 (网格方法下的) 网格体积.
    fn surface_by(&self, estimator: SurfaceEstimator) -> (f64, Option<f64>) {
        match estimator {
            SurfaceEstimator::FaceCounting => (self.surface_face_counting(), None),
            SurfaceEstimator::GradientWeighted => {
                (self.surface_gradient_weighted(&self.gradient_field()), None)
            }
            SurfaceEstimator::Mesh => {
                let (area, volume) = self.mesh_measures();
                (area, Some(volume))
            }
        }
    }

    /// 使用网格表面积的标准描述.
    #[inline]
    pub fn descriptor(&self) -> MeasureResult<ShapeDescriptor> {
        self.descriptor_with(SurfaceEstimator::Mesh)
    }

    /// 使用给定表面积估计方法的描述. 所有依赖表面积的量都来自同一方法.
    pub fn descriptor_with(&self, estimator: SurfaceEstimator) -> MeasureResult<ShapeDescriptor> {
        let volume = self.volume();
        if volume <= 0.0 {
            return Err(MeasureError::EmptyObject(self.label));
        }
        let (surface_area, mesh_volume) = self.surface_by(estimator);
        let eigenvalues = self.eigenvalues()?;
        let (flatness, elongation) = shape::flatness_elongation(eigenvalues)?;
        let (foreground, background) = self.intensity_stats()?;

        Ok(ShapeDescriptor {
            volume,
            surface_area,
            surface_estimator: estimator,
            mesh_volume,
            eigenvalues,
            flatness,
            elongation,
            sphericity: sphericity(volume, surface_area)?,
            equivalent_radius: equivalent_radius(volume),
            foreground,
            background,
            barycenter: self.barycenter(true)?,
        })
    }

    /// 细胞核内的染色中心统计. `chromocenters` 形状必须与掩膜一致, 否则 panic.
    #[inline]
    pub fn heterochromatin(&self, chromocenters: &NucleusMask) -> MeasureResult<Heterochromatin> {
        chromatin::heterochromatin(self.raw, self.mask, self.label, chromocenters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phantom::Ellipsoid;
    use crate::Calibration;

    const SHAPE: Idx3d = (64, 64, 64);

    fn sphere() -> (RawStack, NucleusMask, Ellipsoid) {
        let calib = Calibration::unit();
        let s = Ellipsoid::centered_sphere(SHAPE, &calib, 20.0).unwrap();
        (s.stack("sphere", SHAPE, &calib, 200, 20), s.mask(SHAPE, &calib), s)
    }

    #[test]
    fn test_sphere_calibration() {
        let (raw, mask, s) = sphere();
        let m = Measure3d::new(&raw, &mask);
        let d = m.descriptor().unwrap();
        assert_eq!(d.surface_estimator, SurfaceEstimator::Mesh);
        assert!(d.sphericity >= 0.9, "sphericity = {}", d.sphericity);
        assert!((d.volume - s.volume()).abs() / s.volume() < 0.05);
        let mesh_volume = d.mesh_volume.unwrap();
        assert!((mesh_volume - s.volume()).abs() / s.volume() < 0.05);
        assert!((d.equivalent_radius - 20.0).abs() < 1.0);
    }

    #[test]
    fn test_estimators_ordering() {
        let (raw, mask, s) = sphere();
        let m = Measure3d::new(&raw, &mask);
        let fc = m.descriptor_with(SurfaceEstimator::FaceCounting).unwrap();
        let gw = m.descriptor_with(SurfaceEstimator::GradientWeighted).unwrap();
        assert_eq!(fc.surface_estimator, SurfaceEstimator::FaceCounting);
        assert!(fc.mesh_volume.is_none());
        assert!(gw.sphericity > fc.sphericity);
        // 面计数的阶梯效应使球体表面积偏大约 50%.
        assert!(fc.sphericity < 0.8);
        // 平均法向量不做单位化时, 梯度加权表面积比解析值偏大不到 10%.
        let rel = (gw.surface_area - s.surface_area()) / s.surface_area();
        assert!(0.0 < rel && rel < 0.12, "relative error = {rel}");
    }

    #[test]
    fn test_volume_identity_and_stats() {
        let (raw, mask, _) = sphere();
        let m = Measure3d::new(&raw, &mask);
        assert_eq!(m.volume(), m.voxel_count() as f64);
        assert_eq!(m.volume_of(FOREGROUND), m.volume());
        assert_eq!(
            m.volume_of(BACKGROUND) + m.volume(),
            mask.frame_volume()
        );

        let d = m.descriptor().unwrap();
        assert_eq!(d.mean_intensity_fg(), 200.0);
        assert_eq!(d.mean_intensity_bg(), 20.0);
        assert_eq!(d.std_dev_fg(), 0.0);
        assert_eq!((d.min_fg(), d.max_fg()), (200, 200));
        assert_eq!((d.median_fg(), d.median_bg()), (200.0, 20.0));
        for (b, c) in d.barycenter.iter().zip([31.5; 3]) {
            assert!((b - c).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ellipsoid_eigen() {
        let calib = Calibration::new(0.5, 0.5, 1.0, "µm").unwrap();
        let shape = (32, 64, 64);
        let e = Ellipsoid::centered(shape, &calib, [6.0, 8.0, 12.0]).unwrap();
        let raw = e.stack("e", shape, &calib, 120, 5);
        let mask = e.mask(shape, &calib);
        let d = Measure3d::new(&raw, &mask).descriptor().unwrap();
        let [l0, l1, l2] = d.eigenvalues;
        assert!(0.0 < l0 && l0 <= l1 && l1 <= l2);
        assert!(d.flatness > 1.0 && d.elongation > 1.0);
        // 实心椭球沿半轴 a 的方差为 a² / 5.
        assert!((l2 - 144.0 / 5.0).abs() / (144.0 / 5.0) < 0.05);
        assert!(d.sphericity < 0.95);
    }

    #[test]
    fn test_empty_object() {
        let (raw, _, _) = sphere();
        let empty = NucleusMask::empty_like(&raw);
        let m = Measure3d::new(&raw, &empty);
        assert_eq!(m.descriptor(), Err(MeasureError::EmptyObject(FOREGROUND)));
        assert!(m.barycenter(false).is_err());
    }

    #[test]
    fn test_heterochromatin() {
        let (raw, mask, _) = sphere();
        // 两个 2x2x2 的染色中心, 一个在核内, 一个在核外角落.
        let cc = NucleusMask::from_fn(SHAPE, Calibration::unit(), |(z, h, w)| {
            let inner = (30..32).contains(&z) && (30..32).contains(&h) && (30..32).contains(&w);
            let outer = z < 2 && h < 2 && w < 2;
            if inner || outer {
                FOREGROUND
            } else {
                BACKGROUND
            }
        });
        let m = Measure3d::new(&raw, &mask);
        let het = m.heterochromatin(&cc).unwrap();
        assert_eq!(het.count, 1);
        assert_eq!(het.volumes, vec![8.0]);
        let n = m.voxel_count() as f64;
        assert!((het.rhf_volume - 8.0 / n).abs() < 1e-12);
        assert!((het.rhf_intensity - 8.0 / n).abs() < 1e-12);

        let empty = NucleusMask::empty_like(&raw);
        assert!(Measure3d::new(&raw, &empty).heterochromatin(&cc).is_err());
    }

    #[test]
    #[should_panic]
    fn test_shape_mismatch() {
        let (raw, _, _) = sphere();
        let other = NucleusMask::from_fn((2, 2, 2), Calibration::unit(), |_| 0);
        Measure3d::new(&raw, &other);
    }
}
