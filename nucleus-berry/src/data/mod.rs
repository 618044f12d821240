use std::ops::{Index, IndexMut};

use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewMut3, Axis, Zip};

use crate::consts::gray::*;
use crate::labeling::{label_volume, Connectivity};
use crate::{Idx2d, Idx3d};

pub mod morph_3d;
pub mod phantom;
pub mod slice;

pub use slice::{MaskSlice, MaskSliceMut, OwnedMaskSlice};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 体素的物理尺寸 (标定信息).
///
/// 三个方向的尺寸分别对应 width (`dx`, 自然图像水平方向),
/// height (`dy`, 自然图像垂直方向) 和 z (`dz`, 相邻切片方向).
/// 单位由 `unit` 描述, 通常为 `"µm"`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Calibration {
    width: f64,
    height: f64,
    z: f64,
    unit: String,
}

impl Calibration {
    /// 构建标定信息.
    ///
    /// 三个尺寸都必须是有限正数, 否则返回 `None`.
    pub fn new(width: f64, height: f64, z: f64, unit: impl Into<String>) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        (valid(width) && valid(height) && valid(z)).then(|| Self {
            width,
            height,
            z,
            unit: unit.into(),
        })
    }

    /// 各向同性的单位标定 (每个体素边长为 1 像素).
    #[inline]
    pub fn unit() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            z: 1.0,
            unit: "pixel".to_string(),
        }
    }

    /// width 方向体素尺寸 (`dx`).
    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    /// height 方向体素尺寸 (`dy`).
    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// z 方向体素尺寸 (`dz`).
    #[inline]
    pub fn z(&self) -> f64 {
        self.z
    }

    /// 长度单位.
    #[inline]
    pub fn unit_name(&self) -> &str {
        &self.unit
    }

    /// 按 `(z, h, w)` 顺序获取体素尺寸.
    #[inline]
    pub fn pix_dim(&self) -> [f64; 3] {
        [self.z, self.height, self.width]
    }

    /// 单个体素的物理体积.
    #[inline]
    pub fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }

    /// 与第 `k` 个轴 (`0 = z, 1 = h, 2 = w`) 垂直的体素面的物理面积.
    #[inline]
    pub fn face_areas(&self) -> [f64; 3] {
        let [z, h, w] = self.pix_dim();
        [h * w, z * w, z * h]
    }
}

impl Default for Calibration {
    #[inline]
    fn default() -> Self {
        Self::unit()
    }
}

/// 三维体数据 (原图或掩膜) 的共用属性和部分通用操作.
pub trait StackAttr {
    /// 获取标定信息.
    fn calibration(&self) -> &Calibration;

    /// 获取数据形状 `(z, h, w)`.
    fn shape(&self) -> Idx3d;

    /// 获取数据水平切片形状大小.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 按 `(z, h, w)` 顺序获取体素尺寸.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        self.calibration().pix_dim()
    }

    /// 获取单个体素的物理体积.
    #[inline]
    fn voxel(&self) -> f64 {
        self.calibration().voxel()
    }

    /// 获取整幅图像的物理体积.
    #[inline]
    fn frame_volume(&self) -> f64 {
        self.size() as f64 * self.voxel()
    }
}

/// 判断两个体数据形状是否一致. 不一致时 panic.
#[inline]
pub(crate) fn assert_same_shape(a: &impl StackAttr, b: &impl StackAttr) {
    assert_eq!(a.shape(), b.shape(), "原图和掩膜形状不一致");
}

/// 三维荧光显微原图, 包括名称、标定信息和体素强度. 强度以 `u16` 保存,
/// 可以无损容纳 8-bit 和 16-bit 的显微图像.
#[derive(Debug, Clone)]
pub struct RawStack {
    name: String,
    calib: Calibration,
    data: Array3<u16>,
}

impl StackAttr for RawStack {
    #[inline]
    fn calibration(&self) -> &Calibration {
        &self.calib
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for RawStack {
    type Output = u16;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl RawStack {
    /// 根据 `(z, h, w)` 组织的强度数据直接创建原图.
    ///
    /// `data` 不能为空, 否则程序 panic.
    pub fn new(name: impl Into<String>, data: Array3<u16>, calib: Calibration) -> Self {
        assert!(!data.is_empty(), "原图不能为空");
        Self {
            name: name.into(),
            calib,
            data,
        }
    }

    /// 以 `f` 逐体素生成原图.
    pub fn from_fn<F>(name: impl Into<String>, shape: Idx3d, calib: Calibration, f: F) -> Self
    where
        F: FnMut(Idx3d) -> u16,
    {
        Self::new(name, Array3::from_shape_fn(shape, f), calib)
    }

    /// 图像名称, 仅用于日志与报告.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, u16> {
        self.data.view()
    }

    /// 获取 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, u16> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 以 `threshold` 二值化: 强度不小于 `threshold` 的体素为 [`FOREGROUND`],
    /// 其余为 [`BACKGROUND`].
    pub fn binarize(&self, threshold: u32) -> NucleusMask {
        let data = self.data.mapv(|v| {
            if u32::from(v) >= threshold {
                FOREGROUND
            } else {
                BACKGROUND
            }
        });
        NucleusMask::new(data, self.calib.clone())
    }
}

/// 三维细胞核掩膜 (标签图). 0 为背景, 非 0 为前景标签;
/// 分割输出的掩膜只含一个前景标签 [`FOREGROUND`].
#[derive(Debug, Clone, PartialEq)]
pub struct NucleusMask {
    calib: Calibration,
    data: Array3<u8>,
}

impl StackAttr for NucleusMask {
    #[inline]
    fn calibration(&self) -> &Calibration {
        &self.calib
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for NucleusMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for NucleusMask {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl NucleusMask {
    /// 根据 `(z, h, w)` 组织的标签数据直接创建掩膜.
    ///
    /// `data` 不能为空, 否则程序 panic.
    #[inline]
    pub fn new(data: Array3<u8>, calib: Calibration) -> Self {
        assert!(!data.is_empty(), "掩膜不能为空");
        Self { calib, data }
    }

    /// 创建与 `like` 同形状、同标定的全背景掩膜.
    pub fn empty_like(like: &impl StackAttr) -> Self {
        Self {
            calib: like.calibration().clone(),
            data: Array3::from_elem(like.shape(), BACKGROUND),
        }
    }

    /// 以 `f` 逐体素生成掩膜.
    pub fn from_fn<F>(shape: Idx3d, calib: Calibration, f: F) -> Self
    where
        F: FnMut(Idx3d) -> u8,
    {
        Self::new(Array3::from_shape_fn(shape, f), calib)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        self.data.view_mut()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array3<u8> {
        self.data
    }

    /// 获取 z 空间的第 `z_index` 层不可变切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> MaskSlice<'_> {
        MaskSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代水平可变切片的迭代器.
    #[inline]
    pub fn slice_iter_mut(&mut self) -> impl ExactSizeIterator<Item = MaskSliceMut> {
        self.data.axis_iter_mut(Axis(0)).map(MaskSliceMut::new)
    }

    /// 获取掩膜中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 获取前景 ([`FOREGROUND`]) 体素个数.
    #[inline]
    pub fn foreground_count(&self) -> usize {
        self.count(FOREGROUND)
    }

    /// 掩膜是否为全背景?
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().copied().all(is_background)
    }

    /// 收集满足谓词 `pred` 的所有体素对应的下标, 结果按行优先存储.
    pub fn filter_pos(&self, pred: impl Fn(u8) -> bool) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, pixel)| pred(*pixel).then_some(pos))
            .collect()
    }

    /// 第一张和最后一张 z 切片上值为 `label` 的体素个数.
    pub fn z_border_counts(&self, label: u8) -> (usize, usize) {
        let last = self.len_z() - 1;
        (
            self.slice_at(0).count(label),
            self.slice_at(last).count(label),
        )
    }

    /// 与 `other` 逐体素取逻辑或: 任一方非背景的位置被设置为 [`FOREGROUND`].
    ///
    /// 形状不一致时 panic.
    pub fn union_with(&mut self, other: &NucleusMask) {
        assert_same_shape(self, other);
        Zip::from(&mut self.data)
            .and(&other.data)
            .for_each(|mine, &theirs| {
                if is_marked(*mine) || is_marked(theirs) {
                    *mine = FOREGROUND;
                }
            });
    }

    /// 只保留 `connectivity` 意义下体素数最多的一个前景连通域 (任意非背景值视为前景),
    /// 并将其标记为 [`FOREGROUND`], 其余全部置为背景.
    ///
    /// 返回保留下来的体素个数. 若不存在前景, 返回 0.
    pub fn keep_largest_component(&mut self, connectivity: Connectivity) -> usize {
        let labeling = label_volume(self.data(), is_marked, connectivity);
        let Some(largest) = labeling.largest() else {
            return 0;
        };
        for (v, &l) in self.data.iter_mut().zip(labeling.labels()) {
            *v = if l == largest { FOREGROUND } else { BACKGROUND };
        }
        labeling.size_of(largest)
    }

    /// 将每张水平切片中的背景空洞 (不接触切片边缘的 8-连通背景区域)
    /// 填充为前景. 如果以此法修改了掩膜则返回 `true`.
    pub fn fill_holes_2d(&mut self) -> bool {
        let mut non_trivial = false;
        self.slice_iter_mut()
            .for_each(|mut s| non_trivial |= s.fill_holes());
        non_trivial
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use std::sync::atomic::{AtomicBool, Ordering};
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl NucleusMask {
    /// 借助 `rayon`, 并行地对每个水平可变切片实施 `op` 操作.
    pub fn par_for_each_slice_mut<F>(&mut self, op: F)
    where
        F: Fn(MaskSliceMut) + Sync + Send,
    {
        self.data_mut()
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|v| {
                op(MaskSliceMut::new(v));
            });
    }

    /// 借助 `rayon`, 使用多任务模式运行 `self.fill_holes_2d`.
    pub fn par_fill_holes_2d(&mut self) -> bool {
        let non_trivial = AtomicBool::new(false);
        self.par_for_each_slice_mut(|mut s| {
            non_trivial.fetch_or(s.fill_holes(), Ordering::Release);
        });
        non_trivial.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_invalid() {
        assert!(Calibration::new(0.0, 1.0, 1.0, "µm").is_none());
        assert!(Calibration::new(1.0, f64::NAN, 1.0, "µm").is_none());
        assert!(Calibration::new(1.0, 1.0, -0.2, "µm").is_none());

        let c = Calibration::new(0.1, 0.2, 0.5, "µm").unwrap();
        assert_eq!(c.pix_dim(), [0.5, 0.2, 0.1]);
        assert!((c.voxel() - 0.01).abs() < 1e-12);
        let [fz, fh, fw] = c.face_areas();
        assert!((fz - 0.02).abs() < 1e-12);
        assert!((fh - 0.05).abs() < 1e-12);
        assert!((fw - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_binarize_and_border_counts() {
        let raw = RawStack::from_fn("ramp", (3, 4, 5), Calibration::unit(), |(z, _, w)| {
            (z * 10 + w) as u16
        });
        let mask = raw.binarize(12);
        // z = 0: 全背景; z = 1: w >= 2; z = 2: 全前景.
        assert_eq!(mask.z_border_counts(FOREGROUND), (0, 20));
        assert_eq!(mask.foreground_count(), 3 * 4 + 20);
    }

    #[test]
    fn test_keep_largest_component() {
        let mut mask = NucleusMask::from_fn((5, 5, 5), Calibration::unit(), |(z, h, w)| {
            let big = z >= 2 && h >= 2 && w >= 2;
            let small = (z, h, w) == (0, 0, 0);
            if big || small {
                7
            } else {
                BACKGROUND
            }
        });
        assert_eq!(mask.keep_largest_component(Connectivity::Full), 27);
        assert_eq!(mask[(0, 0, 0)], BACKGROUND);
        assert_eq!(mask[(4, 4, 4)], FOREGROUND);
        assert_eq!(mask.foreground_count(), 27);

        let mut empty = NucleusMask::empty_like(&mask);
        assert_eq!(empty.keep_largest_component(Connectivity::Full), 0);
    }

    #[test]
    fn test_union_with() {
        let c = Calibration::unit();
        let mut a = NucleusMask::from_fn((1, 2, 2), c.clone(), |(_, h, _)| {
            if h == 0 {
                FOREGROUND
            } else {
                BACKGROUND
            }
        });
        let b = NucleusMask::from_fn((1, 2, 2), c, |(_, _, w)| if w == 0 { 3 } else { 0 });
        a.union_with(&b);
        assert_eq!(a.foreground_count(), 3);
        assert_eq!(a[(0, 1, 1)], BACKGROUND);
    }

    #[test]
    #[should_panic(expected = "掩膜不能为空")]
    fn test_zero_depth_mask() {
        let mask = NucleusMask::new(Array3::zeros((0, 4, 4)), Calibration::unit());
        mask.z_border_counts(FOREGROUND);
    }
}
