use std::ops::{Index, IndexMut};

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use crate::consts::gray::*;
use crate::labeling::{label_plane, Connectivity, Labeling};
use crate::Idx2d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 不可变、借用的二维掩膜切片.
///
/// 切片可以来自任意一个轴 (见 [`crate::hull::AxisPair`]), 但总是以 `(行, 列)` 索引.
pub struct MaskSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::NucleusMask`] 或 [`OwnedMaskSlice`].
    data: ArrayView2<'a, u8>,
}

impl Index<Idx2d> for MaskSlice<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

/// 可变、借用的二维掩膜切片.
pub struct MaskSliceMut<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::NucleusMask`] 或 [`OwnedMaskSlice`].
    data: ArrayViewMut2<'a, u8>,
}

/// 可变方法集合.
impl<'a> MaskSliceMut<'a> {
    /// 将图像中的背景空洞 (即不接触图像边缘的 8-连通背景区域)
    /// 填充为 [`FOREGROUND`]. 如果以此法修改了原图则返回 `true`,
    /// 否则返回 `false`.
    pub fn fill_holes(&mut self) -> bool {
        let bg = self.components(is_background, Connectivity::Full);
        if bg.is_empty() {
            return false;
        }

        // 接触边缘的背景区域 (按 id 编号记录).
        let mut open = vec![false; bg.len()];
        let (h, w) = self.shape();
        for (r, c) in ndarray::indices((h, w)) {
            if self.is_at_border((r, c)) {
                let l = bg.label_at([r, c]);
                if let Some(i) = bg.index_of(l) {
                    open[i] = true;
                }
            }
        }
        if open.iter().all(|o| *o) {
            return false;
        }

        for ((r, c), pix) in self.data.indexed_iter_mut() {
            if let Some(i) = bg.index_of(bg.label_at([r, c])) {
                if !open[i] {
                    *pix = FOREGROUND;
                }
            }
        }
        true
    }
}

impl Index<Idx2d> for MaskSliceMut<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for MaskSliceMut<'_> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// 掩膜切片不可变方法集合.
macro_rules! impl_mask_slice_immut {
    ($life: lifetime, $slice: ty, $array: ty) => {
        /// 不可变方法集合.
        impl<$life> $slice {
            /// 直接初始化.
            #[inline]
            pub(crate) fn new(data: $array) -> Self {
                Self { data }
            }

            /// 获得 **底层** 数据的一份不可变 shallow copy.
            #[inline]
            pub fn array_view(&self) -> ArrayView2<u8> {
                self.data.view()
            }

            /// 该图是否为全背景图?
            #[inline]
            pub fn is_background(&self) -> bool {
                self.data.iter().copied().all(is_background)
            }

            /// 图像的分辨率 (行, 列).
            #[inline]
            pub fn shape(&self) -> Idx2d {
                self.data.dim()
            }

            /// 统计图像中值为 `label` 的像素总个数.
            #[inline]
            pub fn count(&self, label: u8) -> usize {
                self.data.iter().filter(|&p| *p == label).count()
            }

            /// 获得图像的行数.
            #[inline]
            pub fn height(&self) -> usize {
                self.shape().0
            }

            /// 获得图像的列数.
            #[inline]
            pub fn width(&self) -> usize {
                self.shape().1
            }

            /// 判断一个索引是否位于图像的边缘.
            #[inline]
            pub fn is_at_border(&self, (h, w): Idx2d) -> bool {
                h == 0
                    || h.saturating_add(1) == self.height()
                    || w == 0
                    || w.saturating_add(1) == self.width()
            }

            /// 以行优先规则, 获取能迭代图像所有 `(索引, 像素值)` 的迭代器.
            #[inline]
            pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &u8)> {
                self.data.indexed_iter()
            }

            /// 按照 `connectivity` 标记满足谓词 `pred` 的所有连通区域.
            #[inline]
            pub fn components(
                &self,
                pred: impl Fn(u8) -> bool,
                connectivity: Connectivity,
            ) -> Labeling<2> {
                label_plane(self.array_view(), pred, connectivity)
            }

            /// 一次扫描收集 `labeling` 中每个连通区域的边缘像素, 按 [`Labeling::ids`] 的顺序返回.
            ///
            /// 边缘像素指位于图像边缘, 或 4-邻域中存在不属于该区域的像素的区域像素.
            /// `labeling` 必须来自 `self`, 否则结果无意义.
            pub fn boundaries(&self, labeling: &Labeling<2>) -> Vec<Vec<Idx2d>> {
                let mut ans = vec![Vec::new(); labeling.len()];
                for (h, w) in ndarray::indices(self.shape()) {
                    let id = labeling.label_at([h, w]);
                    let Some(i) = labeling.index_of(id) else {
                        continue;
                    };
                    let on_edge = self.is_at_border((h, w)) || {
                        let outside = |(r, c): Idx2d| labeling.label_at([r, c]) != id;
                        outside((h - 1, w))
                            || outside((h + 1, w))
                            || outside((h, w - 1))
                            || outside((h, w + 1))
                    };
                    if on_edge {
                        ans[i].push((h, w));
                    }
                }
                ans
            }
        }
    };
}
impl_mask_slice_immut!('a, MaskSlice<'a>, ArrayView2<'a, u8>);
impl_mask_slice_immut!('a, MaskSliceMut<'a>, ArrayViewMut2<'a, u8>);

/// 拥有所有权的二维掩膜切片.
///
/// `OwnedMaskSlice` 仅提供到 `MaskSlice` 和 `MaskSliceMut`
/// 的轻量转换和底层数据移动, 不提供任何其它方法.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedMaskSlice {
    data: Array2<u8>,
}

impl OwnedMaskSlice {
    /// 创建形状为 `shape` 的全背景切片.
    #[inline]
    pub fn zeros(shape: Idx2d) -> Self {
        Self {
            data: Array2::from_elem(shape, BACKGROUND),
        }
    }

    /// 以 `f` 逐像素生成切片.
    #[inline]
    pub fn from_fn(shape: Idx2d, f: impl FnMut(Idx2d) -> u8) -> Self {
        Self {
            data: Array2::from_shape_fn(shape, f),
        }
    }

    /// 获得不可变切片引用.
    #[inline]
    pub fn as_immut(&self) -> MaskSlice<'_> {
        MaskSlice::new(self.data.view())
    }

    /// 获得可变切片引用.
    #[inline]
    pub fn as_mutable(&mut self) -> MaskSliceMut<'_> {
        MaskSliceMut::new(self.data.view_mut())
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<u8> {
        self.data
    }
}

impl From<Array2<u8>> for OwnedMaskSlice {
    #[inline]
    fn from(data: Array2<u8>) -> Self {
        Self { data }
    }
}
