//! 3D 形态学操作.
//!
//! 提供 [`crate::host::MorphologyService`] 的默认纯 Rust 实现: 以结构元为窗口的
//! 最小值/最大值滤波 (即灰度腐蚀/膨胀). 窗口越出体数据的部分被忽略.

use ndarray::Array3;

use super::{NucleusMask, StackAttr};
use crate::host::MorphologyService;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use ndarray::Zip;
    }
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 三维结构元.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StructElem {
    /// 半径为 `r` (体素) 的离散球: 满足 `dz² + dh² + dw² ≤ r²` 的全部偏移.
    Ball(usize),

    /// 边长为 `e` (体素) 的立方体.
    Cube(usize),
}

impl StructElem {
    /// 获取结构元的全部偏移量 `(dz, dh, dw)`, 含原点.
    pub fn offsets(&self) -> Vec<(isize, isize, isize)> {
        match *self {
            StructElem::Ball(r) => {
                let r = r as isize;
                let r2 = r * r;
                let mut ans = Vec::new();
                for dz in -r..=r {
                    for dh in -r..=r {
                        for dw in -r..=r {
                            if dz * dz + dh * dh + dw * dw <= r2 {
                                ans.push((dz, dh, dw));
                            }
                        }
                    }
                }
                ans
            }
            StructElem::Cube(e) => {
                let e = e.max(1) as isize;
                let lo = -(e / 2);
                let hi = lo + e - 1;
                let mut ans = Vec::with_capacity((e * e * e) as usize);
                for dz in lo..=hi {
                    for dh in lo..=hi {
                        for dw in lo..=hi {
                            ans.push((dz, dh, dw));
                        }
                    }
                }
                ans
            }
        }
    }
}

/// 默认的三维形态学服务.
#[derive(Copy, Clone, Debug, Default)]
pub struct Morphology3d;

impl Morphology3d {
    /// 以 `pick` 在结构元窗口内聚合体素值.
    fn rank_filter(mask: &NucleusMask, elem: StructElem, pick: fn(u8, u8) -> u8) -> NucleusMask {
        let offsets = elem.offsets();
        let src = mask.data();
        let (z_len, h_len, w_len) = mask.shape();

        let at = |(z, h, w): (usize, usize, usize)| -> u8 {
            let mut acc: Option<u8> = None;
            for &(dz, dh, dw) in offsets.iter() {
                let (Some(nz), Some(nh), Some(nw)) = (
                    z.checked_add_signed(dz),
                    h.checked_add_signed(dh),
                    w.checked_add_signed(dw),
                ) else {
                    continue;
                };
                if nz < z_len && nh < h_len && nw < w_len {
                    let v = src[(nz, nh, nw)];
                    acc = Some(acc.map_or(v, |a| pick(a, v)));
                }
            }
            acc.unwrap_or(src[(z, h, w)])
        };

        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                let mut out = Array3::zeros(mask.shape());
                Zip::indexed(&mut out).par_for_each(|pos, v| *v = at(pos));
            } else {
                let out = Array3::from_shape_fn(mask.shape(), at);
            }
        }
        NucleusMask::new(out, mask.calibration().clone())
    }
}

impl MorphologyService for Morphology3d {
    #[inline]
    fn min_filter(&self, mask: &NucleusMask, elem: StructElem) -> NucleusMask {
        Self::rank_filter(mask, elem, u8::min)
    }

    #[inline]
    fn max_filter(&self, mask: &NucleusMask, elem: StructElem) -> NucleusMask {
        Self::rank_filter(mask, elem, u8::max)
    }

    fn fill_holes_2d(&self, mask: &mut NucleusMask) -> bool {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                mask.par_fill_holes_2d()
            } else {
                mask.fill_holes_2d()
            }
        }
    }
}
