//! N 维连通域标记.
//!
//! 二维凸包校正和三维去伪影共用同一个泛洪算法: 按行优先顺序扫描,
//! 每遇到一个未标记的种子体素就以 FIFO 队列生长出一个新区域.

use std::collections::VecDeque;

use ndarray::{ArrayView2, ArrayView3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 第一个连通域的编号. 0 表示未标记; 1 保留不用.
pub const FIRST_LABEL: u32 = 2;

/// 邻接规则.
///
/// 以 "两个体素坐标有几个分量不同" 区分: 二维时 `Face` 为 4-邻接, `Edge` 和 `Full`
/// 均为 8-邻接; 三维时分别为 6-, 18-, 26-邻接.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity {
    /// 共面邻接.
    Face,
    /// 共棱邻接.
    Edge,
    /// 共点邻接.
    Full,
}

impl Connectivity {
    /// 邻居坐标中允许不同的最大分量个数.
    #[inline]
    fn max_changed(self, dim: usize) -> usize {
        match self {
            Connectivity::Face => 1,
            Connectivity::Edge => 2.min(dim),
            Connectivity::Full => dim,
        }
    }

    /// 获取 `N` 维空间中该邻接规则的全部邻居偏移量, 不含零向量.
    pub fn offsets<const N: usize>(self) -> Vec<[isize; N]> {
        let limit = self.max_changed(N);
        let mut ans = Vec::with_capacity(3usize.pow(N as u32) - 1);
        for code in 0..3usize.pow(N as u32) {
            let mut off = [0isize; N];
            let mut rest = code;
            for o in off.iter_mut() {
                *o = (rest % 3) as isize - 1;
                rest /= 3;
            }
            let changed = off.iter().filter(|o| **o != 0).count();
            if changed != 0 && changed <= limit {
                ans.push(off);
            }
        }
        ans
    }
}

/// 连通域标记结果.
///
/// 标签按行优先顺序平铺保存; 0 表示该位置不是种子.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Labeling<const N: usize> {
    shape: [usize; N],
    labels: Vec<u32>,
    sizes: Vec<usize>,
}

impl<const N: usize> Labeling<N> {
    /// 数据形状.
    #[inline]
    pub fn shape(&self) -> [usize; N] {
        self.shape
    }

    /// 行优先平铺的标签.
    #[inline]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// 连通域个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// 是否不存在任何连通域?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// 按扫描顺序 (即编号升序) 获取全部连通域编号.
    pub fn ids(&self) -> Vec<u32> {
        (0..self.len() as u32).map(|i| i + FIRST_LABEL).collect()
    }

    /// 获取编号 `id` 在 [`Self::ids`] 中的下标. `id` 不是连通域编号时返回 `None`.
    #[inline]
    pub fn index_of(&self, id: u32) -> Option<usize> {
        let i = id.checked_sub(FIRST_LABEL)? as usize;
        (i < self.len()).then_some(i)
    }

    /// 获取位置 `pos` 的标签.
    ///
    /// 越界时 panic.
    #[inline]
    pub fn label_at(&self, pos: [usize; N]) -> u32 {
        self.labels[self.flatten(pos)]
    }

    /// 获取连通域 `id` 的体素个数. 不存在时返回 0.
    #[inline]
    pub fn size_of(&self, id: u32) -> usize {
        self.index_of(id).map_or(0, |i| self.sizes[i])
    }

    /// 体素个数最多的连通域编号. 个数相同时取编号较小者. 不存在连通域时返回 `None`.
    pub fn largest(&self) -> Option<u32> {
        let mut best: Option<(usize, usize)> = None;
        for (i, &s) in self.sizes.iter().enumerate() {
            if best.map_or(true, |(_, bs)| s > bs) {
                best = Some((i, s));
            }
        }
        best.map(|(i, _)| i as u32 + FIRST_LABEL)
    }

    /// 按行优先顺序迭代连通域 `id` 的全部位置.
    pub fn members(&self, id: u32) -> impl Iterator<Item = [usize; N]> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(move |(_, l)| **l == id)
            .map(|(i, _)| self.unflatten(i))
    }

    #[inline]
    fn flatten(&self, pos: [usize; N]) -> usize {
        flatten(&self.shape, &pos)
    }

    #[inline]
    fn unflatten(&self, idx: usize) -> [usize; N] {
        unflatten(&self.shape, idx)
    }
}

#[inline]
fn flatten<const N: usize>(shape: &[usize; N], pos: &[usize; N]) -> usize {
    pos.iter()
        .zip(shape.iter())
        .fold(0, |acc, (p, s)| {
            assert!(p < s, "索引越界");
            acc * s + p
        })
}

#[inline]
fn unflatten<const N: usize>(shape: &[usize; N], mut idx: usize) -> [usize; N] {
    let mut pos = [0; N];
    for k in (0..N).rev() {
        pos[k] = idx % shape[k];
        idx /= shape[k];
    }
    pos
}

/// 通用 N 维连通域标记.
///
/// `is_seed(i)` 判断行优先平铺下标 `i` 处的体素是否可以被标记.
/// 编号从 [`FIRST_LABEL`] 开始按扫描顺序递增.
pub fn label_components<const N: usize, F>(
    shape: [usize; N],
    is_seed: F,
    connectivity: Connectivity,
) -> Labeling<N>
where
    F: Fn(usize) -> bool,
{
    let total: usize = shape.iter().product();
    let offsets = connectivity.offsets::<N>();
    let mut labels = vec![0u32; total];
    let mut sizes = Vec::with_capacity(1);
    let mut bfs_q = VecDeque::with_capacity(64);

    for start in 0..total {
        if labels[start] != 0 || !is_seed(start) {
            continue;
        }
        let id = FIRST_LABEL + sizes.len() as u32;
        labels[start] = id;
        bfs_q.push_back(start);
        let mut size = 0usize;

        while let Some(cur) = bfs_q.pop_front() {
            size += 1;
            let pos = unflatten(&shape, cur);
            'next: for off in offsets.iter() {
                let mut neigh = [0usize; N];
                for k in 0..N {
                    match pos[k].checked_add_signed(off[k]) {
                        Some(v) if v < shape[k] => neigh[k] = v,
                        _ => continue 'next,
                    }
                }
                let n = flatten(&shape, &neigh);
                if labels[n] == 0 && is_seed(n) {
                    labels[n] = id;
                    bfs_q.push_back(n);
                }
            }
        }
        sizes.push(size);
    }

    Labeling {
        shape,
        labels,
        sizes,
    }
}

/// 标记二维视图中像素值满足 `pred` 的连通区域.
///
/// 视图可以不是标准内存布局 (如沿非首轴取出的切片).
pub fn label_plane(
    view: ArrayView2<u8>,
    pred: impl Fn(u8) -> bool,
    connectivity: Connectivity,
) -> Labeling<2> {
    let (h, w) = view.dim();
    label_components([h, w], |i| pred(view[(i / w, i % w)]), connectivity)
}

/// 标记三维视图中体素值满足 `pred` 的连通区域.
pub fn label_volume(
    view: ArrayView3<u8>,
    pred: impl Fn(u8) -> bool,
    connectivity: Connectivity,
) -> Labeling<3> {
    let (z, h, w) = view.dim();
    let slice = h * w;
    label_components(
        [z, h, w],
        |i| pred(view[(i / slice, (i % slice) / w, i % w)]),
        connectivity,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_offsets() {
        assert_eq!(Connectivity::Face.offsets::<2>().len(), 4);
        assert_eq!(Connectivity::Full.offsets::<2>().len(), 8);
        assert_eq!(Connectivity::Edge.offsets::<2>().len(), 8);
        assert_eq!(Connectivity::Face.offsets::<3>().len(), 6);
        assert_eq!(Connectivity::Edge.offsets::<3>().len(), 18);
        assert_eq!(Connectivity::Full.offsets::<3>().len(), 26);
    }

    #[test]
    fn test_diagonal_plane() {
        // 对角线上的两个像素: 4-邻接下分离, 8-邻接下相连.
        let a = Array2::from_shape_fn((3, 3), |(h, w)| u8::from(h == w && h < 2));
        let face = label_plane(a.view(), |p| p != 0, Connectivity::Face);
        assert_eq!(face.len(), 2);
        assert_eq!(face.label_at([0, 0]), FIRST_LABEL);
        assert_eq!(face.label_at([1, 1]), FIRST_LABEL + 1);

        let full = label_plane(a.view(), |p| p != 0, Connectivity::Full);
        assert_eq!(full.len(), 1);
        assert_eq!(full.size_of(FIRST_LABEL), 2);
        assert_eq!(full.label_at([2, 2]), 0);
    }

    #[test]
    fn test_largest_tie() {
        // 两个大小相同的区域, 取编号较小者.
        let a = Array2::from_shape_fn((1, 5), |(_, w)| u8::from(w != 2));
        let l = label_plane(a.view(), |p| p != 0, Connectivity::Full);
        assert_eq!(l.ids(), vec![2, 3]);
        assert_eq!(l.largest(), Some(2));
        assert_eq!(l.members(3).collect::<Vec<_>>(), vec![[0, 3], [0, 4]]);
    }

    #[test]
    fn test_volume_connectivity() {
        // 两个只共用一个顶点的体素.
        let a = Array3::from_shape_fn((2, 2, 2), |(z, h, w)| {
            u8::from((z, h, w) == (0, 0, 0) || (z, h, w) == (1, 1, 1))
        });
        assert_eq!(label_volume(a.view(), |p| p != 0, Connectivity::Face).len(), 2);
        assert_eq!(label_volume(a.view(), |p| p != 0, Connectivity::Edge).len(), 2);
        assert_eq!(label_volume(a.view(), |p| p != 0, Connectivity::Full).len(), 1);

        let empty = label_volume(a.view(), |p| p > 5, Connectivity::Full);
        assert!(empty.is_empty());
        assert_eq!(empty.largest(), None);
        assert_eq!(empty.size_of(FIRST_LABEL), 0);
    }

    #[test]
    fn test_strided_view() {
        let a = Array3::from_shape_fn((4, 3, 2), |(z, _, w)| u8::from(z % 2 == 0 && w == 0));
        // 沿 w 轴取出的 (z, h) 切片.
        let yz = a.index_axis(ndarray::Axis(2), 0);
        let l = label_plane(yz, |p| p != 0, Connectivity::Face);
        assert_eq!(l.len(), 2);
        assert_eq!(l.size_of(2), 3);
    }
}
