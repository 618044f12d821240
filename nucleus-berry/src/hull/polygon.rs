use super::graham::cross;
use crate::{Idx2d, MaskSliceMut};

/// 多边形有向面积的两倍 (鞋带公式, `(x, y) = (列, 行)`). 逆时针为正.
///
/// `closed` 必须首尾相同.
pub fn signed_area2(closed: &[Idx2d]) -> i128 {
    closed
        .windows(2)
        .map(|w| {
            let ((y1, x1), (y2, x2)) = (w[0], w[1]);
            x1 as i128 * y2 as i128 - x2 as i128 * y1 as i128
        })
        .sum()
}

/// 多边形顶点的轴对齐包围盒 `(左上, 右下)`, 均为闭区间. 空输入返回 `None`.
pub fn bounding_box(poly: &[Idx2d]) -> Option<(Idx2d, Idx2d)> {
    let (h_min, h_max) = poly.iter().map(|p| p.0).fold(None, min_max)?;
    let (w_min, w_max) = poly.iter().map(|p| p.1).fold(None, min_max)?;
    Some(((h_min, w_min), (h_max, w_max)))
}

#[inline]
fn min_max(acc: Option<(usize, usize)>, v: usize) -> Option<(usize, usize)> {
    Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
}

/// 判断 `p` 是否位于闭合凸多边形 `hull` 内部或边界上.
///
/// 对每条边 `(a, b)`, `p` 必须始终在同一侧 (叉积全部 `≥ 0` 或全部 `≤ 0`).
pub fn contains(hull: &[Idx2d], p: Idx2d) -> bool {
    let Some(((h0, w0), (h1, w1))) = bounding_box(hull) else {
        return false;
    };
    if p.0 < h0 || p.0 > h1 || p.1 < w0 || p.1 > w1 {
        return false;
    }
    let (mut pos, mut neg) = (false, false);
    for w in hull.windows(2) {
        let c = cross(w[0], w[1], p);
        pos |= c > 0;
        neg |= c < 0;
        if pos && neg {
            return false;
        }
    }
    true
}

/// 将凸包 `hull` 光栅化到 `out`: 位于内部或边界上的像素被设置为 `value`.
/// 越出 `out` 的部分被忽略.
pub fn rasterize(hull: &[Idx2d], out: &mut MaskSliceMut, value: u8) {
    let Some(((h0, w0), (h1, w1))) = bounding_box(hull) else {
        return;
    };
    let (h_len, w_len) = out.shape();
    for h in h0..=h1.min(h_len.saturating_sub(1)) {
        for w in w0..=w1.min(w_len.saturating_sub(1)) {
            if contains(hull, (h, w)) {
                out[(h, w)] = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OwnedMaskSlice;

    #[test]
    fn test_triangle() {
        let tri = [(0, 0), (0, 4), (4, 0), (0, 0)];
        assert!(contains(&tri, (2, 2)));
        assert!(contains(&tri, (0, 2)));
        assert!(contains(&tri, (1, 1)));
        assert!(!contains(&tri, (3, 3)));

        let mut s = OwnedMaskSlice::zeros((6, 6));
        rasterize(&tri, &mut s.as_mutable(), 9);
        // 1 + 2 + 3 + 4 + 5
        assert_eq!(s.as_immut().count(9), 15);
    }

    #[test]
    fn test_orientation_independent() {
        let ccw = [(0, 0), (0, 3), (3, 3), (3, 0), (0, 0)];
        let cw: Vec<Idx2d> = ccw.iter().rev().copied().collect();
        assert_eq!(signed_area2(&ccw), 18);
        assert_eq!(signed_area2(&cw), -18);
        assert!(contains(&cw, (1, 2)));
        assert!(contains(&ccw, (1, 2)));
    }
}
