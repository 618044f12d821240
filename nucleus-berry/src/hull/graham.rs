use std::cmp::Ordering;

use itertools::Itertools;

use super::{HullError, HullResult};
use crate::Idx2d;

/// 以 `o` 为起点的向量 `oa` 与 `ob` 的叉积 (坐标按 `(x, y) = (列, 行)` 解释).
///
/// 大于 0 表示 `o -> a -> b` 逆时针转向, 小于 0 为顺时针, 等于 0 为共线.
#[inline]
pub fn cross((oy, ox): Idx2d, (ay, ax): Idx2d, (by, bx): Idx2d) -> i128 {
    let (oy, ox, ay, ax, by, bx) = (
        oy as i128, ox as i128, ay as i128, ax as i128, by as i128, bx as i128,
    );
    (ax - ox) * (by - oy) - (ay - oy) * (bx - ox)
}

#[inline]
fn dist2((ay, ax): Idx2d, (by, bx): Idx2d) -> i128 {
    let dy = ay as i128 - by as i128;
    let dx = ax as i128 - bx as i128;
    dy * dy + dx * dx
}

/// Graham 扫描法计算 `points` 的凸包.
///
/// 返回的顶点序列以锚点 (行最小, 其次列最小) 开头, 按极角升序排列,
/// 并以再次追加锚点闭合. 共线的中间点可能被保留.
///
/// 去重后不足 3 个点时返回 [`HullError::DegenerateGeometry`].
pub fn convex_hull(points: &[Idx2d]) -> HullResult<Vec<Idx2d>> {
    let mut pts: Vec<Idx2d> = points.iter().copied().unique().collect();
    if pts.len() < 3 {
        return Err(HullError::DegenerateGeometry(pts.len()));
    }

    // 行 (y) 最小, 其次列 (x) 最小. 元组的字典序恰好如此.
    let anchor_at = pts
        .iter()
        .position_min()
        .ok_or(HullError::DegenerateGeometry(0))?;
    let anchor = pts.swap_remove(anchor_at);

    pts.sort_by(|&a, &b| match cross(anchor, a, b) {
        c if c > 0 => Ordering::Less,
        c if c < 0 => Ordering::Greater,
        _ => dist2(anchor, a).cmp(&dist2(anchor, b)),
    });

    let mut stack: Vec<Idx2d> = Vec::with_capacity(pts.len() + 2);
    stack.push(anchor);
    for p in pts.into_iter() {
        // 顺时针转向: 弹出后重试; 逆时针或共线: 入栈.
        while stack.len() >= 2 && cross(stack[stack.len() - 2], stack[stack.len() - 1], p) < 0 {
            stack.pop();
        }
        stack.push(p);
    }
    stack.push(anchor);
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::super::polygon::{contains, signed_area2};
    use super::*;

    #[test]
    fn test_square_with_interior() {
        let pts = [(0, 0), (0, 4), (4, 4), (4, 0), (2, 2), (1, 3), (0, 0)];
        let hull = convex_hull(&pts).unwrap();
        assert_eq!(hull.first(), Some(&(0, 0)));
        assert_eq!(hull.last(), Some(&(0, 0)));
        assert_eq!(hull.len(), 5);
        assert!(!hull.contains(&(2, 2)));
        assert!(signed_area2(&hull) > 0);
    }

    #[test]
    fn test_degenerate() {
        assert_eq!(
            convex_hull(&[(1, 1), (1, 1), (2, 3)]),
            Err(HullError::DegenerateGeometry(2))
        );
        assert_eq!(convex_hull(&[]), Err(HullError::DegenerateGeometry(0)));
    }

    #[test]
    fn test_containment() {
        // 伪随机点集: 凸包必须包含所有输入点.
        let mut seed = 12345u64;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) % 40) as usize
        };
        let pts: Vec<Idx2d> = (0..200).map(|_| (next(), next())).collect();
        let hull = convex_hull(&pts).unwrap();
        // 除去闭合用的锚点, 凸包顶点数不超过互不相同的输入点数.
        let distinct = pts.iter().unique().count();
        assert!(hull.len() - 1 <= distinct);
        assert!(hull.len() - 1 < pts.len());
        for p in pts.iter() {
            assert!(contains(&hull, *p), "{p:?} 不在凸包内");
        }
        // 凸包顶点逆时针, 相邻三点不出现顺时针转向.
        for w in hull.windows(3) {
            assert!(cross(w[0], w[1], w[2]) >= 0);
        }
    }

    #[test]
    fn test_collinear_input() {
        let pts = [(3, 0), (3, 1), (3, 2), (3, 5)];
        let hull = convex_hull(&pts).unwrap();
        assert!(hull.len() - 1 <= pts.len());
        assert!(contains(&hull, (3, 4)));
        assert!(!contains(&hull, (2, 4)));
        assert!(!contains(&hull, (3, 6)));
    }
}
