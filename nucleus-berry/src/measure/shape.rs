//! 形状参数: 球形度、等效半径与协方差特征值.

use std::f64::consts::PI;

use nalgebra::Matrix3;

use super::{MeasureError, MeasureResult};
use crate::Vec3;

/// Wadell 球形度 `∛π · (6V)^(2/3) / A`. 球体为 1, 其它形状小于 1.
///
/// `volume ≤ 0` 或 `surface ≤ 0` 时返回 [`MeasureError::InvalidMeasurement`].
pub fn sphericity(volume: f64, surface: f64) -> MeasureResult<f64> {
    if !(volume > 0.0 && surface > 0.0) {
        return Err(MeasureError::InvalidMeasurement { volume, surface });
    }
    Ok(PI.cbrt() * (6.0 * volume).powf(2.0 / 3.0) / surface)
}

/// 与给定体积相同的球体半径 `∛(3V / 4π)`.
#[inline]
pub fn equivalent_radius(volume: f64) -> f64 {
    (3.0 * volume / (4.0 * PI)).cbrt()
}

/// 点集的重心. 空点集返回 `None`.
pub fn centroid<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Vec3> {
    let mut n = 0usize;
    let mut sum = [0.0; 3];
    for p in points.into_iter() {
        n += 1;
        for k in 0..3 {
            sum[k] += p[k];
        }
    }
    (n != 0).then(|| sum.map(|s| s / n as f64))
}

/// 点集关于其重心的协方差矩阵 (除以 `n`). 空点集返回 `None`.
pub fn covariance(points: &[Vec3]) -> Option<Matrix3<f64>> {
    let c = centroid(points.iter().copied())?;
    let mut cov = Matrix3::zeros();
    for p in points.iter() {
        let d = [p[0] - c[0], p[1] - c[1], p[2] - c[2]];
        for i in 0..3 {
            for j in 0..3 {
                cov[(i, j)] += d[i] * d[j];
            }
        }
    }
    Some(cov / points.len() as f64)
}

/// 对称矩阵的三个特征值, 升序排列.
pub fn sorted_eigenvalues(m: Matrix3<f64>) -> Vec3 {
    let eigen = m.symmetric_eigen();
    let mut ans = [eigen.eigenvalues[0], eigen.eigenvalues[1], eigen.eigenvalues[2]];
    ans.sort_by(f64::total_cmp);
    ans
}

/// 由升序特征值计算 `(flatness, elongation) = (λ1 / λ0, λ2 / λ1)`.
///
/// `λ0 ≤ 0` 时返回 [`MeasureError::DegenerateShape`].
pub fn flatness_elongation([l0, l1, l2]: Vec3) -> MeasureResult<(f64, f64)> {
    if !(l0 > 0.0) {
        return Err(MeasureError::DegenerateShape(l0));
    }
    Ok((l1 / l0, l2 / l1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sphericity_of_sphere() {
        let r: f64 = 3.0;
        let v = 4.0 / 3.0 * PI * r.powi(3);
        let a = 4.0 * PI * r * r;
        assert!(f64_eq(sphericity(v, a).unwrap(), 1.0));
        assert!(f64_eq(equivalent_radius(v), r));
    }

    #[test]
    fn test_sphericity_invalid() {
        assert!(matches!(
            sphericity(0.0, 1.0),
            Err(MeasureError::InvalidMeasurement { .. })
        ));
        assert!(sphericity(1.0, -1.0).is_err());
        assert!(sphericity(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_eigen_ordering() {
        // 沿三个轴方差分别为 9, 1, 4 的点集.
        let pts = [
            [3.0, 0.0, 0.0],
            [-3.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 2.0],
            [0.0, 0.0, -2.0],
        ];
        let [l0, l1, l2] = sorted_eigenvalues(covariance(&pts).unwrap());
        assert!(l0 <= l1 && l1 <= l2);
        assert!(f64_eq(l0, 2.0 / 6.0));
        assert!(f64_eq(l1, 8.0 / 6.0));
        assert!(f64_eq(l2, 18.0 / 6.0));

        let (f, e) = flatness_elongation([l0, l1, l2]).unwrap();
        assert!(f64_eq(f, 4.0));
        assert!(f64_eq(e, 2.25));
    }

    #[test]
    fn test_degenerate() {
        let line = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        let ev = sorted_eigenvalues(covariance(&line).unwrap());
        assert!(matches!(
            flatness_elongation(ev),
            Err(MeasureError::DegenerateShape(_))
        ));
        assert!(covariance(&[]).is_none());
    }
}
