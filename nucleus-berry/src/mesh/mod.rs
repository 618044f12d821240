//! 等值面网格提取.
//!
//! 网格顶点使用与体数据相同的 `(z, h, w)` 分量顺序, 并已乘以体素尺寸.
//! 三角形按右手法则朝外.

mod surface_nets;

pub use surface_nets::SurfaceNets;

use ndarray::ArrayView3;

use crate::Vec3;

/// 网格提取服务.
pub trait MeshExtractionService {
    /// 提取 `volume` 中值为 `iso_level` 的等值面. 值不小于 `iso_level` 的体素视为内部,
    /// `spacing` 为 `(z, h, w)` 顺序的体素尺寸.
    fn extract(&self, volume: ArrayView3<f32>, iso_level: f32, spacing: Vec3) -> TriangleMesh;
}

/// 三角网格.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriangleMesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
}

#[inline]
fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

impl TriangleMesh {
    /// 由顶点和三角形直接构建.
    ///
    /// 三角形引用了不存在的顶点时 panic.
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        assert!(
            triangles
                .iter()
                .flatten()
                .all(|i| (*i as usize) < vertices.len()),
            "三角形顶点索引越界"
        );
        Self {
            vertices,
            triangles,
        }
    }

    /// 全部顶点.
    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// 全部三角形.
    #[inline]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// 网格是否不含任何三角形?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// 迭代每个三角形的三个顶点坐标.
    fn corners(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.triangles.iter().map(|&[a, b, c]| {
            [
                self.vertices[a as usize],
                self.vertices[b as usize],
                self.vertices[c as usize],
            ]
        })
    }

    /// 表面积: `Σ ½ ‖(B − A) × (C − A)‖`.
    pub fn area(&self) -> f64 {
        self.corners()
            .map(|[a, b, c]| {
                let n = cross(sub(b, a), sub(c, a));
                0.5 * dot(n, n).sqrt()
            })
            .sum()
    }

    /// 有向体积: `Σ ⅙ A · (B × C)`. 闭合且朝外的网格为正.
    pub fn signed_volume(&self) -> f64 {
        self.corners()
            .map(|[a, b, c]| dot(a, cross(b, c)) / 6.0)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tetrahedron() {
        let mesh = TriangleMesh::new(
            vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        );
        assert!((mesh.signed_volume() - 1.0 / 6.0).abs() < 1e-12);
        let expect = 1.5 + 3f64.sqrt() / 2.0;
        assert!((mesh.area() - expect).abs() < 1e-12);
    }

    #[test]
    #[should_panic]
    fn test_bad_index() {
        TriangleMesh::new(vec![[0.0; 3]], vec![[0, 0, 1]]);
    }
}
