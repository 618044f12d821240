use ndarray::{Array3, ArrayView3};

use super::{MeshExtractionService, TriangleMesh};
use crate::Vec3;

/// 无顶点的网格单元.
const NO_VERTEX: u32 = u32::MAX;

/// 朴素 surface nets (对偶 marching cubes).
///
/// 体数据先在外侧补一层 "外部" 体素, 因此输出网格总是闭合的.
/// 每个跨越等值面的网格单元放置一个顶点 (各交点的平均位置),
/// 每条跨越等值面的网格边生成一个四边形 (两个三角形).
#[derive(Copy, Clone, Debug, Default)]
pub struct SurfaceNets;

/// 单元的 8 个角点偏移, 第 `i` 个角点在第 `k` 轴上的偏移为 `(i >> (2 - k)) & 1`.
#[inline]
fn corner_offset(i: usize) -> [usize; 3] {
    [(i >> 2) & 1, (i >> 1) & 1, i & 1]
}

impl MeshExtractionService for SurfaceNets {
    fn extract(&self, volume: ArrayView3<f32>, iso_level: f32, spacing: Vec3) -> TriangleMesh {
        let (d0, d1, d2) = volume.dim();
        let pad_value = if iso_level > 0.0 { 0.0 } else { iso_level - 1.0 };
        let padded = Array3::from_shape_fn((d0 + 2, d1 + 2, d2 + 2), |(z, h, w)| {
            let real = (1..=d0).contains(&z) && (1..=d1).contains(&h) && (1..=d2).contains(&w);
            if real {
                volume[(z - 1, h - 1, w - 1)]
            } else {
                pad_value
            }
        });
        let dims = [d0 + 2, d1 + 2, d2 + 2];
        let inside = |p: [usize; 3]| padded[(p[0], p[1], p[2])] >= iso_level;

        // 单元 `c` 覆盖 `[c, c + 1]³`, 共 `(dims - 1)³` 个.
        let cells = [dims[0] - 1, dims[1] - 1, dims[2] - 1];
        let cell_at = |c: [usize; 3]| (c[0] * cells[1] + c[1]) * cells[2] + c[2];
        let mut cell_vertex = vec![NO_VERTEX; cells.iter().product()];
        let mut vertices: Vec<Vec3> = Vec::new();

        for c0 in 0..cells[0] {
            for c1 in 0..cells[1] {
                for c2 in 0..cells[2] {
                    let base = [c0, c1, c2];
                    let corner = |i: usize| {
                        let o = corner_offset(i);
                        [base[0] + o[0], base[1] + o[1], base[2] + o[2]]
                    };
                    let mut mask = 0u8;
                    for i in 0..8 {
                        if inside(corner(i)) {
                            mask |= 1 << i;
                        }
                    }
                    if mask == 0 || mask == u8::MAX {
                        continue;
                    }

                    let mut sum = [0.0f64; 3];
                    let mut n = 0usize;
                    for i in 0..8 {
                        for bit in [1usize, 2, 4] {
                            let j = i | bit;
                            if i & bit != 0 || ((mask >> i) & 1) == ((mask >> j) & 1) {
                                continue;
                            }
                            let (pa, pb) = (corner(i), corner(j));
                            let va = padded[(pa[0], pa[1], pa[2])];
                            let vb = padded[(pb[0], pb[1], pb[2])];
                            let t = ((iso_level - va) / (vb - va)).clamp(0.0, 1.0) as f64;
                            for k in 0..3 {
                                sum[k] += pa[k] as f64 + t * (pb[k] as f64 - pa[k] as f64);
                            }
                            n += 1;
                        }
                    }
                    // 补边后的坐标减 1 还原为体素下标, 再乘以体素尺寸.
                    let vertex = [
                        (sum[0] / n as f64 - 1.0) * spacing[0],
                        (sum[1] / n as f64 - 1.0) * spacing[1],
                        (sum[2] / n as f64 - 1.0) * spacing[2],
                    ];
                    cell_vertex[cell_at(base)] = vertices.len() as u32;
                    vertices.push(vertex);
                }
            }
        }

        let mut triangles = Vec::with_capacity(vertices.len() * 2);
        for (p, _) in padded.indexed_iter() {
            let p = [p.0, p.1, p.2];
            let p_inside = inside(p);
            for a in 0..3 {
                if p[a] + 1 >= dims[a] {
                    continue;
                }
                let mut q = p;
                q[a] += 1;
                if inside(q) == p_inside {
                    continue;
                }
                let (b, c) = ((a + 1) % 3, (a + 2) % 3);
                if p[b] == 0 || p[c] == 0 || p[b] >= cells[b] || p[c] >= cells[c] {
                    continue;
                }
                // 环绕该边的四个单元, 在 (b, c) 平面上逆时针排列.
                let quad = [(p[b] - 1, p[c] - 1), (p[b], p[c] - 1), (p[b], p[c]), (p[b] - 1, p[c])]
                    .map(|(x, y)| {
                        let mut cell = [0; 3];
                        cell[a] = p[a];
                        cell[b] = x;
                        cell[c] = y;
                        cell_vertex[cell_at(cell)]
                    });
                if quad.contains(&NO_VERTEX) {
                    continue;
                }
                let [v0, v1, v2, v3] = quad;
                if p_inside {
                    triangles.push([v0, v1, v2]);
                    triangles.push([v0, v2, v3]);
                } else {
                    triangles.push([v0, v2, v1]);
                    triangles.push([v0, v3, v2]);
                }
            }
        }

        TriangleMesh::new(vertices, triangles)
    }
}
