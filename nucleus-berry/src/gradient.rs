//! 原图强度梯度与单位法向量.

use ndarray::Array3;

use crate::consts::NORMAL_EPSILON;
use crate::{Idx3d, RawStack, StackAttr, Vec3};

/// 原图的标定梯度场.
///
/// 内部体素使用中心差分 `(I[i+1] - I[i-1]) / (2 * spacing)`;
/// 最外一层体素的梯度为零向量. 向量分量顺序为 `(z, h, w)`.
#[derive(Clone, Debug)]
pub struct GradientField {
    gradient: Array3<Vec3>,
    normals: Array3<Vec3>,
}

/// 获取 `g` 方向的单位向量. 模长不超过 [`NORMAL_EPSILON`] 时返回零向量.
#[inline]
pub fn unit_normal(g: Vec3) -> Vec3 {
    let norm = g.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > NORMAL_EPSILON {
        [g[0] / norm, g[1] / norm, g[2] / norm]
    } else {
        [0.0; 3]
    }
}

impl GradientField {
    /// 计算原图 `raw` 的梯度场.
    pub fn compute(raw: &RawStack) -> Self {
        let (z_len, h_len, w_len) = raw.shape();
        let [dz, dh, dw] = raw.pix_dim();
        let data = raw.data();
        let at = |pos: Idx3d| data[pos] as f64;

        let gradient = Array3::from_shape_fn(raw.shape(), |(z, h, w)| {
            let interior = (1..z_len.saturating_sub(1)).contains(&z)
                && (1..h_len.saturating_sub(1)).contains(&h)
                && (1..w_len.saturating_sub(1)).contains(&w);
            if !interior {
                return [0.0; 3];
            }
            [
                (at((z + 1, h, w)) - at((z - 1, h, w))) / (2.0 * dz),
                (at((z, h + 1, w)) - at((z, h - 1, w))) / (2.0 * dh),
                (at((z, h, w + 1)) - at((z, h, w - 1))) / (2.0 * dw),
            ]
        });
        let normals = gradient.mapv(unit_normal);
        Self { gradient, normals }
    }

    /// 数据形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.gradient.dim()
    }

    /// 位置 `pos` 处的梯度. 越界时 panic.
    #[inline]
    pub fn gradient_at(&self, pos: Idx3d) -> Vec3 {
        self.gradient[pos]
    }

    /// 位置 `pos` 处的单位法向量. 越界时 panic.
    #[inline]
    pub fn normal_at(&self, pos: Idx3d) -> Vec3 {
        self.normals[pos]
    }
}
