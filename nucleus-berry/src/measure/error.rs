//! 测量的运行时错误.

use thiserror::Error;

/// 测量的运行时错误.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasureError {
    /// 体积或表面积不是正数, 无法计算依赖它们的形状参数.
    #[error("invalid measurement: volume = {volume}, surface = {surface}")]
    InvalidMeasurement {
        /// 体积.
        volume: f64,
        /// 表面积.
        surface: f64,
    },

    /// 掩膜中不存在给定标签的体素.
    #[error("no voxel carries label {0}")]
    EmptyObject(u8),

    /// 协方差矩阵的最小特征值不是正数 (物体退化为平面、线或点).
    #[error("degenerate shape: smallest eigenvalue is {0}")]
    DegenerateShape(f64),
}
