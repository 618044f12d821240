//! 凸包计算的运行时错误.

use thiserror::Error;

/// 凸包计算的运行时错误.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HullError {
    /// 去重后不足 3 个点, 无法围成多边形.
    ///
    /// 参数为去重后的点数.
    #[error("degenerate geometry: {0} distinct point(s), at least 3 required")]
    DegenerateGeometry(usize),
}
