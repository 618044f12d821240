//! 凸包检测与基于凸包的掩膜几何校正.

mod correction;
mod error;
mod graham;
pub mod polygon;

pub use correction::{hull_slice, AxisPair, ConvexHullCorrection};
pub use error::HullError;
pub use graham::{convex_hull, cross};

/// 凸包计算结果.
pub type HullResult<T> = Result<T, HullError>;
