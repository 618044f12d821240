#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供三维荧光显微细胞核图像的分割、几何校正和形态学测量算法.
//!
//! 该 crate 目前仅提供 `safe` 接口, 且所有计算都是同步、纯 CPU 的.
//! 每次调用只读取调用者传入的体数据, 不维护任何进程级可变状态,
//! 因此可以在多个线程上对 **互相独立** 的图像并发调用.
//!
//! # 注意
//!
//! 1. 体数据一律按照 `(z, h, w)` 组织, 即 (相邻切片方向, 自然图像垂直方向, 自然图像水平方向).
//! 2. 宿主平台 (图像读取、形态学滤波、网格提取) 被抽象为 trait,
//!   本 crate 为每个 trait 提供了一份纯 Rust 的默认实现.
//! 3. 在非期望情况下 (如原图与掩膜形状不一致), 程序会直接 panic.
//!
//! # 功能
//!
//! ### 自适应阈值搜索分割 ✅
//!
//! 以自动阈值为中心扫描一段阈值区间, 以球形度为目标函数挑选最佳二值掩膜.
//!
//! 实现位于 `nucleus-berry/src/segment`.
//!
//! ### 连通域标记 ✅
//!
//! 统一的 N 维泛洪标记, 同时服务于 3D 去伪影和 2D 凸包校正.
//!
//! 实现位于 `nucleus-berry/src/labeling.rs`.
//!
//! ### 凸包校正 ✅
//!
//! 沿三个正交平面逐切片计算 Graham 凸包并光栅化, 再与原掩膜取并集.
//!
//! 实现位于 `nucleus-berry/src/hull`.
//!
//! ### 三维形态学测量 ✅
//!
//! 体积, 三种表面积估计 (面计数 / 梯度加权 / 网格),
//! 协方差特征值形状参数, 球形度, 等效半径, 前景/背景强度统计, 重心,
//! 以及异染色质比例 (RHF).
//!
//! 实现位于 `nucleus-berry/src/measure`.
//!
//! ### 表面积估计的消融实验 ✅
//!
//! 实现位于 `ablations/surface3`.

/// 二维索引 `(h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引 `(z, h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 高精度三维坐标 / 向量, 分量顺序同 [`Idx3d`].
pub type Vec3 = [f64; 3];

pub mod consts;

/// 体数据基础结构.
mod data;

pub use data::{
    morph_3d, phantom, Calibration, MaskSlice, MaskSliceMut, NucleusMask, OwnedMaskSlice,
    RawStack, StackAttr,
};

pub mod gradient;
pub mod histogram;
pub mod host;
pub mod hull;
pub mod labeling;
pub mod measure;
pub mod mesh;
pub mod pipeline;
pub mod prelude;
pub mod segment;
pub mod threshold;
