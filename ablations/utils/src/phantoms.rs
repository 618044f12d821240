//! 合成体数据集. 真实表面积已知, 用于比较表面积估计方法.
//!
//! 数据集规模可以通过环境变量调整:
//!
//! - `NUCLEUS_ABLATION_GRID`: 立方体网格边长 (体素), 默认 48;
//! - `NUCLEUS_ABLATION_RADII`: 逗号分隔的球半径列表 (体素), 默认 `8,12,16`;
//! - `NUCLEUS_ABLATION_Z_STEP`: 各向异性数据的 z 方向体素尺寸, 默认 2.0.
//!
//! 环境变量无法解析时使用默认值.

use nucleus_berry::phantom::Ellipsoid;
use nucleus_berry::{Calibration, RawStack};
use std::env;
use std::str::FromStr;

const DEFAULT_GRID: usize = 48;
const DEFAULT_RADII: [f64; 3] = [8.0, 12.0, 16.0];
const DEFAULT_Z_STEP: f64 = 2.0;

/// 前景 (核内) 强度.
pub const INSIDE: u16 = 200;

/// 背景强度.
pub const OUTSIDE: u16 = 20;

/// 一个合成样本: 原图与其解析表面积/体积.
#[derive(Clone, Debug)]
pub struct Phantom {
    /// 原图. 掩膜可由 `raw.binarize(INSIDE as u32)` 得到.
    pub raw: RawStack,
    /// 解析表面积.
    pub surface: f64,
    /// 解析体积.
    pub volume: f64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// 网格边长.
pub fn grid_from_env() -> usize {
    env_or("NUCLEUS_ABLATION_GRID", DEFAULT_GRID)
}

/// 球半径列表.
pub fn radii_from_env() -> Vec<f64> {
    let parsed: Option<Vec<f64>> = env::var("NUCLEUS_ABLATION_RADII")
        .ok()
        .and_then(|v| v.split(',').map(|r| r.trim().parse().ok()).collect());
    match parsed {
        Some(radii) if !radii.is_empty() => radii,
        _ => DEFAULT_RADII.to_vec(),
    }
}

/// 各向异性标定: 平面内 1, z 方向为 `NUCLEUS_ABLATION_Z_STEP`.
pub fn anisotropic_from_env() -> Calibration {
    let z = env_or("NUCLEUS_ABLATION_Z_STEP", DEFAULT_Z_STEP);
    Calibration::new(1.0, 1.0, z, "pixel").unwrap_or_else(Calibration::unit)
}

fn make(name: String, grid: usize, calib: &Calibration, e: Ellipsoid) -> Phantom {
    let shape = (grid, grid, grid);
    Phantom {
        raw: e.stack(name, shape, calib, INSIDE, OUTSIDE),
        surface: e.surface_area(),
        volume: e.volume(),
    }
}

/// 生成全部合成样本: 每个半径对应一个各向同性球体, 一个各向同性扁椭球,
/// 以及一个各向异性标定下的球体.
///
/// 放不进网格的样本会被跳过.
pub fn phantoms_from_env() -> Vec<Phantom> {
    let grid = grid_from_env();
    let iso = Calibration::unit();
    let aniso = anisotropic_from_env();
    let fits = |extent: f64| 2.0 * extent + 4.0 <= grid as f64;

    let mut ans = Vec::new();
    for r in radii_from_env() {
        if !fits(r) {
            continue;
        }
        if let Some(e) = Ellipsoid::centered_sphere((grid, grid, grid), &iso, r) {
            ans.push(make(format!("sphere-r{r}"), grid, &iso, e));
        }
        if let Some(e) = Ellipsoid::centered((grid, grid, grid), &iso, [r * 0.6, r, r * 0.8]) {
            ans.push(make(format!("ellipsoid-r{r}"), grid, &iso, e));
        }
        // z 方向体素更大, 物理半径 r 需要 r / z_step 个切片.
        if fits(r / aniso.z()) {
            if let Some(e) = Ellipsoid::centered_sphere((grid, grid, grid), &aniso, r) {
                ans.push(make(format!("aniso-sphere-r{r}"), grid, &aniso, e));
            }
        }
    }
    ans
}
