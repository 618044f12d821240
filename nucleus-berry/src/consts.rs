//! 通用常量.

/// 单通道掩膜取值.
pub mod gray {
    /// 掩膜中背景的体素值.
    pub const BACKGROUND: u8 = 0;

    /// 掩膜中 (唯一保留的) 细胞核前景的体素值.
    pub const FOREGROUND: u8 = 255;

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        p == BACKGROUND
    }

    /// 体素是否是细胞核前景?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        p == FOREGROUND
    }

    /// 体素是否被标记 (任意非背景值)?
    #[inline]
    pub const fn is_marked(p: u8) -> bool {
        p != BACKGROUND
    }
}

/// 阈值搜索相关的默认参数.
pub mod search {
    /// 阈值下限. 过低的阈值会把噪声整体视为前景, 没有意义.
    pub const MIN_THRESHOLD: u32 = 6;

    /// 候选前景体积占整幅图像体积比例的上限 (不含).
    pub const MAX_FRAME_FRACTION: f64 = 0.70;

    /// 第一张或最后一张 z 切片上的前景体素数达到该值时, 视为物体被截断.
    pub const BORDER_VOXELS: usize = 10;

    /// 后处理开/闭运算的默认结构元半径 (体素).
    pub const MORPH_RADIUS: usize = 1;
}

/// 凸包校正相关常量.
pub mod hull {
    /// 连通域边缘像素个数不超过该值时不做凸包.
    pub const MIN_BOUNDARY_PIXELS: usize = 5;

    /// 并集之后开运算所用立方体结构元的边长. 外接球直径为 `3 * sqrt(3) ≈ 5.2`.
    pub const OPENING_CUBE_EDGE: usize = 3;
}

/// 梯度单位法向量的模长下限. 低于该值的梯度不赋予方向.
pub const NORMAL_EPSILON: f64 = 1e-15;

/// 网格提取的默认等值面.
pub const ISO_LEVEL: f32 = 0.5;
