//! 宿主平台接口.
//!
//! 图像读取、三维形态学滤波等由宿主成像平台提供的能力被抽象为 trait,
//! 分割与校正算法只依赖这些 trait. 每个 trait 都有一份纯 Rust 默认实现.

use std::collections::VecDeque;
use std::convert::Infallible;

use crate::morph_3d::StructElem;
use crate::{NucleusMask, RawStack};

/// 原图来源.
pub trait VoxelGridSource {
    /// 读取失败时的错误类型.
    type Error: std::error::Error + Send + Sync + 'static;

    /// 读取下一幅原图. 没有更多图像时返回 `None`.
    fn next_stack(&mut self) -> Option<Result<RawStack, Self::Error>>;
}

/// 内存中的原图队列.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    stacks: VecDeque<RawStack>,
}

impl MemorySource {
    /// 以若干原图构建来源, 按给定顺序产出.
    pub fn new<I: IntoIterator<Item = RawStack>>(stacks: I) -> Self {
        Self {
            stacks: stacks.into_iter().collect(),
        }
    }

    /// 追加一幅原图.
    #[inline]
    pub fn push(&mut self, stack: RawStack) {
        self.stacks.push_back(stack);
    }

    /// 剩余原图个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// 是否已经取空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

impl VoxelGridSource for MemorySource {
    type Error = Infallible;

    #[inline]
    fn next_stack(&mut self) -> Option<Result<RawStack, Self::Error>> {
        self.stacks.pop_front().map(Ok)
    }
}

/// 三维形态学服务.
pub trait MorphologyService {
    /// 最小值滤波 (腐蚀).
    fn min_filter(&self, mask: &NucleusMask, elem: StructElem) -> NucleusMask;

    /// 最大值滤波 (膨胀).
    fn max_filter(&self, mask: &NucleusMask, elem: StructElem) -> NucleusMask;

    /// 逐张水平切片填充背景空洞. 修改了掩膜时返回 `true`.
    fn fill_holes_2d(&self, mask: &mut NucleusMask) -> bool;

    /// 开运算: 先腐蚀后膨胀.
    fn open(&self, mask: &NucleusMask, elem: StructElem) -> NucleusMask {
        self.max_filter(&self.min_filter(mask, elem), elem)
    }

    /// 闭运算: 先膨胀后腐蚀.
    fn close(&self, mask: &NucleusMask, elem: StructElem) -> NucleusMask {
        self.min_filter(&self.max_filter(mask, elem), elem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Calibration;
    use ndarray::Array3;

    #[test]
    fn test_memory_source_order() {
        let make = |name: &str| RawStack::new(name, Array3::zeros((1, 1, 1)), Calibration::unit());
        let mut src = MemorySource::new([make("a"), make("b")]);
        src.push(make("c"));
        assert_eq!(src.len(), 3);

        let mut names = Vec::new();
        while let Some(Ok(s)) = src.next_stack() {
            names.push(s.name().to_string());
        }
        assert_eq!(names, ["a", "b", "c"]);
        assert!(src.is_empty());
    }
}
