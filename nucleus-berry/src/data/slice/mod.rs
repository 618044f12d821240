//! 掩膜二维切片对象的操作.

mod core;

pub use core::{MaskSlice, MaskSliceMut, OwnedMaskSlice};
