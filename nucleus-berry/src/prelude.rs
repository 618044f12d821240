//! 🔬欢迎光临🧫
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d, Vec3};

pub use crate::data::{Calibration, MaskSlice, MaskSliceMut, NucleusMask, OwnedMaskSlice, RawStack, StackAttr};

pub use crate::consts::gray::{BACKGROUND, FOREGROUND};

pub use crate::histogram::{Histogram, IntensityStats};
pub use crate::host::{MemorySource, MorphologyService, VoxelGridSource};
pub use crate::hull::{AxisPair, ConvexHullCorrection};
pub use crate::labeling::Connectivity;
pub use crate::measure::{Measure3d, MeasureError, ShapeDescriptor, SurfaceEstimator};
pub use crate::mesh::{MeshExtractionService, SurfaceNets};
pub use crate::morph_3d::{Morphology3d, StructElem};
pub use crate::pipeline::{Analysis, AnalysisError, Analyzer};
pub use crate::segment::{Segmentation, SegmentationParams, Segmenter};
pub use crate::threshold::{AutoThresholder, ThresholdMethod};
