//! The filter kinds.

mod annotation;
mod boundbox;
mod clip;
mod common;
mod composition;
mod dataload;
mod downsample;
mod rangefilter;
mod spatial;
mod spectrum;
mod transform;
mod voxelise;

pub use annotation::{AnnotationFilter, AnnotationMode};
pub use boundbox::BoundingBoxFilter;
pub use clip::{ClipFilter, ClipPrimitive};
pub use composition::{CompositionNormalise, CompositionProfileFilter};
pub use dataload::{DataFileKind, DataLoadFilter};
pub use downsample::DownsampleFilter;
pub use rangefilter::RangeFileFilter;
pub use spatial::{SpatialAlgorithm, SpatialAnalysisFilter, StopMode};
pub use spectrum::SpectrumPlotFilter;
pub use transform::{TransformFilter, TransformMode, TransformOrigin};
pub use voxelise::{VoxelNormalise, VoxeliseFilter};
