//! ionvue-core: shared value types and refresh runtime for the ionvue
//! analysis engine.
//!
//! Everything here is GUI-free plain data plus the small amount of runtime
//! machinery (progress counters, abort flag) that every loader and filter
//! shares. Heavier components (loaders, range tables, the filter tree) live
//! in their own crates and depend on this one.

pub mod bound_cube;
pub mod colour;
pub mod draw;
pub mod error;
pub mod ion;
pub mod plot;
pub mod point;
pub mod progress;
pub mod quat;
pub mod sampling;
pub mod voxels;

pub use bound_cube::BoundCube;
pub use colour::ColourRGBAf;
pub use draw::{DrawPrimitive, DrawShape, SelectionBinding, TextMode};
pub use error::{RefreshError, Result};
pub use ion::{IonHit, ION_RECORD_SIZE};
pub use plot::{ErrorMode, PlotRegion, PlotSeries, TraceType};
pub use point::Point3D;
pub use progress::{CancelFlag, ProgressData, ProgressSink, RefreshContext, PROGRESS_CHUNK};
pub use quat::Quaternion;
pub use voxels::VoxelGrid;
