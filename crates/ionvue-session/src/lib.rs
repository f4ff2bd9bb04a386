//! ionvue-session: the persisted analysis session.
//!
//! An [`AnalysisState`] owns the live filter tree plus everything a user
//! expects to get back when they reopen a saved analysis: named stashed
//! trees, the camera list, scene colours, and a bounded undo history.
//! The XML state format round-trips all of it; merge loading combines a
//! second session into the current one without clobbering names.

pub mod camera;
pub mod config;
pub mod persist;
pub mod state;

pub use camera::{Camera, CameraProjection};
pub use config::ConfigFile;
pub use persist::{SessionError, STATE_WRITER_VERSION};
pub use state::{AnalysisState, AxisMode, ModifyLevel, UNDO_LIMIT};
