//! ionvue-filters: the data-flow engine.
//!
//! Analyses are expressed as a rooted forest of typed filter nodes.
//! Source nodes load ion datasets and range tables; downstream nodes
//! transform, clip, classify and measure; every node communicates through
//! typed stream frames. The tree owns the nodes, their caches and the
//! refresh scheduler; XML persistence round-trips the whole structure.
//!
//! Key contracts:
//! - A node's emitted frame types are always a subset of its emit mask,
//!   and its emit and block masks never intersect.
//! - Caches are monotone: invalidating a node invalidates its whole
//!   subtree.
//! - One refresh traversal runs at a time; filters may fan work out to
//!   rayon but join before returning.

pub mod analyse;
pub mod filter;
pub mod filters;
pub mod persist;
pub mod stream;
pub mod tree;
pub mod xml;

pub use filter::{
    create_filter, BindingValue, Filter, FilterType, PropertyError, PropertyKind, PropertyValue,
};
pub use stream::{
    DrawFrame, Frame, FramePayload, IonFrame, PlotFrame, RangeFrame, StreamMask, VoxelFrame,
    VoxelRepresentation, DEFAULT_VALUE_LABEL,
};
pub use tree::{FilterTree, NodeId, RefreshOutput, TreeError};
