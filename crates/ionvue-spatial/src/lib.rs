//! ionvue-spatial: the spatial machinery behind the neighbourhood
//! analysers.
//!
//! - [`KdTree`]: a static 3D k-d index over a borrowed point buffer with
//!   bound-aware nearest and k-nearest queries.
//! - [`hull`]: convex hull construction and the hull-distance source
//!   reduction used to suppress edge bias in pair statistics.
//! - [`rdf`]: nearest-neighbour and radial distance histograms.
//! - [`binomial`]: block-count randomness statistics for clustering
//!   detection.

pub mod binomial;
pub mod hull;
pub mod kdtree;
pub mod rdf;

pub use binomial::{binomial_comparison, BinomialComparison, BinomialError};
pub use hull::{reduced_hull_points, ConvexHull, HullError};
pub use kdtree::KdTree;
pub use rdf::{nn_histograms, radial_histogram, DistanceHistogram};
