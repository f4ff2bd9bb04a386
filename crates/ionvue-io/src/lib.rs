//! ionvue-io: ion dataset file loaders.
//!
//! Two source formats are supported:
//!
//! - POS: headerless fixed-record binary, big-endian IEEE-754 floats in
//!   groups of N columns (usually 4), read whole or by uniform random
//!   sample.
//! - Delimited text: tab/space/comma separated columns after an arbitrary
//!   header, located by a two-pass scan.
//!
//! Both loaders reject records containing NaN, report integer percent
//! progress, and poll a cancellation flag every few thousand records.

pub mod pos;
pub mod text;

pub use pos::{load_pos, load_pos_sampled, write_pos, PosColumnMap};
pub use text::{load_text, load_text_sampled, TEXT_DELIMITERS};
