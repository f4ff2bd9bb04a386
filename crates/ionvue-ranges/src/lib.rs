//! ionvue-ranges: mass-to-charge range tables and their legacy file
//! formats.
//!
//! A range file classifies mass-to-charge intervals to ion species with
//! display colours. Three text formats are read and written, none of them
//! formally specified; the parsers are built from surviving examples and
//! accept the quirks observed in real instrument output:
//!
//! - ORNL `.rng`: counted header, ion/colour block, dashed table separator,
//!   one-hot (or composed) range rows.
//! - Imago/Cameca `.rrng`: INI-like `[Ions]`/`[Ranges]` sections.
//! - Cameca `.env`: best-effort reader for the environment format.
//!
//! Every successful parse must pass the self-consistency check (no
//! overlapping, nested, spanning, duplicate or zero-width ranges) before
//! the table is handed out.

pub mod env;
pub mod error;
pub mod rangefile;
pub mod rng_format;
pub mod rrng;
pub mod species;
pub mod write;

pub use error::{RangeError, Result};
pub use rangefile::{IonEntry, MassRange, RangeFile, RangeFormat};
pub use species::{decompose_ion_names, match_composed_name, NameFragment};
