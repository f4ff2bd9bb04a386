//! Range-file load errors.

use thiserror::Error;

/// Everything that can go wrong opening a range file. Format errors keep
/// enough structure to tell the user which part of the file broke.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Error opening file: {0}")]
    Open(String),

    #[error("Range file appears to be empty")]
    Empty,

    #[error("Unable to read range file header")]
    FormatHeader,

    #[error("Error reading ion long name")]
    FormatLongName,

    #[error("Error reading ion short name")]
    FormatShortName,

    #[error("Error reading ion colour")]
    FormatColour,

    #[error("Unable to interpret the table separator line")]
    FormatTableSeparator,

    #[error("Range table has wrong number of entries on a row")]
    FormatRangeTable,

    #[error("Unable to parse range mass pair")]
    FormatMassPair,

    #[error("Unable to parse range table frequency entry")]
    FormatTableEntry,

    #[error("Unable to interpret range file contents")]
    Format,

    #[error("Range has flipped bounds (low value above high)")]
    DataFlipped,

    #[error("Range table contains no usable ranges")]
    TooManyUselessRanges,

    #[error("Range data failed the self-consistency check")]
    DataInconsistent,
}

pub type Result<T> = std::result::Result<T, RangeError>;
