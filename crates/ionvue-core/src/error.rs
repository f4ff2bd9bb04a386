//! Refresh-level error taxonomy shared by loaders and filters.

use thiserror::Error;

/// Errors a loader or filter refresh can surface to the scheduler.
///
/// I/O and parse errors terminate the refresh immediately; the scheduler
/// leaves the node's cache invalid, records the message on the node's
/// console list, and continues with siblings. Bad-point events are not
/// errors and never appear here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("Memory allocation failure")]
    AllocFail,

    #[error("Error opening file: {0}")]
    OpenFail(String),

    #[error("File is empty")]
    EmptyFile,

    #[error("File size appears to have non-integer number of entries")]
    SizeModulus,

    #[error("Error reading from file (after open)")]
    ReadFail,

    #[error("Found NaN in input data")]
    NanFound,

    #[error("Error interpreting field in file")]
    Format,

    #[error("Incorrect number of fields in file")]
    FieldCount,

    #[error("No numerical data found")]
    HeaderOnly,

    #[error("Insufficient data to continue")]
    InsufficientSize,

    #[error("Input bounds are not valid")]
    BoundsInvalid,

    #[error("Aborted by interrupt")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, RefreshError>;

impl RefreshError {
    /// True when the refresh stopped because the host asked it to, rather
    /// than because anything was wrong with the data.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
