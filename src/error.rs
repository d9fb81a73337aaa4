//! Error types for the row splitter.

use thiserror::Error;

/// Result type alias for splitter operations
pub type Result<T> = std::result::Result<T, SplitError>;

/// Errors that can occur while loading rules or splitting rows.
///
/// All variants are fatal. Currency mismatches between a row and its splits
/// are not errors; see [`crate::splitter::Mismatch`].
#[derive(Error, Debug)]
pub enum SplitError {
    /// Failed to open, read, or write a stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Rule definition row that cannot be turned into a rule
    #[error("Malformed rule at row {row}: {message}")]
    MalformedRule { row: usize, message: String },

    /// Referenced column index is past the end of a row
    #[error("Row {row} has no column {column} (row has {width} fields)")]
    FieldAccess {
        row: usize,
        column: usize,
        width: usize,
    },

    /// Value that should hold a monetary amount does not contain one
    #[error("Cannot parse currency amount '{value}' at row {row}")]
    CurrencyParse { row: usize, value: String },

    /// Sum or difference of amounts too large to represent
    #[error("Currency amount '{value}' overflows the running total at row {row}")]
    AmountOverflow { row: usize, value: String },
}
