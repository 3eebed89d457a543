use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a scanned payload could not be turned into an invoice record.
///
/// These are recoverable: the operator simply scans again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("expected at least {expected} comma-separated fields, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("field `{field}` is empty")]
    EmptyField { field: &'static str },
}

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] PayloadError),

    /// The ledger could not be opened or read. It is mandatory, so there is no fallback.
    #[error("ledger {} is unavailable: {source}", .path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The file exists but is empty, so there is no header row to skip.
    #[error("ledger {} has no header row", .path.display())]
    MissingHeader { path: PathBuf },

    #[error("failed to append to ledger {}: {source}", .path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create ledger {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
