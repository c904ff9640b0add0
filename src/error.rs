use thiserror::Error;

/// Main error type for Liftlog
#[derive(Error, Debug)]
pub enum LiftlogError {
    /// Input is an archive or does not carry the expected extension
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The chunked reader failed mid-stream; the whole import is aborted
    #[error("Failed to read export at byte {offset}: {source}")]
    SourceRead {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// A single record could not be converted. Extractors drop the record and continue.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// The persistence layer rejected a write for one category
    #[error("Store write failed for {category}: {reason}")]
    StoreWrite {
        category: &'static str,
        reason: String,
    },

    /// The caller cancelled the import between chunk reads
    #[error("Import cancelled after {bytes_consumed} bytes")]
    Cancelled { bytes_consumed: u64 },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LiftlogError {
    /// Short problem category shown to the user in the single failure summary.
    pub fn category(&self) -> &'static str {
        match self {
            LiftlogError::UnsupportedFormat(_) | LiftlogError::MalformedRecord(_) => "bad format",
            LiftlogError::SourceRead { .. } | LiftlogError::Io(_) => "read failure",
            LiftlogError::StoreWrite { .. } | LiftlogError::Database(_) => "write failure",
            LiftlogError::Cancelled { .. } => "cancelled",
            LiftlogError::Config(_) | LiftlogError::InvalidInput(_) => "configuration",
        }
    }
}

/// Convenient Result type using LiftlogError
pub type Result<T> = std::result::Result<T, LiftlogError>;
