//! Unified error type for the recorder.
//!
//! `RecorderError` covers the failures that can stop the process: bad
//! configuration, an unusable capture device, or storage that cannot be
//! opened. Undecodable frames and filtered traffic are not errors and never
//! reach this type.

/// Recorder-level error.
///
/// Each variant maps to a distinct failure domain; `kind()` gives the
/// variant name for structured log fields.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// Malformed or inconsistent configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Errors from the packet capture source (libpcap).
    #[error("capture error: {0}")]
    Capture(String),

    /// Errors originating from SQLite / database operations.
    #[error("database error: {0}")]
    Database(String),

    /// I/O and OS-level errors (config file, filesystem).
    #[error("io error: {0}")]
    Io(String),

    /// Invalid user input, e.g. a malformed subnet string.
    #[error("{0}")]
    InvalidInput(String),
}

impl RecorderError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            RecorderError::Config(_) => "Config",
            RecorderError::Capture(_) => "Capture",
            RecorderError::Database(_) => "Database",
            RecorderError::Io(_) => "Io",
            RecorderError::InvalidInput(_) => "InvalidInput",
        }
    }
}

// ---- From implementations for ergonomic error conversion ----

impl From<std::io::Error> for RecorderError {
    fn from(err: std::io::Error) -> Self {
        RecorderError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for RecorderError {
    fn from(err: rusqlite::Error) -> Self {
        RecorderError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RecorderError {
    fn from(err: serde_json::Error) -> Self {
        RecorderError::Config(err.to_string())
    }
}

impl From<pcap::Error> for RecorderError {
    fn from(err: pcap::Error) -> Self {
        RecorderError::Capture(err.to_string())
    }
}
