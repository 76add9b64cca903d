//! Error types for usql-gate.
//!
//! Every failure a request can hit is a variant here, so the handler can turn
//! any of them into a single failure envelope.

use std::path::PathBuf;

use thiserror::Error;

use crate::safety::Rejection;

/// Main error type for usql-gate operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// The query was refused by the read-only gate.
    #[error("{0}")]
    Rejected(Rejection),

    /// The request itself was malformed (bad JSON, connection number < 1, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No connection string is registered under the requested number.
    #[error("Connection string not found for number: {0}")]
    ConnectionNotFound(u32),

    /// The usql binary could not be found and installing it is not allowed.
    #[error(
        "usql binary not found at path: {}. Please ensure it is installed and accessible \
         or set UNSAFE_USQL_BINARY=true to download it automatically.",
        .0.display()
    )]
    BinaryNotFound(PathBuf),

    #[error("Unsupported CPU architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("Unsupported operating system: {0}. Supported systems are: linux, macos, windows.")]
    UnsupportedOperatingSystem(String),

    /// The release download failed (HTTP status or transport error).
    #[error("Failed to download usql binary: {0}")]
    Download(String),

    #[error("Failed to extract usql archive: {0}")]
    Extraction(String),

    #[error("usql binary not found in extracted files")]
    BinaryNotFoundInArchive,

    #[error("Failed to install usql binary: {0}")]
    Install(String),

    /// The usql process could not be started at all.
    #[error("Failed to spawn usql: {0}")]
    Spawn(String),

    #[error("Query timed out after {0}ms")]
    Timeout(u64),

    #[error("usql exited with code {code}. stderr: {stderr}")]
    ProcessExit { code: i32, stderr: String },

    /// usql exited successfully but its stdout was not valid JSON.
    #[error("Failed to parse JSON output: {detail}. Output: {raw}")]
    ResponseParse { raw: String, detail: String },

    /// Configuration errors (missing connection strings, invalid settings file, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading requests or writing responses failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl GateError {
    /// Creates an invalid input error with the given message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a download error with the given message.
    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    /// Creates an extraction error with the given message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Creates an install error with the given message.
    pub fn install(msg: impl Into<String>) -> Self {
        Self::Install(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Rejected(_) | Self::InvalidInput(_) => "Validation Error",
            Self::ConnectionNotFound(_) => "Connection Error",
            Self::BinaryNotFound(_)
            | Self::UnsupportedArchitecture(_)
            | Self::UnsupportedOperatingSystem(_)
            | Self::Download(_)
            | Self::Extraction(_)
            | Self::BinaryNotFoundInArchive
            | Self::Install(_) => "Install Error",
            Self::Spawn(_)
            | Self::Timeout(_)
            | Self::ProcessExit { .. }
            | Self::ResponseParse { .. } => "Execution Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
        }
    }
}

impl From<Rejection> for GateError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

/// Result type alias using GateError.
pub type Result<T> = std::result::Result<T, GateError>;
