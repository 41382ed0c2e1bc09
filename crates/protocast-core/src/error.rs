//! Error types for the overlay engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for overlay operations
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Error type for overlay operations
///
/// Only conditions that must abort a run are represented here. A field whose
/// annotation cannot be read, or an accessor that does not have the expected
/// shape, is ordinary control flow and never produces an `OverlayError`.
#[derive(Error, Debug)]
pub enum OverlayError {
    /// Generated source could not be parsed
    #[error("failed to parse generated source {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: syn::Error,
    },

    /// The serialized descriptor set is not valid protobuf
    #[error("invalid descriptor set: {0}")]
    Descriptor(String),

    /// Reading or writing a file failed
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// An override type or import origin cannot be expressed as Rust syntax
    #[error("invalid override type `{value}`: {reason}")]
    InvalidOverride { value: String, reason: String },
}

impl OverlayError {
    /// Returns a stable process exit code for this error category
    pub fn exit_code(&self) -> i32 {
        match self {
            OverlayError::Parse { .. } => 2,
            OverlayError::Descriptor(_) => 3,
            OverlayError::Io { .. } => 4,
            OverlayError::Config(_) => 5,
            OverlayError::InvalidOverride { .. } => 6,
        }
    }

    pub(crate) fn parse(file: impl Into<String>, source: syn::Error) -> Self {
        OverlayError::Parse {
            file: file.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OverlayError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<prost::DecodeError> for OverlayError {
    fn from(err: prost::DecodeError) -> Self {
        OverlayError::Descriptor(err.to_string())
    }
}

impl From<toml::de::Error> for OverlayError {
    fn from(err: toml::de::Error) -> Self {
        OverlayError::Config(err.to_string())
    }
}
