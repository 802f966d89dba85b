//! Error types for the ovpn-profile-core crate

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not read file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Line {line} is {length} bytes, longer than the maximum of {max}")]
    LineTooLong { line: usize, length: usize, max: usize },

    #[error("Inline block <{tag}> contains invalid UTF-8 on line {line}")]
    InvalidUtf8 { tag: String, line: usize },

    #[error("Inline block <{tag}> opened on line {line} is never closed")]
    UnterminatedBlock { tag: String, line: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// True when the source file itself could not be opened or read
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Open { .. })
    }
}
