use std::path::PathBuf;
use thiserror::Error;

/// Core error type for dojo-amd operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Illegal absMid: {name:?} must be a non empty string.")]
    IllegalAlias { name: String },

    #[error("Irrational module id: {mid}")]
    IrrationalPath { mid: String },

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required option: {option}")]
    MissingOption { option: &'static str },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn illegal_alias(name: impl Into<String>) -> Self {
        Self::IllegalAlias { name: name.into() }
    }

    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
