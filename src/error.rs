//! Error types shared across the watch face engines.
//!
//! Each background concern gets its own enum so a failure in one (a menu
//! fetch, a store write) can be logged and absorbed without touching the
//! render path.

use std::path::PathBuf;

use thiserror::Error;

// Malformed value for a recognized style setting
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StyleError {
    #[error("setting `{id}` expects a {expected} value, got {found}")]
    WrongValueType {
        id: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown color style id `{0}`")]
    UnknownColorStyle(String),
}

// Content-extraction failures, one condition per day request
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("menu source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed menu content for {date_key}: {reason}")]
    Malformed { date_key: String, reason: String },
}

// Durable store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("menu store I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("menu store encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

// Settings file failures
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("cannot read settings {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}
