// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only failures without a recovery path surface as `ServeError`: a broken
//! configuration aborts start-up and a dead front-end watcher ends the
//! session. Compile failures and shell crashes are absorbed by their
//! components and only logged.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Front-end build watcher exited unexpectedly (exit code {code:?})")]
    FrontendExited { code: Option<i32> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServeError {
    /// Shorthand for building a [`ServeError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        ServeError::Config(msg.into())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ServeError>;
