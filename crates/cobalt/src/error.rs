//! Run-level errors.
//!
//! Only failures that stop the whole batch live here: an unreadable input
//! root or an unusable configuration. Everything that goes wrong inside a
//! single program is collected into that program's report instead and
//! never crosses a program boundary.

use std::path::Path;

pub type Result<T> = std::result::Result<T, RunError>;

/// A failure that prevents the batch from running at all.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum RunError {
    /// The input or output root could not be read or created.
    #[error("i/o failure at {path}: {message}")]
    #[diagnostic(code(cobalt::run::io))]
    Io { path: String, message: String },

    /// The configuration is self-contradictory or incomplete.
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(cobalt::run::config))]
    Config { message: String },
}

impl RunError {
    /// Wrap an i/o error with the path it happened on.
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        RunError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        RunError::Config {
            message: message.into(),
        }
    }
}
