//! Error types for benchmark compilation
//!
//! Every failure aborts the whole conversion: a compliance document is
//! either complete and correct or it is not produced at all. Errors are
//! raised synchronously at construction or append time and nothing is
//! written to disk until the full document set has been assembled.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while assembling benchmark documents
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing from the YAML input
    #[error("missing required field '{field}' in {context}")]
    Configuration {
        /// The missing field name
        field: &'static str,
        /// Where the field was expected (rule id, section name)
        context: String,
    },

    /// An enumerated value is outside its closed vocabulary
    #[error("validation error: {message}")]
    Validation {
        /// What was rejected and the accepted vocabulary
        message: String,
    },

    /// Two entries share a key but carry different content
    #[error("collision: {message}")]
    Collision {
        /// The colliding key and both origins
        message: String,
    },

    /// A child tag was appended outside an element's restricted vocabulary
    #[error("element '{element}' does not allow child '{child}'")]
    SchemaOrdering {
        /// The restricted parent element
        element: String,
        /// The rejected child tag
        child: String,
    },

    /// Payload encoding failed
    #[error("encoding error: {message}")]
    Encoding {
        /// Encoder failure detail
        message: String,
    },

    /// Filesystem error while exporting documents or shared files
    #[error("IO error for {path:?}: {message}")]
    Io {
        /// The path being read or written
        path: PathBuf,
        /// Underlying error text
        message: String,
    },

    /// YAML input could not be parsed
    #[error("YAML error: {message}")]
    Yaml {
        /// Parser error text
        message: String,
    },
}

impl Error {
    /// Shorthand for a [`Error::Configuration`] value
    pub fn config(field: &'static str, context: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            context: context.into(),
        }
    }

    /// Shorthand for a [`Error::Validation`] value
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Collision`] value
    pub fn collision(message: impl Into<String>) -> Self {
        Self::Collision {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Io`] value
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: e.to_string(),
        }
    }
}

/// Result type alias for compilation operations
pub type Result<T> = std::result::Result<T, Error>;
