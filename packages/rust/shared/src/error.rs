//! Error types for classweave.
//!
//! Library crates use [`ClassweaveError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Every variant is fatal for the run. The one recoverable condition, a failed
//! write-back of enhanced bytes, is modelled separately as
//! [`PersistenceWarning`] so it can never be propagated with `?` by accident.

use std::path::PathBuf;

/// Error type a transformer plugin may fail with.
pub type EnhancerFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all classweave operations.
#[derive(Debug, thiserror::Error)]
pub enum ClassweaveError {
    /// Configuration loading or validation error (including a missing scan root).
    #[error("config error: {message}")]
    Config { message: String },

    /// No classpath location can supply the requested binary name.
    #[error("class not found: {name}")]
    NotFound { name: String },

    /// A classpath location cannot be turned into a resolvable location.
    #[error("cannot resolve classpath entry {location}: {reason}")]
    Resolution { location: String, reason: String },

    /// The bytes of a binary artifact are not a well-formed class file.
    #[error("class format error: {message}")]
    ClassFormat { message: String },

    /// An artifact was requested while the orchestrator holds it for mutation.
    #[error("artifact {name} is being enhanced; use the description handed to the enhancer")]
    InUse { name: String },

    /// Processing a single artifact file failed.
    #[error("error transforming file {file}")]
    Transform {
        file: String,
        #[source]
        source: Box<ClassweaveError>,
    },

    /// A transformer failed on an artifact.
    #[error("while applying {enhancer}[version: {version}] on {class_name}")]
    Enhancement {
        enhancer: String,
        version: String,
        class_name: String,
        #[source]
        source: EnhancerFailure,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ClassweaveError>;

impl ClassweaveError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a class format error from any displayable message.
    pub fn class_format(msg: impl Into<String>) -> Self {
        Self::ClassFormat {
            message: msg.into(),
        }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn resolution(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a lower-level error with the name of the file being processed.
    pub fn transform(file: impl Into<String>, source: ClassweaveError) -> Self {
        Self::Transform {
            file: file.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A write-back of enhanced bytes failed. Logged and recorded, never fatal.
#[derive(Debug, Clone, serde::Serialize, thiserror::Error)]
#[error("failed to persist {class_name} to {path:?} after {enhancer}: {message}")]
pub struct PersistenceWarning {
    /// Target file of the failed write.
    pub path: PathBuf,
    /// Binary name of the artifact.
    pub class_name: String,
    /// Identifier of the transformer whose output could not be written.
    pub enhancer: String,
    /// Rendered I/O error.
    pub message: String,
    /// Set once a later write of the same artifact reached disk.
    pub recovered: bool,
}
