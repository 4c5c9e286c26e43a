//! Error types for the reconciler crate.

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The namespace filter is not a valid regular expression.
    #[error("invalid namespace filter '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Listing namespaces failed.
    #[error("failed to list namespaces: {reason}")]
    NamespaceSource { reason: String },

    /// A group directory call failed.
    #[error("group directory operation '{operation}' failed: {reason}")]
    Directory { operation: String, reason: String },

    /// Opening or reading the event stream failed.
    #[error(transparent)]
    Event(#[from] nsgroup_events::Error),

    /// The loop gave up after too many consecutive event failures.
    #[error("sync loop aborted after {count} consecutive failures")]
    TooManyFailures { count: usize },
}

impl Error {
    /// Create an invalid filter error.
    pub fn invalid_filter(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a namespace source error.
    pub fn namespace_source(reason: impl Into<String>) -> Self {
        Self::NamespaceSource {
            reason: reason.into(),
        }
    }

    /// Create a group directory error.
    pub fn directory(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Directory {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}
