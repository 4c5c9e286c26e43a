//! Namespace event types.

use std::fmt;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Kind of namespace lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Namespace appeared in the cluster.
    Added,
    /// Namespace was removed from the cluster.
    Deleted,
    /// Namespace object changed (labels, annotations, status).
    Modified,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Deleted => write!(f, "deleted"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

/// A single namespace lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceEvent {
    /// What happened.
    pub kind: EventKind,
    /// Name of the namespace it happened to.
    pub name: String,
}

impl NamespaceEvent {
    /// Create a new event.
    pub fn new(kind: EventKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Create an added event.
    pub fn added(name: impl Into<String>) -> Self {
        Self::new(EventKind::Added, name)
    }

    /// Create a deleted event.
    pub fn deleted(name: impl Into<String>) -> Self {
        Self::new(EventKind::Deleted, name)
    }

    /// Create a modified event.
    pub fn modified(name: impl Into<String>) -> Self {
        Self::new(EventKind::Modified, name)
    }
}

impl fmt::Display for NamespaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "namespace {} {}", self.name, self.kind)
    }
}

/// Lazy, in-order stream of namespace events.
///
/// The stream ends when the underlying source closes. An `Err` item reports a
/// problem with one item and does not by itself end the stream.
pub type NamespaceEventStream = Pin<Box<dyn Stream<Item = Result<NamespaceEvent>> + Send>>;
