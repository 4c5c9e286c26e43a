//! Kubernetes side of namespace group sync.
//!
//! [`KubeNamespaces`] lists the cluster's namespaces and then watches them
//! for as long as the loop runs. [`NamespaceTracker`] turns watcher events,
//! relists included, into [`NamespaceEvent`](nsgroup_events::NamespaceEvent)s.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod namespaces;

pub use error::ConnectionError;
pub use namespaces::{KubeNamespaces, NamespaceTracker, SOURCE};
