//! Error types for the Kubernetes adapter.

use thiserror::Error;

/// Errors that can occur when connecting to the cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("could not build a Kubernetes client from kubeconfig or in-cluster config: {0}")]
    Client(#[from] kube::Error),

    #[error("invalid label selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}
