//! nsgroup-sync - namespace to Keycloak group synchronization.
//!
//! The binary wires three crates together:
//!
//! - `nsgroup-kube` lists and watches the cluster's namespaces
//! - `nsgroup-reconciler` decides which groups should exist and applies the
//!   difference
//! - `nsgroup-keycloak` creates and deletes the groups in a Keycloak realm
//!
//! This library holds the CLI and configuration so they can be tested apart
//! from `main`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod cli;
pub mod config;

pub use cli::{Cli, LogFormat};
pub use config::{Config, ConfigError, Settings};
