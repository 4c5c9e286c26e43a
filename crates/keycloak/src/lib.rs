//! # nsgroup-keycloak
//!
//! Keycloak admin API adapter for namespace group sync.
//!
//! ## Features
//!
//! - Password-grant login with a cached, auto-refreshed access token
//! - Paginated listing of a realm's top-level groups
//! - Group creation, and deletion by name (resolved to the group id)
//! - Exponential backoff on server errors and transport failures
//!
//! ## Example
//!
//! ```ignore
//! use nsgroup_keycloak::{KeycloakClient, KeycloakConfig, KeycloakDirectory};
//!
//! let config = KeycloakConfig::new(
//!     "https://sso.example.com".parse()?,
//!     "admin",
//!     password,
//!     "apps",
//! );
//! let directory = KeycloakDirectory::new(KeycloakClient::new(config)?);
//! let groups = directory.list().await?;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod types;

pub use client::KeycloakClient;
pub use config::{DEFAULT_CLIENT_ID, DEFAULT_LOGIN_REALM, KeycloakConfig};
pub use directory::KeycloakDirectory;
pub use error::{Error, Result};
pub use types::GroupRepresentation;
