//! [`GroupDirectory`] backed by a Keycloak realm.

use std::collections::BTreeSet;

use async_trait::async_trait;
use nsgroup_reconciler::{Error as ReconcileError, GroupDirectory, Result as ReconcileResult};
use tracing::debug;

use crate::client::KeycloakClient;
use crate::error::Error;

/// A realm's top-level groups, seen as a group directory.
///
/// Creating a group that already exists and deleting one that is already
/// gone both succeed.
#[derive(Debug, Clone)]
pub struct KeycloakDirectory {
    client: KeycloakClient,
}

impl KeycloakDirectory {
    pub const fn new(client: KeycloakClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GroupDirectory for KeycloakDirectory {
    async fn list(&self) -> ReconcileResult<BTreeSet<String>> {
        let groups = self
            .client
            .list_groups()
            .await
            .map_err(|e| ReconcileError::directory("list groups", e.to_string()))?;
        Ok(groups.into_iter().map(|group| group.name).collect())
    }

    async fn create(&self, name: &str) -> ReconcileResult<()> {
        match self.client.create_group(name).await {
            Ok(()) => Ok(()),
            Err(Error::GroupExists { .. }) => {
                debug!(realm = self.client.realm(), group = name, "Group already exists");
                Ok(())
            }
            Err(e) => Err(ReconcileError::directory(
                format!("create {name}"),
                e.to_string(),
            )),
        }
    }

    async fn delete(&self, name: &str) -> ReconcileResult<()> {
        match self.client.delete_group(name).await {
            Ok(()) => Ok(()),
            Err(Error::GroupNotFound { .. }) => {
                debug!(realm = self.client.realm(), group = name, "Group already absent");
                Ok(())
            }
            Err(e) => Err(ReconcileError::directory(
                format!("delete {name}"),
                e.to_string(),
            )),
        }
    }
}
