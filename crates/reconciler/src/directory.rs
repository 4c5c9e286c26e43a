//! Group directory abstraction.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Identity-provider group store.
///
/// Each call is independent: a failed call must not affect later ones.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Names of all groups currently present.
    async fn list(&self) -> Result<BTreeSet<String>>;

    /// Create a group.
    async fn create(&self, name: &str) -> Result<()>;

    /// Delete a group.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// A call recorded by [`InMemoryGroupDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    List,
    Create(String),
    Delete(String),
}

/// In-memory group directory.
///
/// Records every call, and can be told to fail listing or to fail
/// create/delete for specific groups.
#[derive(Debug, Default)]
pub struct InMemoryGroupDirectory {
    groups: RwLock<BTreeSet<String>>,
    calls: RwLock<Vec<DirectoryCall>>,
    failing: RwLock<HashSet<String>>,
    fail_list: RwLock<bool>,
}

impl InMemoryGroupDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory that already holds `groups`.
    pub fn with_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: RwLock::new(groups.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Make create/delete of `group` fail.
    pub async fn fail_on(&self, group: impl Into<String>) {
        self.failing.write().await.insert(group.into());
    }

    /// Make `list` fail (or succeed again).
    pub async fn fail_listing(&self, fail: bool) {
        *self.fail_list.write().await = fail;
    }

    /// Current group names.
    pub async fn groups(&self) -> BTreeSet<String> {
        self.groups.read().await.clone()
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<DirectoryCall> {
        self.calls.read().await.clone()
    }

    /// Only the create/delete calls, in order.
    pub async fn mutations(&self) -> Vec<DirectoryCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| !matches!(call, DirectoryCall::List))
            .cloned()
            .collect()
    }

    async fn check_failing(&self, operation: &str, name: &str) -> Result<()> {
        if self.failing.read().await.contains(name) {
            return Err(Error::directory(
                format!("{operation} {name}"),
                "injected failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GroupDirectory for InMemoryGroupDirectory {
    async fn list(&self) -> Result<BTreeSet<String>> {
        self.calls.write().await.push(DirectoryCall::List);
        if *self.fail_list.read().await {
            return Err(Error::directory("list", "injected failure"));
        }
        Ok(self.groups.read().await.clone())
    }

    async fn create(&self, name: &str) -> Result<()> {
        self.calls
            .write()
            .await
            .push(DirectoryCall::Create(name.to_string()));
        self.check_failing("create", name).await?;
        self.groups.write().await.insert(name.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.calls
            .write()
            .await
            .push(DirectoryCall::Delete(name.to_string()));
        self.check_failing("delete", name).await?;
        self.groups.write().await.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_delete_are_idempotent() -> Result<()> {
        let dir = InMemoryGroupDirectory::new();
        dir.create("a").await?;
        dir.create("a").await?;
        assert_eq!(dir.list().await?.len(), 1);

        dir.delete("a").await?;
        dir.delete("a").await?;
        assert!(dir.list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let dir = InMemoryGroupDirectory::with_groups(["a"]);
        dir.fail_on("b").await;
        dir.fail_listing(true).await;

        assert!(dir.list().await.is_err());
        assert!(dir.create("b").await.is_err());
        assert!(dir.create("c").await.is_ok());
        assert_eq!(dir.mutations().await.len(), 2);
        assert!(!dir.groups().await.contains("b"));
    }
}
