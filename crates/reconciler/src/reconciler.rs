//! Reconciler implementation.

use std::sync::Arc;

use nsgroup_events::{EventKind, NamespaceEvent};
use tracing::{debug, info, warn};

use crate::directory::GroupDirectory;
use crate::error::{Error, Result};
use crate::policy::{compute_diff, NamespaceFilter, SyncPolicy};
use crate::types::{GroupAction, SyncReport};

/// Filter `namespaces` through `pattern`, keeping the lister's order.
///
/// # Errors
///
/// Returns [`Error::InvalidFilter`] if `pattern` does not compile. The
/// pattern is compiled before `namespaces` is looked at.
pub fn filter_namespaces<I>(namespaces: I, pattern: &str) -> Result<Vec<String>>
where
    I: IntoIterator<Item = String>,
{
    let filter = NamespaceFilter::new(pattern)?;
    Ok(filter.apply(namespaces))
}

/// Converges the group directory toward the namespaces in the cluster.
pub struct Reconciler {
    /// Group directory.
    directory: Arc<dyn GroupDirectory>,
    /// Naming and filtering policy.
    policy: SyncPolicy,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(directory: Arc<dyn GroupDirectory>, policy: SyncPolicy) -> Self {
        Self { directory, policy }
    }

    /// Keep the namespaces that pass the policy's filter.
    pub fn filter_namespaces(&self, namespaces: Vec<String>) -> Vec<String> {
        self.policy.filter().apply(namespaces)
    }

    /// Full reconciliation against an already-filtered namespace list.
    ///
    /// Creates every missing desired group and deletes every existing group
    /// inside the prefix that is no longer desired. Individual create/delete
    /// failures are logged and recorded in the report.
    ///
    /// # Errors
    ///
    /// Fails only if the initial group listing fails.
    pub async fn bulk_sync(&self, namespaces: &[String]) -> Result<SyncReport> {
        let existing = self.directory.list().await?;
        let desired = self.policy.desired_groups(namespaces);

        info!(
            namespaces = namespaces.len(),
            desired = desired.len(),
            existing = existing.len(),
            prefix = %self.policy.prefix(),
            "Starting bulk sync"
        );

        let diff = compute_diff(&desired, &existing, self.policy.prefix());
        debug!(
            to_create = diff.to_create.len(),
            to_delete = diff.to_delete.len(),
            "Computed group diff"
        );

        let (taken, failed) = self.apply_actions(diff.actions()).await;
        let report = SyncReport::new(taken, failed, desired.len(), existing.len());

        if report.converged() {
            info!("Groups already in sync");
        } else {
            info!(
                actions_taken = report.actions_taken.len(),
                actions_failed = report.actions_failed.len(),
                "Bulk sync complete"
            );
        }

        Ok(report)
    }

    /// Create the groups of a new namespace that do not exist yet.
    ///
    /// Never deletes anything.
    ///
    /// # Errors
    ///
    /// Fails if the group listing fails; nothing is created in that case.
    pub async fn on_namespace_added(&self, namespace: &str) -> Result<SyncReport> {
        info!(namespace, "Namespace added");

        let existing = self.directory.list().await?;
        let wanted = self.policy.groups_for(namespace);

        let actions = wanted
            .iter()
            .filter(|group| {
                let present = existing.contains(group.as_str());
                if present {
                    debug!(group = %group, "Group already exists, skipping");
                }
                !present
            })
            .map(|group| GroupAction::create(group.as_str()))
            .collect();

        let (taken, failed) = self.apply_actions(actions).await;
        Ok(SyncReport::new(taken, failed, wanted.len(), existing.len()))
    }

    /// Delete every group derived from a removed namespace.
    ///
    /// Deletes are issued without checking existence first. Never creates
    /// anything.
    pub async fn on_namespace_deleted(&self, namespace: &str) -> SyncReport {
        info!(namespace, "Namespace deleted");

        let actions = self
            .policy
            .groups_for(namespace)
            .into_iter()
            .map(GroupAction::delete)
            .collect();

        let (taken, failed) = self.apply_actions(actions).await;
        SyncReport::new(taken, failed, 0, 0)
    }

    /// Modified namespaces keep their groups; a rename is a delete plus an add.
    pub fn on_namespace_modified(&self, namespace: &str) {
        info!(namespace, "Namespace modified, no group changes");
    }

    /// Dispatch one event to its handler.
    ///
    /// Events for namespaces outside the filter are ignored.
    ///
    /// # Errors
    ///
    /// Propagates the handler's error (only `Added` can fail as a whole).
    pub async fn handle_event(&self, event: &NamespaceEvent) -> Result<SyncReport> {
        if !self.policy.filter().matches(&event.name) {
            debug!(
                namespace = %event.name,
                kind = %event.kind,
                filter = %self.policy.filter().as_str(),
                "Namespace outside filter, ignoring event"
            );
            return Ok(SyncReport::empty());
        }

        match event.kind {
            EventKind::Added => self.on_namespace_added(&event.name).await,
            EventKind::Deleted => Ok(self.on_namespace_deleted(&event.name).await),
            EventKind::Modified => {
                self.on_namespace_modified(&event.name);
                Ok(SyncReport::empty())
            }
        }
    }

    /// Apply actions one by one, continuing past failures.
    async fn apply_actions(
        &self,
        actions: Vec<GroupAction>,
    ) -> (Vec<GroupAction>, Vec<(GroupAction, String)>) {
        let mut taken = Vec::new();
        let mut failed = Vec::new();

        for action in actions {
            debug!(action = %action, "Applying action");

            let result = match &action {
                GroupAction::Create(group) => self.directory.create(group).await,
                GroupAction::Delete(group) => self.directory.delete(group).await,
            };

            match result {
                Ok(()) => {
                    info!(group = %action.group(), action = %action, "Group updated");
                    taken.push(action);
                }
                Err(e) => {
                    warn!(group = %action.group(), action = %action, error = %e, "Action failed");
                    failed.push((action, e.to_string()));
                }
            }
        }

        (taken, failed)
    }

    /// Get the policy.
    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    directory: Option<Arc<dyn GroupDirectory>>,
    filter: String,
    postfixes: Vec<String>,
    prefix: String,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    ///
    /// Defaults: filter `.*`, no postfixes, empty prefix.
    pub fn new() -> Self {
        Self {
            directory: None,
            filter: ".*".to_string(),
            postfixes: Vec::new(),
            prefix: String::new(),
        }
    }

    /// Set the group directory.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn GroupDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Set the namespace filter pattern.
    #[must_use]
    pub fn filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = pattern.into();
        self
    }

    /// Append a group postfix.
    #[must_use]
    pub fn postfix(mut self, postfix: impl Into<String>) -> Self {
        self.postfixes.push(postfix.into());
        self
    }

    /// Replace the group postfixes.
    #[must_use]
    pub fn postfixes<I, S>(mut self, postfixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.postfixes = postfixes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the deletion prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Fails if no directory was set, the filter does not compile, or the
    /// postfixes are invalid.
    pub fn build(self) -> Result<Reconciler> {
        let directory = self
            .directory
            .ok_or_else(|| Error::invalid_config("group directory is required"))?;
        let policy = SyncPolicy::new(&self.filter, self.postfixes, self.prefix)?;

        Ok(Reconciler::new(directory, policy))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
