//! Core types for the reconciler.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A single change to the group directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "group", rename_all = "lowercase")]
pub enum GroupAction {
    /// Create a group.
    Create(String),
    /// Delete a group.
    Delete(String),
}

impl GroupAction {
    /// Create action for `group`.
    pub fn create(group: impl Into<String>) -> Self {
        Self::Create(group.into())
    }

    /// Delete action for `group`.
    pub fn delete(group: impl Into<String>) -> Self {
        Self::Delete(group.into())
    }

    /// The group this action targets.
    pub fn group(&self) -> &str {
        match self {
            Self::Create(group) | Self::Delete(group) => group,
        }
    }

    /// Whether this is a create.
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create(_))
    }

    /// Whether this is a delete.
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete(_))
    }

    /// Get a description of the action.
    pub fn description(&self) -> String {
        match self {
            Self::Create(group) => format!("create group {group}"),
            Self::Delete(group) => format!("delete group {group}"),
        }
    }
}

impl fmt::Display for GroupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Outcome of a bulk sync or a single event, with partial success support.
///
/// Every attempted action lands in exactly one of `actions_taken` or
/// `actions_failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Actions that succeeded.
    pub actions_taken: Vec<GroupAction>,
    /// Actions that failed, with the reason.
    pub actions_failed: Vec<(GroupAction, String)>,
    /// Number of groups in the desired set.
    pub desired_count: usize,
    /// Number of groups that existed before any action.
    pub existing_count: usize,
}

impl SyncReport {
    /// Create a new report.
    pub fn new(
        actions_taken: Vec<GroupAction>,
        actions_failed: Vec<(GroupAction, String)>,
        desired_count: usize,
        existing_count: usize,
    ) -> Self {
        Self {
            actions_taken,
            actions_failed,
            desired_count,
            existing_count,
        }
    }

    /// A report with no actions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// No action was needed.
    pub fn converged(&self) -> bool {
        self.actions_taken.is_empty() && self.actions_failed.is_empty()
    }

    /// Check if all actions succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.actions_failed.is_empty()
    }

    /// Total number of attempted actions.
    pub fn attempted(&self) -> usize {
        self.actions_taken
            .len()
            .saturating_add(self.actions_failed.len())
    }

    /// Every attempted action: the successful ones first, then the failed
    /// ones, each group in the order it was issued.
    pub fn attempted_actions(&self) -> impl Iterator<Item = &GroupAction> {
        self.actions_taken
            .iter()
            .chain(self.actions_failed.iter().map(|(action, _)| action))
    }

    /// Groups created successfully.
    pub fn created(&self) -> Vec<&str> {
        self.actions_taken
            .iter()
            .filter(|a| a.is_create())
            .map(GroupAction::group)
            .collect_vec()
    }

    /// Groups deleted successfully.
    pub fn deleted(&self) -> Vec<&str> {
        self.actions_taken
            .iter()
            .filter(|a| a.is_delete())
            .map(GroupAction::group)
            .collect_vec()
    }

    /// Groups whose action failed.
    pub fn failed_groups(&self) -> Vec<&str> {
        self.actions_failed
            .iter()
            .map(|(action, _)| action.group())
            .collect_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_accessors() {
        let action = GroupAction::create("team-a-admins");
        assert_eq!(action.group(), "team-a-admins");
        assert!(action.is_create());
        assert!(!action.is_delete());
        assert_eq!(action.to_string(), "create group team-a-admins");
    }

    #[test]
    fn test_report_counts() {
        let report = SyncReport::new(
            vec![GroupAction::create("a"), GroupAction::delete("b")],
            vec![(GroupAction::create("c"), "HTTP 500".to_string())],
            2,
            1,
        );

        assert!(!report.converged());
        assert!(!report.all_succeeded());
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.created(), vec!["a"]);
        assert_eq!(report.deleted(), vec!["b"]);
        assert_eq!(report.failed_groups(), vec!["c"]);
    }

    #[test]
    fn test_attempted_actions_lists_successes_before_failures() {
        let report = SyncReport::new(
            vec![GroupAction::delete("b")],
            vec![
                (GroupAction::create("a"), "HTTP 500".to_string()),
                (GroupAction::create("c"), "HTTP 503".to_string()),
            ],
            0,
            0,
        );

        let groups: Vec<&str> = report.attempted_actions().map(GroupAction::group).collect();
        assert_eq!(groups, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_empty_report_is_converged() {
        let report = SyncReport::empty();
        assert!(report.converged());
        assert!(report.all_succeeded());
        assert_eq!(report.attempted_actions().count(), 0);
    }
}
