//! Group naming policy.
//!
//! Pure functions that turn namespace names into desired group names and
//! compare them against the groups that already exist. Nothing in here does
//! I/O; the [`Reconciler`](crate::Reconciler) feeds it live data.

use std::collections::BTreeSet;

use itertools::Itertools;
use regex::Regex;

use crate::error::{Error, Result};
use crate::types::GroupAction;

/// Separator between the namespace and the postfix in a group name.
pub const SEPARATOR: char = '-';

/// Group name for one (namespace, postfix) pair.
pub fn group_name(namespace: &str, postfix: &str) -> String {
    format!("{namespace}{SEPARATOR}{postfix}")
}

/// Every `{namespace}-{postfix}` combination as a set.
pub fn derive_group_names<N, P>(namespaces: N, postfixes: &[P]) -> BTreeSet<String>
where
    N: IntoIterator,
    N::Item: AsRef<str>,
    P: AsRef<str>,
{
    namespaces
        .into_iter()
        .map(|ns| ns.as_ref().to_owned())
        .cartesian_product(postfixes.iter())
        .map(|(ns, postfix)| group_name(&ns, postfix.as_ref()))
        .collect()
}

/// Groups to create and delete to turn `existing` into `desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDiff {
    /// Desired groups that do not exist yet.
    pub to_create: BTreeSet<String>,
    /// Existing groups inside the prefix that are no longer desired.
    pub to_delete: BTreeSet<String>,
}

impl GroupDiff {
    /// Whether nothing needs to change.
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of changes.
    pub fn len(&self) -> usize {
        self.to_create.len().saturating_add(self.to_delete.len())
    }

    /// Creates first, then deletes, each in name order.
    pub fn actions(&self) -> Vec<GroupAction> {
        self.to_create
            .iter()
            .map(|group| GroupAction::create(group.as_str()))
            .chain(
                self.to_delete
                    .iter()
                    .map(|group| GroupAction::delete(group.as_str())),
            )
            .collect_vec()
    }
}

/// Compare desired against existing groups.
///
/// Existing groups that do not start with `prefix` are left alone even when
/// they are not desired.
pub fn compute_diff(
    desired: &BTreeSet<String>,
    existing: &BTreeSet<String>,
    prefix: &str,
) -> GroupDiff {
    let to_create = desired.difference(existing).cloned().collect();
    let to_delete = existing
        .iter()
        .filter(|name| name.starts_with(prefix) && !desired.contains(name.as_str()))
        .cloned()
        .collect();

    GroupDiff {
        to_create,
        to_delete,
    }
}

/// Compiled namespace filter.
#[derive(Debug, Clone)]
pub struct NamespaceFilter {
    regex: Regex,
}

impl NamespaceFilter {
    /// Compile a filter from a regular expression.
    ///
    /// The pattern is unanchored: `team-` matches `my-team-a`.
    pub fn new(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(|regex| Self { regex })
            .map_err(|e| Error::invalid_filter(pattern, e.to_string()))
    }

    /// Whether `namespace` passes the filter.
    pub fn matches(&self, namespace: &str) -> bool {
        self.regex.is_match(namespace)
    }

    /// Keep the namespaces that pass, in their original order.
    pub fn apply<I>(&self, namespaces: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        namespaces
            .into_iter()
            .filter(|ns| self.matches(ns))
            .collect_vec()
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Immutable naming and filtering policy for one process.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    filter: NamespaceFilter,
    postfixes: Vec<String>,
    prefix: String,
}

impl SyncPolicy {
    /// Build a policy, compiling the filter and validating the postfixes.
    pub fn new(
        filter_pattern: &str,
        postfixes: impl IntoIterator<Item = impl Into<String>>,
        prefix: impl Into<String>,
    ) -> Result<Self> {
        let filter = NamespaceFilter::new(filter_pattern)?;
        let postfixes = postfixes.into_iter().map(Into::into).collect_vec();

        if postfixes.is_empty() {
            return Err(Error::invalid_config("at least one group postfix is required"));
        }
        if postfixes.iter().any(String::is_empty) {
            return Err(Error::invalid_config("group postfixes must not be empty"));
        }

        Ok(Self {
            filter,
            postfixes,
            prefix: prefix.into(),
        })
    }

    /// The namespace filter.
    pub fn filter(&self) -> &NamespaceFilter {
        &self.filter
    }

    /// Configured postfixes, in order.
    pub fn postfixes(&self) -> &[String] {
        &self.postfixes
    }

    /// Prefix that scopes deletions.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Group names for a single namespace, in postfix order.
    pub fn groups_for(&self, namespace: &str) -> Vec<String> {
        self.postfixes
            .iter()
            .map(|postfix| group_name(namespace, postfix))
            .collect_vec()
    }

    /// Desired set for a list of namespaces.
    pub fn desired_groups<N>(&self, namespaces: N) -> BTreeSet<String>
    where
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        derive_group_names(namespaces, &self.postfixes)
    }
}
