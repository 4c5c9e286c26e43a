//! Namespace-to-group reconciliation.
//!
//! This crate keeps an identity provider's groups in step with the
//! namespaces of a cluster, following a Kubernetes-style reconcile pattern:
//!
//! - **Desired State**: `{namespace}-{postfix}` for every namespace passing the
//!   filter and every configured postfix
//! - **Actual State**: the groups the directory currently holds, read fresh
//!   before every decision
//! - **Diff**: create what is missing, delete what is stale inside the prefix
//! - **Actions**: applied one by one; a failed action is logged and recorded,
//!   never fatal to the batch
//!
//! # Lifecycle
//!
//! [`SyncLoop`] runs a bulk sync at startup, then consumes namespace events
//! one at a time until the stream ends:
//!
//! 1. `Starting` → `Syncing`: list namespaces, filter, bulk sync
//! 2. `Syncing` → `Watching`: open the event stream
//! 3. `Watching`: `Added` creates missing groups, `Deleted` deletes the
//!    namespace's groups, `Modified` changes nothing
//! 4. `Terminated`: the stream closed or the loop was stopped
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nsgroup_reconciler::{
//!     InMemoryGroupDirectory, LoopConfig, ReconcilerBuilder, StaticNamespaceSource, SyncLoop,
//! };
//!
//! #[tokio::main]
//! async fn main() -> nsgroup_reconciler::Result<()> {
//!     let directory = Arc::new(InMemoryGroupDirectory::new());
//!     let reconciler = ReconcilerBuilder::new()
//!         .with_directory(directory)
//!         .filter("^team-")
//!         .postfixes(["admins", "viewers"])
//!         .prefix("team-")
//!         .build()?;
//!
//!     let source = Arc::new(StaticNamespaceSource::new(["team-a", "team-b"]));
//!     let mut sync_loop =
//!         SyncLoop::new(Arc::new(reconciler), source.clone(), source, LoopConfig::default());
//!     let summary = sync_loop.run().await?;
//!     println!("created {:?}", summary.initial_sync.created());
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod directory;
pub mod error;
pub mod r#loop;
pub mod policy;
pub mod reconciler;
pub mod source;
pub mod types;

// Re-export main types
pub use directory::{DirectoryCall, GroupDirectory, InMemoryGroupDirectory};
pub use error::{Error, Result};
pub use r#loop::{LoopConfig, LoopState, LoopStopper, LoopSummary, SyncLoop};
pub use policy::{
    compute_diff, derive_group_names, group_name, GroupDiff, NamespaceFilter, SyncPolicy,
};
pub use reconciler::{filter_namespaces, Reconciler, ReconcilerBuilder};
pub use source::{NamespaceLister, NamespaceWatcher, StaticNamespaceSource};
pub use types::{GroupAction, SyncReport};
