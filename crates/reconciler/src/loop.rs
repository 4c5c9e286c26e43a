//! Startup sync followed by event-driven reconciliation.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use nsgroup_events::NamespaceEventStream;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::reconciler::Reconciler;
use crate::source::{NamespaceLister, NamespaceWatcher};
use crate::types::SyncReport;

/// Lifecycle of a [`SyncLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Created, nothing done yet.
    Starting,
    /// Running the initial bulk sync.
    Syncing,
    /// Consuming namespace events.
    Watching,
    /// Stream closed, loop stopped, or startup failed.
    Terminated,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Syncing => write!(f, "syncing"),
            Self::Watching => write!(f, "watching"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Configuration for the sync loop.
#[derive(Debug, Clone, Default)]
pub struct LoopConfig {
    /// Give up after this many consecutive failed events. `None` never gives up.
    pub max_consecutive_failures: Option<usize>,
}

/// What happened during a loop run.
#[derive(Debug, Clone, Default)]
pub struct LoopSummary {
    /// Report of the initial bulk sync.
    pub initial_sync: SyncReport,
    /// Events handled without a handler error.
    pub events_handled: usize,
    /// Events (or stream items) that failed.
    pub events_failed: usize,
    /// Per-item action failures across all handled events.
    pub actions_failed: usize,
    /// Whether the loop ended because of a stop request.
    pub stopped: bool,
}

/// Runs the initial bulk sync, then applies namespace events one at a time.
///
/// The handler for one event finishes before the next event is read.
pub struct SyncLoop {
    reconciler: Arc<Reconciler>,
    lister: Arc<dyn NamespaceLister>,
    watcher: Arc<dyn NamespaceWatcher>,
    config: LoopConfig,
    state_tx: watch::Sender<LoopState>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl SyncLoop {
    /// Create a new sync loop.
    pub fn new(
        reconciler: Arc<Reconciler>,
        lister: Arc<dyn NamespaceLister>,
        watcher: Arc<dyn NamespaceWatcher>,
        config: LoopConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(LoopState::Starting);
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            reconciler,
            lister,
            watcher,
            config,
            state_tx,
            stop_tx,
            stop_rx,
        }
    }

    /// Sync, then watch until the stream ends or the loop is stopped.
    ///
    /// # Errors
    ///
    /// Fails if listing namespaces, the initial group listing, or opening the
    /// watch fails, or if `max_consecutive_failures` is exceeded.
    pub async fn run(&mut self) -> Result<LoopSummary> {
        let initial_sync = match self.sync_once().await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Initial sync failed");
                self.set_state(LoopState::Terminated);
                return Err(e);
            }
        };

        let events = match self.watcher.watch().await {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "Failed to open namespace watch");
                self.set_state(LoopState::Terminated);
                return Err(e);
            }
        };

        let mut summary = self.watch(events).await?;
        summary.initial_sync = initial_sync;
        Ok(summary)
    }

    /// List and filter namespaces, then run a bulk sync.
    ///
    /// # Errors
    ///
    /// Fails if listing namespaces or the initial group listing fails.
    pub async fn sync_once(&self) -> Result<SyncReport> {
        self.set_state(LoopState::Syncing);

        let all = self.lister.list().await?;
        let total = all.len();
        let namespaces = self.reconciler.filter_namespaces(all);
        info!(
            total,
            matched = namespaces.len(),
            filter = %self.reconciler.policy().filter().as_str(),
            "Listed namespaces"
        );

        self.reconciler.bulk_sync(&namespaces).await
    }

    /// Consume `events` until it ends or the loop is stopped.
    ///
    /// # Errors
    ///
    /// Fails only when `max_consecutive_failures` is exceeded.
    pub async fn watch(&mut self, mut events: NamespaceEventStream) -> Result<LoopSummary> {
        self.set_state(LoopState::Watching);
        info!("Watching for namespace changes");

        let mut summary = LoopSummary::default();
        let mut consecutive_failures = 0usize;

        loop {
            if *self.stop_rx.borrow() {
                summary.stopped = true;
                break;
            }

            let item = tokio::select! {
                biased;
                changed = self.stop_rx.changed() => {
                    if changed.is_err() || *self.stop_rx.borrow() {
                        summary.stopped = true;
                        break;
                    }
                    continue;
                }
                item = events.next() => item,
            };

            let Some(item) = item else {
                info!("Namespace event stream closed");
                break;
            };

            let outcome = match item {
                Ok(event) => {
                    debug!(event = %event, "Received namespace event");
                    self.reconciler.handle_event(&event).await
                }
                Err(e) => Err(Error::from(e)),
            };

            match outcome {
                Ok(report) => {
                    consecutive_failures = 0;
                    summary.events_handled = summary.events_handled.saturating_add(1);
                    summary.actions_failed = summary
                        .actions_failed
                        .saturating_add(report.actions_failed.len());
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    summary.events_failed = summary.events_failed.saturating_add(1);
                    warn!(
                        error = %e,
                        consecutive = consecutive_failures,
                        "Namespace event failed"
                    );

                    if let Some(max) = self.config.max_consecutive_failures {
                        if consecutive_failures >= max {
                            error!(max, "Too many consecutive failures, stopping loop");
                            self.set_state(LoopState::Terminated);
                            return Err(Error::TooManyFailures {
                                count: consecutive_failures,
                            });
                        }
                    }
                }
            }
        }

        self.set_state(LoopState::Terminated);
        info!(
            handled = summary.events_handled,
            failed = summary.events_failed,
            stopped = summary.stopped,
            "Sync loop terminated"
        );
        Ok(summary)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        *self.state_tx.borrow()
    }

    /// Receiver that observes state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.state_tx.subscribe()
    }

    /// Stop the loop before the next event.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Get a stopper handle.
    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            stop_tx: self.stop_tx.clone(),
        }
    }

    fn set_state(&self, state: LoopState) {
        debug!(%state, "Sync loop state change");
        self.state_tx.send_replace(state);
    }
}

/// Handle to stop a sync loop.
#[derive(Clone)]
pub struct LoopStopper {
    stop_tx: watch::Sender<bool>,
}

impl LoopStopper {
    /// Stop the loop.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}
