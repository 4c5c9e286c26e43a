//! Namespace sources.

use async_trait::async_trait;
use nsgroup_events::{EventFeed, NamespaceEvent, NamespaceEventStream};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Lists the namespaces currently in the cluster.
#[async_trait]
pub trait NamespaceLister: Send + Sync {
    /// All namespace names, in the order the cluster returns them.
    async fn list(&self) -> Result<Vec<String>>;
}

/// Opens the namespace event stream.
///
/// Called once, after the initial sync has finished.
#[async_trait]
pub trait NamespaceWatcher: Send + Sync {
    /// Open a stream of namespace lifecycle events.
    async fn watch(&self) -> Result<NamespaceEventStream>;
}

/// Fixed namespace list and a scripted event sequence.
///
/// The event sequence is handed out by the first `watch` call; later calls
/// get an empty stream.
pub struct StaticNamespaceSource {
    namespaces: Vec<String>,
    events: Mutex<Option<NamespaceEventStream>>,
    fail_list: bool,
}

impl StaticNamespaceSource {
    /// Source with `namespaces` and no events.
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
            events: Mutex::new(None),
            fail_list: false,
        }
    }

    /// Replay `events` from `watch`.
    #[must_use]
    pub fn with_events(self, events: Vec<NamespaceEvent>) -> Self {
        self.with_stream(EventFeed::replay(events))
    }

    /// Hand out `stream` from `watch`.
    #[must_use]
    pub fn with_stream(mut self, stream: NamespaceEventStream) -> Self {
        self.events = Mutex::new(Some(stream));
        self
    }

    /// Make `list` fail.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_list = true;
        self
    }
}

#[async_trait]
impl NamespaceLister for StaticNamespaceSource {
    async fn list(&self) -> Result<Vec<String>> {
        if self.fail_list {
            return Err(Error::namespace_source("injected failure"));
        }
        Ok(self.namespaces.clone())
    }
}

#[async_trait]
impl NamespaceWatcher for StaticNamespaceSource {
    async fn watch(&self) -> Result<NamespaceEventStream> {
        Ok(self
            .events
            .lock()
            .await
            .take()
            .unwrap_or_else(|| EventFeed::replay(Vec::new())))
    }
}
