//! Namespace listing and watching through the Kubernetes API.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, ListParams};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::Client;
use nsgroup_events::{Error as EventError, EventKind, NamespaceEvent, NamespaceEventStream};
use nsgroup_reconciler::{Error, NamespaceLister, NamespaceWatcher, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::ConnectionError;

/// Source name attached to stream errors.
pub const SOURCE: &str = "kubernetes";

/// Cluster namespaces, listed once and then watched.
///
/// The watch re-opens itself when the API server closes it, and relists when
/// its resource version has expired. Names seen by the last listing seed the
/// watch, so nothing listed is replayed as new.
#[derive(Clone)]
pub struct KubeNamespaces {
    api: Api<Namespace>,
    label_selector: Option<String>,
    listed: Arc<Mutex<BTreeSet<String>>>,
}

impl std::fmt::Debug for KubeNamespaces {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeNamespaces")
            .field("label_selector", &self.label_selector)
            .finish_non_exhaustive()
    }
}

impl KubeNamespaces {
    /// Connect using the local kubeconfig, or the in-cluster service account.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable cluster configuration is found, or the
    /// label selector is blank.
    #[instrument(skip_all)]
    pub async fn try_default(label_selector: Option<String>) -> std::result::Result<Self, ConnectionError> {
        let client = Client::try_default().await?;
        Self::new(client, label_selector)
    }

    /// Wrap an existing client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelector` if the label selector is blank.
    pub fn new(client: Client, label_selector: Option<String>) -> std::result::Result<Self, ConnectionError> {
        if let Some(selector) = label_selector.as_deref() {
            if selector.trim().is_empty() {
                return Err(ConnectionError::InvalidSelector {
                    selector: selector.to_string(),
                    reason: "selector is blank".to_string(),
                });
            }
        }

        Ok(Self {
            api: Api::all(client),
            label_selector,
            listed: Arc::new(Mutex::new(BTreeSet::new())),
        })
    }

    fn list_params(&self) -> ListParams {
        match self.label_selector.as_deref() {
            Some(selector) => ListParams::default().labels(selector),
            None => ListParams::default(),
        }
    }

    fn watcher_config(&self) -> watcher::Config {
        match self.label_selector.as_deref() {
            Some(selector) => watcher::Config::default().labels(selector),
            None => watcher::Config::default(),
        }
    }
}

#[async_trait]
impl NamespaceLister for KubeNamespaces {
    async fn list(&self) -> Result<Vec<String>> {
        let list = self
            .api
            .list(&self.list_params())
            .await
            .map_err(|e| Error::namespace_source(format!("list namespaces: {e}")))?;

        let names: Vec<String> = list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect();

        debug!(count = names.len(), "Listed namespaces");
        *self.listed.lock().await = names.iter().cloned().collect();
        Ok(names)
    }
}

#[async_trait]
impl NamespaceWatcher for KubeNamespaces {
    async fn watch(&self) -> Result<NamespaceEventStream> {
        let mut tracker = NamespaceTracker::new(self.listed.lock().await.clone());

        info!(label_selector = ?self.label_selector, "Watching namespaces");
        Ok(watcher::watcher(self.api.clone(), self.watcher_config())
            .default_backoff()
            .flat_map(move |item| {
                let events = match item {
                    Ok(event) => tracker.observe(event),
                    Err(e) => {
                        warn!(error = %e, "Namespace watch interrupted, retrying");
                        vec![Err(EventError::source_failed(SOURCE, e.to_string()))]
                    }
                };
                futures::stream::iter(events)
            })
            .boxed())
    }
}

/// Turns watcher events into namespace events.
///
/// Keeps the set of namespaces known to exist. A relist is buffered until it
/// completes and then diffed against that set, so namespaces created or
/// removed while the watch was desynchronized still produce events.
#[derive(Debug, Default)]
pub struct NamespaceTracker {
    known: BTreeSet<String>,
    relist: Option<BTreeSet<String>>,
}

impl NamespaceTracker {
    /// Tracker that already knows `known`.
    pub fn new(known: BTreeSet<String>) -> Self {
        Self {
            known,
            relist: None,
        }
    }

    /// Namespaces currently known to exist.
    pub fn known(&self) -> &BTreeSet<String> {
        &self.known
    }

    /// Feed one watcher event; returns the namespace events it implies.
    pub fn observe(&mut self, event: Event<Namespace>) -> Vec<nsgroup_events::Result<NamespaceEvent>> {
        match event {
            Event::Apply(ns) => match name_of(ns, EventKind::Modified) {
                Ok(name) => {
                    let kind = if self.known.insert(name.clone()) {
                        EventKind::Added
                    } else {
                        EventKind::Modified
                    };
                    vec![Ok(NamespaceEvent::new(kind, name))]
                }
                Err(e) => vec![Err(e)],
            },
            Event::Delete(ns) => match name_of(ns, EventKind::Deleted) {
                Ok(name) => {
                    self.known.remove(&name);
                    vec![Ok(NamespaceEvent::deleted(name))]
                }
                Err(e) => vec![Err(e)],
            },
            Event::Init => {
                self.relist = Some(BTreeSet::new());
                Vec::new()
            }
            Event::InitApply(ns) => match name_of(ns, EventKind::Added) {
                Ok(name) => {
                    self.relist.get_or_insert_with(BTreeSet::new).insert(name);
                    Vec::new()
                }
                Err(e) => vec![Err(e)],
            },
            Event::InitDone => self.finish_relist(),
        }
    }

    fn finish_relist(&mut self) -> Vec<nsgroup_events::Result<NamespaceEvent>> {
        let Some(current) = self.relist.take() else {
            return Vec::new();
        };

        let added = current
            .difference(&self.known)
            .map(|name| Ok(NamespaceEvent::added(name.as_str())));
        let deleted = self
            .known
            .difference(&current)
            .map(|name| Ok(NamespaceEvent::deleted(name.as_str())));
        let events: Vec<_> = added.chain(deleted).collect();

        if !events.is_empty() {
            debug!(changes = events.len(), "Namespace relist found changes");
        }
        self.known = current;
        events
    }
}

fn name_of(ns: Namespace, kind: EventKind) -> nsgroup_events::Result<String> {
    ns.metadata
        .name
        .ok_or_else(|| EventError::invalid_event(format!("{kind} namespace without a name")))
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use super::*;

    fn namespace(name: Option<&str>) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: name.map(str::to_string),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        }
    }

    fn named(name: &str) -> Namespace {
        namespace(Some(name))
    }

    fn tracker(known: &[&str]) -> NamespaceTracker {
        NamespaceTracker::new(known.iter().map(|n| (*n).to_string()).collect())
    }

    fn relist(tracker: &mut NamespaceTracker, names: &[&str]) -> Vec<nsgroup_events::Result<NamespaceEvent>> {
        let mut events = tracker.observe(Event::Init);
        for name in names {
            events.extend(tracker.observe(Event::InitApply(named(name))));
        }
        events.extend(tracker.observe(Event::InitDone));
        events
    }

    #[test]
    fn test_apply_of_unknown_namespace_is_added() {
        let mut tracker = tracker(&["team-a"]);
        let events = tracker.observe(Event::Apply(named("team-b")));

        assert_eq!(events, vec![Ok(NamespaceEvent::added("team-b"))]);
        assert!(tracker.known().contains("team-b"));
    }

    #[test]
    fn test_apply_of_known_namespace_is_modified() {
        let mut tracker = tracker(&["team-a"]);
        let events = tracker.observe(Event::Apply(named("team-a")));

        assert_eq!(events, vec![Ok(NamespaceEvent::modified("team-a"))]);
    }

    #[test]
    fn test_delete_forgets_namespace() {
        let mut tracker = tracker(&["team-a"]);
        let events = tracker.observe(Event::Delete(named("team-a")));

        assert_eq!(events, vec![Ok(NamespaceEvent::deleted("team-a"))]);
        assert!(tracker.known().is_empty());
    }

    #[test]
    fn test_first_listing_matching_known_set_is_silent() {
        let mut tracker = tracker(&["team-a", "team-b"]);
        assert!(relist(&mut tracker, &["team-b", "team-a"]).is_empty());
    }

    #[test]
    fn test_relist_reports_changes_missed_while_disconnected() {
        let mut tracker = tracker(&["team-a", "team-b"]);
        let events = relist(&mut tracker, &["team-a", "team-c"]);

        assert_eq!(
            events,
            vec![
                Ok(NamespaceEvent::added("team-c")),
                Ok(NamespaceEvent::deleted("team-b")),
            ]
        );
        assert_eq!(
            tracker.known().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["team-a", "team-c"]
        );
    }

    #[test]
    fn test_events_after_relist_use_new_known_set() {
        let mut tracker = tracker(&["team-a"]);
        let _ = relist(&mut tracker, &["team-b"]);

        assert_eq!(
            tracker.observe(Event::Apply(named("team-a"))),
            vec![Ok(NamespaceEvent::added("team-a"))]
        );
        assert_eq!(
            tracker.observe(Event::Apply(named("team-b"))),
            vec![Ok(NamespaceEvent::modified("team-b"))]
        );
    }

    #[test]
    fn test_nameless_namespace_is_an_error_item() {
        let mut tracker = tracker(&[]);
        let events = tracker.observe(Event::Apply(namespace(None)));

        assert!(matches!(
            events.as_slice(),
            [Err(EventError::InvalidEvent { .. })]
        ));
        assert!(tracker.known().is_empty());
    }
}
