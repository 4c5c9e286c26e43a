//! Namespace lifecycle events.
//!
//! This crate defines the events the sync loop consumes and the stream type
//! they arrive on:
//!
//! - **Event types**: [`NamespaceEvent`] and [`EventKind`]
//! - **Event stream**: [`NamespaceEventStream`], a lazy, ordered sequence that
//!   ends when its source closes
//! - **Event feed**: [`EventFeed`], an in-process bounded channel that turns
//!   published events into a [`NamespaceEventStream`]
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//! use nsgroup_events::{EventFeed, NamespaceEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (publisher, feed) = EventFeed::new(16);
//!     publisher.publish(NamespaceEvent::added("team-a")).await.unwrap();
//!     drop(publisher);
//!
//!     let mut stream = feed.into_stream();
//!     while let Some(event) = stream.next().await {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod event;
pub mod feed;

pub use error::{Error, Result};
pub use event::{EventKind, NamespaceEvent, NamespaceEventStream};
pub use feed::{EventFeed, EventPublisher};
