//! Change-notification backends
//!
//! A backend provides one capability: subscribe to entry changes inside a
//! single directory, and report when that subscription stops working.
//! Events are pushed into an [`EventSink`]; dropping the returned
//! [`Subscription`] releases the platform resources.

mod memory;
mod native;

pub use memory::MemoryBackend;
pub use native::NativeBackend;

use crate::{ChangeKind, WatchError};
use std::ffi::OsString;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Source of directory change notifications
pub trait ChangeBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Watch the entries of `dir` (non-recursively)
    fn subscribe(&self, dir: &Path, sink: EventSink) -> Result<Subscription, WatchError>;
}

/// Live subscription; dropping it stops delivery
pub struct Subscription {
    _guard: Box<dyn Send>,
}

impl Subscription {
    pub fn new(guard: impl Send + 'static) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

/// Messages from a backend to its path watcher, in delivery order
#[derive(Debug)]
pub(crate) enum SinkMessage {
    Change {
        name: OsString,
        kind: ChangeKind,
        at: Instant,
    },
    Lost {
        reason: String,
    },
}

/// Delivery end handed to a backend
///
/// Cheap to clone and callable from any thread. Events are timestamped on
/// delivery.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SinkMessage>) -> Self {
        Self { tx }
    }

    /// Report a change to the directory entry `name`
    ///
    /// Returns false once the receiving watcher is gone.
    pub fn change(&self, name: impl Into<OsString>, kind: ChangeKind) -> bool {
        self.tx
            .send(SinkMessage::Change {
                name: name.into(),
                kind,
                at: Instant::now(),
            })
            .is_ok()
    }

    /// Report that the subscription is no longer valid
    pub fn lost(&self, reason: impl Into<String>) -> bool {
        self.tx
            .send(SinkMessage::Lost {
                reason: reason.into(),
            })
            .is_ok()
    }
}
