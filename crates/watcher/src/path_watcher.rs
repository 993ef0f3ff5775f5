//! Single-directory watch
//!
//! A `PathWatcher` owns at most one backend subscription for its directory
//! and feeds qualifying events to its pulse detector.
//!
//! ```text
//! INACTIVE --try_start (target file present)--> ACTIVE
//! ACTIVE   --on_subscription_error-----------> INACTIVE
//! ```
//!
//! Every established subscription gets a new generation number. Messages
//! and loss reports from an older generation are ignored, so a late report
//! from a replaced subscription cannot tear down its successor.

use crate::debounce::{PulseDetector, PulseSnapshot};
use crate::filter::PulseFilter;
use crate::platform::{ChangeBackend, EventSink, SinkMessage, Subscription};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Result of a start attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// New subscription established
    Started,
    /// Already watching; nothing changed
    AlreadyActive,
    /// Another start attempt is running for this path
    InProgress,
    /// Target file does not exist (yet)
    NotAvailable,
    /// Backend refused the subscription
    Failed(String),
}

#[derive(Default)]
struct Slot {
    subscription: Option<Subscription>,
    generation: u64,
}

/// Watch on one candidate directory
pub struct PathWatcher {
    path: PathBuf,
    filter: PulseFilter,
    detector: PulseDetector,
    backend: Arc<dyn ChangeBackend>,
    slot: Mutex<Slot>,
    starting: AtomicBool,
    runtime: Handle,
}

impl PathWatcher {
    pub fn new(
        path: PathBuf,
        filter: PulseFilter,
        detector: PulseDetector,
        backend: Arc<dyn ChangeBackend>,
        runtime: Handle,
    ) -> Self {
        Self {
            path,
            filter,
            detector,
            backend,
            slot: Mutex::new(Slot::default()),
            starting: AtomicBool::new(false),
            runtime,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.slot.lock().subscription.is_some()
    }

    pub fn pulse_snapshot(&self) -> PulseSnapshot {
        self.detector.snapshot()
    }

    /// Location of the monitored file
    pub fn target_path(&self) -> PathBuf {
        self.path.join(self.filter.target_file())
    }

    /// Establish the subscription if the target file exists
    ///
    /// Idempotent: an active watcher is left untouched. The existence check
    /// and the backend call run without holding the watcher lock.
    pub fn try_start(self: &Arc<Self>) -> StartOutcome {
        if self.starting.swap(true, Ordering::AcqRel) {
            return StartOutcome::InProgress;
        }

        // Checked under the claim: a start that finished just before ours
        // must not be followed by a second subscribe.
        let outcome = if self.is_active() {
            StartOutcome::AlreadyActive
        } else {
            self.start_subscription()
        };
        self.starting.store(false, Ordering::Release);
        outcome
    }

    fn start_subscription(self: &Arc<Self>) -> StartOutcome {
        if !self.target_path().is_file() {
            debug!("{} not available yet", self.target_path().display());
            return StartOutcome::NotAvailable;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = match self.backend.subscribe(&self.path, EventSink::new(tx)) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("Failed to watch {}: {}", self.path.display(), e);
                return StartOutcome::Failed(e.to_string());
            }
        };

        let generation = {
            let mut slot = self.slot.lock();
            if slot.subscription.is_some() {
                // Lost a race with another start; ours is dropped below
                None
            } else {
                slot.generation += 1;
                slot.subscription = Some(subscription);
                Some(slot.generation)
            }
        };

        let Some(generation) = generation else {
            return StartOutcome::AlreadyActive;
        };

        // Messages queue in the channel until the drain task runs, so the
        // reset always precedes the first event of this subscription.
        self.detector.reset();
        self.runtime
            .spawn(Arc::clone(self).drain(generation, rx));

        info!(
            "Start watch path {} ({} backend)",
            self.path.display(),
            self.backend.name()
        );
        StartOutcome::Started
    }

    /// Mark the watch lost and release its subscription
    ///
    /// Returns false if the watcher was not active. Pulse state is left for
    /// the next successful start to reset.
    pub fn on_subscription_error(&self, reason: &str) -> bool {
        let generation = self.slot.lock().generation;
        self.lose(generation, reason)
    }

    /// Report loss if the directory has disappeared under an active watch
    pub fn probe(&self) -> bool {
        if self.is_active() && !self.path.is_dir() {
            return self.on_subscription_error("directory no longer exists");
        }
        false
    }

    fn lose(&self, generation: u64, reason: &str) -> bool {
        let released = {
            let mut slot = self.slot.lock();
            if slot.generation != generation {
                return false;
            }
            slot.subscription.take()
        };

        match released {
            Some(subscription) => {
                warn!("Lost directory {}: {}", self.path.display(), reason);
                drop(subscription);
                true
            }
            None => false,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        let slot = self.slot.lock();
        slot.generation == generation && slot.subscription.is_some()
    }

    /// Process one subscription's messages in delivery order
    async fn drain(self: Arc<Self>, generation: u64, mut rx: mpsc::UnboundedReceiver<SinkMessage>) {
        while let Some(message) = rx.recv().await {
            if !self.is_current(generation) {
                break;
            }

            match message {
                SinkMessage::Change { name, kind, at } => {
                    if self.filter.qualifies(&name, kind) {
                        self.detector.on_raw_event(at);
                    } else {
                        trace!("Ignoring {:?} on {:?}", kind, name);
                    }
                }
                SinkMessage::Lost { reason } => {
                    self.lose(generation, &reason);
                    break;
                }
            }
        }
    }
}
