//! In-memory backend
//!
//! Events are injected by hand. Used for dry runs and for exercising the
//! supervisor without depending on filesystem event timing.

use super::{ChangeBackend, EventSink, Subscription};
use crate::{ChangeKind, WatchError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Registry {
    /// dir -> live subscriptions (id, sink)
    live: HashMap<PathBuf, Vec<(u64, EventSink)>>,
    /// Directories whose next subscribe attempt fails
    refuse: Vec<PathBuf>,
}

/// Backend whose events come from [`MemoryBackend::emit`]
#[derive(Clone, Default)]
pub struct MemoryBackend {
    registry: Arc<Mutex<Registry>>,
    next_id: Arc<AtomicU64>,
    subscribes: Arc<AtomicU64>,
}

/// Removes its subscription from the registry when dropped
struct MemoryGuard {
    registry: Arc<Mutex<Registry>>,
    dir: PathBuf,
    id: u64,
}

impl Drop for MemoryGuard {
    fn drop(&mut self) {
        let mut registry = self.registry.lock();
        if let Some(subs) = registry.live.get_mut(&self.dir) {
            subs.retain(|(id, _)| *id != self.id);
            if subs.is_empty() {
                registry.live.remove(&self.dir);
            }
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a change to every live subscription on `dir`
    ///
    /// Returns the number of subscriptions reached.
    pub fn emit(&self, dir: &Path, name: &str, kind: ChangeKind) -> usize {
        self.sinks(dir)
            .iter()
            .filter(|sink| sink.change(name, kind))
            .count()
    }

    /// Report subscription loss on `dir`
    pub fn fail(&self, dir: &Path, reason: &str) -> usize {
        self.sinks(dir)
            .iter()
            .filter(|sink| sink.lost(reason))
            .count()
    }

    /// Make the next subscribe attempt on `dir` fail
    pub fn refuse_next(&self, dir: &Path) {
        self.registry.lock().refuse.push(dir.to_path_buf());
    }

    /// Live subscriptions on `dir`
    pub fn live_subscriptions(&self, dir: &Path) -> usize {
        self.registry.lock().live.get(dir).map_or(0, Vec::len)
    }

    /// Subscriptions ever established, across all directories
    pub fn total_subscribes(&self) -> u64 {
        self.subscribes.load(Ordering::SeqCst)
    }

    fn sinks(&self, dir: &Path) -> Vec<EventSink> {
        self.registry
            .lock()
            .live
            .get(dir)
            .map(|subs| subs.iter().map(|(_, sink)| sink.clone()).collect())
            .unwrap_or_default()
    }
}

impl ChangeBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn subscribe(&self, dir: &Path, sink: EventSink) -> Result<Subscription, WatchError> {
        let mut registry = self.registry.lock();

        if let Some(pos) = registry.refuse.iter().position(|d| d == dir) {
            registry.refuse.remove(pos);
            return Err(WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: "refused".to_string(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        registry
            .live
            .entry(dir.to_path_buf())
            .or_default()
            .push((id, sink));
        self.subscribes.fetch_add(1, Ordering::SeqCst);

        Ok(Subscription::new(MemoryGuard {
            registry: Arc::clone(&self.registry),
            dir: dir.to_path_buf(),
            id,
        }))
    }
}
