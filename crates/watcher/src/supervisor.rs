//! Watch supervisor
//!
//! Owns every candidate directory's [`PathWatcher`], retries the inactive
//! ones on a fixed period, and is the single place splits are emitted from.
//! Directories that do not exist at startup, or that disappear later (a
//! save reset deletes and recreates them), are picked up by the next sweep
//! without a restart.

use crate::debounce::{PulseDetector, SplitCallback};
use crate::filter::PulseFilter;
use crate::path_watcher::{PathWatcher, StartOutcome};
use crate::platform::ChangeBackend;
use crate::SplitEmitter;
use indexmap::IndexMap;
use parking_lot::RwLock;
use splitter_core::paths::normalize;
use splitter_core::SystemConfig;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Watch parameters shared by every target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    /// Maximum gap between pulses of one burst
    pub pulse_window: Duration,
    /// Sweep period
    pub rescan_interval: Duration,
    pub target_file: String,
    pub count_creates: bool,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self::from(&SystemConfig::default())
    }
}

impl From<&SystemConfig> for WatchSettings {
    fn from(config: &SystemConfig) -> Self {
        Self {
            pulse_window: config.pulse_window(),
            rescan_interval: config.rescan_interval(),
            target_file: config.target_file.clone(),
            count_creates: config.count_creates,
        }
    }
}

/// Status of one target, for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStatus {
    pub path: PathBuf,
    pub active: bool,
    pub pulse_count: u32,
    pub splits: u64,
}

/// Outcome counts of one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Watches established by this sweep
    pub started: usize,
    /// Watches that were already live
    pub active: usize,
    /// Targets still waiting for their directory or file
    pub pending: usize,
    /// Active watches found without a directory
    pub lost: usize,
    /// Backend refusals
    pub failed: usize,
}

impl SweepReport {
    fn record(&mut self, outcome: &StartOutcome) {
        match outcome {
            StartOutcome::Started => self.started += 1,
            StartOutcome::AlreadyActive | StartOutcome::InProgress => self.active += 1,
            StartOutcome::NotAvailable => self.pending += 1,
            StartOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Supervisor over all watched directories
pub struct Supervisor {
    /// Insertion-ordered path -> watcher
    targets: RwLock<IndexMap<PathBuf, Arc<PathWatcher>>>,
    settings: WatchSettings,
    backend: Arc<dyn ChangeBackend>,
    emitter: Arc<dyn SplitEmitter>,
    splits: AtomicU64,
    runtime: Handle,
    /// Handed to split callbacks without creating a cycle
    me: Weak<Supervisor>,
}

impl Supervisor {
    /// Create a supervisor
    ///
    /// Must be called from within a tokio runtime; watchers and split
    /// timers are spawned on it.
    pub fn new(
        settings: WatchSettings,
        backend: Arc<dyn ChangeBackend>,
        emitter: Arc<dyn SplitEmitter>,
    ) -> Arc<Self> {
        let runtime = Handle::current();
        Arc::new_cyclic(|me| Self {
            targets: RwLock::new(IndexMap::new()),
            settings,
            backend,
            emitter,
            splits: AtomicU64::new(0),
            runtime,
            me: me.clone(),
        })
    }

    /// Add a directory and try to start watching it right away
    ///
    /// Returns false if the (normalized) path was already registered.
    pub fn register_path(&self, path: impl AsRef<Path>) -> bool {
        let path = normalize(path.as_ref());

        let watcher = {
            let mut targets = self.targets.write();
            if targets.contains_key(&path) {
                debug!("{} already on watch list", path.display());
                return false;
            }
            let watcher = Arc::new(self.build_watcher(path.clone()));
            targets.insert(path.clone(), Arc::clone(&watcher));
            watcher
        };

        info!("Adding {} to watch list", path.display());
        watcher.try_start();
        true
    }

    fn build_watcher(&self, path: PathBuf) -> PathWatcher {
        let me = self.me.clone();
        let source = path.clone();
        let on_split: SplitCallback = Arc::new(move || {
            if let Some(supervisor) = me.upgrade() {
                supervisor.emit_split(&source);
            }
        });

        PathWatcher::new(
            path,
            PulseFilter::new(&self.settings.target_file, self.settings.count_creates),
            PulseDetector::new(self.settings.pulse_window, self.runtime.clone(), on_split),
            Arc::clone(&self.backend),
            self.runtime.clone(),
        )
    }

    /// Retry every inactive target once
    ///
    /// Each target is handled on its own blocking task, outside the map
    /// lock, so a slow filesystem on one path does not hold up the others.
    /// Active targets whose directory vanished are reported lost first.
    pub async fn sweep(&self) -> SweepReport {
        let targets: Vec<Arc<PathWatcher>> = self.targets.read().values().cloned().collect();

        let handles: Vec<_> = targets
            .into_iter()
            .map(|target| {
                tokio::task::spawn_blocking(move || {
                    let lost = target.probe();
                    (lost, target.try_start())
                })
            })
            .collect();

        let mut report = SweepReport::default();
        for handle in handles {
            match handle.await {
                Ok((lost, outcome)) => {
                    if lost {
                        report.lost += 1;
                    }
                    report.record(&outcome);
                }
                Err(e) => warn!("Sweep task failed: {}", e),
            }
        }
        report
    }

    /// Sweep on the configured period until `shutdown` completes
    ///
    /// Sweeps are spawned rather than awaited so one stuck start attempt
    /// cannot delay the next sweep.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) {
        let mut timer = interval(self.settings.rescan_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick is immediate; registration already tried every path
        timer.tick().await;

        info!(
            "Watching {} path(s), rescanning every {:?}",
            self.targets.read().len(),
            self.settings.rescan_interval
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = timer.tick() => {
                    let supervisor = Arc::clone(&self);
                    tokio::spawn(async move {
                        let report = supervisor.sweep().await;
                        if report.started > 0 || report.lost > 0 {
                            info!(
                                "Sweep: {} started, {} lost, {} pending",
                                report.started, report.lost, report.pending
                            );
                        } else {
                            debug!("Sweep: {:?}", report);
                        }
                    });
                }
            }
        }

        info!("Supervisor stopped after {} split(s)", self.split_count());
    }

    /// Forward one split to the emitter
    ///
    /// Called from any target's timer; calls are independent and never
    /// coalesced.
    pub fn emit_split(&self, source: &Path) {
        let total = self.splits.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Split from {} (#{})", source.display(), total);
        self.emitter.emit_split();
    }

    /// Splits emitted since startup
    pub fn split_count(&self) -> u64 {
        self.splits.load(Ordering::Relaxed)
    }

    pub fn target(&self, path: impl AsRef<Path>) -> Option<Arc<PathWatcher>> {
        self.targets.read().get(&normalize(path.as_ref())).cloned()
    }

    /// Snapshot of every target, in registration order
    pub fn targets(&self) -> Vec<TargetStatus> {
        let targets: Vec<Arc<PathWatcher>> = self.targets.read().values().cloned().collect();
        targets
            .iter()
            .map(|watcher| {
                let pulses = watcher.pulse_snapshot();
                TargetStatus {
                    path: watcher.path().to_path_buf(),
                    active: watcher.is_active(),
                    pulse_count: pulses.pulse_count,
                    splits: pulses.splits,
                }
            })
            .collect()
    }
}
