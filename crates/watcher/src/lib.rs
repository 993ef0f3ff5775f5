//! Pulse-driven split detection for splitter
//!
//! This crate provides:
//! - Per-path pulse detection (burst counting inside a debounce window)
//! - Path watchers that survive directory loss and recreation
//! - A supervisor that retries inactive watches on a fixed period
//! - A change-backend capability with a native `notify` implementation

pub mod debounce;
pub mod error;
pub mod filter;
pub mod path_watcher;
pub mod platform;
pub mod supervisor;

pub use debounce::{PulseDetector, PulseSnapshot, SplitCallback};
pub use error::WatchError;
pub use filter::PulseFilter;
pub use path_watcher::{PathWatcher, StartOutcome};
pub use platform::{ChangeBackend, EventSink, MemoryBackend, NativeBackend, Subscription};
pub use supervisor::{Supervisor, SweepReport, TargetStatus, WatchSettings};

/// Kind of change reported by a backend for one directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Entry created (or renamed into place)
    Create,
    /// Entry content modified
    Modify,
    /// Entry deleted (or renamed away)
    Remove,
    /// Anything else (access, attribute changes, ...)
    Other,
}

/// Receiver of split decisions
///
/// Implementations perform the actual platform action (keystroke, command,
/// ...). Called concurrently from any watched path; each call is one
/// independent split.
pub trait SplitEmitter: Send + Sync {
    fn emit_split(&self);
}
