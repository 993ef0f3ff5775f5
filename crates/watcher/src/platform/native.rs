//! Native backend on `notify::RecommendedWatcher`
//!
//! inotify on Linux, FSEvents on macOS, ReadDirectoryChangesW on Windows.
//!
//! One save must map to one pulse. inotify reports a rewrite of an existing
//! file as a truncate plus one modify per `write(2)`, so on Linux only the
//! close of a file opened for writing counts as a modification. Other
//! platforms count their modify events directly.

use super::{ChangeBackend, EventSink, Subscription};
use crate::{ChangeKind, WatchError};
#[cfg(not(target_os = "linux"))]
use notify::event::MetadataKind;
#[cfg(target_os = "linux")]
use notify::event::{AccessKind, AccessMode};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Backend using the platform's native file-event API
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ChangeBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn subscribe(&self, dir: &Path, sink: EventSink) -> Result<Subscription, WatchError> {
        let watched = WatchedDir::new(dir);
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => forward(&watched, &sink, event),
                Err(e) => {
                    sink.lost(e.to_string());
                }
            })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Subscription::new(watcher))
    }
}

/// The watched directory under both of its names
///
/// inotify reports paths under the name that was watched, FSEvents under
/// the canonical one (`/private/var/...` for `/var/...`).
#[derive(Debug, Clone)]
struct WatchedDir {
    given: PathBuf,
    canonical: Option<PathBuf>,
}

impl WatchedDir {
    fn new(dir: &Path) -> Self {
        let canonical = dir.canonicalize().ok().filter(|c| c != dir);
        Self {
            given: dir.to_path_buf(),
            canonical,
        }
    }

    fn is(&self, path: &Path) -> bool {
        path == self.given || self.canonical.as_deref() == Some(path)
    }

    fn contains(&self, path: &Path) -> bool {
        path.parent().is_some_and(|parent| self.is(parent))
    }

    fn exists(&self) -> bool {
        self.given.is_dir()
    }

    fn display(&self) -> std::path::Display<'_> {
        self.given.display()
    }
}

/// Map a notify event kind onto the backend-neutral kind
#[cfg(target_os = "linux")]
fn classify(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => ChangeKind::Modify,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Create,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Remove,
        EventKind::Remove(_) => ChangeKind::Remove,
        // A created file is written and closed before it is complete; the
        // close is what counts.
        _ => ChangeKind::Other,
    }
}

/// Map a notify event kind onto the backend-neutral kind
#[cfg(not(target_os = "linux"))]
fn classify(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) => ChangeKind::Create,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Create,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Remove,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Other,
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)) => ChangeKind::Modify,
        EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::Other,
        EventKind::Modify(_) => ChangeKind::Modify,
        EventKind::Remove(_) => ChangeKind::Remove,
        _ => ChangeKind::Other,
    }
}

/// Split one notify event into per-entry changes
///
/// A rename reported with both ends becomes a removal of the old name and a
/// creation of the new one.
fn entries(event: &Event) -> Vec<(PathBuf, ChangeKind)> {
    if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind {
        if let [from, to] = event.paths.as_slice() {
            return vec![
                (from.clone(), ChangeKind::Remove),
                (to.clone(), ChangeKind::Create),
            ];
        }
    }

    let kind = classify(&event.kind);
    event.paths.iter().map(|path| (path.clone(), kind)).collect()
}

fn forward(watched: &WatchedDir, sink: &EventSink, event: Event) {
    trace!("{:?} {:?}", event.kind, event.paths);

    for (path, kind) in entries(&event) {
        if kind == ChangeKind::Remove && (watched.is(&path) || !watched.exists()) {
            sink.lost(format!("{} was removed", watched.display()));
            return;
        }

        if !watched.contains(&path) {
            continue;
        }
        if let Some(name) = path.file_name() {
            sink.change(name, kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SinkMessage;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use tokio::sync::mpsc;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_counts_write_closes_only() {
        assert_eq!(
            classify(&EventKind::Access(AccessKind::Close(AccessMode::Write))),
            ChangeKind::Modify
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Any))),
            ChangeKind::Other
        );
        assert_eq!(classify(&EventKind::Modify(ModifyKind::Any)), ChangeKind::Other);
        assert_eq!(classify(&EventKind::Create(CreateKind::File)), ChangeKind::Other);
        assert_eq!(
            classify(&EventKind::Access(AccessKind::Close(AccessMode::Read))),
            ChangeKind::Other
        );
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn test_classify_content_writes() {
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            ChangeKind::Modify
        );
        assert_eq!(classify(&EventKind::Modify(ModifyKind::Any)), ChangeKind::Modify);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime))),
            ChangeKind::Modify
        );
        assert_eq!(classify(&EventKind::Create(CreateKind::File)), ChangeKind::Create);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            ChangeKind::Other
        );
    }

    #[test]
    fn test_classify_renames_and_removals() {
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            ChangeKind::Create
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            ChangeKind::Remove
        );
        assert_eq!(classify(&EventKind::Remove(RemoveKind::File)), ChangeKind::Remove);
        assert_eq!(classify(&EventKind::Any), ChangeKind::Other);
    }

    #[test]
    fn test_rename_with_both_ends() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/game/user/stats0.tmp"))
            .add_path(PathBuf::from("/game/user/stats0"));

        let entries = entries(&event);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, ChangeKind::Remove);
        assert_eq!(entries[1], (PathBuf::from("/game/user/stats0"), ChangeKind::Create));
    }

    #[cfg(unix)]
    #[test]
    fn test_events_under_canonical_name_are_forwarded() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        std::fs::create_dir(&real).unwrap();
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let watched = WatchedDir::new(&link);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);

        let canonical = real.canonicalize().unwrap();
        let event = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(canonical.join("stats0"));
        forward(&watched, &sink, event);
        let event = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(link.join("stats0"));
        forward(&watched, &sink, event);
        let event = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(temp_dir.path().join("elsewhere").join("stats0"));
        forward(&watched, &sink, event);

        for _ in 0..2 {
            match rx.try_recv().unwrap() {
                SinkMessage::Change { name, kind, .. } => {
                    assert_eq!(name, "stats0");
                    assert_eq!(kind, ChangeKind::Remove);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(rx.try_recv().is_err());
    }
}
