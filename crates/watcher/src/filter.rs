//! Qualifying-event filter
//!
//! Decides which backend events count as pulses: writes to the target file,
//! and optionally its creation. Creation counting is a policy switch because
//! some platforms report a save as create-then-modify and others as modify
//! only.

use crate::ChangeKind;
use std::ffi::{OsStr, OsString};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseFilter {
    target_file: OsString,
    count_creates: bool,
}

impl PulseFilter {
    pub fn new(target_file: impl Into<OsString>, count_creates: bool) -> Self {
        Self {
            target_file: target_file.into(),
            count_creates,
        }
    }

    /// Name of the file whose writes are counted
    pub fn target_file(&self) -> &OsStr {
        &self.target_file
    }

    /// Whether an event on `name` counts as a pulse
    pub fn qualifies(&self, name: &OsStr, kind: ChangeKind) -> bool {
        if name != self.target_file {
            return false;
        }

        match kind {
            ChangeKind::Modify => true,
            ChangeKind::Create => self.count_creates,
            ChangeKind::Remove | ChangeKind::Other => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modify_on_target_qualifies() {
        let filter = PulseFilter::new("stats0", false);
        assert!(filter.qualifies(OsStr::new("stats0"), ChangeKind::Modify));
    }

    #[test]
    fn test_other_files_never_qualify() {
        let filter = PulseFilter::new("stats0", true);
        assert!(!filter.qualifies(OsStr::new("stats1"), ChangeKind::Modify));
        assert!(!filter.qualifies(OsStr::new("stats0.tmp"), ChangeKind::Create));
        assert!(!filter.qualifies(OsStr::new("STATS0"), ChangeKind::Modify));
    }

    #[test]
    fn test_create_policy() {
        let counting = PulseFilter::new("stats0", true);
        let ignoring = PulseFilter::new("stats0", false);

        assert!(counting.qualifies(OsStr::new("stats0"), ChangeKind::Create));
        assert!(!ignoring.qualifies(OsStr::new("stats0"), ChangeKind::Create));
    }

    #[test]
    fn test_remove_and_other_never_qualify() {
        let filter = PulseFilter::new("stats0", true);
        assert!(!filter.qualifies(OsStr::new("stats0"), ChangeKind::Remove));
        assert!(!filter.qualifies(OsStr::new("stats0"), ChangeKind::Other));
    }
}
