//! Per-process record of every file the scanner has dispatched.
//!
//! A filename is claimed once, at dispatch time, before its outcome is known. Claimed names are
//! never dispatched again for the life of the process, whatever their outcome: a file that was
//! rejected or hit a network error stays in the watched directory until the agent restarts.
//!
//! The tracker has a single owner (the scanner). Pipelines report their terminal state back
//! through the scanner, never by touching the tracker directly.

use std::collections::HashMap;
use std::fmt;

/// Where a dispatched file currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// Dispatched, outcome not yet known.
    InFlight,
    /// Disappeared during the debounce.
    Gone,
    /// Uploaded and moved to the processed folder.
    Archived,
    /// Uploaded, but the move to the processed folder failed.
    Uploaded,
    /// The server answered and refused the file.
    Rejected,
    /// Network failure, unreadable file or a non-JSON reply.
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PipelineState::InFlight)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineState::InFlight => "in-flight",
            PipelineState::Gone => "gone",
            PipelineState::Archived => "archived",
            PipelineState::Uploaded => "uploaded",
            PipelineState::Rejected => "rejected",
            PipelineState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Snapshot of how many tracked files are in each state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackerCounts {
    pub in_flight: usize,
    pub gone: usize,
    pub archived: usize,
    pub uploaded: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl TrackerCounts {
    pub fn total(&self) -> usize {
        self.in_flight + self.gone + self.archived + self.uploaded + self.rejected + self.failed
    }
}

impl fmt::Display for TrackerCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "in-flight={} archived={} uploaded={} rejected={} failed={} gone={}",
            self.in_flight, self.archived, self.uploaded, self.rejected, self.failed, self.gone
        )
    }
}

#[derive(Debug, Default)]
pub struct FileTracker {
    states: HashMap<String, PipelineState>,
}

impl FileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `filename` for dispatch.
    ///
    /// Returns `true` the first time a name is seen and `false` on every later call, including
    /// after the first attempt has failed.
    pub fn claim(&mut self, filename: &str) -> bool {
        if self.states.contains_key(filename) {
            return false;
        }
        self.states
            .insert(filename.to_string(), PipelineState::InFlight);
        true
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.states.contains_key(filename)
    }

    /// Record the terminal state of a claimed file. Unknown names are ignored.
    pub fn finish(&mut self, filename: &str, state: PipelineState) {
        if let Some(entry) = self.states.get_mut(filename) {
            *entry = state;
        }
    }

    pub fn state(&self, filename: &str) -> Option<PipelineState> {
        self.states.get(filename).copied()
    }

    pub fn counts(&self) -> TrackerCounts {
        let mut counts = TrackerCounts::default();
        for state in self.states.values() {
            match state {
                PipelineState::InFlight => counts.in_flight += 1,
                PipelineState::Gone => counts.gone += 1,
                PipelineState::Archived => counts.archived += 1,
                PipelineState::Uploaded => counts.uploaded += 1,
                PipelineState::Rejected => counts.rejected += 1,
                PipelineState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_only_once() {
        let mut tracker = FileTracker::new();
        assert!(tracker.claim("1005_chest.dcm"));
        assert!(!tracker.claim("1005_chest.dcm"));
        assert_eq!(tracker.state("1005_chest.dcm"), Some(PipelineState::InFlight));
    }

    #[test]
    fn test_failed_file_is_not_claimable_again() {
        let mut tracker = FileTracker::new();
        tracker.claim("scan.png");
        tracker.finish("scan.png", PipelineState::Failed);

        assert!(!tracker.claim("scan.png"));
        assert_eq!(tracker.state("scan.png"), Some(PipelineState::Failed));
    }

    #[test]
    fn test_finish_unknown_name_is_ignored() {
        let mut tracker = FileTracker::new();
        tracker.finish("never-claimed.dcm", PipelineState::Archived);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_counts() {
        let mut tracker = FileTracker::new();
        for name in ["a.dcm", "b.dcm", "c.png", "d.png", "e.jpg"] {
            tracker.claim(name);
        }
        tracker.finish("a.dcm", PipelineState::Archived);
        tracker.finish("b.dcm", PipelineState::Rejected);
        tracker.finish("c.png", PipelineState::Failed);
        tracker.finish("d.png", PipelineState::Gone);

        let counts = tracker.counts();
        assert_eq!(
            counts,
            TrackerCounts {
                in_flight: 1,
                gone: 1,
                archived: 1,
                uploaded: 0,
                rejected: 1,
                failed: 1,
            }
        );
        assert_eq!(counts.total(), tracker.len());
        assert!(PipelineState::Archived.is_terminal());
        assert!(!PipelineState::InFlight.is_terminal());
    }
}
