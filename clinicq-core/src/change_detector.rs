//! Decides whether the active check-in set changed since the last poll.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use clinicq_model::{CheckIn, CheckInID};
use tracing::debug;

/// Content hash over a check-in's tracked fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentHash(pub u64);

impl ContentHash {
    pub fn of(check_in: &CheckIn) -> Self {
        let mut hasher = DefaultHasher::new();
        check_in.tracked_fields().hash(&mut hasher);
        ContentHash(hasher.finish())
    }
}

/// Outcome of comparing a fresh poll against the previous snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<CheckInID>,
    pub modified: Vec<CheckInID>,
    /// Ids present last time but gone now. Reported for logging only; a
    /// disappearance alone does not count as a change.
    pub removed: usize,
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.modified.is_empty()
    }
}

/// Process-local snapshot of tracked fields for every active check-in.
///
/// Starts empty, so the first observation after a restart always reports
/// every check-in as new.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    snapshot: HashMap<CheckInID, ContentHash>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `active` against the snapshot, then replace the snapshot with
    /// `active` regardless of the result.
    pub fn observe(&mut self, active: &[CheckIn]) -> ChangeSet {
        let mut next = HashMap::with_capacity(active.len());
        let mut changes = ChangeSet::default();

        for check_in in active {
            let hash = ContentHash::of(check_in);
            match self.snapshot.get(&check_in.id) {
                None => changes.added.push(check_in.id),
                Some(previous) if *previous != hash => {
                    changes.modified.push(check_in.id)
                }
                Some(_) => {}
            }
            next.insert(check_in.id, hash);
        }

        changes.removed = self
            .snapshot
            .keys()
            .filter(|id| !next.contains_key(id))
            .count();

        debug!(
            target: "queue::detector",
            tracked = next.len(),
            added = changes.added.len(),
            modified = changes.modified.len(),
            removed = changes.removed,
            "change detection complete"
        );

        self.snapshot = next;
        changes
    }

    pub fn tracked(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }
}
