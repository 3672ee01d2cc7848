//! Merge snapshots into a local board of shared race rows.
//!
//! The board is keyed by race id. Reconciling a snapshot:
//!
//! 1. removes rows whose id is absent from the snapshot,
//! 2. overwrites rows present in both, in place, so holders of the row's
//!    [`SharedRace`] handle see the new values,
//! 3. inserts rows that only the snapshot has.
//!
//! The merge is idempotent and does not depend on the order of races
//! within a snapshot. A snapshot carrying the same id twice is rejected
//! before anything is touched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use checkmate_types::{RaceId, ScoredRace};
use parking_lot::RwLock;

use crate::error::ReconcileError;

/// A race row shared between the board and whoever renders it.
pub type SharedRace = Arc<RwLock<ScoredRace>>;

/// Counts of what one reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Rows created for ids new to the board.
    pub inserted: usize,
    /// Existing rows whose contents changed.
    pub updated: usize,
    /// Rows dropped because the snapshot no longer carries them.
    pub removed: usize,
    /// Existing rows the snapshot left as they were.
    pub unchanged: usize,
}

impl ReconcileReport {
    /// Whether the board differs from before the merge.
    pub const fn changed(&self) -> bool {
        self.inserted > 0 || self.updated > 0 || self.removed > 0
    }
}

/// The local set of qualified races.
#[derive(Debug, Default)]
pub struct RaceBoard {
    rows: HashMap<RaceId, SharedRace>,
    /// Ids in the order of the last accepted snapshot.
    order: Vec<RaceId>,
}

impl RaceBoard {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `snapshot` into the board.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::DuplicateRaceId`] if an id repeats; the
    /// board is left untouched.
    pub fn reconcile(
        &mut self,
        snapshot: &[ScoredRace],
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut incoming: HashSet<&RaceId> = HashSet::with_capacity(snapshot.len());
        for race in snapshot {
            if !incoming.insert(&race.id) {
                return Err(ReconcileError::DuplicateRaceId {
                    id: race.id.clone(),
                });
            }
        }

        let mut report = ReconcileReport::default();

        let before = self.rows.len();
        self.rows.retain(|id, _| incoming.contains(id));
        report.removed = before.saturating_sub(self.rows.len());

        for race in snapshot {
            if let Some(row) = self.rows.get(&race.id) {
                let mut current = row.write();
                if *current == *race {
                    report.unchanged = report.unchanged.saturating_add(1);
                } else {
                    overwrite(&mut current, race);
                    report.updated = report.updated.saturating_add(1);
                }
            } else {
                self.rows
                    .insert(race.id.clone(), Arc::new(RwLock::new(race.clone())));
                report.inserted = report.inserted.saturating_add(1);
            }
        }

        self.order = snapshot.iter().map(|race| race.id.clone()).collect();
        Ok(report)
    }

    /// Look up a row by id.
    pub fn get(&self, id: &RaceId) -> Option<SharedRace> {
        self.rows.get(id).map(Arc::clone)
    }

    /// Rows in the order of the last accepted snapshot.
    pub fn rows(&self) -> impl Iterator<Item = &SharedRace> {
        self.order.iter().filter_map(|id| self.rows.get(id))
    }

    /// Copy the current rows out, in snapshot order.
    pub fn to_vec(&self) -> Vec<ScoredRace> {
        self.rows().map(|row| row.read().clone()).collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the board has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Copy every field except the id onto an existing row.
fn overwrite(row: &mut ScoredRace, race: &ScoredRace) {
    row.venue.clone_from(&race.venue);
    row.race_number = race.race_number;
    row.post_time = race.post_time;
    row.source.clone_from(&race.source);
    row.score = race.score;
    row.qualified = race.qualified;
    row.factors.clone_from(&race.factors);
    row.runners.clone_from(&race.runners);
    row.updated_at = race.updated_at;
}
