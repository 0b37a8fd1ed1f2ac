//! Append-only point ledger
//!
//! A run's score is never stored. It is always the sum of the run's ledger
//! entries, which are only ever appended.
//!
//! Entries are numbered per run with a gapless `sequence`; appends must hold
//! the run's lock so that two writers never claim the same number.

use crate::{
    storage::{StoreBatch, Storage},
    types::{PointEntry, PointType, RunId},
    Error, Result,
};
use chrono::{DateTime, Utc};

/// Read and append access to the ledger
#[derive(Debug, Clone, Copy)]
pub struct PointLedger<'a> {
    storage: &'a Storage,
}

impl<'a> PointLedger<'a> {
    /// Ledger view over a store
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Append one entry. Its sequence must be the run's next free slot.
    pub fn append(&self, entry: &PointEntry) -> Result<()> {
        let expected = self.next_sequence(entry.run_id)?;
        if entry.sequence != expected {
            return Err(Error::Conflict(format!(
                "ledger sequence {} for run {} (next free is {})",
                entry.sequence, entry.run_id, expected
            )));
        }
        let mut batch = self.storage.batch();
        batch.append_point(entry)?;
        batch.commit()
    }

    /// Entries in append order
    pub fn entries(&self, run_id: RunId) -> Result<Vec<PointEntry>> {
        self.storage.ledger_entries(run_id)
    }

    /// Score of a run
    pub fn sum_for(&self, run_id: RunId) -> Result<i64> {
        Ok(self.entries(run_id)?.iter().map(|e| e.amount).sum())
    }

    /// Sequence number the next entry must carry
    pub fn next_sequence(&self, run_id: RunId) -> Result<u64> {
        Ok(self.entries(run_id)?.len() as u64)
    }

    /// Start staging grants for a run
    pub fn grants(&self, run_id: RunId, now: DateTime<Utc>) -> Result<Grants> {
        Ok(Grants {
            run_id,
            next_sequence: self.next_sequence(run_id)?,
            created_at: now,
            entries: Vec::new(),
        })
    }
}

/// Grants staged for one atomic commit
#[derive(Debug)]
pub struct Grants {
    run_id: RunId,
    next_sequence: u64,
    created_at: DateTime<Utc>,
    entries: Vec<PointEntry>,
}

impl Grants {
    /// Stage a grant
    pub fn grant(&mut self, amount: i64, point_type: PointType, reference: impl Into<String>) {
        self.entries.push(PointEntry {
            run_id: self.run_id,
            sequence: self.next_sequence,
            amount,
            point_type,
            reference: reference.into(),
            created_at: self.created_at,
        });
        self.next_sequence += 1;
    }

    /// Sum of staged grants
    pub fn total(&self) -> i64 {
        self.entries.iter().map(|e| e.amount).sum()
    }

    /// Add staged grants to `batch`
    pub fn write(self, batch: &mut StoreBatch<'_>) -> Result<Vec<PointEntry>> {
        for entry in &self.entries {
            batch.append_point(entry)?;
        }
        Ok(self.entries)
    }
}
