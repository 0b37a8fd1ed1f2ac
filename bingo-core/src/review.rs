//! Review transaction
//!
//! Rejecting only updates the submission. Approving updates the submission,
//! grants tile points (plus the event bonus for bonus tiles), recomputes the
//! run's completed lines and pays each line not yet awarded. All approve
//! writes commit in a single batch, and the caller holds the run's lock for
//! the whole read-compute-write sequence.

use crate::{
    bingo::{detect_new_lines, LineId},
    points::PointLedger,
    storage::Storage,
    types::{
        BingoLineAward, Coordinate, PointEntry, PointType, ReviewDecision, Run, Submission,
        SubmissionStatus, TileType,
    },
    Error, Result,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};

/// Everything a review committed
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    /// Submission after the review
    pub submission: Submission,
    /// Ledger entries appended (empty on reject)
    pub grants: Vec<PointEntry>,
    /// Lines paid by this review
    pub new_lines: BTreeSet<LineId>,
}

impl ReviewOutcome {
    /// Points granted by this review
    pub fn points_granted(&self) -> i64 {
        self.grants.iter().map(|e| e.amount).sum()
    }
}

/// Apply a decision to a pending submission.
///
/// Caller must hold the lock of the submission's run.
pub(crate) fn review(
    storage: &Storage,
    submission: Submission,
    decision: ReviewDecision,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<ReviewOutcome> {
    if submission.status != SubmissionStatus::Pending {
        return Err(Error::IllegalStateTransition(format!(
            "Submission {} is {}, not pending",
            submission.submission_id, submission.status
        )));
    }

    match decision {
        ReviewDecision::Reject => reject(storage, submission, note, now),
        ReviewDecision::Approve => approve(storage, submission, note, now),
    }
}

fn reject(
    storage: &Storage,
    mut submission: Submission,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<ReviewOutcome> {
    submission.status = SubmissionStatus::Rejected;
    submission.review_note = note;
    submission.reviewed_at = Some(now);

    let mut batch = storage.batch();
    batch.put_submission(&submission)?;
    batch.commit()?;

    tracing::info!(
        submission_id = %submission.submission_id,
        run_id = %submission.run_id,
        "Submission rejected"
    );

    Ok(ReviewOutcome {
        submission,
        grants: Vec::new(),
        new_lines: BTreeSet::new(),
    })
}

fn approve(
    storage: &Storage,
    mut submission: Submission,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<ReviewOutcome> {
    let run = storage.get_run(submission.run_id)?;
    let event = storage.get_event(run.event_id)?;
    let tile = storage.get_tile(submission.tile_id)?;

    submission.status = SubmissionStatus::Approved;
    submission.review_note = note;
    submission.reviewed_at = Some(now);

    let mut grants = PointLedger::new(storage).grants(run.run_id, now)?;
    let tile_ref = tile.tile_id.to_string();
    grants.grant(tile.points, PointType::TileApproved, tile_ref.as_str());
    if tile.tile_type == TileType::EventBonus {
        grants.grant(tile.event_bonus_points, PointType::EventBonus, tile_ref.as_str());
    }

    // Reverse-map every approved tile through the board, this one included
    let approved = approved_coordinates(storage, &submission, &run)?;
    let already_awarded = storage.awarded_lines(run.run_id)?;
    let new_lines = detect_new_lines(event.grid_size, &approved, &already_awarded);

    let mut batch = storage.batch();
    batch.put_submission(&submission)?;
    for line in &new_lines {
        batch.put_line_award(&BingoLineAward {
            run_id: run.run_id,
            line: *line,
            awarded_at: now,
        })?;
        grants.grant(event.line_bonus_points, PointType::BingoLine, line.to_string());
    }
    let grants = grants.write(&mut batch)?;
    batch.commit()?;

    tracing::info!(
        submission_id = %submission.submission_id,
        run_id = %run.run_id,
        tile_id = %tile.tile_id,
        points = grants.iter().map(|e| e.amount).sum::<i64>(),
        "Submission approved"
    );
    for line in &new_lines {
        tracing::info!(run_id = %run.run_id, line = %line, "Bingo line awarded");
    }

    Ok(ReviewOutcome {
        submission,
        grants,
        new_lines,
    })
}

fn approved_coordinates(
    storage: &Storage,
    approving: &Submission,
    run: &Run,
) -> Result<HashSet<Coordinate>> {
    let Some(board) = run.board.as_ref() else {
        tracing::warn!(run_id = %run.run_id, "Approving on a run without a board");
        return Ok(HashSet::new());
    };

    let mut tiles: HashSet<_> = storage
        .run_submissions(run.run_id)?
        .into_iter()
        .filter(|s| s.status == SubmissionStatus::Approved)
        .map(|s| s.tile_id)
        .collect();
    tiles.insert(approving.tile_id);

    Ok(tiles
        .into_iter()
        .filter_map(|tile_id| board.position_of(tile_id))
        .collect())
}
