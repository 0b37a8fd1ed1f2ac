//! Submission state machine
//!
//! ```text
//! none ──submit──▶ pending ──approve──▶ approved (terminal)
//!                     │
//!                     └──reject──▶ rejected ──submit──▶ pending ...
//! ```
//!
//! A (run, tile) pair has at most one pending-or-approved submission at a
//! time. Each tile allows `1 + max_resubmits` attempts in total.

use crate::{
    storage::Storage,
    types::{Event, Run, Submission, SubmissionId, SubmissionKind, SubmissionStatus, Tile},
    Error, Result,
};
use chrono::{DateTime, Utc};

/// Check the proof itself against the tile's rules
pub fn validate_content(
    tile: &Tile,
    kind: SubmissionKind,
    content_ref: &str,
    text_max_chars: usize,
) -> Result<()> {
    if content_ref.trim().is_empty() {
        return Err(Error::Validation("Submission content is empty".to_string()));
    }

    if kind == SubmissionKind::Text {
        let chars = content_ref.chars().count();
        if chars > text_max_chars {
            return Err(Error::Validation(format!(
                "Text too long ({} > {} characters)",
                chars, text_max_chars
            )));
        }
    }

    if !tile.submission_format.accepts(kind) {
        return Err(Error::Validation(format!(
            "Tile {} does not accept {:?} submissions ({:?})",
            tile.tile_id, kind, tile.submission_format
        )));
    }

    Ok(())
}

/// Attempt number for a new submission given the pair's history.
///
/// Fails with `Conflict` while an attempt is pending or approved, and with
/// `LimitExceeded` once `max_resubmits + 1` attempts have been rejected.
pub fn next_attempt(history: &[Submission], max_resubmits: u32) -> Result<u32> {
    if let Some(active) = history.iter().find(|s| s.status.is_active()) {
        return Err(Error::Conflict(format!(
            "Submission {} is already {}",
            active.submission_id, active.status
        )));
    }

    let rejected = history
        .iter()
        .filter(|s| s.status == SubmissionStatus::Rejected)
        .count() as u32;

    if rejected >= max_resubmits.saturating_add(1) {
        return Err(Error::LimitExceeded(format!(
            "{} attempts used (1 + {} resubmits allowed)",
            rejected, max_resubmits
        )));
    }

    Ok(rejected + 1)
}

/// Create a pending submission and stamp the run's `last_submission_at`.
///
/// Caller must hold the run's lock: the history check and the insert are
/// only atomic under it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn submit(
    storage: &Storage,
    event: &Event,
    run: &Run,
    tile: &Tile,
    kind: SubmissionKind,
    content_ref: &str,
    text_max_chars: usize,
    now: DateTime<Utc>,
) -> Result<Submission> {
    if tile.event_id != run.event_id {
        return Err(Error::Validation(format!(
            "Tile {} does not belong to event {}",
            tile.tile_id, run.event_id
        )));
    }

    validate_content(tile, kind, content_ref, text_max_chars)?;

    let history = storage.tile_submissions(run.run_id, tile.tile_id)?;
    let attempt_count = next_attempt(&history, event.max_resubmits)?;

    let submission = Submission {
        submission_id: SubmissionId::new(),
        run_id: run.run_id,
        tile_id: tile.tile_id,
        kind,
        content_ref: content_ref.to_string(),
        status: SubmissionStatus::Pending,
        attempt_count,
        review_note: None,
        submitted_at: now,
        reviewed_at: None,
    };

    let mut updated_run = run.clone();
    updated_run.last_submission_at = Some(now);

    let mut batch = storage.batch();
    batch.put_submission(&submission)?;
    batch.put_run(&updated_run)?;
    batch.commit()?;

    tracing::info!(
        submission_id = %submission.submission_id,
        run_id = %run.run_id,
        tile_id = %tile.tile_id,
        attempt = attempt_count,
        "Submission created"
    );

    Ok(submission)
}
