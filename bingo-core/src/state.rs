//! Participant view of a run

use crate::types::{Coordinate, Event, Run, Submission, SubmissionStatus, Tile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Display state of a board cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellStatus {
    /// Tile not yet published
    Locked,
    /// No submission yet
    Open,
    /// Latest attempt awaits review
    Pending,
    /// Tile approved
    Approved,
    /// Latest attempt rejected
    Rejected,
}

/// One cell of the participant's board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardCell {
    /// Position on this run's board
    pub coordinate: Coordinate,
    /// Tile, or `None` when the pool ran out
    pub tile: Option<Tile>,
    /// Display state
    pub status: CellStatus,
    /// Latest attempt for the tile
    pub latest_submission: Option<Submission>,
}

/// Everything a participant's screen needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Event
    pub event: Event,
    /// Run
    pub run: Run,
    /// Cells in row-major order
    pub cells: Vec<BoardCell>,
    /// Ledger sum
    pub score: i64,
    /// Leaderboard tie-break duration
    pub ranking_duration_seconds: i64,
    /// Time the view was built
    pub server_time: DateTime<Utc>,
}

pub(crate) fn build(
    event: Event,
    run: Run,
    tiles: Vec<Tile>,
    submissions: Vec<Submission>,
    score: i64,
    now: DateTime<Utc>,
) -> GameState {
    let tiles: HashMap<_, _> = tiles.into_iter().map(|t| (t.tile_id, t)).collect();

    let mut latest: HashMap<_, Submission> = HashMap::new();
    for submission in submissions {
        match latest.get(&submission.tile_id) {
            Some(current) if current.attempt_count > submission.attempt_count => {}
            _ => {
                latest.insert(submission.tile_id, submission);
            }
        }
    }

    let cells = Coordinate::grid(event.grid_size)
        .map(|coordinate| {
            let tile = run
                .board
                .as_ref()
                .and_then(|board| board.tile_at(coordinate))
                .and_then(|tile_id| tiles.get(&tile_id).cloned());
            let latest_submission = tile
                .as_ref()
                .and_then(|t| latest.get(&t.tile_id).cloned());
            let status = match (&tile, &latest_submission) {
                (Some(t), _) if t.is_locked(now) => CellStatus::Locked,
                (_, Some(s)) => match s.status {
                    SubmissionStatus::Pending => CellStatus::Pending,
                    SubmissionStatus::Approved => CellStatus::Approved,
                    SubmissionStatus::Rejected => CellStatus::Rejected,
                },
                _ => CellStatus::Open,
            };
            BoardCell {
                coordinate,
                tile,
                status,
                latest_submission,
            }
        })
        .collect();

    let ranking_duration_seconds = run.ranking_duration_seconds(&event);

    GameState {
        event,
        run,
        cells,
        score,
        ranking_duration_seconds,
        server_time: now,
    }
}
