//! Bingo Core
//!
//! Board assignment, submission review and scoring for photo/text bingo
//! events.
//!
//! # Architecture
//!
//! - **Per-run serialization**: every state change of a run holds that run's lock
//! - **Append-only ledger**: a run's score is the sum of its point grants
//! - **Atomic review**: an approval and everything it pays commit in one batch
//! - **Board once**: once a run's board holds tiles it never changes
//!
//! # Invariants
//!
//! - Each tile appears at most once on a board
//! - Fixed tiles sit at the same coordinate on every board of an event
//! - At most one pending or approved submission per (run, tile)
//! - A bingo line is paid at most once per run

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod board;
pub mod bingo;
pub mod submission;
pub mod points;
pub mod review;
pub mod leaderboard;
pub mod locks;
pub mod storage;
pub mod state;
pub mod clock;
pub mod engine;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    is_tile_locked, Coordinate, Event, EventDraft, EventId, LeaderboardEntry, Placement,
    PointEntry, PointType, ReviewDecision, Run, RunId, Submission, SubmissionFormat,
    SubmissionId, SubmissionKind, SubmissionStatus, Tile, TileDraft, TileId, TileType,
};
pub use board::{Assignment, BoardMap};
pub use bingo::LineId;
pub use engine::BingoEngine;
pub use storage::Storage;
pub use config::Config;
