//! Core types for the bingo engine
//!
//! All persisted types are serialized with bincode. Identifiers are UUIDv7 so
//! that byte order follows creation order in storage keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

use crate::bingo::LineId;
use crate::board::BoardMap;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh time-ordered identifier
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Underlying UUID
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Raw bytes, used in storage keys
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Event identifier
    EventId
);
id_type!(
    /// Tile identifier
    TileId
);
id_type!(
    /// Run identifier (one participant's play-through)
    RunId
);
id_type!(
    /// Submission identifier
    SubmissionId
);

/// Grid cell. Ordered row-major: by `y`, then by `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    /// Column
    pub x: u8,
    /// Row
    pub y: u8,
}

impl Coordinate {
    /// Create coordinate
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// True if the cell lies inside an `n` x `n` grid
    pub fn within(&self, n: u8) -> bool {
        self.x < n && self.y < n
    }

    /// All cells of an `n` x `n` grid in row-major order
    pub fn grid(n: u8) -> impl Iterator<Item = Coordinate> {
        (0..n).flat_map(move |y| (0..n).map(move |x| Coordinate::new(x, y)))
    }
}

impl Ord for Coordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Coordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Smallest supported grid
pub const MIN_GRID_SIZE: u8 = 3;
/// Largest supported grid
pub const MAX_GRID_SIZE: u8 = 5;

/// A bingo event defined by an organizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub event_id: EventId,
    /// URL slug, unique across events
    pub slug: String,
    /// Title
    pub title: String,
    /// Grid dimension N (3..=5)
    pub grid_size: u8,
    /// Play time limit
    pub time_limit_minutes: u32,
    /// Points per completed line
    pub line_bonus_points: i64,
    /// Retries allowed after the original attempt
    pub max_resubmits: u32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for creating an event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventDraft {
    /// URL slug
    pub slug: String,
    /// Title
    pub title: String,
    /// Grid dimension N
    pub grid_size: u8,
    /// Play time limit
    pub time_limit_minutes: u32,
    /// Points per completed line (configured default when absent)
    pub line_bonus_points: Option<i64>,
    /// Retry budget (configured default when absent)
    pub max_resubmits: Option<u32>,
}

/// Scoring kind of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileType {
    /// Base points only
    Normal,
    /// Base points plus `event_bonus_points`
    EventBonus,
}

/// Accepted proof kinds for a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionFormat {
    /// Photo or text
    Any,
    /// Photo only
    PhotoOnly,
    /// Text only
    TextOnly,
}

impl SubmissionFormat {
    /// Whether a proof of `kind` is acceptable
    pub fn accepts(&self, kind: SubmissionKind) -> bool {
        match self {
            SubmissionFormat::Any => true,
            SubmissionFormat::PhotoOnly => kind == SubmissionKind::Photo,
            SubmissionFormat::TextOnly => kind == SubmissionKind::Text,
        }
    }
}

/// Where a tile lands on participants' boards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// Shuffled into a free cell, independently per run
    Pool,
    /// Pinned to the same cell in every run (secret tile)
    Fixed(Coordinate),
}

/// A mission tile belonging to an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Tile ID
    pub tile_id: TileId,
    /// Owning event
    pub event_id: EventId,
    /// Short label shown on the board
    pub label: String,
    /// Mission description
    pub description: String,
    /// Hint shown to participants
    pub hint: String,
    /// Base points on approval
    pub points: i64,
    /// Scoring kind
    pub tile_type: TileType,
    /// Extra points for `TileType::EventBonus`
    pub event_bonus_points: i64,
    /// Accepted proof kinds
    pub submission_format: SubmissionFormat,
    /// Fixed or pool placement
    pub placement: Placement,
    /// Tile is hidden until this instant
    pub publish_at: Option<DateTime<Utc>>,
}

impl Tile {
    /// Secret tile pinned to one coordinate
    pub fn is_fixed(&self) -> bool {
        matches!(self.placement, Placement::Fixed(_))
    }

    /// Pinned coordinate, if fixed
    pub fn fixed_coordinate(&self) -> Option<Coordinate> {
        match self.placement {
            Placement::Fixed(coord) => Some(coord),
            Placement::Pool => None,
        }
    }

    /// Tile is not yet published at `now`
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        is_tile_locked(self, now)
    }
}

/// `publish_at` is set and still in the future
pub fn is_tile_locked(tile: &Tile, now: DateTime<Utc>) -> bool {
    matches!(tile.publish_at, Some(publish_at) if now < publish_at)
}

/// Input for adding a tile to an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileDraft {
    /// Short label
    pub label: String,
    /// Mission description
    pub description: String,
    /// Hint
    pub hint: String,
    /// Base points
    pub points: i64,
    /// Scoring kind
    pub tile_type: TileType,
    /// Extra points for event-bonus tiles
    pub event_bonus_points: i64,
    /// Accepted proof kinds
    pub submission_format: SubmissionFormat,
    /// Fixed or pool placement
    pub placement: Placement,
    /// Publication time
    pub publish_at: Option<DateTime<Utc>>,
}

impl Default for TileDraft {
    fn default() -> Self {
        Self {
            label: "?".to_string(),
            description: String::new(),
            hint: String::new(),
            points: 10,
            tile_type: TileType::Normal,
            event_bonus_points: 0,
            submission_format: SubmissionFormat::Any,
            placement: Placement::Pool,
            publish_at: None,
        }
    }
}

/// One participant's play-through of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Run ID
    pub run_id: RunId,
    /// Event being played
    pub event_id: EventId,
    /// Opaque per-device key from the identity provider
    pub participant_key: String,
    /// Name shown on the leaderboard
    pub display_name: String,
    /// Board; once it holds a tile it never changes
    pub board: Option<BoardMap>,
    /// Join timestamp
    pub started_at: DateTime<Utc>,
    /// Most recent submission, used for ranking tie-breaks
    pub last_submission_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Seconds used for tie-breaking on the leaderboard
    pub fn ranking_duration_seconds(&self, event: &Event) -> i64 {
        match self.last_submission_at {
            Some(last) => (last - self.started_at).num_seconds().max(0),
            None => i64::from(event.time_limit_minutes) * 60,
        }
    }
}

/// Proof kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionKind {
    /// Photo; content is an opaque blob reference
    Photo,
    /// Text; content is the body
    Text,
}

/// Review status of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionStatus {
    /// Awaiting review
    Pending,
    /// Accepted (terminal)
    Approved,
    /// Declined; a new attempt may follow
    Rejected,
}

impl SubmissionStatus {
    /// Pending and approved submissions block new attempts
    pub fn is_active(&self) -> bool {
        matches!(self, SubmissionStatus::Pending | SubmissionStatus::Approved)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// One attempt at proving a tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Submission ID
    pub submission_id: SubmissionId,
    /// Run
    pub run_id: RunId,
    /// Tile
    pub tile_id: TileId,
    /// Proof kind
    pub kind: SubmissionKind,
    /// Blob reference or text body
    pub content_ref: String,
    /// Review status
    pub status: SubmissionStatus,
    /// 1-based attempt number for this (run, tile)
    pub attempt_count: u32,
    /// Reviewer note
    pub review_note: Option<String>,
    /// Submission timestamp
    pub submitted_at: DateTime<Utc>,
    /// Review timestamp
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Organizer verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    /// Accept and award points
    Approve,
    /// Decline
    Reject,
}

/// Reason a point grant was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointType {
    /// Base points of an approved tile
    TileApproved,
    /// Extra points of an event-bonus tile
    EventBonus,
    /// Completed bingo line
    BingoLine,
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PointType::TileApproved => "tile_approved",
            PointType::EventBonus => "event_bonus",
            PointType::BingoLine => "bingo_line",
        };
        f.write_str(s)
    }
}

/// Immutable point grant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointEntry {
    /// Run credited
    pub run_id: RunId,
    /// Position in the run's ledger (0-based, gapless)
    pub sequence: u64,
    /// Points granted
    pub amount: i64,
    /// Reason
    pub point_type: PointType,
    /// Tile ID or line ID the grant refers to
    pub reference: String,
    /// Grant timestamp
    pub created_at: DateTime<Utc>,
}

/// Permanent marker that a line has been paid for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BingoLineAward {
    /// Run
    pub run_id: RunId,
    /// Completed line
    pub line: LineId,
    /// Award timestamp
    pub awarded_at: DateTime<Utc>,
}

/// Leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Run
    pub run_id: RunId,
    /// Display name
    pub name: String,
    /// Ledger sum
    pub score: i64,
    /// Tie-break duration
    pub duration_seconds: i64,
}
