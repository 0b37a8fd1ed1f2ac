//! Main engine orchestration layer
//!
//! This module ties together storage, the per-run lock table, and the game
//! components into the operations exposed to the outer layers.
//!
//! Every state change of a run (board assignment, submit, review, rename)
//! runs under that run's lock. Reads (score, leaderboard, game state) take
//! no lock.
//!
//! # Example
//!
//! ```no_run
//! use bingo_core::{BingoEngine, Config, SubmissionKind};
//!
//! #[tokio::main]
//! async fn main() -> bingo_core::Result<()> {
//!     let engine = BingoEngine::open(Config::default())?;
//!
//!     let run = engine.join_event("demo-bingo", "device-1234").await?;
//!     // let submission = engine.submit(run.run_id, tile_id, SubmissionKind::Text, "found it").await?;
//!     println!("score: {}", engine.get_score(run.run_id)?);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    board::{self, Assignment},
    clock::{Clock, SystemClock},
    leaderboard,
    locks::LockTable,
    metrics::Metrics,
    points::PointLedger,
    review::{self, ReviewOutcome},
    state::{self, GameState},
    submission,
    types::{
        Event, EventDraft, EventId, LeaderboardEntry, Placement, PointEntry, ReviewDecision, Run,
        RunId, Submission, SubmissionId, SubmissionKind, SubmissionStatus, Tile, TileDraft, TileId,
        TileType, MAX_GRID_SIZE, MIN_GRID_SIZE,
    },
    Config, Error, Result, Storage,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;

/// Main engine interface
#[derive(Debug)]
pub struct BingoEngine {
    /// Storage backend
    storage: Arc<Storage>,

    /// One lock per run
    run_locks: LockTable<RunId>,

    /// One lock per (event, participant) for run creation
    join_locks: LockTable<(EventId, String)>,

    /// Serializes event and tile registration
    catalog_lock: tokio::sync::Mutex<()>,

    /// Time source
    clock: Arc<dyn Clock>,

    /// Metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl BingoEngine {
    /// Open engine with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()?;

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            "Bingo engine opened"
        );

        Ok(Self {
            storage,
            run_locks: LockTable::new(),
            join_locks: LockTable::new(),
            catalog_lock: tokio::sync::Mutex::new(()),
            clock: Arc::new(SystemClock),
            metrics,
            config,
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // Registration

    /// Create an event. Slugs are unique.
    pub async fn create_event(&self, draft: EventDraft) -> Result<Event> {
        let slug = draft.slug.trim().to_string();
        if slug.is_empty() {
            return Err(Error::Validation("Slug is required".to_string()));
        }
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&draft.grid_size) {
            return Err(Error::Validation(format!(
                "Grid size must be {}..={}, got {}",
                MIN_GRID_SIZE, MAX_GRID_SIZE, draft.grid_size
            )));
        }
        if draft.time_limit_minutes == 0 {
            return Err(Error::Validation("Time limit must be positive".to_string()));
        }
        if draft.line_bonus_points.is_some_and(|points| points < 0) {
            return Err(Error::Validation("Line bonus must not be negative".to_string()));
        }

        let _guard = self.catalog_lock.lock().await;

        if self.storage.find_event_by_slug(&slug)?.is_some() {
            return Err(Error::Conflict(format!("Slug {} is taken", slug)));
        }

        let event = Event {
            event_id: EventId::new(),
            slug,
            title: draft.title,
            grid_size: draft.grid_size,
            time_limit_minutes: draft.time_limit_minutes,
            line_bonus_points: draft
                .line_bonus_points
                .unwrap_or(self.config.game.default_line_bonus_points),
            max_resubmits: draft
                .max_resubmits
                .unwrap_or(self.config.game.default_max_resubmits),
            created_at: self.clock.now(),
        };
        self.storage.put_event(&event)?;

        tracing::info!(event_id = %event.event_id, slug = %event.slug, "Event created");
        Ok(event)
    }

    /// Add a tile to an event
    pub async fn add_tile(&self, event_id: EventId, draft: TileDraft) -> Result<Tile> {
        let event = self.storage.get_event(event_id)?;

        if draft.points < 0 || draft.event_bonus_points < 0 {
            return Err(Error::Validation("Tile points must not be negative".to_string()));
        }
        if draft.tile_type == TileType::Normal && draft.event_bonus_points != 0 {
            return Err(Error::Validation(
                "Only event-bonus tiles carry bonus points".to_string(),
            ));
        }

        let _guard = self.catalog_lock.lock().await;

        if let Placement::Fixed(coord) = draft.placement {
            if !coord.within(event.grid_size) {
                return Err(Error::Validation(format!(
                    "Fixed coordinate {} outside {}x{} grid",
                    coord, event.grid_size, event.grid_size
                )));
            }
            let taken = self
                .storage
                .event_tiles(event_id)?
                .iter()
                .any(|t| t.fixed_coordinate() == Some(coord));
            if taken {
                return Err(Error::Conflict(format!(
                    "Coordinate {} already holds a fixed tile",
                    coord
                )));
            }
        }

        let tile = Tile {
            tile_id: TileId::new(),
            event_id,
            label: draft.label,
            description: draft.description,
            hint: draft.hint,
            points: draft.points,
            tile_type: draft.tile_type,
            event_bonus_points: draft.event_bonus_points,
            submission_format: draft.submission_format,
            placement: draft.placement,
            publish_at: draft.publish_at,
        };
        self.storage.put_tile(&tile)?;

        tracing::debug!(tile_id = %tile.tile_id, event_id = %event_id, "Tile added");
        Ok(tile)
    }

    /// Look up an event by slug
    pub fn find_event(&self, slug: &str) -> Result<Event> {
        self.storage
            .find_event_by_slug(slug)?
            .ok_or_else(|| Error::NotFound(format!("event {}", slug)))
    }

    /// Get a tile
    pub fn get_tile(&self, tile_id: TileId) -> Result<Tile> {
        self.storage.get_tile(tile_id)
    }

    /// Tiles of an event
    pub fn event_tiles(&self, event_id: EventId) -> Result<Vec<Tile>> {
        self.storage.event_tiles(event_id)
    }

    // Participation

    /// Join an event, or resume the participant's existing run.
    ///
    /// The participant key is opaque: it is stored and matched byte for byte.
    /// The returned run has its board assigned.
    pub async fn join_event(&self, slug: &str, participant_key: &str) -> Result<Run> {
        let event = self.find_event(slug)?;

        let run_id = {
            let _guard = self
                .join_locks
                .lock((event.event_id, participant_key.to_string()))
                .await;

            match self.storage.find_run(event.event_id, participant_key)? {
                Some(run) => run.run_id,
                None => {
                    let run = Run {
                        run_id: RunId::new(),
                        event_id: event.event_id,
                        participant_key: participant_key.to_string(),
                        display_name: truncate_chars(
                            participant_key,
                            self.config.game.participant_name_max_chars,
                        ),
                        board: None,
                        started_at: self.clock.now(),
                        last_submission_at: None,
                    };
                    let mut batch = self.storage.batch();
                    batch.put_run(&run)?;
                    batch.commit()?;
                    tracing::info!(run_id = %run.run_id, event_id = %event.event_id, "Run created");
                    run.run_id
                }
            }
        };

        self.assign_board(run_id).await?;
        self.storage.get_run(run_id)
    }

    /// Generate and commit the run's board, exactly once.
    ///
    /// Later calls return the committed board as `Assignment::Existing`. An
    /// empty committed board (the event had no tiles yet) counts as unassigned
    /// and is generated again.
    pub async fn assign_board(&self, run_id: RunId) -> Result<Assignment> {
        let mut rng = StdRng::from_entropy();
        self.assign_board_with(run_id, &mut rng).await
    }

    /// [`assign_board`](Self::assign_board) with a caller-supplied RNG
    pub async fn assign_board_with<R: Rng + Send>(
        &self,
        run_id: RunId,
        rng: &mut R,
    ) -> Result<Assignment> {
        let _guard = self.run_locks.lock(run_id).await;

        let mut run = self.storage.get_run(run_id)?;
        if let Some(existing) = run.board.take() {
            if !existing.is_empty() {
                tracing::debug!(run_id = %run_id, "Board already assigned");
                return Ok(Assignment::Existing(existing));
            }
        }

        let event = self.storage.get_event(run.event_id)?;
        let tiles = self.storage.event_tiles(run.event_id)?;
        let board = board::assign_board(event.grid_size, &tiles, rng);

        run.board = Some(board.clone());
        let mut batch = self.storage.batch();
        batch.put_run(&run)?;
        batch.commit()?;

        self.metrics.record_board_assigned();
        tracing::info!(run_id = %run_id, cells = board.len(), "Board assigned");

        Ok(Assignment::Assigned(board))
    }

    /// Change the name shown on the leaderboard
    pub async fn rename_participant(&self, run_id: RunId, name: &str) -> Result<Run> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Name is required".to_string()));
        }

        let _guard = self.run_locks.lock(run_id).await;

        let mut run = self.storage.get_run(run_id)?;
        run.display_name = truncate_chars(name, self.config.game.participant_name_max_chars);
        let mut batch = self.storage.batch();
        batch.put_run(&run)?;
        batch.commit()?;

        Ok(run)
    }

    // Submissions

    /// Submit proof for a tile
    pub async fn submit(
        &self,
        run_id: RunId,
        tile_id: TileId,
        kind: SubmissionKind,
        content_ref: &str,
    ) -> Result<Submission> {
        let _guard = self.run_locks.lock(run_id).await;

        let run = self.storage.get_run(run_id)?;
        let event = self.storage.get_event(run.event_id)?;
        let tile = self.storage.get_tile(tile_id)?;

        let submission = submission::submit(
            &self.storage,
            &event,
            &run,
            &tile,
            kind,
            content_ref,
            self.config.game.text_max_chars,
            self.clock.now(),
        )?;

        self.metrics.record_submission();
        Ok(submission)
    }

    /// Approve or reject a pending submission
    pub async fn review(
        &self,
        submission_id: SubmissionId,
        decision: ReviewDecision,
        note: Option<String>,
    ) -> Result<Submission> {
        Ok(self
            .review_detailed(submission_id, decision, note)
            .await?
            .submission)
    }

    /// [`review`](Self::review), also reporting grants and lines paid
    pub async fn review_detailed(
        &self,
        submission_id: SubmissionId,
        decision: ReviewDecision,
        note: Option<String>,
    ) -> Result<ReviewOutcome> {
        let started = Instant::now();
        let run_id = self.storage.get_submission(submission_id)?.run_id;

        let _guard = self.run_locks.lock(run_id).await;

        // Re-read under the lock: another reviewer may have got here first
        let current = self.storage.get_submission(submission_id)?;
        let outcome = review::review(&self.storage, current, decision, note, self.clock.now())?;

        self.metrics.record_review(
            decision == ReviewDecision::Approve,
            outcome.new_lines.len(),
            outcome.points_granted(),
            started.elapsed().as_secs_f64(),
        );

        Ok(outcome)
    }

    /// Pending submissions of an event, oldest first
    pub fn pending_submissions(&self, event_id: EventId) -> Result<Vec<Submission>> {
        self.storage.get_event(event_id)?;

        let mut pending = Vec::new();
        for run in self.storage.event_runs(event_id)? {
            pending.extend(
                self.storage
                    .run_submissions(run.run_id)?
                    .into_iter()
                    .filter(|s| s.status == SubmissionStatus::Pending),
            );
        }
        pending.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then(a.submission_id.cmp(&b.submission_id))
        });
        Ok(pending)
    }

    /// Get a submission
    pub fn get_submission(&self, submission_id: SubmissionId) -> Result<Submission> {
        self.storage.get_submission(submission_id)
    }

    // Reads

    /// Get a run
    pub fn get_run(&self, run_id: RunId) -> Result<Run> {
        self.storage.get_run(run_id)
    }

    /// Score of a run (sum of its ledger)
    pub fn get_score(&self, run_id: RunId) -> Result<i64> {
        self.storage.get_run(run_id)?;
        PointLedger::new(&self.storage).sum_for(run_id)
    }

    /// Point grants of a run in append order
    pub fn ledger_entries(&self, run_id: RunId) -> Result<Vec<PointEntry>> {
        self.storage.get_run(run_id)?;
        self.storage.ledger_entries(run_id)
    }

    /// Ranked participants; `None` uses the configured default size
    pub fn get_leaderboard(
        &self,
        event_id: EventId,
        top_k: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let top_k = top_k.unwrap_or(self.config.game.leaderboard_default_top_k);
        leaderboard::leaderboard(&self.storage, event_id, top_k)
    }

    /// Participant view of a run, as of now
    pub fn game_state(&self, run_id: RunId) -> Result<GameState> {
        self.game_state_at(run_id, self.clock.now())
    }

    /// Participant view of a run, as of `now`
    pub fn game_state_at(&self, run_id: RunId, now: DateTime<Utc>) -> Result<GameState> {
        let run = self.storage.get_run(run_id)?;
        let event = self.storage.get_event(run.event_id)?;
        let tiles = self.storage.event_tiles(run.event_id)?;
        let submissions = self.storage.run_submissions(run_id)?;
        let score = PointLedger::new(&self.storage).sum_for(run_id)?;
        Ok(state::build(event, run, tiles, submissions, score, now))
    }
}

impl BingoEngine {
    /// Flush and close the store
    pub fn shutdown(self) -> Result<()> {
        tracing::info!("Shutting down bingo engine");
        match Arc::try_unwrap(self.storage) {
            Ok(storage) => storage.close(),
            Err(_) => Err(Error::Storage(
                "Storage still shared at shutdown".to_string(),
            )),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
