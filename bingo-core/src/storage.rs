//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `events` - Event definitions (key: event_id)
//! - `tiles` - Tile definitions (key: tile_id)
//! - `runs` - Runs with their boards (key: run_id)
//! - `submissions` - Submission attempts (key: submission_id)
//! - `ledger` - Append-only point grants (key: run_id || sequence)
//! - `bingo_lines` - Line award markers (key: run_id || line_id)
//! - `indices` - Secondary indices, first byte is the index tag
//!
//! Multi-record writes go through [`StoreBatch`], which commits as one
//! RocksDB `WriteBatch`.

use crate::{
    bingo::LineId,
    error::{Error, Result},
    types::{
        BingoLineAward, Event, EventId, PointEntry, Run, RunId, Submission, SubmissionId, Tile,
        TileId,
    },
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Column family names
const CF_EVENTS: &str = "events";
const CF_TILES: &str = "tiles";
const CF_RUNS: &str = "runs";
const CF_SUBMISSIONS: &str = "submissions";
const CF_LEDGER: &str = "ledger";
const CF_BINGO_LINES: &str = "bingo_lines";
const CF_INDICES: &str = "indices";

/// Index tags (first byte of every `indices` key)
const IDX_EVENT_SLUG: u8 = 1;
const IDX_EVENT_TILE: u8 = 2;
const IDX_EVENT_RUN: u8 = 3;
const IDX_PARTICIPANT: u8 = 4;
const IDX_RUN_SUBMISSION: u8 = 5;

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("path", &self.db.path()).finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_EVENTS, Self::cf_options_definitions()),
            ColumnFamilyDescriptor::new(CF_TILES, Self::cf_options_definitions()),
            ColumnFamilyDescriptor::new(CF_RUNS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_SUBMISSIONS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_LEDGER, Self::cf_options_ledger()),
            ColumnFamilyDescriptor::new(CF_BINGO_LINES, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_definitions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_hot() -> Options {
        let mut opts = Options::default();
        // Read on every submit and review, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_ledger() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helpers

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn get_value<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf_handle(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All (key, value) pairs whose key starts with `prefix`, in key order
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf_handle(cf_name)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut out = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key, value));
        }
        Ok(out)
    }

    /// Index scan: trailing 16 bytes of each matching key as an ID
    fn scan_index_ids(&self, prefix: &[u8]) -> Result<Vec<[u8; 16]>> {
        let entries = self.scan_prefix(CF_INDICES, prefix)?;
        let mut ids = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            if key.len() < 16 {
                return Err(Error::Storage("Truncated index key".to_string()));
            }
            let mut id = [0u8; 16];
            id.copy_from_slice(&key[key.len() - 16..]);
            ids.push(id);
        }
        Ok(ids)
    }

    /// Start an atomic write
    pub fn batch(&self) -> StoreBatch<'_> {
        StoreBatch {
            storage: self,
            batch: WriteBatch::default(),
        }
    }

    // Event operations

    /// Put event and its slug index (atomic)
    pub fn put_event(&self, event: &Event) -> Result<()> {
        let mut batch = self.batch();
        batch.put_event(event)?;
        batch.commit()
    }

    /// Get event by ID
    pub fn get_event(&self, event_id: EventId) -> Result<Event> {
        self.get_value(CF_EVENTS, event_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("event {}", event_id)))
    }

    /// Look up event by slug
    pub fn find_event_by_slug(&self, slug: &str) -> Result<Option<Event>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self.db.get_cf(cf, Self::index_key_slug(slug))? {
            Some(bytes) => Ok(Some(self.get_event(EventId::from_uuid(uuid_from(&bytes)?))?)),
            None => Ok(None),
        }
    }

    // Tile operations

    /// Put tile and its event index (atomic)
    pub fn put_tile(&self, tile: &Tile) -> Result<()> {
        let mut batch = self.batch();
        batch.put_tile(tile)?;
        batch.commit()
    }

    /// Get tile by ID
    pub fn get_tile(&self, tile_id: TileId) -> Result<Tile> {
        self.get_value(CF_TILES, tile_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("tile {}", tile_id)))
    }

    /// All tiles of an event, in creation order
    pub fn event_tiles(&self, event_id: EventId) -> Result<Vec<Tile>> {
        let prefix = Self::index_key(IDX_EVENT_TILE, event_id.as_bytes(), None);
        self.scan_index_ids(&prefix)?
            .into_iter()
            .map(|id| self.get_tile(TileId::from_uuid(uuid::Uuid::from_bytes(id))))
            .collect()
    }

    // Run operations

    /// Get run by ID
    pub fn get_run(&self, run_id: RunId) -> Result<Run> {
        self.get_value(CF_RUNS, run_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("run {}", run_id)))
    }

    /// Run of a participant in an event
    pub fn find_run(&self, event_id: EventId, participant_key: &str) -> Result<Option<Run>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let key = Self::index_key_participant(event_id, participant_key);
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(self.get_run(RunId::from_uuid(uuid_from(&bytes)?))?)),
            None => Ok(None),
        }
    }

    /// All runs of an event
    pub fn event_runs(&self, event_id: EventId) -> Result<Vec<Run>> {
        let prefix = Self::index_key(IDX_EVENT_RUN, event_id.as_bytes(), None);
        self.scan_index_ids(&prefix)?
            .into_iter()
            .map(|id| self.get_run(RunId::from_uuid(uuid::Uuid::from_bytes(id))))
            .collect()
    }

    // Submission operations

    /// Get submission by ID
    pub fn get_submission(&self, submission_id: SubmissionId) -> Result<Submission> {
        self.get_value(CF_SUBMISSIONS, submission_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("submission {}", submission_id)))
    }

    /// All submissions of a run
    pub fn run_submissions(&self, run_id: RunId) -> Result<Vec<Submission>> {
        let prefix = Self::index_key(IDX_RUN_SUBMISSION, run_id.as_bytes(), None);
        self.load_submissions(&prefix)
    }

    /// All submissions of a run for one tile, oldest first
    pub fn tile_submissions(&self, run_id: RunId, tile_id: TileId) -> Result<Vec<Submission>> {
        let prefix = Self::index_key(IDX_RUN_SUBMISSION, run_id.as_bytes(), Some(tile_id.as_bytes()));
        self.load_submissions(&prefix)
    }

    fn load_submissions(&self, prefix: &[u8]) -> Result<Vec<Submission>> {
        self.scan_index_ids(prefix)?
            .into_iter()
            .map(|id| self.get_submission(SubmissionId::from_uuid(uuid::Uuid::from_bytes(id))))
            .collect()
    }

    // Ledger operations

    /// Point grants of a run in append order
    pub fn ledger_entries(&self, run_id: RunId) -> Result<Vec<PointEntry>> {
        self.scan_prefix(CF_LEDGER, run_id.as_bytes())?
            .into_iter()
            .map(|(_, value)| Ok(bincode::deserialize(&value)?))
            .collect()
    }

    /// Lines already awarded to a run
    pub fn awarded_lines(&self, run_id: RunId) -> Result<BTreeSet<LineId>> {
        self.scan_prefix(CF_BINGO_LINES, run_id.as_bytes())?
            .into_iter()
            .map(|(_, value)| {
                let award: BingoLineAward = bincode::deserialize(&value)?;
                Ok(award.line)
            })
            .collect()
    }

    // Key helpers

    fn index_key(tag: u8, owner: &[u8; 16], child: Option<&[u8; 16]>) -> Vec<u8> {
        let mut key = Vec::with_capacity(33);
        key.push(tag);
        key.extend_from_slice(owner);
        if let Some(child) = child {
            key.extend_from_slice(child);
        }
        key
    }

    fn index_key_slug(slug: &str) -> Vec<u8> {
        let mut key = vec![IDX_EVENT_SLUG];
        key.extend_from_slice(slug.as_bytes());
        key
    }

    fn index_key_participant(event_id: EventId, participant_key: &str) -> Vec<u8> {
        let mut key = Self::index_key(IDX_PARTICIPANT, event_id.as_bytes(), None);
        key.extend_from_slice(participant_key.as_bytes());
        key
    }

    fn ledger_key(run_id: RunId, sequence: u64) -> Vec<u8> {
        let mut key = run_id.as_bytes().to_vec();
        key.extend_from_slice(&sequence.to_be_bytes());
        key
    }

    fn line_key(run_id: RunId, line: LineId) -> Vec<u8> {
        let mut key = run_id.as_bytes().to_vec();
        key.extend_from_slice(line.to_string().as_bytes());
        key
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

fn uuid_from(bytes: &[u8]) -> Result<uuid::Uuid> {
    uuid::Uuid::from_slice(bytes).map_err(|e| Error::Storage(format!("Corrupt index value: {}", e)))
}

/// Pending atomic write
///
/// Ledger entries and line awards can only be added, never removed.
pub struct StoreBatch<'a> {
    storage: &'a Storage,
    batch: WriteBatch,
}

impl std::fmt::Debug for StoreBatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBatch")
            .field("len", &self.batch.len())
            .finish()
    }
}

impl StoreBatch<'_> {
    fn put<T: serde::Serialize>(&mut self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.storage.cf_handle(cf_name)?;
        let bytes = bincode::serialize(value)?;
        self.batch.put_cf(cf, key, bytes);
        Ok(())
    }

    fn put_index(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.storage.cf_handle(CF_INDICES)?;
        self.batch.put_cf(cf, key, value);
        Ok(())
    }

    /// Event and slug index
    pub fn put_event(&mut self, event: &Event) -> Result<()> {
        self.put(CF_EVENTS, event.event_id.as_bytes(), event)?;
        self.put_index(&Storage::index_key_slug(&event.slug), event.event_id.as_bytes())
    }

    /// Tile and event → tile index
    pub fn put_tile(&mut self, tile: &Tile) -> Result<()> {
        self.put(CF_TILES, tile.tile_id.as_bytes(), tile)?;
        let idx = Storage::index_key(IDX_EVENT_TILE, tile.event_id.as_bytes(), Some(tile.tile_id.as_bytes()));
        self.put_index(&idx, &[])
    }

    /// Run, event → run index, and participant index
    pub fn put_run(&mut self, run: &Run) -> Result<()> {
        self.put(CF_RUNS, run.run_id.as_bytes(), run)?;
        let idx = Storage::index_key(IDX_EVENT_RUN, run.event_id.as_bytes(), Some(run.run_id.as_bytes()));
        self.put_index(&idx, &[])?;
        let idx = Storage::index_key_participant(run.event_id, &run.participant_key);
        self.put_index(&idx, run.run_id.as_bytes())
    }

    /// Submission and run/tile → submission index
    pub fn put_submission(&mut self, submission: &Submission) -> Result<()> {
        self.put(CF_SUBMISSIONS, submission.submission_id.as_bytes(), submission)?;
        let mut idx = Storage::index_key(
            IDX_RUN_SUBMISSION,
            submission.run_id.as_bytes(),
            Some(submission.tile_id.as_bytes()),
        );
        idx.extend_from_slice(submission.submission_id.as_bytes());
        self.put_index(&idx, &[])
    }

    /// Append a point grant
    pub fn append_point(&mut self, entry: &PointEntry) -> Result<()> {
        let key = Storage::ledger_key(entry.run_id, entry.sequence);
        self.put(CF_LEDGER, &key, entry)
    }

    /// Record a line award marker
    pub fn put_line_award(&mut self, award: &BingoLineAward) -> Result<()> {
        let key = Storage::line_key(award.run_id, award.line);
        self.put(CF_BINGO_LINES, &key, award)
    }

    /// Commit every write in one RocksDB write batch
    pub fn commit(self) -> Result<()> {
        let ops = self.batch.len();
        self.storage.db.write(self.batch)?;
        tracing::debug!(ops, "Batch committed");
        Ok(())
    }
}
