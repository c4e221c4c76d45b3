//! Observation store: append-only SQLite history with deduplication and a
//! one-shot threshold subscription.
//!
//! The connection and the pending threshold live behind one mutex, so the
//! "read latest, compare, append" sequence and the threshold check are atomic
//! per store instance even when a chat command and a scheduled pull race.

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::relative_time::truncate_to_minute;
use crate::types::{OccupancyRecord, WallError, WallResult};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    count INTEGER NOT NULL,
    capacity INTEGER NOT NULL,
    last_update TEXT
);";

/// Predicate over an observation's count: fires when `count <= at_most`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold {
    pub at_most: u32,
}

impl Threshold {
    pub fn at_most(at_most: u32) -> Self {
        Self { at_most }
    }

    pub fn matches(&self, record: &OccupancyRecord) -> bool {
        record.count <= self.at_most
    }
}

/// Side effect run once when the armed threshold matches.
///
/// Runs while the store is locked, so it must not call back into the store.
pub type ThresholdCallback = Box<
    dyn FnOnce(&OccupancyRecord) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send,
>;

/// The store's single subscription slot.
#[derive(Default)]
pub enum PendingThreshold {
    #[default]
    Disarmed,
    Armed {
        threshold: Threshold,
        callback: ThresholdCallback,
    },
}

impl fmt::Debug for PendingThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingThreshold::Disarmed => f.write_str("Disarmed"),
            PendingThreshold::Armed { threshold, .. } => {
                f.debug_struct("Armed").field("threshold", threshold).finish()
            }
        }
    }
}

/// What `store` did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Appended as the newest observation.
    Appended,
    /// Same minute as the newest observation; discarded.
    Duplicate,
}

struct StoreInner {
    conn: Connection,
    pending: PendingThreshold,
}

/// Persistent observation history for one tracked location.
pub struct ObservationStore {
    inner: Mutex<StoreInner>,
}

impl ObservationStore {
    /// Open or create a store at the given SQLite path.
    pub fn open(path: &Path) -> WallResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "opened observation store");
        Self::with_connection(conn)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> WallResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> WallResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            inner: Mutex::new(StoreInner {
                conn,
                pending: PendingThreshold::Disarmed,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an observation.
    ///
    /// The armed threshold, if any, is evaluated first and disarmed as soon as it
    /// matches. The record is then dropped when its `last_update` falls in the same
    /// minute as the newest stored observation; otherwise it is appended. Records
    /// without a `last_update` are always appended.
    pub fn store(&self, record: &OccupancyRecord) -> WallResult<StoreOutcome> {
        let mut inner = self.lock();

        inner.fire_threshold(record);

        if let Some(new) = record.last_update {
            if let Some(Some(prev)) = inner.latest_last_update()? {
                if truncate_to_minute(prev) == truncate_to_minute(new) {
                    tracing::info!(count = record.count, "skipping duplicated observation");
                    return Ok(StoreOutcome::Duplicate);
                }
            }
        }

        inner.conn.execute(
            "INSERT INTO observations (count, capacity, last_update) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                record.count,
                record.capacity,
                record.last_update.map(format_timestamp)
            ],
        )?;

        tracing::info!(
            count = record.count,
            capacity = record.capacity,
            last_update = ?record.last_update,
            "stored observation"
        );
        Ok(StoreOutcome::Appended)
    }

    /// The most recently stored observation.
    pub fn last(&self) -> WallResult<Option<OccupancyRecord>> {
        let inner = self.lock();
        let row = inner
            .conn
            .query_row(
                "SELECT count, capacity, last_update FROM observations ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(count, capacity, raw)| -> WallResult<OccupancyRecord> {
            let last_update = raw.as_deref().map(parse_timestamp).transpose()?;
            Ok(OccupancyRecord::new(count, capacity, last_update))
        })
        .transpose()
    }

    /// Number of stored observations.
    pub fn len(&self) -> WallResult<usize> {
        let inner = self.lock();
        let n: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> WallResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Arm the threshold, replacing any existing subscription.
    pub fn set_threshold(&self, threshold: Threshold, callback: ThresholdCallback) {
        let mut inner = self.lock();
        inner.pending = PendingThreshold::Armed {
            threshold,
            callback,
        };
        tracing::info!(at_most = threshold.at_most, "threshold armed");
    }

    /// Disarm the threshold without firing it.
    pub fn clear_threshold(&self) {
        let mut inner = self.lock();
        if matches!(inner.pending, PendingThreshold::Armed { .. }) {
            tracing::info!("threshold cleared");
        }
        inner.pending = PendingThreshold::Disarmed;
    }

    /// The currently armed threshold, if any.
    pub fn threshold(&self) -> Option<Threshold> {
        match &self.lock().pending {
            PendingThreshold::Armed { threshold, .. } => Some(*threshold),
            PendingThreshold::Disarmed => None,
        }
    }
}

impl StoreInner {
    fn fire_threshold(&mut self, record: &OccupancyRecord) {
        let armed = matches!(
            &self.pending,
            PendingThreshold::Armed { threshold, .. } if threshold.matches(record)
        );
        if !armed {
            return;
        }

        if let PendingThreshold::Armed {
            threshold,
            callback,
        } = std::mem::take(&mut self.pending)
        {
            tracing::info!(at_most = threshold.at_most, count = record.count, "threshold fired");
            if let Err(e) = callback(record) {
                tracing::warn!("threshold callback failed: {e}");
            }
        }
    }

    /// `None` when the table is empty, `Some(None)` when the newest row has no timestamp.
    fn latest_last_update(&self) -> WallResult<Option<Option<DateTime<Utc>>>> {
        let raw: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT last_update FROM observations ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|inner| inner.as_deref().map(parse_timestamp).transpose())
            .transpose()
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(raw: &str) -> WallResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| WallError::CorruptObservation(format!("last_update {raw:?}: {e}")))
}
