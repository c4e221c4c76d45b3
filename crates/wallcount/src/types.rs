//! Core data types for occupancy records and the per-location registry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One location's occupancy snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyRecord {
    /// Current number of people.
    pub count: u32,
    /// Maximum allowed, 0 when unknown.
    pub capacity: u32,
    /// When the source last refreshed the count. `None` when the page left it blank.
    pub last_update: Option<DateTime<Utc>>,
}

impl OccupancyRecord {
    /// Create a record from its parts.
    pub fn new(count: u32, capacity: u32, last_update: Option<DateTime<Utc>>) -> Self {
        Self {
            count,
            capacity,
            last_update,
        }
    }
}

/// Location key → occupancy record, as published by one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyRegistry {
    records: HashMap<String, OccupancyRecord>,
}

impl OccupancyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for a location.
    pub fn insert(&mut self, key: impl Into<String>, record: OccupancyRecord) {
        self.records.insert(key.into(), record);
    }

    /// Look up a location, returning the zero-valued record plus `false` when absent.
    pub fn lookup(&self, key: &str) -> (OccupancyRecord, bool) {
        match self.records.get(key) {
            Some(record) => (*record, true),
            None => (OccupancyRecord::default(), false),
        }
    }

    /// Look up a location, falling back to the zero-valued record.
    pub fn record(&self, key: &str) -> OccupancyRecord {
        self.lookup(key).0
    }

    /// Borrow a record only if the location is present.
    pub fn get(&self, key: &str) -> Option<&OccupancyRecord> {
        self.records.get(key)
    }

    /// Location keys in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<(String, OccupancyRecord)> for OccupancyRegistry {
    fn from_iter<I: IntoIterator<Item = (String, OccupancyRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Errors that can occur while extracting or tracking occupancy.
#[derive(thiserror::Error, Debug)]
pub enum WallError {
    #[error("Marker not found: no text node contains the data literal")]
    MarkerNotFound,

    #[error("Malformed literal: {0}")]
    MalformedLiteral(LiteralFault),

    #[error("Unrecognized time format: {0}")]
    UnrecognizedTimeFormat(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt stored observation: {0}")]
    CorruptObservation(String),
}

impl WallError {
    /// Whether this error only means "nothing to record this cycle".
    pub fn is_no_data(&self) -> bool {
        match self {
            WallError::MarkerNotFound => true,
            WallError::MalformedLiteral(LiteralFault::Empty) => true,
            _ => false,
        }
    }
}

/// Why a sanitized literal could not be decoded.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteralFault {
    /// The sanitizer produced nothing.
    #[error("empty literal")]
    Empty,

    #[error("{0}")]
    Json(String),
}

/// Convenience result type.
pub type WallResult<T> = Result<T, WallError>;
