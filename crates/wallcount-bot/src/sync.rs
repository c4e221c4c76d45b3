//! One pull cycle: fetch the page, decode it, record the tracked location.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};

use wallcount::{extract_registry, ObservationStore, OccupancyRecord, StoreOutcome};

use crate::client::PageSource;

/// Result of a single pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The record was appended to the history.
    Stored(OccupancyRecord),
    /// The record matched the newest observation's minute and was dropped.
    Duplicate(OccupancyRecord),
    /// The page carried no data literal this time.
    NoData,
}

/// Pull the page once and store the record for `gym`.
///
/// Parsing and the SQLite write run on the blocking pool.
pub async fn sync_latest(
    source: &dyn PageSource,
    store: &Arc<ObservationStore>,
    gym: &str,
) -> Result<SyncOutcome> {
    let html = source.fetch_page().await?;
    let store = Arc::clone(store);
    let gym = gym.to_string();
    tokio::task::spawn_blocking(move || sync_page(&html, &store, &gym, Utc::now())).await?
}

/// Decode an already fetched page against `now` and store the record for `gym`.
pub fn sync_page(
    html: &str,
    store: &ObservationStore,
    gym: &str,
    now: DateTime<Utc>,
) -> Result<SyncOutcome> {
    let registry = match extract_registry(html, now) {
        Ok(registry) => registry,
        Err(e) if e.is_no_data() => {
            tracing::info!("no occupancy data on page: {e}");
            return Ok(SyncOutcome::NoData);
        }
        Err(e) => return Err(e.into()),
    };

    let (record, present) = registry.lookup(gym);
    if !present {
        let known: Vec<&str> = registry.keys().collect();
        tracing::warn!("location {gym:?} not on page (found {known:?}); storing zero record");
    }

    let outcome = match store.store(&record)? {
        StoreOutcome::Appended => SyncOutcome::Stored(record),
        StoreOutcome::Duplicate => SyncOutcome::Duplicate(record),
    };
    Ok(outcome)
}
