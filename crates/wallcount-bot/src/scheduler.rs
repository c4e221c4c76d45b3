//! Periodic pull jobs.
//!
//! Each configured job ticks on its own interval and runs one sync per tick
//! until the shared shutdown flag flips to `true`.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use wallcount::ObservationStore;

use crate::client::PageSource;
use crate::config::ScheduledJob;
use crate::sync::{sync_latest, SyncOutcome};

/// Spawn one task per job. The first pull of each job happens one interval
/// from now.
///
/// A job exits once `shutdown` holds `true`, including when it was set before
/// the job first ran, or when every sender is gone.
pub fn spawn_jobs(
    jobs: &[ScheduledJob],
    source: Arc<dyn PageSource>,
    store: Arc<ObservationStore>,
    gym: &str,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    jobs.iter()
        .map(|job| {
            spawn_job(
                job.clone(),
                Arc::clone(&source),
                Arc::clone(&store),
                gym.to_string(),
                shutdown.clone(),
            )
        })
        .collect()
}

fn spawn_job(
    job: ScheduledJob,
    source: Arc<dyn PageSource>,
    store: Arc<ObservationStore>,
    gym: String,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "job {:?} scheduled: every {}s for {gym:?}",
            job.name,
            job.every.as_secs()
        );
        let mut ticker = interval_at(Instant::now() + job.every, job.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match sync_latest(source.as_ref(), &store, &gym).await {
                        Ok(SyncOutcome::Stored(record)) => {
                            tracing::info!(job = %job.name, count = record.count, "pull stored");
                        }
                        Ok(SyncOutcome::Duplicate(_)) => {
                            tracing::debug!(job = %job.name, "pull was a duplicate");
                        }
                        Ok(SyncOutcome::NoData) => {
                            tracing::info!(job = %job.name, "pull found no data");
                        }
                        Err(e) => {
                            tracing::warn!(job = %job.name, "pull failed: {e:#}");
                        }
                    }
                }
            }
        }
        tracing::info!("job {:?} stopping", job.name);
    })
}
