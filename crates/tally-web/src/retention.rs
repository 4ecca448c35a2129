//! Optional pruning of old vote records.
//!
//! Records only matter for the current day's rate limit, so anything before
//! `retention_days` full days ago can go. The cutoff is always at or before
//! today's local midnight, which keeps the live window intact.

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use tally_core::{start_of_day, VoteStore};
use tokio::task::JoinHandle;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub fn purge_cutoff<Tz: TimeZone>(now: &DateTime<Tz>, retention_days: u32) -> DateTime<Utc> {
    (start_of_day(now) - chrono::Duration::days(i64::from(retention_days))).with_timezone(&Utc)
}

pub fn spawn_purge_task(store: VoteStore, retention_days: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let cutoff = purge_cutoff(&Local::now(), retention_days);
            let store = store.clone();
            match tokio::task::spawn_blocking(move || store.purge_before(cutoff)).await {
                Ok(Ok(0)) => tracing::debug!("Retention sweep: nothing older than {cutoff}"),
                Ok(Ok(removed)) => {
                    tracing::info!("Retention sweep removed {removed} vote records older than {cutoff}")
                }
                Ok(Err(e)) => tracing::error!("Retention sweep failed: {e}"),
                Err(e) => tracing::error!("Retention sweep task panicked: {e}"),
            }
        }
    })
}
