//! Background workers - periodic flushes of the in-memory graph
//!
//! Two intervals: a full save sweep on a long period, and a cheap
//! work-queue flush on a short one. Both run until the process exits; the
//! final authoritative flush is the explicit `save_all` + `finish_tasks`
//! in the shutdown path, not these workers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::application::services::DataStore;

/// Worker that runs a full save sweep on a fixed interval.
pub fn spawn_autosave(store: Arc<DataStore>, period: Duration) -> JoinHandle<()> {
    info!(secs = period.as_secs(), "Starting autosave worker");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately; skip it so a fresh start does
        // not double-save right after load.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let summary = store.save_all().await;
            if !summary.all_ok() {
                tracing::warn!(failed = summary.failed, "Autosave completed with failures");
            }
        }
    })
}

/// Worker that flushes the regeneration and snapshot queues.
pub fn spawn_queue_flush(store: Arc<DataStore>, period: Duration) -> JoinHandle<()> {
    info!(secs = period.as_secs(), "Starting queue flush worker");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            store.save_queues().await;
            debug!("Work queues flushed");
        }
    })
}

/// Worker that hibernates townless residents absent past `retention`.
pub fn spawn_hibernation_sweep(
    store: Arc<DataStore>,
    period: Duration,
    retention: chrono::Duration,
) -> JoinHandle<()> {
    info!(secs = period.as_secs(), "Starting hibernation worker");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            store.hibernate_absent_residents(retention).await;
        }
    })
}
