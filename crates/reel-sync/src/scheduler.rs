//! # Sync Scheduler
//!
//! Background task that drains the queue and pulls remote changes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SyncScheduler::run                              │
//! │                                                                         │
//! │   interval tick ──► drain queue ──► cursor stale? ──► incremental pull │
//! │   trigger()     ──► drain queue                                        │
//! │   shutdown()    ──► stop (an in-flight pass is dropped; its items      │
//! │                     stay queued)                                        │
//! │                                                                         │
//! │   Triggers coalesce: the channel holds one pending wake-up and extra   │
//! │   calls are dropped. Overlapping passes are ruled out by the engine's  │
//! │   single-flight guards.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncSettings;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};

/// Handle for waking or stopping the scheduler.
///
/// Dropping every handle stops the scheduler as well.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl SchedulerHandle {
    /// Requests a drain soon. Never blocks.
    ///
    /// Returns [`SyncError::Shutdown`] once the scheduler has stopped.
    pub fn trigger(&self) -> SyncResult<()> {
        match self.trigger_tx.try_send(()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(())) => {
                debug!("Drain already requested");
                Ok(())
            }
            Err(TrySendError::Closed(())) => Err(SyncError::Shutdown),
        }
    }

    /// Triggers graceful shutdown.
    ///
    /// Returns [`SyncError::Shutdown`] if the scheduler had already stopped.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::Shutdown)
    }
}

/// Periodic and on-demand driver for a [`SyncEngine`].
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    poll_interval: Duration,
    trigger_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl SyncScheduler {
    /// Creates a scheduler and returns a handle.
    pub fn new(engine: Arc<SyncEngine>, settings: &SyncSettings) -> (Self, SchedulerHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let scheduler = SyncScheduler {
            engine,
            poll_interval: settings.poll_interval(),
            trigger_rx,
            shutdown_rx,
        };
        let handle = SchedulerHandle {
            trigger_tx,
            shutdown_tx,
        };

        (scheduler, handle)
    }

    /// Runs the scheduler on a new tokio task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until shutdown. The first tick fires immediately.
    pub async fn run(mut self) {
        info!(poll_interval = ?self.poll_interval, "Sync scheduler starting");

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let with_pull = tokio::select! {
                _ = interval.tick() => true,

                Some(()) = self.trigger_rx.recv() => false,

                _ = self.shutdown_rx.recv() => {
                    info!("Sync scheduler shutting down");
                    break;
                }
            };

            let engine = self.engine.clone();
            tokio::select! {
                _ = run_pass(engine, with_pull) => {}

                _ = self.shutdown_rx.recv() => {
                    info!("Sync scheduler shutting down during a pass");
                    break;
                }
            }
        }

        info!("Sync scheduler stopped");
    }
}

async fn run_pass(engine: Arc<SyncEngine>, with_pull: bool) {
    match engine.process_queue().await {
        Ok(report) if report.attempted > 0 => {
            debug!(applied = report.applied, remaining = report.remaining, "Scheduled drain finished");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, retryable = e.is_retryable(), "Scheduled drain failed"),
    }

    if with_pull && engine.needs_pull(Utc::now()).await {
        if let Err(e) = engine.sync_user_lists().await {
            warn!(error = %e, retryable = e.is_retryable(), "Scheduled pull failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Reply};
    use reel_core::{EntryStatus, NewOperation};

    fn settings() -> SyncSettings {
        SyncSettings {
            poll_interval_secs: 3600,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_startup_pass_and_trigger() {
        let (db, transport, engine) = testing::engine(
            vec![
                testing::saved(1),
                testing::viewer(7),
                testing::list_page(vec![], false),
                testing::saved(2),
            ],
            settings(),
        )
        .await;

        db.library()
            .add(&testing::media(1, Some(12)), EntryStatus::Watching, 0, None)
            .await
            .unwrap();
        engine.enqueue(&NewOperation::progress(1, 1)).await.unwrap();

        let (scheduler, handle) = SyncScheduler::new(engine.clone(), &settings());
        let task = scheduler.spawn();

        let (db_ref, engine_ref) = (&db, &engine);
        assert!(
            testing::eventually(|| async move {
                engine_ref.cursor().await.is_some()
                    && db_ref.queue().count_pending().await.unwrap() == 0
            })
            .await
        );

        db.library()
            .add(&testing::media(2, Some(12)), EntryStatus::Watching, 0, None)
            .await
            .unwrap();
        engine.enqueue(&NewOperation::progress(2, 1)).await.unwrap();
        handle.trigger().unwrap();
        handle.trigger().unwrap();

        assert!(
            testing::eventually(|| async move { db_ref.queue().count_pending().await.unwrap() == 0 })
                .await
        );

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(transport.remaining(), 0);

        assert!(matches!(handle.trigger(), Err(SyncError::Shutdown)));
        assert!(matches!(handle.shutdown().await, Err(SyncError::Shutdown)));
    }

    #[tokio::test]
    async fn test_shutdown_during_pass_leaves_items_queued() {
        let (db, _transport, engine) = testing::engine(vec![Reply::Hang], settings()).await;
        db.library()
            .add(&testing::media(1, None), EntryStatus::Watching, 0, None)
            .await
            .unwrap();
        engine.enqueue(&NewOperation::progress(1, 3)).await.unwrap();

        let (scheduler, handle) = SyncScheduler::new(engine.clone(), &settings());
        let task = scheduler.spawn();
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("scheduler did not stop")
            .unwrap();

        let pending = db.queue().pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_scheduler() {
        let (_db, _transport, engine) = testing::engine(vec![], settings()).await;
        let (scheduler, handle) = SyncScheduler::new(engine, &settings());
        let task = scheduler.spawn();

        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
