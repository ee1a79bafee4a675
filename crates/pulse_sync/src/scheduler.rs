//! Periodic drain scheduling
//!
//! A background task that drains the queue every drain interval while
//! online, drains immediately on an offline-to-online transition, and keeps
//! the timer cancelled while offline. Teardown is explicit through
//! [`SchedulerHandle::shutdown`]; a stuck remote call can stall one pass,
//! but the engine's single-flight flag prevents passes from stacking.

use crate::engine::SyncEngine;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle for tearing the scheduler task down.
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler and wait for the task to finish. Any drain pass
    /// already in flight runs to completion first.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

impl SyncEngine {
    /// Spawn the periodic drain task.
    ///
    /// The task first brings the local store up (retrying with backoff),
    /// then follows connectivity: online means an immediate drain plus one
    /// per interval tick and one per enqueue nudge; offline means the timer
    /// is cancelled until the next transition.
    pub fn spawn_scheduler(self: &Arc<Self>) -> SchedulerHandle {
        let engine = Arc::clone(self);
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            engine.run_scheduler(stop_rx).await;
            tracing::debug!("Sync scheduler stopped");
        });

        SchedulerHandle { stop_tx, task }
    }

    async fn run_scheduler(&self, mut stop: watch::Receiver<bool>) {
        tokio::select! {
            _ = self.ensure_initialized() => {}
            _ = stop.changed() => return,
        }

        let mut status = self.net().subscribe();
        loop {
            let online = *status.borrow_and_update();
            if !online {
                // Timer cancelled while offline; wait for the next
                // transition.
                tokio::select! {
                    changed = status.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = stop.changed() => return,
                }
                continue;
            }

            // Online: the interval's first tick fires immediately, which
            // doubles as the drain-on-transition.
            let mut interval = tokio::time::interval(self.drain_interval());
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.drain_logged().await;
                    }
                    _ = self.drain_notify.notified() => {
                        self.drain_logged().await;
                    }
                    changed = status.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if !*status.borrow() {
                            break;
                        }
                    }
                    _ = stop.changed() => return,
                }
            }
        }
    }

    async fn drain_logged(&self) {
        if let Err(e) = self.drain_now().await {
            tracing::warn!(error = %e, "Drain pass failed");
        }
    }
}
