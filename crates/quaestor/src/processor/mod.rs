/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! # Sync Processor
//!
//! Drains the sync outbox: per cycle it fetches a bounded batch of pending
//! entries (oldest first), claims each one via the status-guarded
//! `mark_processing` transition, dispatches it to the external sink, and
//! applies the success/failure policy back onto the queue.
//!
//! Retry is implicit: a failed entry returns to `pending` with an
//! incremented attempt count and simply waits for a later poll cycle.
//! The processor is idempotent-safe to re-run — completed entries are never
//! re-dispatched, and entries left `processing` by a crash are reclaimed by
//! the stale reset at startup.
//!
//! Two independent timers run while started: the short work loop and the
//! long retention cleanup loop.

use chrono::Utc;
use metrics::counter;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::QuaestorConfig;
use crate::dal::DAL;
use crate::database::universal_types::UniversalTimestamp;
use crate::error::ProcessorError;
use crate::models::expense::SyncStatus;
use crate::models::sync_outbox::{OperationKind, SyncOutboxEntry};
use crate::sink::{DeleteRequest, ExpenseSink, SinkRecord};

/// How a single dispatch attempt resolved.
enum DispatchOutcome {
    /// The sink accepted the operation (or it became a no-op).
    Done,
    /// The attempt failed but a later attempt could succeed.
    Retry(String),
    /// The entry can never succeed (undecodable data); terminal.
    Poison(String),
}

struct ProcessorHandles {
    shutdown_tx: watch::Sender<bool>,
    work: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

/// Background processor that pushes outbox entries to the external sink.
///
/// `SyncProcessor` is `Clone`; clones share the same lifecycle state, and
/// the background loops run on clones moved into their tasks.
#[derive(Clone)]
pub struct SyncProcessor {
    dal: DAL,
    sink: Arc<dyn ExpenseSink>,
    poll_interval: Duration,
    batch_size: i64,
    cleanup_interval: Duration,
    completed_retention: Duration,
    handles: Arc<Mutex<Option<ProcessorHandles>>>,
}

impl SyncProcessor {
    pub fn new(dal: DAL, sink: Arc<dyn ExpenseSink>, config: &QuaestorConfig) -> Self {
        Self {
            dal,
            sink,
            poll_interval: config.processor_poll_interval(),
            batch_size: config.processor_batch_size(),
            cleanup_interval: config.cleanup_interval(),
            completed_retention: config.completed_retention(),
            handles: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether the processor loops are currently running.
    pub fn is_running(&self) -> bool {
        self.handles.lock().is_some()
    }

    /// Starts the work and cleanup loops.
    ///
    /// Rejected when already running. Before the first poll, entries left
    /// `processing` by a previous crash are reverted to `pending`.
    pub async fn start(&self) -> Result<(), ProcessorError> {
        if self.is_running() {
            return Err(ProcessorError::AlreadyRunning);
        }

        self.dal.sync_outbox().reset_stale_processing().await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let work = {
            let processor = self.clone();
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move { processor.work_loop(shutdown).await })
        };
        let cleanup = {
            let processor = self.clone();
            tokio::spawn(async move { processor.cleanup_loop(shutdown_rx).await })
        };

        let mut handles = self.handles.lock();
        if handles.is_some() {
            // A racing start won; tear down the loops we just spawned.
            let _ = shutdown_tx.send(true);
            return Err(ProcessorError::AlreadyRunning);
        }
        *handles = Some(ProcessorHandles {
            shutdown_tx,
            work,
            cleanup,
        });
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            batch_size = self.batch_size,
            "Sync processor started"
        );
        Ok(())
    }

    /// Stops the loops, waiting up to `deadline` for the in-flight cycle.
    ///
    /// The in-flight dispatch is never force-killed: on deadline expiry the
    /// loops are left to wind down on their own and any work they abandon
    /// is reclaimed by the stale reset on the next start.
    pub async fn stop(&self, deadline: Duration) -> Result<(), ProcessorError> {
        let handles = self
            .handles
            .lock()
            .take()
            .ok_or(ProcessorError::NotRunning)?;

        let _ = handles.shutdown_tx.send(true);

        let joined = tokio::time::timeout(deadline, async {
            let _ = handles.work.await;
            let _ = handles.cleanup.await;
        })
        .await;

        match joined {
            Ok(()) => {
                info!("Sync processor stopped");
                Ok(())
            }
            Err(_) => {
                warn!("Sync processor stop deadline expired; abandoning in-flight cycle");
                Err(ProcessorError::ShutdownTimeout)
            }
        }
    }

    async fn work_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_cycle().await {
                        Ok(0) => {}
                        Ok(dispatched) => debug!(dispatched, "Sync cycle dispatched entries"),
                        Err(e) => error!(error = %e, "Sync cycle failed"),
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn cleanup_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.cleanup_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let retention = chrono::Duration::from_std(self.completed_retention)
                        .unwrap_or_else(|_| chrono::Duration::days(7));
                    let cutoff = UniversalTimestamp(Utc::now() - retention);
                    match self.dal.sync_outbox().cleanup_completed(cutoff).await {
                        Ok(0) => {}
                        Ok(deleted) => info!(deleted, "Cleaned up aged completed outbox entries"),
                        Err(e) => error!(error = %e, "Outbox cleanup failed"),
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Runs one polling cycle: fetch, claim, dispatch, settle.
    ///
    /// Per-entry failures are logged and isolated so a bad entry never
    /// blocks its siblings. Returns the number of entries dispatched.
    pub async fn run_cycle(&self) -> Result<usize, ProcessorError> {
        let entries = self.dal.sync_outbox().dequeue_batch(self.batch_size).await?;
        let mut dispatched = 0;

        for entry in &entries {
            match self.process_entry(entry).await {
                Ok(true) => dispatched += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(
                        entry_id = %entry.id,
                        expense_id = %entry.expense_id,
                        operation = %entry.operation,
                        error = %e,
                        "Failed to process outbox entry; continuing batch"
                    );
                }
            }
        }

        Ok(dispatched)
    }

    /// Claims and dispatches one entry. Returns `false` when the claim was
    /// lost to a competing cycle.
    async fn process_entry(&self, entry: &SyncOutboxEntry) -> Result<bool, ProcessorError> {
        if !self.dal.sync_outbox().mark_processing(entry.id).await? {
            debug!(entry_id = %entry.id, "Entry already claimed; skipping");
            return Ok(false);
        }

        let outcome = match OperationKind::parse(&entry.operation) {
            Some(OperationKind::Sync) => self.dispatch_sync(entry).await,
            Some(OperationKind::Delete) => self.dispatch_delete(entry).await,
            None => DispatchOutcome::Poison(format!("unknown operation kind '{}'", entry.operation)),
        };

        self.settle(entry, outcome).await?;
        Ok(true)
    }

    async fn dispatch_sync(&self, entry: &SyncOutboxEntry) -> DispatchOutcome {
        let expense = match self.dal.expense().find_by_id(entry.expense_id).await {
            Ok(expense) => expense,
            Err(e) => return DispatchOutcome::Retry(e.to_string()),
        };

        let expense = match expense {
            Some(expense) => expense,
            None => {
                // Subject hard-deleted before its sync ran; the paired
                // delete operation supersedes this entry.
                debug!(
                    expense_id = %entry.expense_id,
                    "Subject gone before sync; completing as no-op"
                );
                return DispatchOutcome::Done;
            }
        };

        let record = SinkRecord::from_expense(&expense);
        match self.sink.append(&record).await {
            Ok(reference) => {
                debug!(
                    expense_id = %expense.id,
                    sink_ref = %reference.0,
                    "Expense appended to sink"
                );
                if let Err(e) = self
                    .dal
                    .expense()
                    .set_sync_status(expense.id, SyncStatus::Synced)
                    .await
                {
                    warn!(expense_id = %expense.id, error = %e, "Failed to flag expense synced");
                }
                DispatchOutcome::Done
            }
            Err(e) => DispatchOutcome::Retry(e.to_string()),
        }
    }

    async fn dispatch_delete(&self, entry: &SyncOutboxEntry) -> DispatchOutcome {
        let request = match entry.decode_snapshot() {
            Err(e) => {
                return DispatchOutcome::Poison(format!("undecodable snapshot: {}", e));
            }
            Ok(Some(snapshot)) => DeleteRequest::BySnapshot(snapshot),
            Ok(None) => DeleteRequest::ById(entry.expense_id),
        };

        match self.sink.delete(&request).await {
            Ok(()) => DispatchOutcome::Done,
            Err(e) => DispatchOutcome::Retry(e.to_string()),
        }
    }

    /// Applies the dispatch outcome back onto the queue and the subject.
    async fn settle(
        &self,
        entry: &SyncOutboxEntry,
        outcome: DispatchOutcome,
    ) -> Result<(), ProcessorError> {
        match outcome {
            DispatchOutcome::Done => {
                self.dal.sync_outbox().mark_completed(entry.id).await?;
                counter!("quaestor_sync_completed_total").increment(1);
            }
            DispatchOutcome::Poison(reason) => {
                warn!(
                    entry_id = %entry.id,
                    expense_id = %entry.expense_id,
                    reason = %reason,
                    "Dropping poison outbox entry"
                );
                self.dal.sync_outbox().mark_failed(entry.id, &reason).await?;
                self.flag_subject_error(entry).await;
                counter!("quaestor_sync_failed_total").increment(1);
            }
            DispatchOutcome::Retry(reason) => {
                if entry.attempts + 1 >= entry.max_attempts {
                    warn!(
                        entry_id = %entry.id,
                        expense_id = %entry.expense_id,
                        attempts = entry.attempts + 1,
                        reason = %reason,
                        "Outbox entry exhausted its attempts"
                    );
                    self.dal.sync_outbox().mark_failed(entry.id, &reason).await?;
                    self.flag_subject_error(entry).await;
                    counter!("quaestor_sync_failed_total").increment(1);
                } else {
                    let next_retry = UniversalTimestamp(
                        Utc::now()
                            + chrono::Duration::from_std(self.poll_interval)
                                .unwrap_or_else(|_| chrono::Duration::seconds(30)),
                    );
                    debug!(
                        entry_id = %entry.id,
                        attempt = entry.attempts + 1,
                        max_attempts = entry.max_attempts,
                        reason = %reason,
                        "Outbox entry will retry on a later cycle"
                    );
                    self.dal
                        .sync_outbox()
                        .increment_attempt(entry.id, &reason, Some(next_retry))
                        .await?;
                    counter!("quaestor_sync_retried_total").increment(1);
                }
            }
        }
        Ok(())
    }

    /// Flags the subject record sync-errored, if it still exists.
    async fn flag_subject_error(&self, entry: &SyncOutboxEntry) {
        match self
            .dal
            .expense()
            .set_sync_status(entry.expense_id, SyncStatus::Error)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(expense_id = %entry.expense_id, "Subject gone; no sync-error flag to set")
            }
            Err(e) => {
                warn!(expense_id = %entry.expense_id, error = %e, "Failed to flag subject sync-errored")
            }
        }
    }
}
