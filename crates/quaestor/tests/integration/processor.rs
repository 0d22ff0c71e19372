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

//! Sync processor integration tests: dispatch, retry policy, terminal
//! failure flagging, crash recovery and lifecycle.

use crate::fixtures::{sample_expense, test_dal, MockSink};
use std::sync::Arc;
use std::time::Duration;

use quaestor::config::QuaestorConfig;
use quaestor::dal::DAL;
use quaestor::models::expense::SyncStatus;
use quaestor::models::sync_outbox::{OperationKind, OutboxStatus};
use quaestor::processor::SyncProcessor;
use quaestor::sink::DeleteRequest;
use quaestor::ProcessorError;

fn processor_with(dal: &DAL, sink: Arc<MockSink>) -> Arc<SyncProcessor> {
    let config = QuaestorConfig::builder()
        .processor_poll_interval(Duration::from_millis(10))
        .cleanup_interval(Duration::from_secs(3600))
        .processor_batch_size(10)
        .build();
    Arc::new(SyncProcessor::new(dal.clone(), sink, &config))
}

#[tokio::test]
async fn test_successful_dispatch_completes_entry_and_flags_subject() {
    let dal = test_dal().await;
    let sink = Arc::new(MockSink::new());
    let processor = processor_with(&dal, sink.clone());

    let expense = dal
        .expense()
        .create(sample_expense("lunch", 1500), 5)
        .await
        .unwrap();

    let dispatched = processor.run_cycle().await.unwrap();
    assert_eq!(dispatched, 1);

    assert_eq!(sink.appended.lock().len(), 1);
    assert_eq!(sink.appended.lock()[0].amount_cents, 1500);

    let entry = &dal.sync_outbox().list_for_expense(expense.id).await.unwrap()[0];
    assert_eq!(entry.status, OutboxStatus::Completed.as_str());
    assert!(entry.processed_at.is_some());

    let expense = dal.expense().get_by_id(expense.id).await.unwrap();
    assert_eq!(expense.sync_status, SyncStatus::Synced.as_str());
}

#[tokio::test]
async fn test_retry_then_success_records_failed_attempts_only() {
    let dal = test_dal().await;
    // Fail max_attempts - 1 times, then succeed.
    let sink = Arc::new(MockSink::failing(2));
    let processor = processor_with(&dal, sink.clone());

    let expense = dal
        .expense()
        .create(sample_expense("flaky", 100), 3)
        .await
        .unwrap();

    processor.run_cycle().await.unwrap();
    processor.run_cycle().await.unwrap();
    processor.run_cycle().await.unwrap();

    let entry = &dal.sync_outbox().list_for_expense(expense.id).await.unwrap()[0];
    assert_eq!(entry.status, OutboxStatus::Completed.as_str());
    assert_eq!(entry.attempts, 2);

    let expense = dal.expense().get_by_id(expense.id).await.unwrap();
    assert_eq!(expense.sync_status, SyncStatus::Synced.as_str());
}

#[tokio::test]
async fn test_attempt_exhaustion_fails_entry_and_flags_subject() {
    let dal = test_dal().await;
    let sink = Arc::new(MockSink::failing(100));
    let processor = processor_with(&dal, sink);

    let expense = dal
        .expense()
        .create(sample_expense("doomed", 100), 2)
        .await
        .unwrap();

    processor.run_cycle().await.unwrap();
    processor.run_cycle().await.unwrap();

    let entry = &dal.sync_outbox().list_for_expense(expense.id).await.unwrap()[0];
    assert_eq!(entry.status, OutboxStatus::Failed.as_str());
    assert_eq!(entry.attempts, 2);
    assert!(entry.last_error.is_some());

    let expense = dal.expense().get_by_id(expense.id).await.unwrap();
    assert_eq!(expense.sync_status, SyncStatus::Error.as_str());
}

#[tokio::test]
async fn test_delete_dispatches_snapshot_and_orphan_sync_completes() {
    let dal = test_dal().await;
    let sink = Arc::new(MockSink::new());
    let processor = processor_with(&dal, sink.clone());

    let expense = dal
        .expense()
        .create(sample_expense("short-lived", 750), 5)
        .await
        .unwrap();
    dal.expense().delete(expense.id, 5).await.unwrap();

    let dispatched = processor.run_cycle().await.unwrap();
    assert_eq!(dispatched, 2);

    // The sync operation found its subject gone and completed as a no-op.
    assert!(sink.appended.lock().is_empty());

    // The delete operation carried the snapshot.
    let deleted = sink.deleted.lock();
    assert_eq!(deleted.len(), 1);
    match &deleted[0] {
        DeleteRequest::BySnapshot(snapshot) => {
            assert_eq!(snapshot.id, expense.id);
            assert_eq!(snapshot.amount_cents, 750);
        }
        DeleteRequest::ById(_) => panic!("delete should use the stored snapshot"),
    }

    let entries = dal.sync_outbox().list_for_expense(expense.id).await.unwrap();
    assert!(entries
        .iter()
        .all(|e| e.status == OutboxStatus::Completed.as_str()));
}

#[tokio::test]
async fn test_completed_entries_are_never_redispatched() {
    let dal = test_dal().await;
    let sink = Arc::new(MockSink::new());
    let processor = processor_with(&dal, sink.clone());

    dal.expense()
        .create(sample_expense("once", 100), 5)
        .await
        .unwrap();

    processor.run_cycle().await.unwrap();
    processor.run_cycle().await.unwrap();
    processor.run_cycle().await.unwrap();

    assert_eq!(sink.appended.lock().len(), 1);
}

#[tokio::test]
async fn test_start_reclaims_stale_processing_entries() {
    let dal = test_dal().await;
    let sink = Arc::new(MockSink::new());
    let processor = processor_with(&dal, sink.clone());

    let expense = dal
        .expense()
        .create(sample_expense("stuck", 100), 5)
        .await
        .unwrap();
    let entry = &dal.sync_outbox().list_for_expense(expense.id).await.unwrap()[0];
    // Simulate a crash mid-cycle from a previous process.
    dal.sync_outbox().mark_processing(entry.id).await.unwrap();

    processor.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    processor.stop(Duration::from_secs(5)).await.unwrap();

    let reloaded = dal.sync_outbox().get_by_id(entry.id).await.unwrap();
    assert_eq!(reloaded.status, OutboxStatus::Completed.as_str());
    assert_eq!(sink.appended.lock().len(), 1);
}

#[tokio::test]
async fn test_lifecycle_start_stop_restart() {
    let dal = test_dal().await;
    let sink = Arc::new(MockSink::new());
    let processor = processor_with(&dal, sink);

    processor.start().await.unwrap();
    assert!(processor.is_running());

    // A second start is rejected while running.
    assert!(matches!(
        processor.start().await,
        Err(ProcessorError::AlreadyRunning)
    ));

    processor.stop(Duration::from_secs(5)).await.unwrap();
    assert!(!processor.is_running());

    // Stop without a running processor is rejected.
    assert!(matches!(
        processor.stop(Duration::from_secs(1)).await,
        Err(ProcessorError::NotRunning)
    ));

    // Restart works after a clean stop.
    processor.start().await.unwrap();
    processor.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_operation_kinds_parse_from_stored_entries() {
    let dal = test_dal().await;
    let expense = dal
        .expense()
        .create(sample_expense("kinds", 100), 5)
        .await
        .unwrap();
    dal.expense().delete(expense.id, 5).await.unwrap();

    let entries = dal.sync_outbox().list_for_expense(expense.id).await.unwrap();
    let kinds: Vec<_> = entries
        .iter()
        .map(|e| OperationKind::parse(&e.operation).unwrap())
        .collect();
    assert_eq!(kinds, vec![OperationKind::Sync, OperationKind::Delete]);
}
