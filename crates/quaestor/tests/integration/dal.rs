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

//! DAL integration tests: atomic outbox pairing and the entry state machine.

use crate::fixtures::{sample_expense, test_dal};
use chrono::Utc;
use quaestor::database::universal_types::UniversalTimestamp;
use quaestor::models::expense::SyncStatus;
use quaestor::models::sync_outbox::{OperationKind, OutboxStatus};
use quaestor::ValidationError;

#[tokio::test]
async fn test_create_pairs_expense_with_sync_entry() {
    let dal = test_dal().await;

    let expense = dal
        .expense()
        .create(sample_expense("groceries", 4200), 5)
        .await
        .unwrap();

    assert_eq!(expense.sync_status, SyncStatus::Pending.as_str());

    let entries = dal.sync_outbox().list_for_expense(expense.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.operation, OperationKind::Sync.as_str());
    assert_eq!(entry.expense_id, expense.id);
    assert_eq!(entry.status, OutboxStatus::Pending.as_str());
    assert_eq!(entry.attempts, 0);
    assert_eq!(entry.max_attempts, 5);
    assert!(entry.snapshot.is_none());
    assert!(entry.processed_at.is_none());
}

#[tokio::test]
async fn test_delete_pairs_removal_with_snapshot_entry() {
    let dal = test_dal().await;

    let expense = dal
        .expense()
        .create(sample_expense("one-off", 999), 5)
        .await
        .unwrap();
    dal.expense().delete(expense.id, 5).await.unwrap();

    // The subject row is gone.
    assert!(dal.expense().find_by_id(expense.id).await.unwrap().is_none());

    let entries = dal.sync_outbox().list_for_expense(expense.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    let delete_entry = entries
        .iter()
        .find(|e| e.operation == OperationKind::Delete.as_str())
        .expect("delete entry should exist");

    let snapshot = delete_entry
        .decode_snapshot()
        .unwrap()
        .expect("delete entry should carry a snapshot");
    assert_eq!(snapshot.id, expense.id);
    assert_eq!(snapshot.amount_cents, 999);
    assert_eq!(snapshot.description, "one-off");
}

#[tokio::test]
async fn test_delete_of_missing_expense_adds_no_entry() {
    let dal = test_dal().await;
    let phantom = quaestor::database::universal_types::UniversalUuid::new_v4();

    let err = dal.expense().delete(phantom, 5).await.unwrap_err();
    assert!(matches!(err, ValidationError::NotFound { .. }));

    assert_eq!(
        dal.sync_outbox()
            .count_by_status(OutboxStatus::Pending)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_mark_processing_claims_exactly_once() {
    let dal = test_dal().await;
    let expense = dal
        .expense()
        .create(sample_expense("claimable", 100), 5)
        .await
        .unwrap();
    let entry = &dal.sync_outbox().list_for_expense(expense.id).await.unwrap()[0];

    assert!(dal.sync_outbox().mark_processing(entry.id).await.unwrap());
    // The status guard makes the second claim lose.
    assert!(!dal.sync_outbox().mark_processing(entry.id).await.unwrap());

    let reloaded = dal.sync_outbox().get_by_id(entry.id).await.unwrap();
    assert_eq!(reloaded.status, OutboxStatus::Processing.as_str());
}

#[tokio::test]
async fn test_reset_stale_processing_makes_entry_redequeuable() {
    let dal = test_dal().await;
    let expense = dal
        .expense()
        .create(sample_expense("stale", 100), 5)
        .await
        .unwrap();
    let entry = &dal.sync_outbox().list_for_expense(expense.id).await.unwrap()[0];
    dal.sync_outbox().mark_processing(entry.id).await.unwrap();

    // Processing entries are invisible to dequeue.
    assert!(dal.sync_outbox().dequeue_batch(10).await.unwrap().is_empty());

    let reverted = dal.sync_outbox().reset_stale_processing().await.unwrap();
    assert_eq!(reverted, 1);

    let batch = dal.sync_outbox().dequeue_batch(10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, entry.id);
}

#[tokio::test]
async fn test_increment_attempt_returns_entry_to_pending() {
    let dal = test_dal().await;
    let expense = dal
        .expense()
        .create(sample_expense("retryable", 100), 5)
        .await
        .unwrap();
    let entry = &dal.sync_outbox().list_for_expense(expense.id).await.unwrap()[0];

    dal.sync_outbox().mark_processing(entry.id).await.unwrap();
    dal.sync_outbox()
        .increment_attempt(entry.id, "sink offline", Some(UniversalTimestamp::now()))
        .await
        .unwrap();

    let reloaded = dal.sync_outbox().get_by_id(entry.id).await.unwrap();
    assert_eq!(reloaded.status, OutboxStatus::Pending.as_str());
    assert_eq!(reloaded.attempts, 1);
    assert_eq!(reloaded.last_error.as_deref(), Some("sink offline"));
    assert!(reloaded.next_retry_at.is_some());
    assert!(reloaded.processed_at.is_none());
}

#[tokio::test]
async fn test_mark_failed_is_terminal_and_records_final_attempt() {
    let dal = test_dal().await;
    let expense = dal
        .expense()
        .create(sample_expense("doomed", 100), 1)
        .await
        .unwrap();
    let entry = &dal.sync_outbox().list_for_expense(expense.id).await.unwrap()[0];

    dal.sync_outbox().mark_processing(entry.id).await.unwrap();
    dal.sync_outbox()
        .mark_failed(entry.id, "permission denied")
        .await
        .unwrap();

    let reloaded = dal.sync_outbox().get_by_id(entry.id).await.unwrap();
    assert_eq!(reloaded.status, OutboxStatus::Failed.as_str());
    assert_eq!(reloaded.attempts, 1);
    assert!(reloaded.processed_at.is_some());
    assert_eq!(reloaded.last_error.as_deref(), Some("permission denied"));
}

#[tokio::test]
async fn test_cleanup_removes_only_aged_completed_entries() {
    let dal = test_dal().await;
    let done = dal
        .expense()
        .create(sample_expense("done", 100), 5)
        .await
        .unwrap();
    let waiting = dal
        .expense()
        .create(sample_expense("waiting", 100), 5)
        .await
        .unwrap();

    let done_entry = &dal.sync_outbox().list_for_expense(done.id).await.unwrap()[0];
    dal.sync_outbox().mark_processing(done_entry.id).await.unwrap();
    dal.sync_outbox().mark_completed(done_entry.id).await.unwrap();

    // Cutoff in the future: every completed entry is older than it.
    let cutoff = UniversalTimestamp(Utc::now() + chrono::Duration::hours(1));
    let deleted = dal.sync_outbox().cleanup_completed(cutoff).await.unwrap();
    assert_eq!(deleted, 1);

    // The pending entry for the other expense is untouched.
    let remaining = dal.sync_outbox().list_for_expense(waiting.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].status, OutboxStatus::Pending.as_str());
}

#[tokio::test]
async fn test_dequeue_returns_oldest_first() {
    let dal = test_dal().await;

    let first = dal
        .expense()
        .create(sample_expense("first", 1), 5)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = dal
        .expense()
        .create(sample_expense("second", 2), 5)
        .await
        .unwrap();

    let batch = dal.sync_outbox().dequeue_batch(10).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].expense_id, first.id);
    assert_eq!(batch[1].expense_id, second.id);

    // Dequeue itself does not mutate state.
    assert_eq!(
        dal.sync_outbox()
            .count_by_status(OutboxStatus::Pending)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_recurring_template_lifecycle() {
    let dal = test_dal().await;
    let template = dal
        .recurring_expense()
        .create(crate::fixtures::template(
            "monthly",
            chrono::NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            500,
        ))
        .await
        .unwrap();

    assert!(template.is_active());
    assert!(template.last_fired_at.is_none());

    let fired_at = UniversalTimestamp::now();
    dal.recurring_expense()
        .set_last_fired(template.id, fired_at)
        .await
        .unwrap();

    let reloaded = dal.recurring_expense().get_by_id(template.id).await.unwrap();
    assert!(reloaded.last_fired_at.is_some());

    // Retiring removes it from the active listing but keeps the row.
    dal.recurring_expense()
        .set_active(template.id, false)
        .await
        .unwrap();
    assert!(dal.recurring_expense().list_active().await.unwrap().is_empty());
    assert!(dal.recurring_expense().get_by_id(template.id).await.is_ok());
}
