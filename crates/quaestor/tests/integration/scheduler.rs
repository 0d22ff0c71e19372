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

//! Recurring scheduler integration tests, driven with fixed evaluation
//! instants so every dueness decision is deterministic.

use crate::fixtures::{template, test_dal};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use quaestor::dal::DAL;
use quaestor::database::universal_types::UniversalDate;
use quaestor::dueness::DuenessRegistry;
use quaestor::models::sync_outbox::OutboxStatus;
use quaestor::scheduler::RecurringScheduler;
use quaestor::transport::{SyncNotice, SyncNotifier};
use quaestor::TransportError;

fn scheduler_for(dal: &DAL) -> RecurringScheduler {
    RecurringScheduler::new(
        dal.clone(),
        Arc::new(DuenessRegistry::standard()),
        Duration::from_secs(3600),
        5,
    )
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn test_monthly_anchor_31_end_to_end() {
    let dal = test_dal().await;
    let scheduler = scheduler_for(&dal);

    dal.recurring_expense()
        .create(template(
            "monthly",
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            500,
        ))
        .await
        .unwrap();

    // Jan 31: never fired, due today.
    let fired = scheduler.process_due_templates(at(2025, 1, 31)).await.unwrap();
    assert_eq!(fired, 1);

    let batch = dal.sync_outbox().dequeue_batch(10).await.unwrap();
    assert_eq!(batch.len(), 1);
    let expense = dal
        .expense()
        .get_by_id(batch[0].expense_id)
        .await
        .unwrap();
    assert_eq!(expense.amount_cents, 500);
    assert_eq!(expense.spent_at.as_datetime().date_naive().day(), 31);

    let reloaded = dal.recurring_expense().list_active().await.unwrap();
    let last_fired = reloaded[0].last_fired_at.expect("last_fired_at should be set");
    assert_eq!(
        last_fired.as_datetime().date_naive(),
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
    );

    // Same day again: nothing new.
    let fired = scheduler.process_due_templates(at(2025, 1, 31)).await.unwrap();
    assert_eq!(fired, 0);

    // Feb 28 in a non-leap year: anchor day 31 clamps to month end.
    let fired = scheduler.process_due_templates(at(2025, 2, 28)).await.unwrap();
    assert_eq!(fired, 1);
    assert_eq!(
        dal.sync_outbox()
            .count_by_status(OutboxStatus::Pending)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_unknown_frequency_skipped_batch_continues() {
    let dal = test_dal().await;
    let scheduler = scheduler_for(&dal);

    dal.recurring_expense()
        .create(template(
            "fortnightly",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            100,
        ))
        .await
        .unwrap();
    dal.recurring_expense()
        .create(template(
            "daily",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            200,
        ))
        .await
        .unwrap();

    // The unknown tag is skipped with a logged error; the daily one fires.
    let fired = scheduler.process_due_templates(at(2025, 6, 1)).await.unwrap();
    assert_eq!(fired, 1);
}

#[tokio::test]
async fn test_inactive_template_never_fires() {
    let dal = test_dal().await;
    let scheduler = scheduler_for(&dal);

    let tpl = dal
        .recurring_expense()
        .create(template(
            "daily",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            100,
        ))
        .await
        .unwrap();
    dal.recurring_expense().set_active(tpl.id, false).await.unwrap();

    let fired = scheduler.process_due_templates(at(2025, 6, 1)).await.unwrap();
    assert_eq!(fired, 0);
}

#[tokio::test]
async fn test_window_boundaries_respected() {
    let dal = test_dal().await;
    let scheduler = scheduler_for(&dal);

    let mut tpl = template(
        "daily",
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
        100,
    );
    tpl.end_date = Some(UniversalDate(NaiveDate::from_ymd_opt(2025, 6, 20).unwrap()));
    dal.recurring_expense().create(tpl).await.unwrap();

    // Before the start date.
    assert_eq!(
        scheduler.process_due_templates(at(2025, 6, 9)).await.unwrap(),
        0
    );
    // Inside the window.
    assert_eq!(
        scheduler.process_due_templates(at(2025, 6, 15)).await.unwrap(),
        1
    );
    // Past the end date.
    assert_eq!(
        scheduler.process_due_templates(at(2025, 6, 21)).await.unwrap(),
        0
    );
}

struct RecordingNotifier {
    notices: Mutex<Vec<SyncNotice>>,
    fail: bool,
}

#[async_trait]
impl SyncNotifier for RecordingNotifier {
    async fn notify(&self, notice: &SyncNotice) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::CircuitOpen);
        }
        self.notices.lock().push(notice.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_notifier_receives_best_effort_notice() {
    let dal = test_dal().await;
    let notifier = Arc::new(RecordingNotifier {
        notices: Mutex::new(Vec::new()),
        fail: false,
    });
    let scheduler = scheduler_for(&dal).with_notifier(notifier.clone());

    dal.recurring_expense()
        .create(template(
            "daily",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            100,
        ))
        .await
        .unwrap();

    scheduler.process_due_templates(at(2025, 6, 1)).await.unwrap();
    assert_eq!(notifier.notices.lock().len(), 1);
}

#[tokio::test]
async fn test_notifier_failure_does_not_block_firing() {
    let dal = test_dal().await;
    let notifier = Arc::new(RecordingNotifier {
        notices: Mutex::new(Vec::new()),
        fail: true,
    });
    let scheduler = scheduler_for(&dal).with_notifier(notifier);

    dal.recurring_expense()
        .create(template(
            "daily",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            100,
        ))
        .await
        .unwrap();

    // The firing still counts and the outbox entry still exists: the
    // notification is pure optimization.
    let fired = scheduler.process_due_templates(at(2025, 6, 1)).await.unwrap();
    assert_eq!(fired, 1);
    assert_eq!(
        dal.sync_outbox()
            .count_by_status(OutboxStatus::Pending)
            .await
            .unwrap(),
        1
    );
}
