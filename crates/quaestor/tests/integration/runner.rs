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

//! Full-system test: template -> scheduler firing -> outbox -> processor ->
//! sink, wired through the runner under one shutdown signal.

use crate::fixtures::{template, MockSink};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

use quaestor::config::QuaestorConfig;
use quaestor::models::expense::SyncStatus;
use quaestor::runner::SyncRunner;

#[tokio::test]
async fn test_runner_syncs_fired_template_end_to_end() {
    let sink = Arc::new(MockSink::new());
    let config = QuaestorConfig::builder()
        // First scheduler tick fires immediately; no second pass needed.
        .scheduler_poll_interval(Duration::from_secs(3600))
        .processor_poll_interval(Duration::from_millis(10))
        .cleanup_interval(Duration::from_secs(3600))
        .build();

    let runner = SyncRunner::new(":memory:", sink.clone(), config)
        .await
        .expect("runner should initialize");

    runner
        .dal()
        .recurring_expense()
        .create(template(
            "daily",
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            2500,
        ))
        .await
        .unwrap();

    runner.start().await.unwrap();

    // Wait for the startup evaluation pass and a few processor cycles.
    let mut synced = 0;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        synced = runner
            .dal()
            .expense()
            .count_by_sync_status(SyncStatus::Synced)
            .await
            .unwrap();
        if synced == 1 {
            break;
        }
    }
    assert_eq!(synced, 1, "the fired expense should reach the sink");
    assert_eq!(sink.appended.lock().len(), 1);
    assert_eq!(sink.appended.lock()[0].amount_cents, 2500);

    runner.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_runner_shutdown_before_start_is_clean() {
    let sink = Arc::new(MockSink::new());
    let runner = SyncRunner::new(":memory:", sink, QuaestorConfig::default())
        .await
        .unwrap();
    runner.shutdown(Duration::from_secs(1)).await.unwrap();
}
