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

//! # Recurring Scheduler
//!
//! Turns due templates into concrete expenses. Each evaluation pass loads
//! the active templates fresh from storage, resolves the dueness rule for
//! each template's frequency tag, and fires the due ones through the
//! expense DAL's atomic create-with-outbox operation.
//!
//! Firing semantics are at-least-once: `last_fired_at` is persisted only
//! after the expense exists, so a crash (or update failure) between the two
//! steps re-fires the template on the next due evaluation rather than
//! losing it.

use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dal::DAL;
use crate::database::universal_types::UniversalTimestamp;
use crate::dueness::DuenessRegistry;
use crate::error::SchedulerError;
use crate::models::expense::NewExpense;
use crate::models::recurring_expense::RecurringExpense;
use crate::models::sync_outbox::OperationKind;
use crate::transport::{SyncNotice, SyncNotifier};
use std::time::Duration;

/// Background scheduler for recurring expense templates.
pub struct RecurringScheduler {
    dal: DAL,
    registry: Arc<DuenessRegistry>,
    notifier: Option<Arc<dyn SyncNotifier>>,
    poll_interval: Duration,
    max_sync_attempts: i32,
}

impl RecurringScheduler {
    pub fn new(
        dal: DAL,
        registry: Arc<DuenessRegistry>,
        poll_interval: Duration,
        max_sync_attempts: i32,
    ) -> Self {
        Self {
            dal,
            registry,
            notifier: None,
            poll_interval,
            max_sync_attempts,
        }
    }

    /// Attaches a best-effort notifier invoked after each successful firing.
    pub fn with_notifier(mut self, notifier: Arc<dyn SyncNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Evaluates every active template against `now` and fires the due ones.
    ///
    /// Per-template failures (unknown frequency, creation error, last-fired
    /// update error) are logged and isolated; the batch always runs to the
    /// end and the count of successful firings is returned.
    pub async fn process_due_templates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<usize, SchedulerError> {
        let templates = self.dal.recurring_expense().list_active().await?;
        let mut fired = 0;

        for template in &templates {
            let rule = match self.registry.get(&template.frequency) {
                Ok(rule) => rule,
                Err(e) => {
                    error!(
                        template_id = %template.id,
                        frequency = %template.frequency,
                        error = %e,
                        "Skipping template with unknown frequency"
                    );
                    continue;
                }
            };

            if !Self::within_window(template, now) {
                continue;
            }

            let last_fired = template.last_fired_at.map(|t| t.into_inner());
            if !rule.is_due(last_fired, now, template.start_date.as_date()) {
                continue;
            }

            match self.fire_template(template, now).await {
                Ok(()) => fired += 1,
                Err(e) => {
                    error!(
                        template_id = %template.id,
                        error = %e,
                        "Failed to fire template; continuing batch"
                    );
                }
            }
        }

        if fired > 0 {
            counter!("quaestor_templates_fired_total").increment(fired as u64);
        }
        Ok(fired)
    }

    /// Whether `now` falls between the template's start and end dates.
    fn within_window(template: &RecurringExpense, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if today < template.start_date.as_date() {
            return false;
        }
        if let Some(end) = template.end_date {
            if today > end.as_date() {
                return false;
            }
        }
        true
    }

    async fn fire_template(
        &self,
        template: &RecurringExpense,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        let new_expense = NewExpense {
            spent_at: UniversalTimestamp(now),
            amount_cents: template.amount_cents,
            description: template.description.clone(),
            category: template.category.clone(),
            subcategory: template.subcategory.clone(),
            notes: template.notes.clone(),
        };

        let expense = self
            .dal
            .expense()
            .create(new_expense, self.max_sync_attempts)
            .await?;

        info!(
            template_id = %template.id,
            expense_id = %expense.id,
            "Recurring template fired"
        );

        // The expense exists from here on. A failed last-fired update means
        // the template may re-fire on the next due evaluation; that is the
        // documented at-least-once contract, so the error is not retried.
        if let Err(e) = self
            .dal
            .recurring_expense()
            .set_last_fired(template.id, UniversalTimestamp(now))
            .await
        {
            warn!(
                template_id = %template.id,
                error = %e,
                "Failed to persist last-fired time; template may re-fire"
            );
        }

        if let Some(notifier) = &self.notifier {
            let notice = SyncNotice {
                expense_id: expense.id,
                operation: OperationKind::Sync,
            };
            if let Err(e) = notifier.notify(&notice).await {
                debug!(
                    expense_id = %expense.id,
                    error = %e,
                    "Best-effort sync notice not delivered; poller will catch up"
                );
            }
        }

        Ok(())
    }

    /// Runs the evaluation loop until the shutdown signal flips.
    ///
    /// The interval's first tick completes immediately, giving the required
    /// evaluation pass at process start.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Recurring scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Utc::now();
                    match self.process_due_templates(now).await {
                        Ok(0) => {}
                        Ok(fired) => info!(fired, "Recurring evaluation pass fired templates"),
                        Err(e) => error!(error = %e, "Recurring evaluation pass failed"),
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Recurring scheduler stopped");
    }
}
