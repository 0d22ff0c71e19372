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

//! External sink capability interfaces.
//!
//! The engine never talks to a concrete sink implementation; it dispatches
//! through [`ExpenseSink`]. The sink is assumed commutative/idempotent per
//! logical subject — correctness does not depend on global sync order, and
//! every appended record carries a disambiguating sync tag so that two
//! appends for the same subject never collapse into one visible row.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::database::universal_types::UniversalUuid;
use crate::error::SinkError;
use crate::models::expense::Expense;
use crate::models::sync_outbox::ExpenseSnapshot;

/// A row written to the external sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRecord {
    pub spent_at: chrono::DateTime<chrono::Utc>,
    pub amount_cents: i64,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub notes: Option<String>,
    /// Uniqueness-disambiguating tag derived from the subject's identity and
    /// creation instant. Keeps duplicate appends for the same logical
    /// subject distinguishable in the sink.
    pub sync_tag: String,
}

impl SinkRecord {
    /// Builds a sink record from a live expense row.
    pub fn from_expense(expense: &Expense) -> Self {
        SinkRecord {
            spent_at: *expense.spent_at.as_datetime(),
            amount_cents: expense.amount_cents,
            description: expense.description.clone(),
            category: expense.category.clone(),
            subcategory: expense.subcategory.clone(),
            notes: expense.notes.clone(),
            sync_tag: format!(
                "{}@{}",
                expense.id,
                expense.created_at.as_datetime().timestamp()
            ),
        }
    }
}

/// Opaque reference to a row the sink wrote (e.g. a sheet row locator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReference(pub String);

/// How to identify the row to remove from the sink.
///
/// Chosen at dispatch time from the outbox entry's stored data: entries
/// whose subject was hard-deleted carry a snapshot, the rest delete by
/// identifier. An explicit sum type, not a runtime capability probe.
#[derive(Debug, Clone)]
pub enum DeleteRequest {
    /// The subject can still be located by its identifier.
    ById(UniversalUuid),
    /// The subject row is gone; locate it by its prior field values.
    BySnapshot(ExpenseSnapshot),
}

/// The external sink's append/delete capability.
#[async_trait]
pub trait ExpenseSink: Send + Sync {
    /// Appends a record, returning a reference to the written row.
    async fn append(&self, record: &SinkRecord) -> Result<SinkReference, SinkError>;

    /// Removes a previously appended record.
    async fn delete(&self, request: &DeleteRequest) -> Result<(), SinkError>;
}

/// Read-only category taxonomy exposed by the sink side.
#[async_trait]
pub trait TaxonomyProvider: Send + Sync {
    /// Lists (primary, secondary) category names.
    async fn list(&self) -> Result<(Vec<String>, Vec<String>), SinkError>;
}

/// Local cache over a [`TaxonomyProvider`].
///
/// Seeded at startup and refreshed on a timer; refresh failures are logged
/// and never fatal — the cache simply keeps serving its previous contents.
pub struct TaxonomyCache {
    provider: Arc<dyn TaxonomyProvider>,
    categories: RwLock<(Vec<String>, Vec<String>)>,
}

impl TaxonomyCache {
    pub fn new(provider: Arc<dyn TaxonomyProvider>) -> Self {
        Self {
            provider,
            categories: RwLock::new((Vec::new(), Vec::new())),
        }
    }

    /// Refreshes the cache from the provider. Failures are logged, never
    /// propagated.
    pub async fn refresh(&self) {
        match self.provider.list().await {
            Ok((primary, secondary)) => {
                debug!(
                    primary = primary.len(),
                    secondary = secondary.len(),
                    "Taxonomy cache refreshed"
                );
                *self.categories.write() = (primary, secondary);
            }
            Err(e) => {
                warn!(error = %e, "Taxonomy refresh failed; keeping cached categories");
            }
        }
    }

    /// Current primary category names.
    pub fn primary(&self) -> Vec<String> {
        self.categories.read().0.clone()
    }

    /// Current secondary category names.
    pub fn secondary(&self) -> Vec<String> {
        self.categories.read().1.clone()
    }

    /// Periodic refresh loop: seeds immediately, then refreshes on the
    /// given interval until the shutdown signal flips.
    pub async fn run_refresh_loop(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh().await;
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Taxonomy refresh loop stopped");
    }
}
