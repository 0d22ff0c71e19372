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

//! Sync Outbox Model
//!
//! The outbox is the durable record of "this external side effect still
//! needs to happen". Entries are written in the same transaction as the
//! subject mutation they describe, so the mutation and its sync intent are
//! never observed independently. The sync processor drains entries with an
//! explicit state machine: pending -> processing -> completed | failed.
//!
//! Delete operations carry a JSON snapshot of the expense's prior field
//! values, because by the time the operation is dispatched the subject row
//! is already gone.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::models::expense::Expense;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// The kind of sink operation an outbox entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Append the expense to the sink.
    Sync,
    /// Remove the expense from the sink.
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Sync => "sync",
            OperationKind::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sync" => Some(OperationKind::Sync),
            "delete" => Some(OperationKind::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Processing state of an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    /// Waiting to be dispatched.
    Pending,
    /// Claimed by a processor cycle.
    Processing,
    /// Terminal: dispatched successfully.
    Completed,
    /// Terminal: attempts exhausted.
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Processing => "processing",
            OutboxStatus::Completed => "completed",
            OutboxStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OutboxStatus::Pending),
            "processing" => Some(OutboxStatus::Processing),
            "completed" => Some(OutboxStatus::Completed),
            "failed" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of an expense's fields, carried by delete operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseSnapshot {
    pub id: UniversalUuid,
    pub spent_at: UniversalTimestamp,
    pub amount_cents: i64,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub notes: Option<String>,
}

impl From<&Expense> for ExpenseSnapshot {
    fn from(expense: &Expense) -> Self {
        ExpenseSnapshot {
            id: expense.id,
            spent_at: expense.spent_at,
            amount_cents: expense.amount_cents,
            description: expense.description.clone(),
            category: expense.category.clone(),
            subcategory: expense.subcategory.clone(),
            notes: expense.notes.clone(),
        }
    }
}

/// Represents a sync outbox entry in the database.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::sync_outbox)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncOutboxEntry {
    /// Unique identifier for the entry
    pub id: UniversalUuid,
    /// Operation kind ("sync" or "delete")
    pub operation: String,
    /// The expense this operation concerns
    pub expense_id: UniversalUuid,
    /// JSON field snapshot, populated only for delete operations
    pub snapshot: Option<String>,
    /// Current state ("pending", "processing", "completed", "failed")
    pub status: String,
    /// Number of dispatch attempts so far
    pub attempts: i32,
    /// Attempts after which the entry becomes terminally failed
    pub max_attempts: i32,
    /// Most recent dispatch error, if any
    pub last_error: Option<String>,
    /// Timestamp when the entry was created
    pub created_at: UniversalTimestamp,
    /// Timestamp when the entry was last updated
    pub updated_at: UniversalTimestamp,
    /// Set only on terminal transitions
    pub processed_at: Option<UniversalTimestamp>,
    /// Recorded for diagnostics; the poll loop retries by repolling rather
    /// than honoring this value
    pub next_retry_at: Option<UniversalTimestamp>,
}

impl SyncOutboxEntry {
    /// Decodes the delete snapshot, if present.
    pub fn decode_snapshot(&self) -> Result<Option<ExpenseSnapshot>, serde_json::Error> {
        self.snapshot
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
    }
}

/// Insertable row for the `sync_outbox` table. Built by the DAL inside the
/// same transaction as the subject mutation.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::sync_outbox)]
pub struct NewSyncOutboxRecord {
    pub id: UniversalUuid,
    pub operation: String,
    pub expense_id: UniversalUuid,
    pub snapshot: Option<String>,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}
