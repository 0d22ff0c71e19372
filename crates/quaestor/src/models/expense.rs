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

//! Expense Model
//!
//! Data structures for the subject records that get synchronized to the
//! external sink. Every expense carries a `sync_status` column tracking its
//! relationship to the sink: `pending` until the outbox operation for it
//! completes, `synced` on success, `error` when the operation is terminally
//! failed.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Synchronization state of an expense relative to the external sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Not yet written to the sink.
    Pending,
    /// Successfully written to the sink.
    Synced,
    /// The sync operation exhausted its attempts.
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SyncStatus::Pending),
            "synced" => Some(SyncStatus::Synced),
            "error" => Some(SyncStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents an expense record in the database.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::expenses)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Expense {
    /// Unique identifier for the expense
    pub id: UniversalUuid,
    /// When the money was spent
    pub spent_at: UniversalTimestamp,
    /// Amount in cents (avoids floating point drift)
    pub amount_cents: i64,
    /// Human-readable description
    pub description: String,
    /// Primary category
    pub category: String,
    /// Secondary category
    pub subcategory: String,
    /// Optional free-form notes
    pub notes: Option<String>,
    /// Sink synchronization state ("pending", "synced", "error")
    pub sync_status: String,
    /// Timestamp when the record was created
    pub created_at: UniversalTimestamp,
    /// Timestamp when the record was last updated
    pub updated_at: UniversalTimestamp,
}

/// Domain input for creating a new expense.
///
/// Identifiers, timestamps and the initial sync status are filled in by the
/// DAL at insert time.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub spent_at: UniversalTimestamp,
    pub amount_cents: i64,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub notes: Option<String>,
}

/// Insertable row for the `expenses` table. Built by the DAL.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::expenses)]
pub struct NewExpenseRecord {
    pub id: UniversalUuid,
    pub spent_at: UniversalTimestamp,
    pub amount_cents: i64,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub notes: Option<String>,
    pub sync_status: String,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}
