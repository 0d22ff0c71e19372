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

//! Recurring Expense Model
//!
//! Templates that the scheduler turns into concrete expenses. The
//! `frequency` column is a free-form tag resolved against the dueness
//! registry at evaluation time, so new recurrence rules can be registered
//! without a schema change. Templates are never deleted by the engine;
//! they are retired by flipping `active` off.

use crate::database::universal_types::{UniversalDate, UniversalTimestamp, UniversalUuid};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// The four standard recurrence frequencies.
///
/// These map onto the dueness rules registered by
/// [`DuenessRegistry::standard`](crate::dueness::DuenessRegistry::standard).
/// The registry itself is string-keyed; this enum exists for ergonomic
/// template construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a recurring expense template in the database.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::recurring_expenses)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecurringExpense {
    /// Unique identifier for the template
    pub id: UniversalUuid,
    /// Description copied onto generated expenses
    pub description: String,
    /// Amount in cents copied onto generated expenses
    pub amount_cents: i64,
    /// Primary category
    pub category: String,
    /// Secondary category
    pub subcategory: String,
    /// Optional free-form notes
    pub notes: Option<String>,
    /// Recurrence frequency tag (e.g. "daily", "monthly")
    pub frequency: String,
    /// Anchor date: the day/month component is the recurrence target
    pub start_date: UniversalDate,
    /// Optional date after which the template stops firing
    pub end_date: Option<UniversalDate>,
    /// Whether the template is eligible to fire
    pub active: i32,
    /// Last time the template fired (unset for never-fired templates)
    pub last_fired_at: Option<UniversalTimestamp>,
    /// Timestamp when the template was created
    pub created_at: UniversalTimestamp,
    /// Timestamp when the template was last updated
    pub updated_at: UniversalTimestamp,
}

impl RecurringExpense {
    pub fn is_active(&self) -> bool {
        self.active != 0
    }
}

/// Domain input for creating a new recurring expense template.
#[derive(Debug, Clone)]
pub struct NewRecurringExpense {
    pub description: String,
    pub amount_cents: i64,
    pub category: String,
    pub subcategory: String,
    pub notes: Option<String>,
    pub frequency: String,
    pub start_date: UniversalDate,
    pub end_date: Option<UniversalDate>,
}

/// Insertable row for the `recurring_expenses` table. Built by the DAL.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::recurring_expenses)]
pub struct NewRecurringExpenseRecord {
    pub id: UniversalUuid,
    pub description: String,
    pub amount_cents: i64,
    pub category: String,
    pub subcategory: String,
    pub notes: Option<String>,
    pub frequency: String,
    pub start_date: UniversalDate,
    pub end_date: Option<UniversalDate>,
    pub active: i32,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}
