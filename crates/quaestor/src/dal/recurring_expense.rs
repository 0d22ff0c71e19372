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

//! Recurring Expense DAL
//!
//! Template operations. Templates are retired with `set_active(false)`,
//! never deleted; `set_last_fired` is written by the scheduler only after
//! the concrete expense has been durably created.

use super::DAL;
use crate::database::schema::recurring_expenses;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::ValidationError;
use crate::models::recurring_expense::{
    NewRecurringExpense, NewRecurringExpenseRecord, RecurringExpense,
};
use diesel::prelude::*;

/// Data access layer for recurring expense template operations.
#[derive(Clone)]
pub struct RecurringExpenseDal<'a> {
    dal: &'a DAL,
}

impl<'a> RecurringExpenseDal<'a> {
    /// Creates a new RecurringExpenseDal instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a new recurring expense template.
    pub async fn create(
        &self,
        new_template: NewRecurringExpense,
    ) -> Result<RecurringExpense, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let template = conn
            .interact(move |conn| {
                let now = UniversalTimestamp::now();
                let id = UniversalUuid::new_v4();

                let record = NewRecurringExpenseRecord {
                    id,
                    description: new_template.description,
                    amount_cents: new_template.amount_cents,
                    category: new_template.category,
                    subcategory: new_template.subcategory,
                    notes: new_template.notes,
                    frequency: new_template.frequency,
                    start_date: new_template.start_date,
                    end_date: new_template.end_date,
                    active: 1,
                    created_at: now,
                    updated_at: now,
                };
                diesel::insert_into(recurring_expenses::table)
                    .values(&record)
                    .execute(conn)?;

                recurring_expenses::table
                    .find(id)
                    .first::<RecurringExpense>(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(template)
    }

    /// Retrieves a template by its ID.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<RecurringExpense, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let template = conn
            .interact(move |conn| {
                recurring_expenses::table
                    .find(id)
                    .first::<RecurringExpense>(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        template.ok_or_else(|| ValidationError::NotFound {
            entity: "recurring expense",
            id: id.to_string(),
        })
    }

    /// Lists all active templates, oldest first.
    ///
    /// The scheduler calls this at the top of every evaluation pass so that
    /// `last_fired_at` is always read fresh from storage, never cached.
    pub async fn list_active(&self) -> Result<Vec<RecurringExpense>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let templates = conn
            .interact(move |conn| {
                recurring_expenses::table
                    .filter(recurring_expenses::active.eq(1))
                    .order(recurring_expenses::created_at.asc())
                    .load::<RecurringExpense>(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(templates)
    }

    /// Persists the template's last firing time.
    pub async fn set_last_fired(
        &self,
        id: UniversalUuid,
        fired_at: UniversalTimestamp,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            diesel::update(recurring_expenses::table.find(id))
                .set((
                    recurring_expenses::last_fired_at.eq(Some(fired_at)),
                    recurring_expenses::updated_at.eq(UniversalTimestamp::now()),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Enables or retires a template.
    pub async fn set_active(&self, id: UniversalUuid, active: bool) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            diesel::update(recurring_expenses::table.find(id))
                .set((
                    recurring_expenses::active.eq(if active { 1 } else { 0 }),
                    recurring_expenses::updated_at.eq(UniversalTimestamp::now()),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(())
    }
}
