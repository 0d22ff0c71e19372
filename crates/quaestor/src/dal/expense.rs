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

//! Expense DAL
//!
//! Subject record operations. `create` and `delete` are the only write
//! paths, and each pairs the subject mutation with its outbox entry inside
//! a single transaction: either both rows exist afterwards or neither does.
//! There is deliberately no standalone enqueue operation that could break
//! that pairing.

use super::DAL;
use crate::database::schema::{expenses, sync_outbox};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::ValidationError;
use crate::models::expense::{Expense, NewExpense, NewExpenseRecord, SyncStatus};
use crate::models::sync_outbox::{ExpenseSnapshot, NewSyncOutboxRecord, OperationKind, OutboxStatus};
use diesel::connection::Connection;
use diesel::prelude::*;

/// Data access layer for expense operations.
#[derive(Clone)]
pub struct ExpenseDal<'a> {
    dal: &'a DAL,
}

impl<'a> ExpenseDal<'a> {
    /// Creates a new ExpenseDal instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a new expense and enqueues its sync operation atomically.
    ///
    /// The expense insert and the outbox insert run in one transaction; a
    /// crash between the two is unobservable.
    pub async fn create(
        &self,
        new_expense: NewExpense,
        max_attempts: i32,
    ) -> Result<Expense, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let expense = conn
            .interact(move |conn| {
                conn.transaction::<_, ValidationError, _>(|conn| {
                    let now = UniversalTimestamp::now();
                    let expense_id = UniversalUuid::new_v4();

                    let record = NewExpenseRecord {
                        id: expense_id,
                        spent_at: new_expense.spent_at,
                        amount_cents: new_expense.amount_cents,
                        description: new_expense.description,
                        category: new_expense.category,
                        subcategory: new_expense.subcategory,
                        notes: new_expense.notes,
                        sync_status: SyncStatus::Pending.as_str().to_string(),
                        created_at: now,
                        updated_at: now,
                    };
                    diesel::insert_into(expenses::table)
                        .values(&record)
                        .execute(conn)?;

                    let outbox_record = NewSyncOutboxRecord {
                        id: UniversalUuid::new_v4(),
                        operation: OperationKind::Sync.as_str().to_string(),
                        expense_id,
                        snapshot: None,
                        status: OutboxStatus::Pending.as_str().to_string(),
                        attempts: 0,
                        max_attempts,
                        created_at: now,
                        updated_at: now,
                    };
                    diesel::insert_into(sync_outbox::table)
                        .values(&outbox_record)
                        .execute(conn)?;

                    let expense: Expense = expenses::table.find(expense_id).first(conn)?;
                    Ok(expense)
                })
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        tracing::debug!(expense_id = %expense.id, "Expense created with pending sync operation");
        Ok(expense)
    }

    /// Deletes an expense and enqueues its delete operation atomically.
    ///
    /// The outbox entry carries a JSON snapshot of the row's prior field
    /// values, since the row itself is gone by the time the operation is
    /// dispatched to the sink.
    pub async fn delete(
        &self,
        id: UniversalUuid,
        max_attempts: i32,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            conn.transaction::<_, ValidationError, _>(|conn| {
                let expense: Option<Expense> =
                    expenses::table.find(id).first(conn).optional()?;
                let expense = expense.ok_or_else(|| ValidationError::NotFound {
                    entity: "expense",
                    id: id.to_string(),
                })?;

                let snapshot = serde_json::to_string(&ExpenseSnapshot::from(&expense))?;
                let now = UniversalTimestamp::now();

                diesel::delete(expenses::table.find(id)).execute(conn)?;

                let outbox_record = NewSyncOutboxRecord {
                    id: UniversalUuid::new_v4(),
                    operation: OperationKind::Delete.as_str().to_string(),
                    expense_id: id,
                    snapshot: Some(snapshot),
                    status: OutboxStatus::Pending.as_str().to_string(),
                    attempts: 0,
                    max_attempts,
                    created_at: now,
                    updated_at: now,
                };
                diesel::insert_into(sync_outbox::table)
                    .values(&outbox_record)
                    .execute(conn)?;

                Ok(())
            })
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        tracing::debug!(expense_id = %id, "Expense deleted with pending delete operation");
        Ok(())
    }

    /// Retrieves an expense by its ID.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<Expense, ValidationError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| ValidationError::NotFound {
                entity: "expense",
                id: id.to_string(),
            })
    }

    /// Retrieves an expense by its ID, returning `None` when it no longer
    /// exists (e.g. hard-deleted before its sync operation ran).
    pub async fn find_by_id(
        &self,
        id: UniversalUuid,
    ) -> Result<Option<Expense>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let expense = conn
            .interact(move |conn| expenses::table.find(id).first::<Expense>(conn).optional())
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(expense)
    }

    /// Updates an expense's sink synchronization state.
    ///
    /// Returns `false` when the expense no longer exists, which callers
    /// treat as a non-error (the subject may have been deleted since).
    pub async fn set_sync_status(
        &self,
        id: UniversalUuid,
        status: SyncStatus,
    ) -> Result<bool, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let updated = conn
            .interact(move |conn| {
                diesel::update(expenses::table.find(id))
                    .set((
                        expenses::sync_status.eq(status.as_str()),
                        expenses::updated_at.eq(UniversalTimestamp::now()),
                    ))
                    .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(updated == 1)
    }

    /// Counts expenses in the given synchronization state.
    pub async fn count_by_sync_status(&self, status: SyncStatus) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let count = conn
            .interact(move |conn| {
                expenses::table
                    .filter(expenses::sync_status.eq(status.as_str()))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}
