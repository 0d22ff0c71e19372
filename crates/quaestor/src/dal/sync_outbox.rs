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

//! Sync Outbox DAL
//!
//! State machine transitions for the durable sync queue. Entries are
//! inserted only by the expense DAL's transactional create/delete paths;
//! this DAL moves them through pending -> processing -> completed | failed.
//!
//! The row's status value is the mutual-exclusion token: `mark_processing`
//! guards its UPDATE with `status = 'pending'` in the WHERE clause, so of
//! two racing claimers exactly one observes an updated row.

use super::DAL;
use crate::database::schema::sync_outbox;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::ValidationError;
use crate::models::sync_outbox::{OutboxStatus, SyncOutboxEntry};
use diesel::prelude::*;

/// Data access layer for sync outbox operations.
#[derive(Clone)]
pub struct SyncOutboxDal<'a> {
    dal: &'a DAL,
}

impl<'a> SyncOutboxDal<'a> {
    /// Creates a new SyncOutboxDal instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Retrieves an outbox entry by its ID.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<SyncOutboxEntry, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let entry = conn
            .interact(move |conn| {
                sync_outbox::table
                    .find(id)
                    .first::<SyncOutboxEntry>(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        entry.ok_or_else(|| ValidationError::NotFound {
            entity: "sync outbox entry",
            id: id.to_string(),
        })
    }

    /// Fetches a batch of pending entries, oldest first.
    ///
    /// Does not mutate state; claiming is a separate explicit
    /// [`mark_processing`](Self::mark_processing) call per entry.
    pub async fn dequeue_batch(&self, limit: i64) -> Result<Vec<SyncOutboxEntry>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let entries = conn
            .interact(move |conn| {
                sync_outbox::table
                    .filter(sync_outbox::status.eq(OutboxStatus::Pending.as_str()))
                    .order(sync_outbox::created_at.asc())
                    .limit(limit)
                    .load::<SyncOutboxEntry>(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(entries)
    }

    /// Claims a pending entry for processing.
    ///
    /// Returns `true` when this caller won the claim; `false` means another
    /// cycle already claimed (or completed) the entry.
    pub async fn mark_processing(&self, id: UniversalUuid) -> Result<bool, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let updated = conn
            .interact(move |conn| {
                diesel::update(sync_outbox::table.find(id))
                    .filter(sync_outbox::status.eq(OutboxStatus::Pending.as_str()))
                    .set((
                        sync_outbox::status.eq(OutboxStatus::Processing.as_str()),
                        sync_outbox::updated_at.eq(UniversalTimestamp::now()),
                    ))
                    .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(updated == 1)
    }

    /// Marks an entry as successfully dispatched (terminal).
    pub async fn mark_completed(&self, id: UniversalUuid) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            let now = UniversalTimestamp::now();
            diesel::update(sync_outbox::table.find(id))
                .set((
                    sync_outbox::status.eq(OutboxStatus::Completed.as_str()),
                    sync_outbox::processed_at.eq(Some(now)),
                    sync_outbox::updated_at.eq(now),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Marks an entry as terminally failed, recording the final attempt.
    ///
    /// Callers invoke this only when the failed attempt was the last one
    /// permitted by `max_attempts`.
    pub async fn mark_failed(
        &self,
        id: UniversalUuid,
        reason: &str,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let reason = reason.to_string();
        conn.interact(move |conn| {
            let now = UniversalTimestamp::now();
            diesel::update(sync_outbox::table.find(id))
                .set((
                    sync_outbox::status.eq(OutboxStatus::Failed.as_str()),
                    sync_outbox::attempts.eq(sync_outbox::attempts + 1),
                    sync_outbox::last_error.eq(Some(reason)),
                    sync_outbox::processed_at.eq(Some(now)),
                    sync_outbox::updated_at.eq(now),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Records a failed attempt and returns the entry to the pending pool.
    ///
    /// `next_retry_at` is stored for diagnostics only; the poll loop retries
    /// by repolling rather than honoring a per-entry schedule.
    pub async fn increment_attempt(
        &self,
        id: UniversalUuid,
        reason: &str,
        next_retry_at: Option<UniversalTimestamp>,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let reason = reason.to_string();
        conn.interact(move |conn| {
            diesel::update(sync_outbox::table.find(id))
                .set((
                    sync_outbox::status.eq(OutboxStatus::Pending.as_str()),
                    sync_outbox::attempts.eq(sync_outbox::attempts + 1),
                    sync_outbox::last_error.eq(Some(reason)),
                    sync_outbox::next_retry_at.eq(next_retry_at),
                    sync_outbox::updated_at.eq(UniversalTimestamp::now()),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Reverts entries stuck in `processing` back to `pending`.
    ///
    /// Run once at processor start: any entry left claimed by a crashed
    /// process becomes immediately re-dequeuable, guaranteeing crash
    /// recovery without manual intervention.
    pub async fn reset_stale_processing(&self) -> Result<usize, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let reverted = conn
            .interact(move |conn| {
                diesel::update(sync_outbox::table)
                    .filter(sync_outbox::status.eq(OutboxStatus::Processing.as_str()))
                    .set((
                        sync_outbox::status.eq(OutboxStatus::Pending.as_str()),
                        sync_outbox::updated_at.eq(UniversalTimestamp::now()),
                    ))
                    .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        if reverted > 0 {
            tracing::warn!(
                count = reverted,
                "Reverted stale processing entries to pending"
            );
        }
        Ok(reverted)
    }

    /// Deletes completed entries older than the cutoff, keeping the table
    /// bounded. Returns the number of entries removed.
    pub async fn cleanup_completed(
        &self,
        older_than: UniversalTimestamp,
    ) -> Result<usize, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let deleted = conn
            .interact(move |conn| {
                diesel::delete(
                    sync_outbox::table
                        .filter(sync_outbox::status.eq(OutboxStatus::Completed.as_str()))
                        .filter(sync_outbox::processed_at.lt(Some(older_than))),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(deleted)
    }

    /// Counts entries in the given state.
    pub async fn count_by_status(&self, status: OutboxStatus) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let count = conn
            .interact(move |conn| {
                sync_outbox::table
                    .filter(sync_outbox::status.eq(status.as_str()))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Lists all entries for an expense, oldest first (test/monitoring
    /// support).
    pub async fn list_for_expense(
        &self,
        expense_id: UniversalUuid,
    ) -> Result<Vec<SyncOutboxEntry>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let entries = conn
            .interact(move |conn| {
                sync_outbox::table
                    .filter(sync_outbox::expense_id.eq(expense_id))
                    .order(sync_outbox::created_at.asc())
                    .load::<SyncOutboxEntry>(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(entries)
    }
}
