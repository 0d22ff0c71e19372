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

//! Domain models for expenses, recurring templates and the sync outbox.

pub mod expense;
pub mod recurring_expense;
pub mod sync_outbox;

pub use expense::{Expense, NewExpense, SyncStatus};
pub use recurring_expense::{Frequency, NewRecurringExpense, RecurringExpense};
pub use sync_outbox::{ExpenseSnapshot, OperationKind, OutboxStatus, SyncOutboxEntry};
