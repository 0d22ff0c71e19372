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

//! Data Access Layer
//!
//! Entity-scoped accessors over the shared connection pool. The expense DAL
//! owns the transactional create/delete operations that pair every subject
//! mutation with its outbox entry; the outbox DAL owns the state machine
//! transitions driven by the sync processor.

use crate::database::Database;

pub mod expense;
pub mod recurring_expense;
pub mod sync_outbox;

pub use expense::ExpenseDal;
pub use recurring_expense::RecurringExpenseDal;
pub use sync_outbox::SyncOutboxDal;

/// The Data Access Layer struct.
///
/// `DAL` is `Clone`; each clone references the same underlying connection
/// pool and can be shared safely between tasks.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance.
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Returns an expense DAL for subject record operations.
    pub fn expense(&self) -> ExpenseDal {
        ExpenseDal::new(self)
    }

    /// Returns a recurring expense DAL for template operations.
    pub fn recurring_expense(&self) -> RecurringExpenseDal {
        RecurringExpenseDal::new(self)
    }

    /// Returns a sync outbox DAL for queue operations.
    pub fn sync_outbox(&self) -> SyncOutboxDal {
        SyncOutboxDal::new(self)
    }
}
