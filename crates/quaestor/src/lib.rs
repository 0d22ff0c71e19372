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

//! # Quaestor
//!
//! A library for reliable, at-least-once synchronization of locally
//! committed expense records to an external, unreliable sink, plus a
//! temporal scheduler that generates those records from recurring
//! templates.
//!
//! ## Architecture
//!
//! - **Outbox**: every expense mutation is paired, in one transaction, with
//!   a durable `sync_outbox` entry describing the external side effect it
//!   still owes. The [`processor::SyncProcessor`] drains these entries with
//!   an explicit state machine and bounded retries.
//! - **Dueness engine**: the [`dueness::DuenessRegistry`] maps frequency
//!   tags onto pure recurrence rules; the [`scheduler::RecurringScheduler`]
//!   evaluates active templates against it and fires the due ones.
//! - **Transport**: the [`transport`] module is a best-effort fast path
//!   that notifies a remote worker about new outbox work, wrapped in a
//!   circuit breaker and reconnect-with-backoff. The outbox poller, not
//!   the notification channel, is the source of truth.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use quaestor::{QuaestorConfig, SyncRunner};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let runner = SyncRunner::new("quaestor.db", my_sink, QuaestorConfig::from_env()?).await?;
//! runner.start().await?;
//! // ... process lifetime ...
//! runner.shutdown(Duration::from_secs(10)).await?;
//! ```

pub mod config;
pub mod dal;
pub mod database;
pub mod dueness;
pub mod error;
pub mod models;
pub mod processor;
pub mod runner;
pub mod scheduler;
pub mod sink;
pub mod transport;

pub use config::QuaestorConfig;
pub use dal::DAL;
pub use database::Database;
pub use dueness::{DuenessRegistry, DuenessRule};
pub use error::{
    ChannelError, ConfigError, DuenessError, ProcessorError, RunnerError, SchedulerError,
    SinkError, TransportError, ValidationError,
};
pub use models::{
    Expense, ExpenseSnapshot, Frequency, NewExpense, NewRecurringExpense, OperationKind,
    OutboxStatus, RecurringExpense, SyncOutboxEntry, SyncStatus,
};
pub use processor::SyncProcessor;
pub use runner::SyncRunner;
pub use scheduler::RecurringScheduler;
pub use sink::{DeleteRequest, ExpenseSink, SinkRecord, SinkReference, TaxonomyProvider};
pub use transport::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ExponentialBackoff, NotifyPublisher,
    PublisherConfig, SyncNotice, SyncNotifier,
};
