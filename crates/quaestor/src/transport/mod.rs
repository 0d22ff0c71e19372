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

//! Transport resilience layer for the notification fast path.
//!
//! The outbox poller is the authoritative, crash-recoverable delivery
//! mechanism; everything in this module is a best-effort optimization that
//! lets a remote worker react immediately instead of waiting for the next
//! poll. Because both paths can race to deliver the same logical event, the
//! sink's append tagging — not this layer — is the de-duplication boundary.

pub mod backoff;
pub mod channel;
pub mod circuit_breaker;
pub mod consumer;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod publisher;

pub use backoff::{sleep_interruptible, ExponentialBackoff};
pub use channel::{MessageChannel, MessageConsumer, RawMessage, SyncNotice};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use consumer::{run_consume_loop, NoticeHandler, NoticeHandlerError};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaChannel, KafkaNoticeConsumer};
pub use publisher::{NotifyPublisher, PublisherConfig, SharedNotifier, SyncNotifier};
