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

//! Circuit-breaker-guarded publisher for sync notices.
//!
//! Publish policy:
//! - circuit open: fail fast with a distinct error, no network touch;
//! - connection-class channel error: bounded reconnects with exponential
//!   backoff, then retry the publish (not surfaced past this boundary);
//! - any other channel error: record a breaker failure and retry on the
//!   same backoff schedule without reconnecting;
//! - every wait races the shutdown signal and returns a cancellation error
//!   immediately when it fires.

use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::backoff::{sleep_interruptible, ExponentialBackoff};
use super::channel::{MessageChannel, SyncNotice};
use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::TransportError;

/// Tuning for the publish retry loop.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Publish attempts before giving up.
    pub max_publish_attempts: u32,
    /// Reconnect attempts per connection-class failure.
    pub max_reconnect_attempts: u32,
    /// Breaker tuning.
    pub breaker: CircuitBreakerConfig,
    /// Backoff schedule shared by reconnects and publish retries.
    pub backoff: ExponentialBackoff,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_publish_attempts: 3,
            max_reconnect_attempts: 5,
            breaker: CircuitBreakerConfig::default(),
            backoff: ExponentialBackoff::default(),
        }
    }
}

/// Best-effort notifier consumed by the scheduler after a record fires.
///
/// Notification is pure optimization: the outbox poller is the
/// authoritative delivery path, so callers log and move on when this fails.
#[async_trait]
pub trait SyncNotifier: Send + Sync {
    async fn notify(&self, notice: &SyncNotice) -> Result<(), TransportError>;
}

/// Publisher wrapping a [`MessageChannel`] with the resilience policy.
pub struct NotifyPublisher<C: MessageChannel> {
    channel: C,
    breaker: CircuitBreaker,
    config: PublisherConfig,
    shutdown: watch::Receiver<bool>,
}

impl<C: MessageChannel> NotifyPublisher<C> {
    pub fn new(channel: C, config: PublisherConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            channel,
            breaker: CircuitBreaker::new(config.breaker.clone()),
            config,
            shutdown,
        }
    }

    /// Current breaker for inspection (monitoring/tests).
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Publishes a notice through the resilience policy.
    pub async fn publish(&self, notice: &SyncNotice) -> Result<(), TransportError> {
        let payload = notice.encode()?;
        let mut shutdown = self.shutdown.clone();
        let mut last_error = String::new();

        for attempt in 0..self.config.max_publish_attempts {
            self.breaker.check().map_err(|e| {
                counter!("quaestor_notify_circuit_rejections_total").increment(1);
                e
            })?;

            match self.channel.publish(&payload).await {
                Ok(()) => {
                    self.breaker.record_success();
                    counter!("quaestor_notify_published_total").increment(1);
                    debug!(expense_id = %notice.expense_id, "Sync notice published");
                    return Ok(());
                }
                Err(e) if e.is_connection_error() => {
                    warn!(error = %e, attempt, "Connection-class publish failure; reconnecting");
                    last_error = e.to_string();
                    self.reconnect_with_backoff(&mut shutdown).await?;
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Publish failure");
                    self.breaker.record_failure();
                    last_error = e.to_string();
                    sleep_interruptible(self.config.backoff.delay(attempt), &mut shutdown).await?;
                }
            }
        }

        counter!("quaestor_notify_failed_total").increment(1);
        Err(TransportError::RetriesExhausted {
            attempts: self.config.max_publish_attempts,
            last_error,
        })
    }

    /// Bounded reconnect loop with exponential backoff.
    ///
    /// Exhaustion counts as one breaker failure: repeated unreachable-broker
    /// episodes should eventually trip the circuit.
    async fn reconnect_with_backoff(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        let mut last_error = String::new();
        for attempt in 0..self.config.max_reconnect_attempts {
            sleep_interruptible(self.config.backoff.delay(attempt), shutdown).await?;
            match self.channel.reconnect().await {
                Ok(()) => {
                    debug!(attempt, "Channel reconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Reconnect failed");
                    last_error = e.to_string();
                }
            }
        }
        self.breaker.record_failure();
        Err(TransportError::RetriesExhausted {
            attempts: self.config.max_reconnect_attempts,
            last_error,
        })
    }
}

#[async_trait]
impl<C: MessageChannel> SyncNotifier for NotifyPublisher<C> {
    async fn notify(&self, notice: &SyncNotice) -> Result<(), TransportError> {
        self.publish(notice).await
    }
}

/// Convenience alias for sharing a notifier across tasks.
pub type SharedNotifier = Arc<dyn SyncNotifier>;
