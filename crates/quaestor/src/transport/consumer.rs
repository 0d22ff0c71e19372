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

//! Consume loop for sync notices, manual acknowledgment only.
//!
//! Policy per message:
//! - undecodable payload: rejected without requeue and dropped with a
//!   warning — retrying cannot fix a parsing failure;
//! - handler error: rejected with requeue;
//! - handled: acknowledged.
//!
//! Ordering and duplicate suppression are deliberately left to the handler
//! side; the outbox is the true de-duplication boundary.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::channel::{MessageConsumer, SyncNotice};
use crate::error::TransportError;

/// Error returned by a notice handler.
#[derive(Debug, Error)]
#[error("notice handler failed: {0}")]
pub struct NoticeHandlerError(pub String);

/// Application-side handling of a decoded sync notice.
#[async_trait]
pub trait NoticeHandler: Send + Sync {
    async fn handle(&self, notice: SyncNotice) -> Result<(), NoticeHandlerError>;
}

/// Runs the consume loop until the channel closes or shutdown fires.
///
/// The loop multiplexes on next-message / cancelled / channel-closed.
/// Ack/reject failures are logged and the loop continues; the worst case is
/// a redelivered notice, which the handler must already tolerate.
pub async fn run_consume_loop<C, H>(
    mut consumer: C,
    handler: Arc<H>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), TransportError>
where
    C: MessageConsumer,
    H: NoticeHandler + ?Sized,
{
    loop {
        tokio::select! {
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    info!("Consume loop stopping on shutdown signal");
                    return Ok(());
                }
            }
            next = consumer.next() => {
                let raw = match next {
                    None => {
                        info!("Notification channel closed; consume loop stopping");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Receive error on notification channel");
                        continue;
                    }
                    Some(Ok(raw)) => raw,
                };

                match SyncNotice::decode(&raw.payload) {
                    Err(e) => {
                        warn!(error = %e, offset = raw.offset, "Dropping undecodable notice");
                        if let Err(e) = consumer.reject(&raw, false).await {
                            warn!(error = %e, "Failed to reject poison message");
                        }
                    }
                    Ok(notice) => match handler.handle(notice.clone()).await {
                        Ok(()) => {
                            debug!(expense_id = %notice.expense_id, "Notice handled");
                            if let Err(e) = consumer.ack(&raw).await {
                                warn!(error = %e, "Failed to acknowledge notice");
                            }
                        }
                        Err(e) => {
                            warn!(
                                expense_id = %notice.expense_id,
                                error = %e,
                                "Notice handler failed; requeueing"
                            );
                            if let Err(e) = consumer.reject(&raw, true).await {
                                warn!(error = %e, "Failed to requeue notice");
                            }
                        }
                    },
                }
            }
        }
    }
}
