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

//! Message channel abstraction for the notification fast path.
//!
//! The resilience layer is generic over these traits; concrete bindings
//! (see the `kafka` feature) implement them against a real broker, and
//! tests drive them with in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::database::universal_types::UniversalUuid;
use crate::error::ChannelError;
use crate::models::sync_outbox::OperationKind;

/// Notification that new outbox work exists.
///
/// Purely an optimization hint for a remote worker: the outbox poller
/// delivers the same work without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncNotice {
    pub expense_id: UniversalUuid,
    pub operation: OperationKind,
}

impl SyncNotice {
    pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
        serde_json::to_vec(self).map_err(|e| ChannelError::Publish(e.to_string()))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ChannelError> {
        serde_json::from_slice(payload).map_err(|e| ChannelError::Consume(e.to_string()))
    }
}

/// Publish side of the notification channel.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Publishes one payload.
    async fn publish(&self, payload: &[u8]) -> Result<(), ChannelError>;

    /// Re-establishes the underlying connection after a connection-class
    /// failure.
    async fn reconnect(&self) -> Result<(), ChannelError>;
}

/// A received message with enough position information to acknowledge or
/// reject it.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// Consume side of the notification channel, manual acknowledgment only.
#[async_trait]
pub trait MessageConsumer: Send {
    /// Waits for the next message. `None` means the channel is closed and
    /// will produce no further messages.
    async fn next(&mut self) -> Option<Result<RawMessage, ChannelError>>;

    /// Acknowledges a successfully handled message.
    async fn ack(&mut self, msg: &RawMessage) -> Result<(), ChannelError>;

    /// Rejects a message. With `requeue`, the message is redelivered later;
    /// without, it is permanently dropped (poison-message policy).
    async fn reject(&mut self, msg: &RawMessage, requeue: bool) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_roundtrip() {
        let notice = SyncNotice {
            expense_id: UniversalUuid::new_v4(),
            operation: OperationKind::Sync,
        };
        let payload = notice.encode().unwrap();
        let back = SyncNotice::decode(&payload).unwrap();
        assert_eq!(notice, back);
    }

    #[test]
    fn test_notice_decode_rejects_garbage() {
        assert!(SyncNotice::decode(b"not json").is_err());
    }
}
