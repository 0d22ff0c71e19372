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

//! Error types for the quaestor engine.
//!
//! Each subsystem owns a `thiserror` enum. Per-item failures inside batch
//! loops are logged and isolated by the callers; only initialization-time
//! failures (pool construction, migrations) are escalated to process exit.

use thiserror::Error;

/// Errors produced by DAL operations.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Failed to obtain or use a pooled connection.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// A Diesel query failed.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// The requested row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Snapshot JSON could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors produced by dueness registry lookups.
#[derive(Debug, Error)]
pub enum DuenessError {
    /// The frequency tag has no registered rule.
    #[error("No dueness rule registered for frequency '{tag}'")]
    UnknownFrequency { tag: String },
}

/// Errors produced by the recurring scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors produced by the sync processor lifecycle.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// `start` was called while the processor was already running.
    #[error("Sync processor is already running")]
    AlreadyRunning,

    /// `stop` was called while the processor was not running.
    #[error("Sync processor is not running")]
    NotRunning,

    /// The in-flight cycle did not finish within the stop deadline.
    #[error("Sync processor did not stop within the deadline")]
    ShutdownTimeout,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors produced by the external sink capability.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink could not be reached; the operation may succeed later.
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    /// The sink rejected the payload (validation, permissions).
    #[error("Sink rejected operation: {0}")]
    Rejected(String),
}

/// Errors produced by a message channel binding.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Connection-level failure (reset, closed, broken pipe).
    #[error("Channel connection error: {0}")]
    Connection(String),

    /// Publish failed for a non-connection reason.
    #[error("Channel publish error: {0}")]
    Publish(String),

    /// Consume-side failure (receive, ack, reject).
    #[error("Channel consume error: {0}")]
    Consume(String),

    /// The channel is closed and will produce no further messages.
    #[error("Channel closed")]
    Closed,
}

/// Substrings identifying transient connection-class failures.
const CONNECTION_ERROR_MARKERS: &[&str] = &["connection reset", "closed", "eof", "broken pipe"];

impl ChannelError {
    /// Whether this error warrants a reconnect-then-retry rather than a
    /// circuit breaker failure.
    pub fn is_connection_error(&self) -> bool {
        match self {
            ChannelError::Connection(_) | ChannelError::Closed => true,
            ChannelError::Publish(msg) | ChannelError::Consume(msg) => {
                let msg = msg.to_lowercase();
                CONNECTION_ERROR_MARKERS.iter().any(|m| msg.contains(m))
            }
        }
    }
}

/// Errors produced by the transport resilience layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The circuit breaker is open; the caller must not retry immediately.
    #[error("Circuit breaker is open; publish rejected")]
    CircuitOpen,

    /// The surrounding shutdown signal fired during a wait.
    #[error("Operation cancelled")]
    Cancelled,

    /// All configured publish attempts were exhausted.
    #[error("Publish retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Errors produced by the top-level runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Storage could not be initialized; fatal to engine startup.
    #[error("Engine initialization failed: {0}")]
    Initialization(String),

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

/// Errors produced while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_detection() {
        assert!(ChannelError::Connection("anything".into()).is_connection_error());
        assert!(ChannelError::Closed.is_connection_error());
        assert!(ChannelError::Publish("Connection reset by peer".into()).is_connection_error());
        assert!(ChannelError::Publish("unexpected EOF".into()).is_connection_error());
        assert!(ChannelError::Publish("broken pipe".into()).is_connection_error());
        assert!(ChannelError::Publish("socket closed".into()).is_connection_error());
        assert!(!ChannelError::Publish("payload too large".into()).is_connection_error());
        assert!(!ChannelError::Consume("deserialization".into()).is_connection_error());
    }
}
