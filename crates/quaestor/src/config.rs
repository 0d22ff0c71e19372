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

//! Configuration for the sync runner.
//!
//! # Construction
//!
//! Use [`QuaestorConfig::builder()`] to create a configuration:
//!
//! ```rust
//! use quaestor::config::QuaestorConfig;
//! use std::time::Duration;
//!
//! let config = QuaestorConfig::builder()
//!     .processor_poll_interval(Duration::from_secs(10))
//!     .max_sync_attempts(3)
//!     .build();
//! assert_eq!(config.max_sync_attempts(), 3);
//! ```
//!
//! Or load overrides from the environment (optionally via a `.env` file)
//! with [`QuaestorConfig::from_env()`].

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for the sync runner.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct QuaestorConfig {
    scheduler_poll_interval: Duration,
    processor_poll_interval: Duration,
    processor_batch_size: i64,
    cleanup_interval: Duration,
    completed_retention: Duration,
    max_sync_attempts: i32,
    taxonomy_refresh_interval: Duration,
}

impl QuaestorConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> QuaestorConfigBuilder {
        QuaestorConfigBuilder::default()
    }

    /// Creates a configuration from environment variables, falling back to
    /// defaults for anything unset. Reads a `.env` file when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = Self::builder();
        if let Some(secs) = parse_env::<u64>("QUAESTOR_SCHEDULER_POLL_SECS")? {
            builder = builder.scheduler_poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_env::<u64>("QUAESTOR_PROCESSOR_POLL_SECS")? {
            builder = builder.processor_poll_interval(Duration::from_secs(secs));
        }
        if let Some(size) = parse_env::<i64>("QUAESTOR_PROCESSOR_BATCH_SIZE")? {
            builder = builder.processor_batch_size(size);
        }
        if let Some(secs) = parse_env::<u64>("QUAESTOR_CLEANUP_INTERVAL_SECS")? {
            builder = builder.cleanup_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_env::<u64>("QUAESTOR_COMPLETED_RETENTION_SECS")? {
            builder = builder.completed_retention(Duration::from_secs(secs));
        }
        if let Some(attempts) = parse_env::<i32>("QUAESTOR_MAX_SYNC_ATTEMPTS")? {
            builder = builder.max_sync_attempts(attempts);
        }
        Ok(builder.build())
    }

    /// How often the recurring scheduler evaluates templates.
    pub fn scheduler_poll_interval(&self) -> Duration {
        self.scheduler_poll_interval
    }

    /// How often the sync processor polls the outbox.
    pub fn processor_poll_interval(&self) -> Duration {
        self.processor_poll_interval
    }

    /// Maximum outbox entries fetched per processor cycle.
    pub fn processor_batch_size(&self) -> i64 {
        self.processor_batch_size
    }

    /// How often completed-entry retention cleanup runs.
    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// Age past which completed outbox entries are deleted.
    pub fn completed_retention(&self) -> Duration {
        self.completed_retention
    }

    /// Dispatch attempts before an outbox entry becomes terminally failed.
    pub fn max_sync_attempts(&self) -> i32 {
        self.max_sync_attempts
    }

    /// How often the taxonomy cache refreshes.
    pub fn taxonomy_refresh_interval(&self) -> Duration {
        self.taxonomy_refresh_interval
    }
}

impl Default for QuaestorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn parse_env<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(None),
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

/// Builder for [`QuaestorConfig`].
#[derive(Debug, Clone)]
pub struct QuaestorConfigBuilder {
    scheduler_poll_interval: Duration,
    processor_poll_interval: Duration,
    processor_batch_size: i64,
    cleanup_interval: Duration,
    completed_retention: Duration,
    max_sync_attempts: i32,
    taxonomy_refresh_interval: Duration,
}

impl Default for QuaestorConfigBuilder {
    fn default() -> Self {
        Self {
            scheduler_poll_interval: Duration::from_secs(15 * 60),
            processor_poll_interval: Duration::from_secs(30),
            processor_batch_size: 10,
            cleanup_interval: Duration::from_secs(60 * 60),
            completed_retention: Duration::from_secs(7 * 24 * 60 * 60),
            max_sync_attempts: 5,
            taxonomy_refresh_interval: Duration::from_secs(6 * 60 * 60),
        }
    }
}

impl QuaestorConfigBuilder {
    pub fn scheduler_poll_interval(mut self, interval: Duration) -> Self {
        self.scheduler_poll_interval = interval;
        self
    }

    pub fn processor_poll_interval(mut self, interval: Duration) -> Self {
        self.processor_poll_interval = interval;
        self
    }

    pub fn processor_batch_size(mut self, size: i64) -> Self {
        self.processor_batch_size = size.max(1);
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn completed_retention(mut self, retention: Duration) -> Self {
        self.completed_retention = retention;
        self
    }

    pub fn max_sync_attempts(mut self, attempts: i32) -> Self {
        self.max_sync_attempts = attempts.max(1);
        self
    }

    pub fn taxonomy_refresh_interval(mut self, interval: Duration) -> Self {
        self.taxonomy_refresh_interval = interval;
        self
    }

    pub fn build(self) -> QuaestorConfig {
        QuaestorConfig {
            scheduler_poll_interval: self.scheduler_poll_interval,
            processor_poll_interval: self.processor_poll_interval,
            processor_batch_size: self.processor_batch_size,
            cleanup_interval: self.cleanup_interval,
            completed_retention: self.completed_retention,
            max_sync_attempts: self.max_sync_attempts,
            taxonomy_refresh_interval: self.taxonomy_refresh_interval,
        }
    }
}
