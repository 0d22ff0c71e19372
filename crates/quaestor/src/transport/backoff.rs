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

//! Exponential backoff with a hard cap, and an interruptible sleep.

use std::cmp;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::TransportError;

/// Exponent cap: beyond this the doubling would overflow long before the
/// delay cap matters.
const MAX_EXPONENT: u32 = 16;

/// Exponential backoff schedule: `delay(attempt) = min(2^attempt * base, cap)`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    cap: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before the given (zero-indexed) retry attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = cmp::min(attempt, MAX_EXPONENT);
        let factor = 1u32 << exponent;
        cmp::min(self.base.saturating_mul(factor), self.cap)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

/// Sleeps for `delay`, returning early with [`TransportError::Cancelled`]
/// when the shutdown signal flips.
///
/// Every backoff wait in the transport layer goes through this function so
/// that graceful shutdown never has to ride out a 30-second sleep.
pub async fn sleep_interruptible(
    delay: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), TransportError> {
    if *shutdown.borrow() {
        return Err(TransportError::Cancelled);
    }

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return Ok(()),
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    return Err(TransportError::Cancelled);
                }
            }
        }
    }
}
