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

//! # Dueness Engine
//!
//! Frequency-keyed registry of rules deciding whether a recurring template
//! should fire now. The registry is constructed explicitly at startup and
//! passed by reference into the scheduler — no package-level mutable state —
//! so registration is testable and isolated per test.
//!
//! New frequencies can be registered at runtime without modifying existing
//! rules; looking up an unregistered tag is an error, never a silent
//! default.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DuenessError;
use crate::models::recurring_expense::Frequency;

pub mod rules;

pub use rules::{DailyRule, MonthlyRule, WeeklyRule, YearlyRule};

/// A single frequency's dueness decision.
///
/// Implementations must be pure: the decision is a function of the three
/// arguments only, with no side effects, so each rule stays independently
/// unit-testable.
pub trait DuenessRule: Send + Sync {
    /// Whether a template with the given firing history should fire now.
    ///
    /// * `last_fired` - when the template last fired, `None` if never
    /// * `now` - the evaluation instant (UTC)
    /// * `anchor` - the template's start date; its day/month component is
    ///   the recurrence target
    fn is_due(&self, last_fired: Option<DateTime<Utc>>, now: DateTime<Utc>, anchor: NaiveDate)
        -> bool;
}

/// Registry mapping frequency tags to their dueness rules.
pub struct DuenessRegistry {
    rules: HashMap<String, Arc<dyn DuenessRule>>,
}

impl DuenessRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Creates a registry with the four standard frequencies registered.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Frequency::Daily.as_str(), Arc::new(DailyRule));
        registry.register(Frequency::Weekly.as_str(), Arc::new(WeeklyRule));
        registry.register(Frequency::Monthly.as_str(), Arc::new(MonthlyRule));
        registry.register(Frequency::Yearly.as_str(), Arc::new(YearlyRule));
        registry
    }

    /// Registers a rule under a frequency tag, replacing any previous rule
    /// for that tag.
    pub fn register(&mut self, tag: impl Into<String>, rule: Arc<dyn DuenessRule>) {
        let tag = tag.into();
        tracing::debug!(frequency = %tag, "Registered dueness rule");
        self.rules.insert(tag, rule);
    }

    /// Looks up the rule for a frequency tag.
    pub fn get(&self, tag: &str) -> Result<&Arc<dyn DuenessRule>, DuenessError> {
        self.rules.get(tag).ok_or_else(|| DuenessError::UnknownFrequency {
            tag: tag.to_string(),
        })
    }

    /// All registered frequency tags.
    pub fn tags(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }
}

impl Default for DuenessRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
