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

//! Built-in dueness rules for the four standard frequencies.
//!
//! Every rule is a pure function of (last fired, now, anchor date) in UTC.
//! A template that has never fired is due under every rule.

use super::DuenessRule;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

/// Number of days in the given month, derived by normalizing
/// first-of-next-month minus one day. Correct across year boundaries
/// (month 12 rolls into the next January).
pub(crate) fn last_day_of(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Due when the calendar date (UTC) has changed since the last firing.
/// Time of day is irrelevant.
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyRule;

impl DuenessRule for DailyRule {
    fn is_due(
        &self,
        last_fired: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        _anchor: NaiveDate,
    ) -> bool {
        match last_fired {
            None => true,
            Some(last) => last.date_naive() != now.date_naive(),
        }
    }
}

/// Due once a full seven days have elapsed since the last firing.
/// Elapsed-duration based, not calendar-week based.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeeklyRule;

impl DuenessRule for WeeklyRule {
    fn is_due(
        &self,
        last_fired: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        _anchor: NaiveDate,
    ) -> bool {
        match last_fired {
            None => true,
            Some(last) => now.signed_duration_since(last) >= Duration::days(7),
        }
    }
}

/// Due once per (year, month), on or after the anchor day clamped to the
/// current month's length: an anchor day of 31 fires on the last day of a
/// 30-, 29- or 28-day month.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonthlyRule;

impl DuenessRule for MonthlyRule {
    fn is_due(
        &self,
        last_fired: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        anchor: NaiveDate,
    ) -> bool {
        let last = match last_fired {
            None => return true,
            Some(last) => last,
        };
        if last.year() == now.year() && last.month() == now.month() {
            return false;
        }
        let target_day = anchor.day().min(last_day_of(now.year(), now.month()));
        now.day() >= target_day
    }
}

/// Due once per year, on or after the anchor month/day, with the anchor day
/// clamped to the anchor month's length in the current year.
#[derive(Debug, Clone, Copy, Default)]
pub struct YearlyRule;

impl DuenessRule for YearlyRule {
    fn is_due(
        &self,
        last_fired: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        anchor: NaiveDate,
    ) -> bool {
        let last = match last_fired {
            None => return true,
            Some(last) => last,
        };
        if last.year() == now.year() {
            return false;
        }
        if now.month() > anchor.month() {
            return true;
        }
        if now.month() < anchor.month() {
            return false;
        }
        let target_day = anchor.day().min(last_day_of(now.year(), anchor.month()));
        now.day() >= target_day
    }
}
