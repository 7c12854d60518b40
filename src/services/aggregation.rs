// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pure reductions over ledger entries.
//!
//! Nothing here touches storage or the clock. Ordered maps keep output
//! identical across calls, and decimal arithmetic keeps the per-category
//! partition exact.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::AppError;
use crate::models::{LedgerEntry, TargetMetric};
use crate::time_utils::{local_day, month_start, next_month_start, start_of_day, week_start};

/// Half-open aggregation window `[start, end)` tied to a caller time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: FixedOffset,
}

impl Window {
    /// Arbitrary window. Empty or inverted windows are rejected.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tz: FixedOffset,
    ) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::Empty);
        }
        Ok(Self { start, end, tz })
    }

    /// The single calendar day `day`.
    pub fn day(day: NaiveDate, tz: FixedOffset) -> Result<Self, WindowError> {
        let next = day.succ_opt().ok_or(WindowError::OutOfRange)?;
        Self::between_days(day, next, tz)
    }

    /// The seven days containing `day`, starting on `anchor`.
    pub fn week(day: NaiveDate, anchor: Weekday, tz: FixedOffset) -> Result<Self, WindowError> {
        let first = week_start(day, anchor).ok_or(WindowError::OutOfRange)?;
        let after = first
            .checked_add_days(chrono::Days::new(7))
            .ok_or(WindowError::OutOfRange)?;
        Self::between_days(first, after, tz)
    }

    /// The calendar month containing `day`.
    pub fn month(day: NaiveDate, tz: FixedOffset) -> Result<Self, WindowError> {
        let first = month_start(day).ok_or(WindowError::OutOfRange)?;
        let after = next_month_start(day).ok_or(WindowError::OutOfRange)?;
        Self::between_days(first, after, tz)
    }

    /// Local midnight of `first` up to local midnight of `after`.
    fn between_days(
        first: NaiveDate,
        after: NaiveDate,
        tz: FixedOffset,
    ) -> Result<Self, WindowError> {
        let start = start_of_day(first, tz).ok_or(WindowError::OutOfRange)?;
        let end = start_of_day(after, tz).ok_or(WindowError::OutOfRange)?;
        Self::new(start, end, tz)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn timezone(&self) -> FixedOffset {
        self.tz
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("window must end after it starts")]
    Empty,
    #[error("window is outside the supported calendar range")]
    OutOfRange,
}

impl From<WindowError> for AppError {
    fn from(err: WindowError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Totals for one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Aggregate {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub total_impact: Decimal,
    pub entry_count: u32,
    /// category id → summed impact
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, string>"))]
    pub per_category_totals: BTreeMap<String, Decimal>,
    /// local calendar day → summed impact
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, string>"))]
    pub per_day_totals: BTreeMap<NaiveDate, Decimal>,
}

/// Reduce `entries` over `window`. Entries outside the window are ignored.
pub fn aggregate(entries: &[LedgerEntry], window: &Window) -> Aggregate {
    let mut result = Aggregate {
        total_impact: Decimal::ZERO,
        entry_count: 0,
        per_category_totals: BTreeMap::new(),
        per_day_totals: BTreeMap::new(),
    };

    for entry in entries.iter().filter(|e| window.contains(e.logged_at)) {
        result.total_impact += entry.impact;
        result.entry_count += 1;
        *result
            .per_category_totals
            .entry(entry.category_id.clone())
            .or_insert(Decimal::ZERO) += entry.impact;
        *result
            .per_day_totals
            .entry(local_day(entry.logged_at, window.tz))
            .or_insert(Decimal::ZERO) += entry.impact;
    }

    result
}

/// Compute a challenge metric over `window`.
pub fn measure(metric: &TargetMetric, entries: &[LedgerEntry], window: &Window) -> Decimal {
    let in_window = entries.iter().filter(|e| window.contains(e.logged_at));

    match metric {
        TargetMetric::ActivityCount => Decimal::from(in_window.count()),
        TargetMetric::CarbonReduction => in_window.map(LedgerEntry::carbon_saved).sum(),
        TargetMetric::CategoryCount { category_id } => {
            Decimal::from(in_window.filter(|e| &e.category_id == category_id).count())
        }
        TargetMetric::ConsistencyDays => {
            let days: BTreeSet<NaiveDate> = in_window
                .map(|e| local_day(e.logged_at, window.tz))
                .collect();
            Decimal::from(days.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Offset, TimeZone};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(id: &str, at: &str, category: &str, impact: Decimal) -> LedgerEntry {
        LedgerEntry {
            id: id.to_string(),
            owner_id: "owner-1".to_string(),
            activity_id: format!("{}_activity", category),
            category_id: category.to_string(),
            quantity: Decimal::ONE,
            unit: "unit".to_string(),
            carbon_per_unit: impact,
            impact,
            logged_at: ts(at),
            note: None,
            created_at: ts(at),
        }
    }

    fn sample() -> Vec<LedgerEntry> {
        vec![
            entry("1", "2024-03-11T08:00:00Z", "transport", Decimal::new(21, 1)),
            entry("2", "2024-03-11T18:00:00Z", "transport", Decimal::new(21, 1)),
            entry("3", "2024-03-12T12:00:00Z", "food", Decimal::new(-15, 1)),
            entry("4", "2024-03-13T07:30:00Z", "energy", Decimal::new(333, 2)),
            entry("5", "2024-03-18T09:00:00Z", "food", Decimal::new(7, 1)),
        ]
    }

    #[test]
    fn test_day_window_is_half_open() {
        let window = Window::day(date(2024, 3, 11), Utc.fix()).unwrap();
        assert!(window.contains(ts("2024-03-11T00:00:00Z")));
        assert!(window.contains(ts("2024-03-11T23:59:59Z")));
        assert!(!window.contains(ts("2024-03-12T00:00:00Z")));
    }

    #[test]
    fn test_week_window_spans_seven_days_from_anchor() {
        let window = Window::week(date(2024, 3, 13), Weekday::Mon, Utc.fix()).unwrap();
        assert_eq!(window.start(), ts("2024-03-11T00:00:00Z"));
        assert_eq!(window.end(), ts("2024-03-18T00:00:00Z"));

        let sunday_weeks = Window::week(date(2024, 3, 13), Weekday::Sun, Utc.fix()).unwrap();
        assert_eq!(sunday_weeks.start(), ts("2024-03-10T00:00:00Z"));
    }

    #[test]
    fn test_month_window() {
        let window = Window::month(date(2024, 2, 10), Utc.fix()).unwrap();
        assert_eq!(window.start(), ts("2024-02-01T00:00:00Z"));
        assert_eq!(window.end(), ts("2024-03-01T00:00:00Z"));
    }

    #[test]
    fn test_empty_window_rejected() {
        let at = ts("2024-03-11T00:00:00Z");
        assert_eq!(Window::new(at, at, Utc.fix()), Err(WindowError::Empty));
    }

    #[test]
    fn test_windows_at_calendar_edge_are_out_of_range() {
        let plus_14 = FixedOffset::east_opt(14 * 3600).unwrap();
        let near_min = NaiveDate::MIN + chrono::Days::new(2);

        // Anchored so the week would start six days before `near_min`.
        let anchor = near_min.weekday().succ();
        assert_eq!(
            Window::week(near_min, anchor, plus_14),
            Err(WindowError::OutOfRange)
        );
        assert_eq!(Window::month(near_min, plus_14), Err(WindowError::OutOfRange));
        assert_eq!(Window::day(NaiveDate::MAX, Utc.fix()), Err(WindowError::OutOfRange));
    }

    #[test]
    fn test_aggregate_weekly_totals() {
        let window = Window::week(date(2024, 3, 13), Weekday::Mon, Utc.fix()).unwrap();
        let result = aggregate(&sample(), &window);

        assert_eq!(result.entry_count, 4);
        assert_eq!(result.total_impact, Decimal::new(603, 2));
        assert_eq!(
            result.per_category_totals.get("transport"),
            Some(&Decimal::new(42, 1))
        );
        assert_eq!(
            result.per_day_totals.get(&date(2024, 3, 11)),
            Some(&Decimal::new(42, 1))
        );
        assert!(!result.per_day_totals.contains_key(&date(2024, 3, 18)));
    }

    #[test]
    fn test_category_partition_sums_to_total() {
        let entries = sample();
        for window in [
            Window::day(date(2024, 3, 11), Utc.fix()).unwrap(),
            Window::week(date(2024, 3, 13), Weekday::Mon, Utc.fix()).unwrap(),
            Window::month(date(2024, 3, 1), Utc.fix()).unwrap(),
        ] {
            let result = aggregate(&entries, &window);
            let by_category: Decimal = result.per_category_totals.values().copied().sum();
            let by_day: Decimal = result.per_day_totals.values().copied().sum();
            assert_eq!(by_category, result.total_impact);
            assert_eq!(by_day, result.total_impact);
        }
    }

    #[test]
    fn test_aggregate_is_idempotent_and_order_independent() {
        let window = Window::month(date(2024, 3, 1), Utc.fix()).unwrap();
        let entries = sample();
        let mut reversed = entries.clone();
        reversed.reverse();

        let first = aggregate(&entries, &window);
        let second = aggregate(&entries, &window);
        let third = aggregate(&reversed, &window);

        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&third).unwrap()
        );
    }

    #[test]
    fn test_per_day_uses_window_time_zone() {
        // 18:00 UTC on the 11th is the 12th in UTC+9.
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let window = Window::week(date(2024, 3, 13), Weekday::Mon, tokyo).unwrap();
        let result = aggregate(&sample(), &window);
        assert_eq!(
            result.per_day_totals.get(&date(2024, 3, 12)),
            Some(&Decimal::new(6, 1))
        );
    }

    #[test]
    fn test_measure_metrics() {
        let window = Window::week(date(2024, 3, 13), Weekday::Mon, Utc.fix()).unwrap();
        let entries = sample();

        assert_eq!(
            measure(&TargetMetric::ActivityCount, &entries, &window),
            Decimal::from(4)
        );
        assert_eq!(
            measure(&TargetMetric::CarbonReduction, &entries, &window),
            Decimal::new(15, 1)
        );
        assert_eq!(
            measure(
                &TargetMetric::CategoryCount {
                    category_id: "transport".to_string()
                },
                &entries,
                &window
            ),
            Decimal::from(2)
        );
        assert_eq!(
            measure(&TargetMetric::ConsistencyDays, &entries, &window),
            Decimal::from(3)
        );
    }
}
