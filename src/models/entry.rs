// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ledger entry model for storage and API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::AppError;

/// One recorded user activity, valued at write time.
///
/// The factor, unit and category in effect when the entry was written are
/// frozen onto the record; later catalog changes never revalue it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LedgerEntry {
    /// Entry ID (unique per owner)
    pub id: String,
    /// Owner (caller identity)
    pub owner_id: String,
    pub activity_id: String,
    /// Category of the activity at write time
    pub category_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub quantity: Decimal,
    pub unit: String,
    /// Factor used for valuation (kg CO2e per unit)
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub carbon_per_unit: Decimal,
    /// quantity × carbon_per_unit (kg CO2e, signed)
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub impact: Decimal,
    /// When the activity happened
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub logged_at: DateTime<Utc>,
    pub note: Option<String>,
    /// When the entry was written
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Carbon avoided by this entry (zero for emitting activities).
    pub fn carbon_saved(&self) -> Decimal {
        if self.impact < Decimal::ZERO {
            -self.impact
        } else {
            Decimal::ZERO
        }
    }
}

/// Input for recording a new entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Caller-chosen ID; doubles as an idempotency key for retries
    pub id: Option<String>,
    pub activity_id: String,
    pub quantity: Decimal,
    /// Defaults to server time
    pub logged_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

/// Filter for listing entries. Time bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub category_id: Option<String>,
    pub activity_id: Option<String>,
}

impl EntryFilter {
    /// Entries within `[from, to]`.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    /// Reject ranges that end before they start.
    pub fn validate(&self) -> Result<(), AppError> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(AppError::Validation(
                "'from' must not be after 'to'".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.from.map_or(true, |from| entry.logged_at >= from)
            && self.to.map_or(true, |to| entry.logged_at <= to)
            && self
                .category_id
                .as_deref()
                .map_or(true, |c| entry.category_id == c)
            && self
                .activity_id
                .as_deref()
                .map_or(true, |a| entry.activity_id == a)
    }
}

/// Newest first; ties broken by ID so listings are stable.
pub fn sort_newest_first(entries: &mut [LedgerEntry]) {
    entries.sort_by(|a, b| {
        b.logged_at
            .cmp(&a.logged_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, at: &str, category: &str, impact: Decimal) -> LedgerEntry {
        let ts = DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc);
        LedgerEntry {
            id: id.to_string(),
            owner_id: "owner-1".to_string(),
            activity_id: format!("{}_activity", category),
            category_id: category.to_string(),
            quantity: Decimal::ONE,
            unit: "unit".to_string(),
            carbon_per_unit: impact,
            impact,
            logged_at: ts,
            note: None,
            created_at: ts,
        }
    }

    #[test]
    fn test_filter_bounds_are_inclusive() {
        let e = entry("a", "2024-01-15T10:00:00Z", "food", Decimal::ONE);
        let filter = EntryFilter::between(e.logged_at, e.logged_at);
        assert!(filter.matches(&e));
    }

    #[test]
    fn test_filter_by_category() {
        let e = entry("a", "2024-01-15T10:00:00Z", "food", Decimal::ONE);
        let filter = EntryFilter {
            category_id: Some("transport".to_string()),
            ..EntryFilter::default()
        };
        assert!(!filter.matches(&e));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let later = entry("a", "2024-01-15T10:00:00Z", "food", Decimal::ONE).logged_at;
        let earlier = entry("b", "2024-01-14T10:00:00Z", "food", Decimal::ONE).logged_at;
        let filter = EntryFilter::between(later, earlier);
        assert!(matches!(filter.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_sort_newest_first_breaks_ties_by_id() {
        let mut entries = vec![
            entry("a", "2024-01-15T10:00:00Z", "food", Decimal::ONE),
            entry("c", "2024-01-16T10:00:00Z", "food", Decimal::ONE),
            entry("b", "2024-01-15T10:00:00Z", "food", Decimal::ONE),
        ];
        sort_newest_first(&mut entries);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_carbon_saved_only_for_negative_impact() {
        assert_eq!(
            entry("a", "2024-01-15T10:00:00Z", "food", Decimal::new(-15, 1)).carbon_saved(),
            Decimal::new(15, 1)
        );
        assert_eq!(
            entry("b", "2024-01-15T10:00:00Z", "food", Decimal::new(15, 1)).carbon_saved(),
            Decimal::ZERO
        );
    }
}
