//! Per-owner carbon profile aggregates.
//!
//! These running totals are maintained when entries are written or deleted,
//! so profile reads are O(1) instead of O(entries).

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::LedgerEntry;
use crate::time_utils::local_day;

/// Running totals for one owner.
///
/// Stored at: `carbon_profiles/{owner_id}`
///
/// Updated in the same atomic write as the entry that changes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CarbonProfile {
    pub owner_id: String,

    // ─── Lifetime Totals ─────────────────────────────────────────
    /// Entries currently on the ledger
    #[serde(default)]
    pub total_entries: u32,
    /// Sum of entry impacts (kg CO2e, signed)
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub total_impact: Decimal,
    /// Sum of avoided emissions from carbon-saving entries (kg CO2e)
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub total_saved: Decimal,

    // ─── Streaks ─────────────────────────────────────────────────
    /// Consecutive active calendar days ending at `last_active_day`
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub last_active_day: Option<NaiveDate>,

    // ─── Settings ────────────────────────────────────────────────
    /// Personal weekly goal (kg CO2e); falls back to the configured default
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub weekly_goal: Option<Decimal>,

    // ─── Metadata ────────────────────────────────────────────────
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CarbonProfile {
    pub fn new(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            ..Self::default()
        }
    }

    /// Add a newly written entry to the running totals.
    ///
    /// The streak compares the entry's calendar day in `tz` with the last
    /// active day: the next day extends it, the same day leaves it alone, a
    /// gap restarts it at 1. Any other day, earlier days included, also
    /// restarts it and becomes the last active day.
    pub fn apply_entry(&mut self, entry: &LedgerEntry, tz: FixedOffset, now: DateTime<Utc>) {
        self.total_entries += 1;
        self.total_impact += entry.impact;
        self.total_saved += entry.carbon_saved();
        self.advance_streak(local_day(entry.logged_at, tz));
        self.updated_at = Some(now);
    }

    /// Remove a deleted entry's contribution. Streak state is left as-is.
    pub fn revert_entry(&mut self, entry: &LedgerEntry, now: DateTime<Utc>) {
        self.total_entries = self.total_entries.saturating_sub(1);
        self.total_impact -= entry.impact;
        self.total_saved -= entry.carbon_saved();
        self.updated_at = Some(now);
    }

    fn advance_streak(&mut self, day: NaiveDate) {
        match self.last_active_day {
            Some(last) if day == last => {}
            Some(last) if last.succ_opt() == Some(day) => self.current_streak += 1,
            _ => self.current_streak = 1,
        }
        self.last_active_day = Some(day);
        self.longest_streak = self.longest_streak.max(self.current_streak);
    }
}
