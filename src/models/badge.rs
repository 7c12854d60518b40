// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Badge definitions and unlock records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::CarbonProfile;

/// Metric and threshold a badge unlocks at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum BadgeCriteria {
    /// Lifetime entries on the ledger
    TotalEntries { threshold: u32 },
    /// Longest run of consecutive active days
    StreakDays { threshold: u32 },
    /// Lifetime kg CO2e avoided
    CarbonSaved {
        #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
        threshold: Decimal,
    },
    /// Completed challenges
    ChallengesCompleted { threshold: u32 },
}

impl BadgeCriteria {
    /// Check the criteria against an owner's current metrics.
    pub fn is_met(&self, profile: &CarbonProfile, challenges_completed: u32) -> bool {
        match self {
            BadgeCriteria::TotalEntries { threshold } => profile.total_entries >= *threshold,
            BadgeCriteria::StreakDays { threshold } => profile.longest_streak >= *threshold,
            BadgeCriteria::CarbonSaved { threshold } => profile.total_saved >= *threshold,
            BadgeCriteria::ChallengesCompleted { threshold } => {
                challenges_completed >= *threshold
            }
        }
    }
}

/// Static badge definition from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub criteria: BadgeCriteria,
}

/// Unlock record. At most one exists per (owner, badge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BadgeAward {
    pub owner_id: String,
    pub badge_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub awarded_at: DateTime<Utc>,
}
