// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge templates and per-owner challenge instances.

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::time_utils::offset_minutes;

/// What a challenge counts toward its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetMetric {
    /// Number of entries logged
    ActivityCount,
    /// kg CO2e avoided by carbon-saving entries
    CarbonReduction,
    /// Number of entries in one category
    CategoryCount { category_id: String },
    /// Distinct calendar days with at least one entry
    ConsistencyDays,
}

/// Reward granted on completion (display only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Reward {
    pub points: u32,
    pub label: String,
}

/// Static challenge definition from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChallengeTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub metric: TargetMetric,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub target: Decimal,
    pub duration_days: u32,
    pub reward: Reward,
    /// Suggested activities (display only, not enforced)
    #[serde(default)]
    pub prerequisite_activity_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Active,
    Completed,
    Expired,
}

/// An owner's attempt at a challenge template.
///
/// Template fields are copied at join time so later catalog edits never
/// alter an in-flight challenge. Status only moves forward:
/// `active → completed` or `active → expired`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChallengeInstance {
    pub id: String,
    pub owner_id: String,
    pub template_id: String,

    // ─── Template Snapshot ───────────────────────────────────────
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub metric: TargetMetric,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub target: Decimal,
    pub reward: Reward,

    // ─── Timing ──────────────────────────────────────────────────
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub started_at: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub ends_at: DateTime<Utc>,
    /// Caller time zone at join time (for counting calendar days)
    pub utc_offset_minutes: i32,

    // ─── State ───────────────────────────────────────────────────
    /// Always within `0..=target`
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub progress: Decimal,
    pub status: ChallengeStatus,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shared_platforms: BTreeSet<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub updated_at: DateTime<Utc>,
}

impl ChallengeInstance {
    /// Start a new active instance of `template`.
    pub fn from_template(
        id: String,
        owner_id: &str,
        template: &ChallengeTemplate,
        tz: FixedOffset,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id: owner_id.to_string(),
            template_id: template.id.clone(),
            title: template.title.clone(),
            description: template.description.clone(),
            category_id: template.category_id.clone(),
            metric: template.metric.clone(),
            target: template.target,
            reward: template.reward.clone(),
            started_at: now,
            ends_at: now + Duration::days(i64::from(template.duration_days)),
            utc_offset_minutes: offset_minutes(tz),
            progress: Decimal::ZERO,
            status: ChallengeStatus::Active,
            completed_at: None,
            shared_platforms: BTreeSet::new(),
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ChallengeStatus::Active
    }

    /// Active or completed instances block joining the same template again.
    pub fn blocks_rejoin(&self) -> bool {
        matches!(
            self.status,
            ChallengeStatus::Active | ChallengeStatus::Completed
        )
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }

    /// Time zone captured at join time.
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// End of the measurement window at `now`: progress counts
    /// `[started_at, min(now, ends_at))`.
    pub fn measured_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.min(self.ends_at)
    }

    /// Store a freshly recomputed metric value.
    ///
    /// Progress is clamped to `0..=target`. Reaching the target completes an
    /// active instance. Returns `true` only for the call that completes it.
    pub fn record_measurement(&mut self, measured: Decimal, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.progress = measured.max(Decimal::ZERO).min(self.target);
        self.updated_at = now;
        if measured >= self.target {
            return self.complete(now);
        }
        false
    }

    /// `active → completed`. `completed_at` is written at most once.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = ChallengeStatus::Completed;
        self.progress = self.target;
        if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        true
    }

    /// `active → expired`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = ChallengeStatus::Expired;
        self.updated_at = now;
        true
    }

    /// Record that the challenge was shared to `platform`.
    /// Returns `false` when it already was.
    pub fn mark_shared(&mut self, platform: &str, now: DateTime<Utc>) -> bool {
        let added = self.shared_platforms.insert(platform.to_string());
        if added {
            self.updated_at = now;
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(target: i64) -> ChallengeTemplate {
        ChallengeTemplate {
            id: "log_ten".to_string(),
            title: "Log ten activities".to_string(),
            description: "Build the habit".to_string(),
            category_id: "transport".to_string(),
            metric: TargetMetric::ActivityCount,
            target: Decimal::from(target),
            duration_days: 7,
            reward: Reward {
                points: 50,
                label: "Habit builder".to_string(),
            },
            prerequisite_activity_ids: vec![],
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn instance(target: i64) -> ChallengeInstance {
        ChallengeInstance::from_template(
            "c1".to_string(),
            "owner-1",
            &template(target),
            Utc.fix(),
            now(),
        )
    }

    #[test]
    fn test_from_template_snapshots_fields() {
        let c = instance(10);
        assert_eq!(c.status, ChallengeStatus::Active);
        assert_eq!(c.progress, Decimal::ZERO);
        assert_eq!(c.ends_at - c.started_at, Duration::days(7));
        assert_eq!(c.title, "Log ten activities");
        assert!(c.completed_at.is_none());
    }

    #[test]
    fn test_measurement_clamped_to_target() {
        let mut c = instance(10);
        assert!(!c.record_measurement(Decimal::from(4), now()));
        assert_eq!(c.progress, Decimal::from(4));

        assert!(c.record_measurement(Decimal::from(12), now()));
        assert_eq!(c.progress, Decimal::from(10));
        assert_eq!(c.status, ChallengeStatus::Completed);
    }

    #[test]
    fn test_negative_measurement_clamped_to_zero() {
        let mut c = instance(10);
        c.record_measurement(Decimal::from(-3), now());
        assert_eq!(c.progress, Decimal::ZERO);
    }

    #[test]
    fn test_completed_at_set_once() {
        let mut c = instance(1);
        assert!(c.record_measurement(Decimal::ONE, now()));
        let first = c.completed_at;

        let later = now() + Duration::hours(1);
        assert!(!c.record_measurement(Decimal::from(5), later));
        assert!(!c.complete(later));
        assert_eq!(c.completed_at, first);
    }

    #[test]
    fn test_expired_is_terminal() {
        let mut c = instance(10);
        assert!(c.expire(now()));
        assert!(!c.complete(now()));
        assert!(!c.record_measurement(Decimal::from(10), now()));
        assert_eq!(c.status, ChallengeStatus::Expired);
        assert!(!c.blocks_rejoin());
    }

    #[test]
    fn test_mark_shared_is_idempotent() {
        let mut c = instance(10);
        assert!(c.mark_shared("mastodon", now()));
        assert!(!c.mark_shared("mastodon", now()));
        assert_eq!(c.shared_platforms.len(), 1);
    }

    #[test]
    fn test_metric_serialization_is_tagged() {
        let metric = TargetMetric::CategoryCount {
            category_id: "food".to_string(),
        };
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["type"], "category_count");
        assert_eq!(json["category_id"], "food");
    }
}
