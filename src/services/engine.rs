// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public operations of the carbon engine.
//!
//! `CarbonEngine` composes the ledger, the aggregation functions and the
//! progression rules into the caller-facing operations. HTTP handlers and
//! the background sweeper talk only to this type. Every operation takes
//! `now` explicitly so behavior is reproducible in tests.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc, Weekday};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::config::Config;
use crate::db::Db;
use crate::error::AppError;
use crate::models::{
    Badge, BadgeAward, CarbonProfile, ChallengeInstance, EntryFilter, LedgerEntry, NewEntry,
};
use crate::services::aggregation::{aggregate, Aggregate, Window};
use crate::services::{
    CatalogService, LedgerService, OwnerLocks, ProgressionService, UserChallenges,
};
use crate::time_utils::local_day;

/// Statistics period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Weekly,
    Monthly,
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" | "week" => Ok(Period::Weekly),
            "monthly" | "month" => Ok(Period::Monthly),
            other => Err(AppError::Validation(format!(
                "period must be 'weekly' or 'monthly', got '{}'",
                other
            ))),
        }
    }
}

/// A recorded entry plus any badges it unlocked.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoggedEntry {
    pub entry: LedgerEntry,
    pub new_badges: Vec<BadgeAward>,
}

/// Today's impact and progress toward the weekly goal.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TodayImpact {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub date: NaiveDate,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub today_total: Decimal,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub weekly_total: Decimal,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub weekly_goal: Decimal,
    /// max(weekly_total, 0) / weekly_goal × 100, one decimal place
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub weekly_progress_percent: Decimal,
    /// Today's entries, newest first
    pub activities: Vec<LedgerEntry>,
}

/// Aggregate for a weekly or monthly window.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PeriodStats {
    pub period: Period,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub window_start: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub window_end: DateTime<Utc>,
    #[serde(flatten)]
    pub totals: Aggregate,
}

/// Result of a progress update.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProgressUpdate {
    pub challenge: ChallengeInstance,
    pub completed_now: bool,
    pub new_badges: Vec<BadgeAward>,
}

/// Badge definition with the time the owner earned it.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EarnedBadge {
    #[serde(flatten)]
    pub badge: Badge,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileSummary {
    pub profile: CarbonProfile,
    /// Personal goal, or the configured default
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub effective_weekly_goal: Decimal,
    pub badges: Vec<EarnedBadge>,
    pub current_challenge: Option<ChallengeInstance>,
}

/// Facade over the ledger and progression services.
#[derive(Clone)]
pub struct CarbonEngine {
    catalog: Arc<CatalogService>,
    ledger: LedgerService,
    progression: ProgressionService,
    week_start: Weekday,
    default_weekly_goal: Decimal,
}

impl CarbonEngine {
    pub fn new(db: Db, catalog: Arc<CatalogService>, config: &Config) -> Self {
        let locks = OwnerLocks::new();
        Self {
            ledger: LedgerService::new(db.clone(), Arc::clone(&catalog), locks.clone()),
            progression: ProgressionService::new(db, Arc::clone(&catalog), locks),
            catalog,
            week_start: config.week_start,
            default_weekly_goal: config.default_weekly_goal,
        }
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    // ─── Ledger ──────────────────────────────────────────────────

    /// Record an entry, then award any badges it unlocked.
    pub async fn log_activity(
        &self,
        owner_id: &str,
        new: NewEntry,
        tz: FixedOffset,
        now: DateTime<Utc>,
    ) -> Result<LoggedEntry, AppError> {
        let entry = self.ledger.record_entry(owner_id, new, tz, now).await?;
        let evaluated = self.progression.evaluate_badges(owner_id, now).await;
        Ok(LoggedEntry {
            entry,
            new_badges: badges_after_commit(owner_id, evaluated),
        })
    }

    pub async fn delete_log_entry(
        &self,
        owner_id: &str,
        entry_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.ledger.delete_entry(owner_id, entry_id, now).await
    }

    pub async fn list_entries(
        &self,
        owner_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        self.ledger.list_entries(owner_id, filter).await
    }

    // ─── Aggregation ─────────────────────────────────────────────

    pub async fn today_impact(
        &self,
        owner_id: &str,
        tz: FixedOffset,
        now: DateTime<Utc>,
    ) -> Result<TodayImpact, AppError> {
        let today = local_day(now, tz);
        let day = Window::day(today, tz)?;
        let week = Window::week(today, self.week_start, tz)?;

        let entries = self
            .ledger
            .list_entries(owner_id, &EntryFilter::between(week.start(), week.end()))
            .await?;
        let today_totals = aggregate(&entries, &day);
        let week_totals = aggregate(&entries, &week);

        let profile = self.ledger.profile(owner_id).await?;
        let weekly_goal = profile.weekly_goal.unwrap_or(self.default_weekly_goal);

        Ok(TodayImpact {
            date: today,
            today_total: today_totals.total_impact,
            weekly_total: week_totals.total_impact,
            weekly_goal,
            weekly_progress_percent: goal_percent(week_totals.total_impact, weekly_goal),
            activities: entries
                .into_iter()
                .filter(|e| day.contains(e.logged_at))
                .collect(),
        })
    }

    /// Aggregate for the week or month containing `date` (default: today).
    pub async fn stats(
        &self,
        owner_id: &str,
        period: Period,
        date: Option<NaiveDate>,
        tz: FixedOffset,
        now: DateTime<Utc>,
    ) -> Result<PeriodStats, AppError> {
        let date = date.unwrap_or_else(|| local_day(now, tz));
        let window = match period {
            Period::Weekly => Window::week(date, self.week_start, tz)?,
            Period::Monthly => Window::month(date, tz)?,
        };

        let entries = self
            .ledger
            .list_entries(owner_id, &EntryFilter::between(window.start(), window.end()))
            .await?;

        Ok(PeriodStats {
            period,
            window_start: window.start(),
            window_end: window.end(),
            totals: aggregate(&entries, &window),
        })
    }

    // ─── Progression ─────────────────────────────────────────────

    pub async fn join_challenge(
        &self,
        owner_id: &str,
        template_id: &str,
        tz: FixedOffset,
        now: DateTime<Utc>,
    ) -> Result<ChallengeInstance, AppError> {
        self.progression
            .join_challenge(owner_id, template_id, tz, now)
            .await
    }

    /// Recompute progress; a completion triggers badge evaluation.
    pub async fn update_challenge_progress(
        &self,
        owner_id: &str,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ProgressUpdate, AppError> {
        let outcome = self
            .progression
            .update_progress(owner_id, instance_id, now)
            .await?;

        let new_badges = if outcome.completed_now {
            let evaluated = self.progression.evaluate_badges(owner_id, now).await;
            badges_after_commit(owner_id, evaluated)
        } else {
            Vec::new()
        };

        Ok(ProgressUpdate {
            challenge: outcome.instance,
            completed_now: outcome.completed_now,
            new_badges,
        })
    }

    pub async fn mark_challenge_shared(
        &self,
        owner_id: &str,
        instance_id: &str,
        platform: &str,
        now: DateTime<Utc>,
    ) -> Result<ChallengeInstance, AppError> {
        self.progression
            .mark_shared(owner_id, instance_id, platform, now)
            .await
    }

    pub async fn user_challenges(&self, owner_id: &str) -> Result<UserChallenges, AppError> {
        self.progression.user_challenges(owner_id).await
    }

    pub async fn expire_stale_challenges(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        self.progression.expire_stale_challenges(now).await
    }

    // ─── Profile ─────────────────────────────────────────────────

    pub async fn profile(&self, owner_id: &str) -> Result<ProfileSummary, AppError> {
        let profile = self.ledger.profile(owner_id).await?;

        let badges = self
            .progression
            .awards(owner_id)
            .await?
            .into_iter()
            .filter_map(|award| {
                // Awards for badges since removed from the catalog are skipped.
                self.catalog
                    .list_badges()
                    .iter()
                    .find(|b| b.id == award.badge_id)
                    .map(|badge| EarnedBadge {
                        badge: badge.clone(),
                        awarded_at: award.awarded_at,
                    })
            })
            .collect();

        let current_challenge = self.progression.current_challenge(owner_id).await?;

        Ok(ProfileSummary {
            effective_weekly_goal: profile.weekly_goal.unwrap_or(self.default_weekly_goal),
            profile,
            badges,
            current_challenge,
        })
    }

    pub async fn set_weekly_goal(
        &self,
        owner_id: &str,
        goal: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<CarbonProfile, AppError> {
        self.ledger.set_weekly_goal(owner_id, goal, now).await
    }
}

/// Badges awarded after a write has already committed. A failure here must
/// not turn the committed write into an error; the next evaluation retries.
fn badges_after_commit(
    owner_id: &str,
    evaluated: Result<Vec<BadgeAward>, AppError>,
) -> Vec<BadgeAward> {
    evaluated.unwrap_or_else(|e| {
        tracing::error!(owner_id, error = ?e, "Badge evaluation failed after commit");
        Vec::new()
    })
}

/// Percent of `goal` reached by `total`, one decimal place. Net savings
/// (negative totals) count as zero progress.
fn goal_percent(total: Decimal, goal: Decimal) -> Decimal {
    total
        .max(Decimal::ZERO)
        .checked_div(goal)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| pct.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or(Decimal::ZERO)
}
