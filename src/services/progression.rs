// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge state machine and badge unlocks.
//!
//! Progress is never incremented in place. Each update recomputes the
//! metric from the ledger, which makes repeated updates idempotent and
//! keeps progress correct after entries are deleted.

use chrono::{DateTime, FixedOffset, Utc};
use futures_util::{stream, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::db::Db;
use crate::error::AppError;
use crate::models::{BadgeAward, ChallengeInstance, ChallengeStatus, EntryFilter};
use crate::services::aggregation::{measure, Window};
use crate::services::{CatalogService, OwnerLocks};

/// Maximum owners settled concurrently by one expiry sweep.
const MAX_CONCURRENT_SETTLEMENTS: usize = 8;

/// Longest accepted share platform tag.
const MAX_PLATFORM_CHARS: usize = 32;

/// An owner's challenges grouped for display.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserChallenges {
    /// Most recently started first
    pub active: Vec<ChallengeInstance>,
    /// Most recently completed first
    pub completed: Vec<ChallengeInstance>,
}

/// Result of recomputing one instance.
#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    pub instance: ChallengeInstance,
    /// `true` only for the update that moved the instance to completed
    pub completed_now: bool,
}

/// How an expiry sweep left a past-due instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Completed,
    Expired,
    Unchanged,
}

#[derive(Clone)]
pub struct ProgressionService {
    db: Db,
    catalog: Arc<CatalogService>,
    locks: OwnerLocks,
}

impl ProgressionService {
    pub fn new(db: Db, catalog: Arc<CatalogService>, locks: OwnerLocks) -> Self {
        Self { db, catalog, locks }
    }

    /// Start a new instance of `template_id` for `owner_id`.
    ///
    /// Fails with `AlreadyJoined` while an active or completed instance of
    /// the same template exists. Expired instances do not block.
    pub async fn join_challenge(
        &self,
        owner_id: &str,
        template_id: &str,
        tz: FixedOffset,
        now: DateTime<Utc>,
    ) -> Result<ChallengeInstance, AppError> {
        let template = self.catalog.get_template(template_id)?;

        let _guard = self.locks.acquire(owner_id).await;

        let existing = self.db.list_challenges(owner_id).await?;
        if let Some(blocking) = existing
            .iter()
            .find(|c| c.template_id == template.id && c.blocks_rejoin())
        {
            tracing::warn!(
                owner_id,
                template_id,
                instance_id = %blocking.id,
                "Rejected duplicate challenge join"
            );
            return Err(AppError::AlreadyJoined(template.id.clone()));
        }

        let instance = ChallengeInstance::from_template(
            uuid::Uuid::new_v4().to_string(),
            owner_id,
            template,
            tz,
            now,
        );
        self.db.put_challenge(&instance).await?;

        tracing::info!(
            owner_id,
            template_id,
            instance_id = %instance.id,
            ends_at = %instance.ends_at,
            "Joined challenge"
        );

        Ok(instance)
    }

    /// Recompute progress for one instance.
    ///
    /// Completed and expired instances are returned unchanged. An active
    /// instance past its end that still falls short of its target expires.
    pub async fn update_progress(
        &self,
        owner_id: &str,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ProgressOutcome, AppError> {
        let _guard = self.locks.acquire(owner_id).await;

        let mut instance = self.load_instance(owner_id, instance_id).await?;
        if !instance.is_active() {
            tracing::debug!(
                owner_id,
                instance_id,
                status = ?instance.status,
                "Challenge already settled, skipping recompute"
            );
            return Ok(ProgressOutcome {
                instance,
                completed_now: false,
            });
        }

        let completed_now = self.recompute(&mut instance, now).await?;
        if !completed_now && instance.is_past_due(now) {
            instance.expire(now);
        }
        self.db.put_challenge(&instance).await?;

        log_transition(&instance, completed_now);

        Ok(ProgressOutcome {
            instance,
            completed_now,
        })
    }

    /// Expire every active instance whose window has closed without
    /// reaching its target. Returns the number expired.
    ///
    /// Each candidate gets a final recompute over its full window first, so
    /// an instance that did reach its target completes instead.
    pub async fn expire_stale_challenges(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let candidates: Vec<ChallengeInstance> = self
            .db
            .list_active_challenges()
            .await?
            .into_iter()
            .filter(|c| c.is_past_due(now))
            .collect();

        if candidates.is_empty() {
            return Ok(0);
        }

        let expired = Arc::new(AtomicUsize::new(0));

        stream::iter(candidates)
            .for_each_concurrent(MAX_CONCURRENT_SETTLEMENTS, |candidate| {
                let expired = Arc::clone(&expired);
                async move {
                    match self.settle(&candidate.owner_id, &candidate.id, now).await {
                        Ok(Settlement::Expired) => {
                            expired.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(Settlement::Completed) => {
                            if let Err(e) = self.evaluate_badges(&candidate.owner_id, now).await {
                                tracing::warn!(
                                    owner_id = %candidate.owner_id,
                                    error = ?e,
                                    "Badge evaluation failed after sweep completion"
                                );
                            }
                        }
                        Ok(Settlement::Unchanged) => {}
                        Err(e) => {
                            tracing::warn!(
                                owner_id = %candidate.owner_id,
                                instance_id = %candidate.id,
                                error = ?e,
                                "Failed to settle past-due challenge"
                            );
                        }
                    }
                }
            })
            .await;

        let expired = expired.load(Ordering::Relaxed);
        tracing::info!(expired, "Challenge expiry sweep finished");
        Ok(expired)
    }

    /// Record that an instance was shared to `platform`.
    pub async fn mark_shared(
        &self,
        owner_id: &str,
        instance_id: &str,
        platform: &str,
        now: DateTime<Utc>,
    ) -> Result<ChallengeInstance, AppError> {
        let platform = normalize_platform(platform)?;

        let _guard = self.locks.acquire(owner_id).await;

        let mut instance = self.load_instance(owner_id, instance_id).await?;
        if instance.mark_shared(&platform, now) {
            self.db.put_challenge(&instance).await?;
            tracing::info!(owner_id, instance_id, platform = %platform, "Challenge shared");
        } else {
            tracing::debug!(owner_id, instance_id, platform = %platform, "Already shared");
        }

        Ok(instance)
    }

    /// Award every badge whose criteria now hold and which the owner does
    /// not have yet. Returns only the newly created awards.
    pub async fn evaluate_badges(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<BadgeAward>, AppError> {
        let badges = self.catalog.list_badges();
        if badges.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.locks.acquire(owner_id).await;

        let profile = self.db.get_profile(owner_id).await?.unwrap_or_default();
        let challenges_completed = self
            .db
            .list_challenges(owner_id)
            .await?
            .iter()
            .filter(|c| c.status == ChallengeStatus::Completed)
            .count() as u32;
        let held: HashSet<String> = self
            .db
            .list_awards(owner_id)
            .await?
            .into_iter()
            .map(|a| a.badge_id)
            .collect();

        let mut awarded = Vec::new();
        for badge in badges {
            if held.contains(&badge.id) || !badge.criteria.is_met(&profile, challenges_completed) {
                continue;
            }
            let award = BadgeAward {
                owner_id: owner_id.to_string(),
                badge_id: badge.id.clone(),
                awarded_at: now,
            };
            if self.db.insert_award(&award).await? {
                tracing::info!(owner_id, badge_id = %badge.id, "Badge awarded");
                awarded.push(award);
            }
        }

        Ok(awarded)
    }

    /// Active and completed instances. Expired ones are omitted.
    pub async fn user_challenges(&self, owner_id: &str) -> Result<UserChallenges, AppError> {
        let mut active = Vec::new();
        let mut completed = Vec::new();
        for instance in self.db.list_challenges(owner_id).await? {
            match instance.status {
                ChallengeStatus::Active => active.push(instance),
                ChallengeStatus::Completed => completed.push(instance),
                ChallengeStatus::Expired => {}
            }
        }
        active.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| b.id.cmp(&a.id)));
        completed.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(UserChallenges { active, completed })
    }

    /// The most recently started active instance, if any.
    pub async fn current_challenge(
        &self,
        owner_id: &str,
    ) -> Result<Option<ChallengeInstance>, AppError> {
        Ok(self.user_challenges(owner_id).await?.active.into_iter().next())
    }

    pub async fn awards(&self, owner_id: &str) -> Result<Vec<BadgeAward>, AppError> {
        let mut awards = self.db.list_awards(owner_id).await?;
        awards.sort_by(|a, b| {
            a.awarded_at
                .cmp(&b.awarded_at)
                .then_with(|| a.badge_id.cmp(&b.badge_id))
        });
        Ok(awards)
    }

    async fn load_instance(
        &self,
        owner_id: &str,
        instance_id: &str,
    ) -> Result<ChallengeInstance, AppError> {
        self.db
            .get_challenge(owner_id, instance_id)
            .await?
            .filter(|c| c.owner_id == owner_id)
            .ok_or_else(|| AppError::NotFound(format!("Challenge {}", instance_id)))
    }

    /// Measure the instance over `[started_at, min(now, ends_at))` and store
    /// the result. Returns `true` if this completed it.
    async fn recompute(
        &self,
        instance: &mut ChallengeInstance,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let until = instance.measured_until(now);
        let measured = match Window::new(instance.started_at, until, instance.timezone()) {
            Ok(window) => {
                let entries = self
                    .db
                    .list_entries(
                        &instance.owner_id,
                        &EntryFilter::between(window.start(), window.end()),
                    )
                    .await?;
                measure(&instance.metric, &entries, &window)
            }
            // Nothing can have been logged inside an empty window.
            Err(_) => Decimal::ZERO,
        };

        Ok(instance.record_measurement(measured, now))
    }

    async fn settle(
        &self,
        owner_id: &str,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Settlement, AppError> {
        let _guard = self.locks.acquire(owner_id).await;

        let mut instance = self.load_instance(owner_id, instance_id).await?;
        if !instance.is_active() || !instance.is_past_due(now) {
            return Ok(Settlement::Unchanged);
        }

        let completed_now = self.recompute(&mut instance, now).await?;
        let settlement = if completed_now {
            Settlement::Completed
        } else {
            instance.expire(now);
            Settlement::Expired
        };
        self.db.put_challenge(&instance).await?;

        log_transition(&instance, completed_now);

        Ok(settlement)
    }
}

fn log_transition(instance: &ChallengeInstance, completed_now: bool) {
    if completed_now {
        tracing::info!(
            owner_id = %instance.owner_id,
            instance_id = %instance.id,
            template_id = %instance.template_id,
            "Challenge completed"
        );
    } else if instance.status == ChallengeStatus::Expired {
        tracing::info!(
            owner_id = %instance.owner_id,
            instance_id = %instance.id,
            progress = %instance.progress,
            target = %instance.target,
            "Challenge expired"
        );
    } else {
        tracing::debug!(
            owner_id = %instance.owner_id,
            instance_id = %instance.id,
            progress = %instance.progress,
            "Challenge progress updated"
        );
    }
}

fn normalize_platform(platform: &str) -> Result<String, AppError> {
    let platform = platform.trim().to_lowercase();
    if platform.is_empty() || platform.chars().count() > MAX_PLATFORM_CHARS {
        return Err(AppError::Validation(format!(
            "platform must be 1 to {} characters",
            MAX_PLATFORM_CHARS
        )));
    }
    Ok(platform)
}
