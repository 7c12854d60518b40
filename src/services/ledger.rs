// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Carbon ledger: entry writes and the profile totals that track them.
//!
//! Every write runs under the owner lock and commits the entry together with
//! the updated `CarbonProfile`, so the profile always equals the sum of the
//! ledger.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::db::Db;
use crate::error::AppError;
use crate::models::entry::sort_newest_first;
use crate::models::{CarbonProfile, EntryFilter, LedgerEntry, NewEntry};
use crate::services::{CatalogService, OwnerLocks};

/// Longest accepted note, in characters.
pub const MAX_NOTE_CHARS: usize = 500;

/// Longest accepted caller-supplied entry ID.
pub const MAX_ENTRY_ID_CHARS: usize = 128;

/// Largest quantity a single entry may carry.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

#[derive(Clone)]
pub struct LedgerService {
    db: Db,
    catalog: Arc<CatalogService>,
    locks: OwnerLocks,
}

impl LedgerService {
    pub fn new(db: Db, catalog: Arc<CatalogService>, locks: OwnerLocks) -> Self {
        Self { db, catalog, locks }
    }

    /// Value and persist a new entry, updating the owner's profile in the
    /// same commit.
    ///
    /// If `new.id` names an entry the owner already has, that entry is
    /// returned and nothing is counted again.
    pub async fn record_entry(
        &self,
        owner_id: &str,
        new: NewEntry,
        tz: FixedOffset,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, AppError> {
        if new.quantity <= Decimal::ZERO || new.quantity > MAX_QUANTITY {
            tracing::warn!(
                owner_id,
                activity_id = %new.activity_id,
                quantity = %new.quantity,
                "Rejected entry with out-of-range quantity"
            );
            return Err(AppError::InvalidQuantity(format!(
                "quantity must be greater than 0 and at most {}",
                MAX_QUANTITY
            )));
        }

        let activity = self
            .catalog
            .get_activity(&new.activity_id)
            .map_err(|_| AppError::UnknownActivity(new.activity_id.clone()))?;

        let note = normalize_note(new.note)?;
        if let Some(id) = &new.id {
            validate_entry_id(id)?;
        }

        let _guard = self.locks.acquire(owner_id).await;

        if let Some(id) = &new.id {
            if let Some(existing) = self.db.get_entry(owner_id, id).await? {
                tracing::debug!(owner_id, entry_id = %id, "Entry already recorded, returning it");
                return Ok(existing);
            }
        }

        let entry = LedgerEntry {
            id: new.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            owner_id: owner_id.to_string(),
            activity_id: activity.id.clone(),
            category_id: activity.category_id.clone(),
            quantity: new.quantity,
            unit: activity.unit.clone(),
            carbon_per_unit: activity.carbon_per_unit,
            impact: activity.impact_for(new.quantity),
            logged_at: new.logged_at.unwrap_or(now),
            note,
            created_at: now,
        };

        let profile = self
            .db
            .commit_entry(&entry, |profile| profile.apply_entry(&entry, tz, now))
            .await?;

        tracing::info!(
            owner_id,
            entry_id = %entry.id,
            activity_id = %entry.activity_id,
            impact = %entry.impact,
            streak = profile.current_streak,
            "Recorded ledger entry"
        );

        Ok(entry)
    }

    /// Hard-delete an entry and reverse its contribution to the profile.
    pub async fn delete_entry(
        &self,
        owner_id: &str,
        entry_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let _guard = self.locks.acquire(owner_id).await;

        let entry = self
            .db
            .get_entry(owner_id, entry_id)
            .await?
            .filter(|e| e.owner_id == owner_id)
            .ok_or_else(|| AppError::NotFound(format!("Entry {}", entry_id)))?;

        self.db
            .commit_entry_deletion(&entry, |profile| profile.revert_entry(&entry, now))
            .await?;

        tracing::info!(
            owner_id,
            entry_id,
            impact = %entry.impact,
            "Deleted ledger entry"
        );

        Ok(())
    }

    /// Entries matching `filter`, newest first.
    pub async fn list_entries(
        &self,
        owner_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        filter.validate()?;
        let mut entries = self.db.list_entries(owner_id, filter).await?;
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    /// Current profile (a zeroed one for owners with no entries yet).
    pub async fn profile(&self, owner_id: &str) -> Result<CarbonProfile, AppError> {
        self.load_profile(owner_id).await
    }

    /// Set or clear the owner's personal weekly goal.
    pub async fn set_weekly_goal(
        &self,
        owner_id: &str,
        goal: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<CarbonProfile, AppError> {
        if let Some(goal) = goal {
            if goal <= Decimal::ZERO || goal > MAX_QUANTITY {
                return Err(AppError::Validation(
                    "weekly goal must be a positive number of kg".to_string(),
                ));
            }
        }

        let _guard = self.locks.acquire(owner_id).await;

        let mut profile = self.load_profile(owner_id).await?;
        profile.weekly_goal = goal.map(|g| g.normalize());
        profile.updated_at = Some(now);
        self.db.put_profile(&profile).await?;

        tracing::info!(owner_id, weekly_goal = ?profile.weekly_goal, "Updated weekly goal");

        Ok(profile)
    }

    async fn load_profile(&self, owner_id: &str) -> Result<CarbonProfile, AppError> {
        Ok(self
            .db
            .get_profile(owner_id)
            .await?
            .unwrap_or_else(|| CarbonProfile::new(owner_id)))
    }
}

fn normalize_note(note: Option<String>) -> Result<Option<String>, AppError> {
    let Some(note) = note else {
        return Ok(None);
    };
    let trimmed = note.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_NOTE_CHARS {
        return Err(AppError::Validation(format!(
            "note must be at most {} characters",
            MAX_NOTE_CHARS
        )));
    }
    Ok(Some(trimmed.to_string()))
}

fn validate_entry_id(id: &str) -> Result<(), AppError> {
    if id.trim().is_empty() || id.chars().count() > MAX_ENTRY_ID_CHARS {
        return Err(AppError::Validation(format!(
            "entry id must be 1 to {} characters",
            MAX_ENTRY_ID_CHARS
        )));
    }
    Ok(())
}
