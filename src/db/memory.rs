// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process storage backend.
//!
//! All records for an owner live in one partition guarded by a single
//! DashMap shard lock, so every multi-record write here is atomic. No
//! guard is ever held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::models::{BadgeAward, CarbonProfile, ChallengeInstance, EntryFilter, LedgerEntry};

#[derive(Default)]
struct OwnerPartition {
    profile: Option<CarbonProfile>,
    entries: HashMap<String, LedgerEntry>,
    challenges: HashMap<String, ChallengeInstance>,
    awards: HashMap<String, BadgeAward>,
}

/// Volatile database used for local development and tests.
#[derive(Clone, Default)]
pub struct MemoryDb {
    partitions: Arc<DashMap<String, OwnerPartition>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_profile(&self, owner_id: &str) -> Option<CarbonProfile> {
        self.partitions
            .get(owner_id)
            .and_then(|p| p.profile.clone())
    }

    pub fn put_profile(&self, profile: &CarbonProfile) {
        self.partitions
            .entry(profile.owner_id.clone())
            .or_default()
            .profile = Some(profile.clone());
    }

    pub fn get_entry(&self, owner_id: &str, entry_id: &str) -> Option<LedgerEntry> {
        self.partitions
            .get(owner_id)
            .and_then(|p| p.entries.get(entry_id).cloned())
    }

    pub fn list_entries(&self, owner_id: &str, filter: &EntryFilter) -> Vec<LedgerEntry> {
        self.partitions
            .get(owner_id)
            .map(|p| {
                p.entries
                    .values()
                    .filter(|e| filter.matches(e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Insert `entry` and apply `update` to the stored profile under one
    /// partition guard. Returns the profile as written.
    pub fn commit_entry<F>(&self, entry: &LedgerEntry, update: F) -> CarbonProfile
    where
        F: FnOnce(&mut CarbonProfile),
    {
        let mut partition = self.partitions.entry(entry.owner_id.clone()).or_default();
        partition.entries.insert(entry.id.clone(), entry.clone());
        let profile = partition
            .profile
            .get_or_insert_with(|| CarbonProfile::new(&entry.owner_id));
        update(profile);
        profile.clone()
    }

    pub fn commit_entry_deletion<F>(&self, entry: &LedgerEntry, update: F) -> CarbonProfile
    where
        F: FnOnce(&mut CarbonProfile),
    {
        let mut partition = self.partitions.entry(entry.owner_id.clone()).or_default();
        partition.entries.remove(&entry.id);
        let profile = partition
            .profile
            .get_or_insert_with(|| CarbonProfile::new(&entry.owner_id));
        update(profile);
        profile.clone()
    }

    pub fn get_challenge(&self, owner_id: &str, instance_id: &str) -> Option<ChallengeInstance> {
        self.partitions
            .get(owner_id)
            .and_then(|p| p.challenges.get(instance_id).cloned())
    }

    pub fn put_challenge(&self, instance: &ChallengeInstance) {
        self.partitions
            .entry(instance.owner_id.clone())
            .or_default()
            .challenges
            .insert(instance.id.clone(), instance.clone());
    }

    pub fn list_challenges(&self, owner_id: &str) -> Vec<ChallengeInstance> {
        self.partitions
            .get(owner_id)
            .map(|p| p.challenges.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_active_challenges(&self) -> Vec<ChallengeInstance> {
        self.partitions
            .iter()
            .flat_map(|p| {
                p.challenges
                    .values()
                    .filter(|c| c.is_active())
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Insert unless an award for (owner, badge) exists. Returns whether it
    /// was inserted.
    pub fn insert_award(&self, award: &BadgeAward) -> bool {
        let mut partition = self.partitions.entry(award.owner_id.clone()).or_default();
        if partition.awards.contains_key(&award.badge_id) {
            return false;
        }
        partition
            .awards
            .insert(award.badge_id.clone(), award.clone());
        true
    }

    pub fn list_awards(&self, owner_id: &str) -> Vec<BadgeAward> {
        self.partitions
            .get(owner_id)
            .map(|p| p.awards.values().cloned().collect())
            .unwrap_or_default()
    }
}
