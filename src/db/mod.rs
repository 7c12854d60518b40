//! Database layer (Firestore or in-memory).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{BadgeAward, CarbonProfile, ChallengeInstance, EntryFilter, LedgerEntry};

/// Collection names as constants.
pub mod collections {
    /// Ledger entries (keyed by owner and entry id)
    pub const ENTRIES: &str = "entries";
    /// Per-owner running totals (keyed by owner)
    pub const PROFILES: &str = "carbon_profiles";
    pub const CHALLENGES: &str = "challenge_instances";
    /// Badge unlocks (keyed by owner and badge id)
    pub const BADGE_AWARDS: &str = "badge_awards";
}

/// Document ID for a record scoped to `owner_id`.
///
/// Components are URL-encoded, which escapes `:`, so the separator can
/// never appear inside either half and two different pairs never collide.
pub fn owner_doc_id(owner_id: &str, record_id: Option<&str>) -> String {
    match record_id {
        Some(id) => format!(
            "{}:{}",
            urlencoding::encode(owner_id),
            urlencoding::encode(id)
        ),
        None => urlencoding::encode(owner_id).into_owned(),
    }
}

/// Storage handle used by the services.
#[derive(Clone)]
pub enum Db {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

impl Db {
    pub async fn get_profile(&self, owner_id: &str) -> Result<Option<CarbonProfile>, AppError> {
        match self {
            Db::Firestore(db) => db.get_profile(owner_id).await,
            Db::Memory(db) => Ok(db.get_profile(owner_id)),
        }
    }

    pub async fn put_profile(&self, profile: &CarbonProfile) -> Result<(), AppError> {
        match self {
            Db::Firestore(db) => db.put_profile(profile).await,
            Db::Memory(db) => {
                db.put_profile(profile);
                Ok(())
            }
        }
    }

    pub async fn get_entry(
        &self,
        owner_id: &str,
        entry_id: &str,
    ) -> Result<Option<LedgerEntry>, AppError> {
        match self {
            Db::Firestore(db) => db.get_entry(owner_id, entry_id).await,
            Db::Memory(db) => Ok(db.get_entry(owner_id, entry_id)),
        }
    }

    /// Entries matching `filter`, in no particular order.
    pub async fn list_entries(
        &self,
        owner_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        match self {
            Db::Firestore(db) => db.list_entries(owner_id, filter).await,
            Db::Memory(db) => Ok(db.list_entries(owner_id, filter)),
        }
    }

    /// Write a new entry and apply `update` to the stored profile as one
    /// unit. The profile is read inside that unit, so a concurrent writer
    /// cannot be overwritten. Returns the profile as written.
    pub async fn commit_entry<F>(
        &self,
        entry: &LedgerEntry,
        update: F,
    ) -> Result<CarbonProfile, AppError>
    where
        F: FnOnce(&mut CarbonProfile),
    {
        match self {
            Db::Firestore(db) => db.commit_entry(entry, update).await,
            Db::Memory(db) => Ok(db.commit_entry(entry, update)),
        }
    }

    /// Remove an entry and apply `update` to the stored profile as one unit.
    pub async fn commit_entry_deletion<F>(
        &self,
        entry: &LedgerEntry,
        update: F,
    ) -> Result<CarbonProfile, AppError>
    where
        F: FnOnce(&mut CarbonProfile),
    {
        match self {
            Db::Firestore(db) => db.commit_entry_deletion(entry, update).await,
            Db::Memory(db) => Ok(db.commit_entry_deletion(entry, update)),
        }
    }

    pub async fn get_challenge(
        &self,
        owner_id: &str,
        instance_id: &str,
    ) -> Result<Option<ChallengeInstance>, AppError> {
        match self {
            Db::Firestore(db) => db.get_challenge(owner_id, instance_id).await,
            Db::Memory(db) => Ok(db.get_challenge(owner_id, instance_id)),
        }
    }

    pub async fn put_challenge(&self, instance: &ChallengeInstance) -> Result<(), AppError> {
        match self {
            Db::Firestore(db) => db.put_challenge(instance).await,
            Db::Memory(db) => {
                db.put_challenge(instance);
                Ok(())
            }
        }
    }

    pub async fn list_challenges(
        &self,
        owner_id: &str,
    ) -> Result<Vec<ChallengeInstance>, AppError> {
        match self {
            Db::Firestore(db) => db.list_challenges(owner_id).await,
            Db::Memory(db) => Ok(db.list_challenges(owner_id)),
        }
    }

    pub async fn list_active_challenges(&self) -> Result<Vec<ChallengeInstance>, AppError> {
        match self {
            Db::Firestore(db) => db.list_active_challenges().await,
            Db::Memory(db) => Ok(db.list_active_challenges()),
        }
    }

    /// Returns `true` if the award was new.
    pub async fn insert_award(&self, award: &BadgeAward) -> Result<bool, AppError> {
        match self {
            Db::Firestore(db) => db.insert_award(award).await,
            Db::Memory(db) => Ok(db.insert_award(award)),
        }
    }

    pub async fn list_awards(&self, owner_id: &str) -> Result<Vec<BadgeAward>, AppError> {
        match self {
            Db::Firestore(db) => db.list_awards(owner_id).await,
            Db::Memory(db) => Ok(db.list_awards(owner_id)),
        }
    }
}
