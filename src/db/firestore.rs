// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Carbon profiles (per-owner running totals)
//! - Ledger entries
//! - Challenge instances
//! - Badge awards
//!
//! Every document ID is scoped by owner so two callers can never address
//! each other's records.

use crate::db::{collections, owner_doc_id};
use crate::error::AppError;
use crate::models::{BadgeAward, CarbonProfile, ChallengeInstance, EntryFilter, LedgerEntry};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── Profile Operations ──────────────────────────────────────

    /// Get the carbon profile for an owner.
    pub async fn get_profile(&self, owner_id: &str) -> Result<Option<CarbonProfile>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(&owner_doc_id(owner_id, None))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a carbon profile.
    pub async fn put_profile(&self, profile: &CarbonProfile) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(owner_doc_id(&profile.owner_id, None))
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Ledger Operations ───────────────────────────────────────

    /// Get one entry owned by `owner_id`.
    pub async fn get_entry(
        &self,
        owner_id: &str,
        entry_id: &str,
    ) -> Result<Option<LedgerEntry>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::ENTRIES)
            .obj()
            .one(&owner_doc_id(owner_id, Some(entry_id)))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Entries for an owner matching `filter` (unordered).
    ///
    /// Timestamps are stored as RFC3339 strings, which do not sort reliably
    /// with variable fractional seconds, so range filtering happens here
    /// rather than in the query.
    pub async fn list_entries(
        &self,
        owner_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let entries: Vec<LedgerEntry> = self
            .client
            .fluent()
            .select()
            .from(collections::ENTRIES)
            .filter(|q| q.for_all([q.field("owner_id").eq(owner_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(entries.into_iter().filter(|e| filter.matches(e)).collect())
    }

    /// Atomically store a new entry and apply `update` to the profile.
    ///
    /// The profile is read inside the transaction, so a commit that raced
    /// another writer fails instead of overwriting its totals.
    pub async fn commit_entry<F>(
        &self,
        entry: &LedgerEntry,
        update: F,
    ) -> Result<CarbonProfile, AppError>
    where
        F: FnOnce(&mut CarbonProfile),
    {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let mut profile = self
            .profile_in_transaction(&entry.owner_id, &transaction)
            .await?;
        update(&mut profile);

        self.client
            .fluent()
            .update()
            .in_col(collections::ENTRIES)
            .document_id(owner_doc_id(&entry.owner_id, Some(&entry.id)))
            .object(entry)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add entry to transaction: {}", e))
            })?;

        self.add_profile_to_transaction(&profile, &mut transaction)?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(profile)
    }

    /// Atomically delete an entry and apply `update` to the profile.
    pub async fn commit_entry_deletion<F>(
        &self,
        entry: &LedgerEntry,
        update: F,
    ) -> Result<CarbonProfile, AppError>
    where
        F: FnOnce(&mut CarbonProfile),
    {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let mut profile = self
            .profile_in_transaction(&entry.owner_id, &transaction)
            .await?;
        update(&mut profile);

        self.client
            .fluent()
            .delete()
            .from(collections::ENTRIES)
            .document_id(owner_doc_id(&entry.owner_id, Some(&entry.id)))
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add deletion to transaction: {}", e))
            })?;

        self.add_profile_to_transaction(&profile, &mut transaction)?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(profile)
    }

    /// Read the owner's profile as part of `transaction`, zeroed if absent.
    async fn profile_in_transaction(
        &self,
        owner_id: &str,
        transaction: &firestore::FirestoreTransaction<'_>,
    ) -> Result<CarbonProfile, AppError> {
        let stored: Option<CarbonProfile> = self
            .client
            .clone_with_consistency_selector(firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(&owner_doc_id(owner_id, None))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(stored.unwrap_or_else(|| CarbonProfile::new(owner_id)))
    }

    fn add_profile_to_transaction(
        &self,
        profile: &CarbonProfile,
        transaction: &mut firestore::FirestoreTransaction<'_>,
    ) -> Result<(), AppError> {
        self.client
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(owner_doc_id(&profile.owner_id, None))
            .object(profile)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add profile to transaction: {}", e))
            })?;
        Ok(())
    }

    // ─── Challenge Operations ────────────────────────────────────

    pub async fn get_challenge(
        &self,
        owner_id: &str,
        instance_id: &str,
    ) -> Result<Option<ChallengeInstance>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::CHALLENGES)
            .obj()
            .one(&owner_doc_id(owner_id, Some(instance_id)))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn put_challenge(&self, instance: &ChallengeInstance) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::CHALLENGES)
            .document_id(owner_doc_id(&instance.owner_id, Some(&instance.id)))
            .object(instance)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn list_challenges(
        &self,
        owner_id: &str,
    ) -> Result<Vec<ChallengeInstance>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::CHALLENGES)
            .filter(|q| q.for_all([q.field("owner_id").eq(owner_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All active instances across owners (for the expiry sweep).
    pub async fn list_active_challenges(&self) -> Result<Vec<ChallengeInstance>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::CHALLENGES)
            .filter(|q| q.for_all([q.field("status").eq("active")]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Badge Award Operations ──────────────────────────────────

    /// Store an award unless one already exists for (owner, badge).
    ///
    /// The document ID is derived from the pair and written with create
    /// semantics, so only the first writer succeeds and the original
    /// `awarded_at` is never overwritten.
    pub async fn insert_award(&self, award: &BadgeAward) -> Result<bool, AppError> {
        let inserted: Result<BadgeAward, _> = self
            .client
            .fluent()
            .insert()
            .into(collections::BADGE_AWARDS)
            .document_id(owner_doc_id(&award.owner_id, Some(&award.badge_id)))
            .object(award)
            .execute()
            .await;

        match inserted {
            Ok(_) => Ok(true),
            Err(firestore::errors::FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    pub async fn list_awards(&self, owner_id: &str) -> Result<Vec<BadgeAward>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::BADGE_AWARDS)
            .filter(|q| q.for_all([q.field("owner_id").eq(owner_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
