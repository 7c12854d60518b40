// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod aggregation;
pub mod catalog;
pub mod engine;
pub mod ledger;
pub mod locks;
pub mod maintenance;
pub mod progression;

pub use aggregation::{aggregate, measure, Aggregate, Window, WindowError};
pub use catalog::{CatalogError, CatalogService};
pub use engine::{
    CarbonEngine, EarnedBadge, LoggedEntry, Period, PeriodStats, ProfileSummary, ProgressUpdate,
    TodayImpact,
};
pub use ledger::LedgerService;
pub use locks::OwnerLocks;
pub use maintenance::spawn_expiry_sweeper;
pub use progression::{ProgressOutcome, ProgressionService, UserChallenges};
