// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod badge;
pub mod catalog;
pub mod challenge;
pub mod entry;
pub mod profile;

pub use badge::{Badge, BadgeAward, BadgeCriteria};
pub use catalog::{Activity, Category};
pub use challenge::{ChallengeInstance, ChallengeStatus, ChallengeTemplate, Reward, TargetMetric};
pub use entry::{EntryFilter, LedgerEntry, NewEntry};
pub use profile::CarbonProfile;
