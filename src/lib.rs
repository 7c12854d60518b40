// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Carbon Ledger: record carbon-impacting activities and track progress
//!
//! This crate provides the backend API for logging activities against a
//! static carbon-factor catalog, aggregating them into daily, weekly and
//! monthly statistics, and driving challenges and badges from the ledger.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::CarbonEngine;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub engine: CarbonEngine,
}
