// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background maintenance: periodic challenge expiry.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::CarbonEngine;

/// Spawn the expiry sweeper. It runs once per `period` until the runtime
/// shuts down; a failed sweep is logged and retried on the next tick.
pub fn spawn_expiry_sweeper(engine: CarbonEngine, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match engine.expire_stale_challenges(chrono::Utc::now()).await {
                Ok(0) => tracing::debug!("Expiry sweep found nothing to expire"),
                Ok(expired) => tracing::info!(expired, "Expired stale challenges"),
                Err(e) => tracing::error!(error = ?e, "Expiry sweep failed"),
            }
        }
    })
}
