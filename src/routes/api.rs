// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated callers.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{CarbonProfile, ChallengeInstance, EntryFilter, LedgerEntry, NewEntry};
use crate::services::{
    LoggedEntry, Period, PeriodStats, ProfileSummary, ProgressUpdate, TodayImpact, UserChallenges,
};
use crate::time_utils::offset_from_minutes;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/entries", post(log_activity).get(list_entries))
        .route("/api/entries/{entry_id}", delete(delete_entry))
        .route("/api/impact/today", get(today_impact))
        .route("/api/stats", get(stats))
        .route("/api/challenges", post(join_challenge).get(user_challenges))
        .route(
            "/api/challenges/{instance_id}/progress",
            post(update_challenge_progress),
        )
        .route("/api/challenges/{instance_id}/share", post(share_challenge))
        .route("/api/profile", get(profile))
        .route("/api/profile/weekly-goal", put(set_weekly_goal))
}

/// Caller time zone, or the configured default when none was sent.
fn resolve_tz(state: &AppState, tz_offset_minutes: Option<i32>) -> Result<FixedOffset> {
    match tz_offset_minutes {
        Some(minutes) => offset_from_minutes(minutes),
        None => Ok(state.config.default_offset()),
    }
}

fn parse_timestamp(raw: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>> {
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| {
                AppError::Validation(format!(
                    "Invalid '{}' parameter: must be RFC3339 datetime",
                    name
                ))
            })
    })
    .transpose()
}

/// Accept decimals as JSON strings or numbers.
fn parse_decimal(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
        serde_json::Value::Number(n) => {
            let s = n.to_string();
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .ok()
        }
        _ => None,
    }
}

// ─── Ledger ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct LogActivityRequest {
    /// Optional client-generated ID; retries with the same ID are no-ops
    id: Option<String>,
    activity_id: String,
    quantity: serde_json::Value,
    /// When the activity happened (RFC3339); defaults to now
    logged_at: Option<String>,
    note: Option<String>,
    tz_offset_minutes: Option<i32>,
}

async fn log_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<LogActivityRequest>,
) -> Result<(StatusCode, Json<LoggedEntry>)> {
    let quantity = parse_decimal(&body.quantity).ok_or_else(|| {
        AppError::InvalidQuantity("quantity must be a decimal number".to_string())
    })?;
    let tz = resolve_tz(&state, body.tz_offset_minutes)?;
    let logged_at = parse_timestamp(body.logged_at.as_deref(), "logged_at")?;

    let new = NewEntry {
        id: body.id,
        activity_id: body.activity_id,
        quantity,
        logged_at,
        note: body.note,
    };

    let logged = state
        .engine
        .log_activity(&user.owner_id, new, tz, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(logged)))
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode> {
    state
        .engine
        .delete_log_entry(&user.owner_id, &entry_id, Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct EntriesQuery {
    /// Inclusive lower bound (RFC3339)
    from: Option<String>,
    /// Inclusive upper bound (RFC3339)
    to: Option<String>,
    category: Option<String>,
    activity: Option<String>,
    /// Cursor for forward pagination (opaque token).
    cursor: Option<String>,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_per_page() -> u32 {
    50
}

const MAX_PER_PAGE: u32 = 100;
const CURSOR_PARTS: usize = 3;

/// Position of the last entry on a page, in listing order.
#[derive(Debug, Clone, PartialEq)]
struct EntryCursor {
    logged_at: DateTime<Utc>,
    entry_id: String,
}

impl EntryCursor {
    /// Whether `entry` sorts after this cursor (newest first, ID descending).
    fn precedes(&self, entry: &LedgerEntry) -> bool {
        entry.logged_at < self.logged_at
            || (entry.logged_at == self.logged_at && entry.id < self.entry_id)
    }
}

fn parse_cursor(cursor: Option<&str>) -> Result<Option<EntryCursor>> {
    cursor
        .map(|raw| {
            let invalid_cursor =
                || AppError::Validation("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;

            // Entry IDs are caller-chosen and may contain ':'.
            let parts: Vec<&str> = decoded_str.splitn(CURSOR_PARTS, ':').collect();
            if parts.len() != CURSOR_PARTS {
                return Err(invalid_cursor());
            }

            let seconds = parts[0].parse::<i64>().map_err(|_| invalid_cursor())?;
            let nanos = parts[1].parse::<u32>().map_err(|_| invalid_cursor())?;
            let logged_at = DateTime::from_timestamp(seconds, nanos).ok_or_else(invalid_cursor)?;

            Ok(EntryCursor {
                logged_at,
                entry_id: parts[2].to_string(),
            })
        })
        .transpose()
}

fn encode_cursor(cursor: &EntryCursor) -> String {
    let payload = format!(
        "{}:{}:{}",
        cursor.logged_at.timestamp(),
        cursor.logged_at.timestamp_subsec_nanos(),
        cursor.entry_id
    );
    URL_SAFE_NO_PAD.encode(payload)
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EntriesResponse {
    pub entries: Vec<LedgerEntry>,
    pub per_page: u32,
    pub next_cursor: Option<String>,
}

/// List the caller's entries, newest first, with cursor pagination.
async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<EntriesQuery>,
) -> Result<Json<EntriesResponse>> {
    tracing::debug!(
        owner_id = %user.owner_id,
        from = ?params.from,
        to = ?params.to,
        cursor = ?params.cursor,
        "Listing entries"
    );

    if params.per_page == 0 {
        return Err(AppError::Validation(
            "per_page must be greater than 0".to_string(),
        ));
    }
    let limit = params.per_page.min(MAX_PER_PAGE) as usize;

    let filter = EntryFilter {
        from: parse_timestamp(params.from.as_deref(), "from")?,
        to: parse_timestamp(params.to.as_deref(), "to")?,
        category_id: params.category,
        activity_id: params.activity,
    };
    let cursor = parse_cursor(params.cursor.as_deref())?;

    let mut entries: Vec<LedgerEntry> = state
        .engine
        .list_entries(&user.owner_id, &filter)
        .await?
        .into_iter()
        .filter(|e| cursor.as_ref().map_or(true, |c| c.precedes(e)))
        .take(limit + 1)
        .collect();

    let has_more = entries.len() > limit;
    if has_more {
        entries.truncate(limit);
    }

    let next_cursor = if has_more {
        entries.last().map(|e| {
            encode_cursor(&EntryCursor {
                logged_at: e.logged_at,
                entry_id: e.id.clone(),
            })
        })
    } else {
        None
    };

    Ok(Json(EntriesResponse {
        entries,
        per_page: limit as u32,
        next_cursor,
    }))
}

// ─── Impact & Stats ──────────────────────────────────────────

#[derive(Deserialize)]
struct TzQuery {
    tz_offset_minutes: Option<i32>,
}

async fn today_impact(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<TzQuery>,
) -> Result<Json<TodayImpact>> {
    let tz = resolve_tz(&state, params.tz_offset_minutes)?;
    let impact = state
        .engine
        .today_impact(&user.owner_id, tz, Utc::now())
        .await?;
    Ok(Json(impact))
}

#[derive(Deserialize)]
struct StatsQuery {
    /// `weekly` (default) or `monthly`
    period: Option<String>,
    /// Any day inside the wanted period (YYYY-MM-DD); defaults to today
    date: Option<String>,
    tz_offset_minutes: Option<i32>,
}

async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<PeriodStats>> {
    let period = params
        .period
        .as_deref()
        .map(Period::from_str)
        .transpose()?
        .unwrap_or(Period::Weekly);
    let date = params
        .date
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                AppError::Validation("Invalid 'date' parameter: must be YYYY-MM-DD".to_string())
            })
        })
        .transpose()?;
    let tz = resolve_tz(&state, params.tz_offset_minutes)?;

    let stats = state
        .engine
        .stats(&user.owner_id, period, date, tz, Utc::now())
        .await?;
    Ok(Json(stats))
}

// ─── Challenges ──────────────────────────────────────────────

#[derive(Deserialize)]
struct JoinChallengeRequest {
    template_id: String,
    tz_offset_minutes: Option<i32>,
}

async fn join_challenge(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<JoinChallengeRequest>,
) -> Result<(StatusCode, Json<ChallengeInstance>)> {
    let tz = resolve_tz(&state, body.tz_offset_minutes)?;
    let instance = state
        .engine
        .join_challenge(&user.owner_id, &body.template_id, tz, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(instance)))
}

async fn update_challenge_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(instance_id): Path<String>,
) -> Result<Json<ProgressUpdate>> {
    let update = state
        .engine
        .update_challenge_progress(&user.owner_id, &instance_id, Utc::now())
        .await?;
    Ok(Json(update))
}

#[derive(Deserialize)]
struct ShareRequest {
    platform: String,
}

async fn share_challenge(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(instance_id): Path<String>,
    Json(body): Json<ShareRequest>,
) -> Result<Json<ChallengeInstance>> {
    let instance = state
        .engine
        .mark_challenge_shared(&user.owner_id, &instance_id, &body.platform, Utc::now())
        .await?;
    Ok(Json(instance))
}

async fn user_challenges(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserChallenges>> {
    Ok(Json(state.engine.user_challenges(&user.owner_id).await?))
}

// ─── Profile ─────────────────────────────────────────────────

async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileSummary>> {
    Ok(Json(state.engine.profile(&user.owner_id).await?))
}

#[derive(Deserialize)]
struct WeeklyGoalRequest {
    /// kg CO2e; `null` reverts to the default goal
    weekly_goal_kg: Option<serde_json::Value>,
}

async fn set_weekly_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<WeeklyGoalRequest>,
) -> Result<Json<CarbonProfile>> {
    let goal = match body.weekly_goal_kg {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => Some(parse_decimal(&value).ok_or_else(|| {
            AppError::Validation("weekly_goal_kg must be a decimal number".to_string())
        })?),
    };

    let profile = state
        .engine
        .set_weekly_goal(&user.owner_id, goal, Utc::now())
        .await?;
    Ok(Json(profile))
}
