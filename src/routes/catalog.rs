// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public read-only catalog routes.

use crate::error::Result;
use crate::models::{Activity, Badge, Category, ChallengeTemplate};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// The catalog never changes while the process runs.
const CATALOG_CACHE_CONTROL: &str = "public, max-age=300";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/catalog/categories", get(list_categories))
        .route("/api/catalog/categories/{category_id}", get(get_category))
        .route("/api/catalog/activities", get(list_activities))
        .route("/api/catalog/activities/{activity_id}", get(get_activity))
        .route("/api/catalog/challenges", get(list_challenges))
        .route("/api/catalog/badges", get(list_badges))
}

fn cached<T>(body: T) -> impl IntoResponse
where
    Json<T>: IntoResponse,
{
    ([(header::CACHE_CONTROL, CATALOG_CACHE_CONTROL)], Json(body))
}

async fn list_categories(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    cached::<Vec<Category>>(state.engine.catalog().list_categories().to_vec())
}

async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<String>,
) -> Result<impl IntoResponse> {
    let category = state.engine.catalog().get_category(&category_id)?.clone();
    Ok(cached(category))
}

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Restrict to one category
    category: Option<String>,
    /// Restrict to carbon-saving (`true`) or emitting (`false`) activities
    saving: Option<bool>,
}

async fn list_activities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<impl IntoResponse> {
    let catalog = state.engine.catalog();
    if let Some(category_id) = params.category.as_deref() {
        catalog.get_category(category_id)?;
    }

    let activities: Vec<Activity> = catalog
        .list_activities(params.category.as_deref())
        .into_iter()
        .filter(|a| params.saving.map_or(true, |saving| a.is_carbon_saving() == saving))
        .cloned()
        .collect();
    Ok(cached(activities))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<String>,
) -> Result<impl IntoResponse> {
    let activity = state.engine.catalog().get_activity(&activity_id)?.clone();
    Ok(cached(activity))
}

async fn list_challenges(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    cached::<Vec<ChallengeTemplate>>(state.engine.catalog().list_templates().to_vec())
}

async fn list_badges(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    cached::<Vec<Badge>>(state.engine.catalog().list_badges().to_vec())
}
