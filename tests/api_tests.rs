// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP surface tests: authentication, status codes, error bodies,
//! pagination and the public catalog.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use carbon_ledger::middleware::auth::SESSION_COOKIE;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{create_test_app, create_test_jwt};

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _) = create_test_app();

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/profile")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_route_with_bad_token() {
    let (app, _) = create_test_app();

    let forged = create_test_jwt("alice", b"some_other_key_that_is_long_enough");
    let (status, body) = send(&app, authed("GET", "/api/profile", &forged, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config.jwt_signing_key);

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/profile")
            .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["owner_id"], "alice");
    assert_eq!(body["effective_weekly_goal"], "50");
}

#[tokio::test]
async fn test_log_activity_created_and_listed() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config.jwt_signing_key);

    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/api/entries",
            &token,
            Some(json!({ "activity_id": "drive_car", "quantity": "10" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["entry"]["impact"], "2.10");
    assert_eq!(body["new_badges"][0]["badge_id"], "first_step");

    // Numbers are accepted as well as strings.
    let (status, _) = send(
        &app,
        authed(
            "POST",
            "/api/entries",
            &token,
            Some(json!({ "activity_id": "ride_bus", "quantity": 2.5 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, authed("GET", "/api/entries", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);
    assert!(body["next_cursor"].is_null());
}

#[tokio::test]
async fn test_log_activity_error_bodies() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config.jwt_signing_key);

    let cases = [
        (json!({ "activity_id": "drive_car", "quantity": "0" }), "invalid_quantity"),
        (json!({ "activity_id": "drive_car", "quantity": "lots" }), "invalid_quantity"),
        (json!({ "activity_id": "drive_car", "quantity": -1 }), "invalid_quantity"),
        (json!({ "activity_id": "teleport", "quantity": "1" }), "unknown_activity"),
        (
            json!({ "activity_id": "drive_car", "quantity": "1", "logged_at": "yesterday" }),
            "validation_error",
        ),
        (
            json!({ "activity_id": "drive_car", "quantity": "1", "tz_offset_minutes": 2000 }),
            "validation_error",
        ),
    ];

    for (request, expected) in cases {
        let (status, body) =
            send(&app, authed("POST", "/api/entries", &token, Some(request))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], expected);
    }

    let (_, profile) = send(&app, authed("GET", "/api/profile", &token, None)).await;
    assert_eq!(profile["profile"]["total_entries"], 0);
}

#[tokio::test]
async fn test_delete_entry() {
    let (app, state) = create_test_app();
    let alice = create_test_jwt("alice", &state.config.jwt_signing_key);
    let bob = create_test_jwt("bob", &state.config.jwt_signing_key);

    let (_, body) = send(
        &app,
        authed(
            "POST",
            "/api/entries",
            &alice,
            Some(json!({ "id": "trip-1", "activity_id": "drive_car", "quantity": "10" })),
        ),
    )
    .await;
    assert_eq!(body["entry"]["id"], "trip-1");

    let (status, body) = send(&app, authed("DELETE", "/api/entries/trip-1", &bob, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = send(&app, authed("DELETE", "/api/entries/trip-1", &alice, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, authed("DELETE", "/api/entries/trip-1", &alice, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_entries_cursor_pagination() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config.jwt_signing_key);

    for hour in 0..5 {
        let (status, _) = send(
            &app,
            authed(
                "POST",
                "/api/entries",
                &token,
                Some(json!({
                    "activity_id": "ride_bus",
                    "quantity": "1",
                    "logged_at": format!("2024-03-11T0{}:00:00Z", hour),
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let mut seen = Vec::new();
    let mut uri = "/api/entries?per_page=2".to_string();
    loop {
        let (status, body) = send(&app, authed("GET", &uri, &token, None)).await;
        assert_eq!(status, StatusCode::OK);
        for entry in body["entries"].as_array().unwrap() {
            seen.push(entry["logged_at"].as_str().unwrap().to_string());
        }
        match body["next_cursor"].as_str() {
            Some(cursor) => uri = format!("/api/entries?per_page=2&cursor={}", cursor),
            None => break,
        }
    }

    assert_eq!(seen.len(), 5);
    let mut sorted = seen.clone();
    sorted.sort();
    sorted.reverse();
    assert_eq!(seen, sorted);

    let (status, _) = send(
        &app,
        authed("GET", "/api/entries?cursor=not-a-cursor", &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, authed("GET", "/api/entries?per_page=0", &token, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_period_validation() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config.jwt_signing_key);

    let (status, body) = send(
        &app,
        authed("GET", "/api/stats?period=monthly&date=2024-02-10", &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["period"], "monthly");
    assert_eq!(body["window_start"], "2024-02-01T00:00:00Z");
    assert_eq!(body["entry_count"], 0);

    let (status, body) = send(&app, authed("GET", "/api/stats?period=yearly", &token, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = send(&app, authed("GET", "/api/stats?date=13/02/2024", &token, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_at_calendar_edge_is_rejected() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config.jwt_signing_key);

    for period in ["weekly", "monthly"] {
        let uri = format!(
            "/api/stats?period={}&date=-262143-01-03&tz_offset_minutes=840",
            period
        );
        let (status, body) = send(&app, authed("GET", &uri, &token, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }
}

#[tokio::test]
async fn test_today_impact_endpoint() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config.jwt_signing_key);

    send(
        &app,
        authed(
            "POST",
            "/api/entries",
            &token,
            Some(json!({ "activity_id": "drive_car", "quantity": "20" })),
        ),
    )
    .await;

    let (status, body) = send(&app, authed("GET", "/api/impact/today", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["today_total"], "4.20");
    assert_eq!(body["weekly_progress_percent"], "8.4");
}

#[tokio::test]
async fn test_challenge_endpoints() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config.jwt_signing_key);

    let (status, instance) = send(
        &app,
        authed(
            "POST",
            "/api/challenges",
            &token,
            Some(json!({ "template_id": "log_ten" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(instance["status"], "active");
    let id = instance["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/api/challenges",
            &token,
            Some(json!({ "template_id": "log_ten" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_joined");

    let (status, body) = send(
        &app,
        authed("POST", &format!("/api/challenges/{}/progress", id), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed_now"], false);

    let (status, body) = send(
        &app,
        authed(
            "POST",
            &format!("/api/challenges/{}/share", id),
            &token,
            Some(json!({ "platform": "Mastodon" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shared_platforms"], json!(["mastodon"]));

    let (status, body) = send(&app, authed("GET", "/api/challenges", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        authed("POST", "/api/challenges/missing/progress", &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_weekly_goal_endpoint() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config.jwt_signing_key);

    let (status, body) = send(
        &app,
        authed(
            "PUT",
            "/api/profile/weekly-goal",
            &token,
            Some(json!({ "weekly_goal_kg": "30" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["weekly_goal"], "30");

    let (status, _) = send(
        &app,
        authed(
            "PUT",
            "/api/profile/weekly-goal",
            &token,
            Some(json!({ "weekly_goal_kg": "-4" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        authed(
            "PUT",
            "/api/profile/weekly-goal",
            &token,
            Some(json!({ "weekly_goal_kg": null })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["weekly_goal"].is_null());
}

#[tokio::test]
async fn test_public_catalog_routes() {
    let (app, _) = create_test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/catalog/activities?category=food")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=300"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let activities: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(activities
        .as_array()
        .unwrap()
        .iter()
        .all(|a| a["category_id"] == "food"));

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/catalog/activities?category=space")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/catalog/activities?category=transport&saving=true")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["cycle_instead", "walk_instead"]);

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/catalog/activities?saving=false")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .all(|a| !a["carbon_per_unit"].as_str().unwrap().starts_with('-')));

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/catalog/activities/drive_car")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unit"], "km");

    for uri in ["/api/catalog/categories", "/api/catalog/challenges", "/api/catalog/badges"] {
        let (status, body) = send(
            &app,
            Request::builder().uri(uri).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = create_test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["catalog_activities"], 12);
}
