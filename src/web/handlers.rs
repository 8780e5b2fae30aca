//! HTTP request handlers.
//!
//! Every target representation leaving these handlers goes through
//! `TargetView` / `MeasurementRow::sanitized`, which blank hidden addresses.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::db::TargetView;

const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let targets = state.scheduler.targets().await;
    let views: Vec<TargetView> = targets.values().map(TargetView::from).collect();
    let targets_json = serde_json::to_string(&views).unwrap_or_else(|_| "[]".to_string());

    let cfg = state.config.get();
    let title = if cfg.title.is_empty() {
        "pingwatch"
    } else {
        cfg.title.as_str()
    };

    Html(
        DASHBOARD_TEMPLATE
            .replace("{{title}}", title)
            .replace("{{targets_json}}", &targets_json),
    )
}

pub async fn handle_targets(State(state): State<AppState>) -> impl IntoResponse {
    let targets = state.scheduler.targets().await;
    let views: Vec<TargetView> = targets.values().map(TargetView::from).collect();
    Json(views)
}

#[derive(Debug, Deserialize)]
pub struct PingDataQuery {
    target_id: Option<String>,
    hours: Option<i64>,
}

pub async fn handle_ping_data(
    State(state): State<AppState>,
    Query(query): Query<PingDataQuery>,
) -> impl IntoResponse {
    let Some(target_id) = query.target_id else {
        return (StatusCode::BAD_REQUEST, "target_id parameter is required").into_response();
    };

    let hours = query.hours.unwrap_or(1).max(1);
    let since = Utc::now() - ChronoDuration::hours(hours);

    match state.store.measurements_since(&target_id, since) {
        Ok(rows) => {
            let rows: Vec<_> = rows.into_iter().map(|r| r.sanitized()).collect();
            Json(rows).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_config(State(state): State<AppState>) -> impl IntoResponse {
    let cfg = state.config.get();
    let targets = state.scheduler.targets().await;

    Json(json!({
        "title": cfg.title,
        "description": cfg.description,
        "ping_interval": cfg.ping_interval,
        "ping_count": cfg.ping_count,
        "web_port": cfg.web_port,
        "default_dns": cfg.default_dns,
        "targets_count": targets.len(),
    }))
}

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.latest_measurements() {
        Ok(rows) => {
            let rows: Vec<_> = rows.into_iter().map(|r| r.sanitized()).collect();
            Json(rows).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
