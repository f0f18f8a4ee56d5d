use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::{ApiResult, AppError};
use crate::api::AppState;
use crate::engine::scheduler::parse_expression;
use crate::model::{Scan, ScheduleDefinition, SubdomainRecord};
use crate::store::ScanStore;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/scans", post(create_scan).get(list_scans))
        .route("/scans/scheduled", post(create_schedule))
        .route("/scans/scheduled/list", get(list_schedules))
        .route("/scans/scheduled/{id}", delete(delete_schedule))
        .route("/scans/scheduled/{id}/toggle", patch(toggle_schedule))
        .route("/scans/{id}", get(get_scan).delete(delete_scan))
}

#[derive(Debug, Deserialize)]
struct CreateScan {
    domain: String,
}

#[derive(Debug, Deserialize)]
struct CreateSchedule {
    domain: String,
    /// Five-field crontab expression, e.g. `0 0 * * *` for daily at midnight.
    cron_expression: String,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    skip: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ScanCounts {
    total_subdomains: usize,
    alive_hosts: usize,
    with_ports: usize,
}

#[derive(Debug, Serialize)]
struct ScanDetail {
    scan: Scan,
    subdomains: Vec<SubdomainRecord>,
    stats: ScanCounts,
}

/// Start a new scan; the pipeline runs in the background.
async fn create_scan(
    State(state): State<AppState>,
    Json(req): Json<CreateScan>,
) -> ApiResult<Json<Scan>> {
    let domain = req.domain.trim().to_lowercase();
    if domain.is_empty() {
        return Err(AppError::bad_request("domain must not be empty"));
    }
    let id = state.store.create_scan(&domain, false).await?;
    let scan = state.store.get_scan(id).await?;

    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        let _ = orchestrator.execute(id).await;
    });

    Ok(Json(scan))
}

async fn list_scans(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<serde_json::Value>> {
    let limit = page.limit.unwrap_or(50).clamp(1, 200);
    let skip = page.skip.unwrap_or(0).max(0);
    let (scans, total) = state.store.list_scans(limit, skip).await?;
    Ok(Json(json!({ "scans": scans, "total": total })))
}

async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ScanDetail>> {
    let scan = state.store.get_scan(id).await?;
    let subdomains = state.store.records_for_scan(id).await?;
    let stats = ScanCounts {
        total_subdomains: subdomains.len(),
        alive_hosts: subdomains.iter().filter(|s| s.is_alive).count(),
        with_ports: subdomains.iter().filter(|s| s.ports.is_some()).count(),
    };
    Ok(Json(ScanDetail {
        scan,
        subdomains,
        stats,
    }))
}

async fn delete_scan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    state.store.delete_scan(id).await?;
    Ok(Json(json!({ "message": "Scan deleted" })))
}

async fn create_schedule(
    State(state): State<AppState>,
    Json(req): Json<CreateSchedule>,
) -> ApiResult<Json<ScheduleDefinition>> {
    let domain = req.domain.trim().to_lowercase();
    if domain.is_empty() {
        return Err(AppError::bad_request("domain must not be empty"));
    }
    // Reject malformed expressions here instead of letting them rot in the
    // schedule checker's logs.
    parse_expression(&req.cron_expression)?;
    let schedule = state
        .store
        .create_schedule(&domain, req.cron_expression.trim())
        .await?;
    Ok(Json(schedule))
}

async fn list_schedules(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ScheduleDefinition>>> {
    Ok(Json(state.store.list_schedules().await?))
}

async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    state.store.delete_schedule(id).await?;
    Ok(Json(json!({ "message": "Scheduled scan deleted" })))
}

async fn toggle_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ScheduleDefinition>> {
    Ok(Json(state.store.toggle_schedule(id).await?))
}
