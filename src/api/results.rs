use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::{ApiResult, AppError};
use crate::api::AppState;
use crate::model::{GlobalStats, SubdomainRecord};
use crate::store::ScanStore;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/results", get(list_results))
        .route("/results/stats", get(stats))
        .route("/results/export/{scan_id}", get(export))
}

#[derive(Debug, Deserialize)]
struct ResultsQuery {
    scan_id: Option<i64>,
    #[serde(default)]
    alive_only: bool,
    skip: Option<i64>,
    limit: Option<i64>,
}

async fn list_results(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let skip = query.skip.unwrap_or(0).max(0);
    let (results, total) = state
        .store
        .list_records(query.scan_id, query.alive_only, limit, skip)
        .await?;
    Ok(Json(json!({ "results": results, "total": total })))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<GlobalStats>> {
    Ok(Json(state.store.global_stats().await?))
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    /// `json` (default) or `csv`.
    format: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExportRow {
    subdomain: String,
    ip: Option<String>,
    ports: Vec<u16>,
    status_code: Option<u16>,
    title: Option<String>,
    technologies: Vec<String>,
    is_alive: bool,
}

impl From<SubdomainRecord> for ExportRow {
    fn from(r: SubdomainRecord) -> Self {
        Self {
            subdomain: r.hostname,
            ip: r.ip_address,
            ports: r.ports.unwrap_or_default(),
            status_code: r.status_code,
            title: r.title,
            technologies: r.technologies,
            is_alive: r.is_alive,
        }
    }
}

async fn export(
    State(state): State<AppState>,
    Path(scan_id): Path<i64>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let scan = state.store.get_scan(scan_id).await?;
    let records = state.store.records_for_scan(scan_id).await?;
    let rows: Vec<ExportRow> = records.into_iter().map(ExportRow::from).collect();

    match query.format.as_deref() {
        Some("csv") => {
            let body = to_csv(&rows)
                .map_err(|e| AppError::internal(format!("csv export failed: {e}")))?;
            let disposition = format!("attachment; filename=\"scan_{scan_id}.csv\"");
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response())
        }
        _ => Ok(Json(json!({
            "scan_id": scan_id,
            "domain": scan.domain,
            "results": rows,
        }))
        .into_response()),
    }
}

fn to_csv(rows: &[ExportRow]) -> anyhow::Result<String> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record([
        "subdomain",
        "ip",
        "ports",
        "status_code",
        "title",
        "technologies",
        "is_alive",
    ])?;
    for row in rows {
        w.write_record(&[
            row.subdomain.clone(),
            row.ip.clone().unwrap_or_default(),
            row.ports
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(";"),
            row.status_code.map(|c| c.to_string()).unwrap_or_default(),
            row.title.clone().unwrap_or_default(),
            row.technologies.join(";"),
            row.is_alive.to_string(),
        ])?;
    }
    let bytes = w.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}
