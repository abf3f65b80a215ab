use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::sink;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub name: String,
}

/// `GET /api/report?name=<key>` — serve a persisted report as JSON
/// records. 404 until the report has been refreshed at least once.
pub async fn report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<Value>>, AppError> {
    let spec = state.resolver.catalog().get(&query.name)?;
    let path = sink::report_path(&state.config.data_dir, &spec.filename);
    if !path.exists() {
        return Err(AppError::NotFound(format!(
            "report `{}` has no data yet; POST /api/refresh-data first",
            query.name
        )));
    }
    let records = sink::read_report(&path)?;
    Ok(Json(records))
}

#[derive(Debug, Serialize)]
pub struct ReportInfo {
    pub key: String,
    pub filename: String,
    pub compare_periods: bool,
    pub available: bool,
}

/// `GET /api/reports` — list the catalog with per-report availability.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<ReportInfo>> {
    let infos = state
        .resolver
        .catalog()
        .iter()
        .map(|(key, spec)| ReportInfo {
            key: key.to_string(),
            filename: spec.filename.clone(),
            compare_periods: spec.compare_periods,
            available: sink::report_path(&state.config.data_dir, &spec.filename).exists(),
        })
        .collect();
    Json(infos)
}
