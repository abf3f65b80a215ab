use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use reportly_core::catalog::DASHBOARD_KEYS;

use crate::error::AppError;
use crate::sink;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    /// Window length in days; defaults to the configured window.
    pub days: Option<u32>,
    /// Report keys to refresh; defaults to the dashboard set.
    pub reports: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub days: u32,
    pub refreshed_at: String,
    pub reports: BTreeMap<String, ReportOutcome>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Ok { rows: usize, file: String },
    Error { error: String },
}

/// `POST /api/refresh-data` — resolve the requested reports and persist
/// each as CSV. A report that fails is reported in place; the rest of
/// the batch still refreshes.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<RefreshResponse>, AppError> {
    let Json(req) = body.unwrap_or_default();
    let days = req.days.unwrap_or(state.config.default_days);
    if days == 0 {
        return Err(AppError::BadRequest("days must be at least 1".into()));
    }
    let keys: Vec<String> = req
        .reports
        .unwrap_or_else(|| DASHBOARD_KEYS.iter().map(|k| k.to_string()).collect());

    tracing::info!(days, reports = keys.len(), "refreshing report data");
    let outcome = state.resolver.resolve_batch(&keys, days).await;

    let mut reports = BTreeMap::new();
    let mut success = true;
    for (key, result) in outcome {
        let entry = match result {
            Ok(resolved) => {
                match sink::write_report(&state.config.data_dir, &resolved.filename, &resolved.table)
                {
                    Ok(path) => ReportOutcome::Ok {
                        rows: resolved.table.len(),
                        file: path.to_string_lossy().into_owned(),
                    },
                    Err(err) => {
                        success = false;
                        tracing::error!(key = %key, error = %err, "failed to persist report");
                        ReportOutcome::Error {
                            error: err.to_string(),
                        }
                    }
                }
            }
            Err(err) => {
                success = false;
                ReportOutcome::Error {
                    error: err.to_string(),
                }
            }
        };
        reports.insert(key, entry);
    }

    Ok(Json(RefreshResponse {
        success,
        days,
        refreshed_at: Utc::now().to_rfc3339(),
        reports,
    }))
}
