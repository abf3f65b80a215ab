//! The report-source capability consumed by the query runner.

use crate::filter::FilterExpr;
use crate::table::RawTable;
use crate::window::QueryWindow;

/// One page of a windowed dimension/metric query.
///
/// `limit` and `offset` address a single page; the runner drives pagination.
/// `order_by`, when present, orders descending by the named metric — ties
/// are broken by the source's natural order, which is unspecified and must
/// not be relied on for determinism.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub window: QueryWindow,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub filter: Option<FilterExpr>,
    pub order_by: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// A backend capable of answering one report page per call.
///
/// Implementations are injected into the runner at startup (live HTTP API
/// or the synthetic fallback dataset) — the runner always talks to "a"
/// source and never probes alternatives per call.
#[async_trait::async_trait]
pub trait ReportSource: Send + Sync + 'static {
    /// Run one page. Rows come back string-valued; the returned table's
    /// columns must equal `dimensions ++ metrics` in request order.
    /// Errors propagate untouched — no retries, no fallback here.
    async fn run_report(&self, req: &ReportRequest) -> anyhow::Result<RawTable>;
}
