//! Paginated query execution against a report source.

use std::sync::Arc;

use anyhow::anyhow;

use crate::catalog::ReportSpec;
use crate::error::ReportError;
use crate::filter::{self, FilterExpr};
use crate::source::{ReportRequest, ReportSource};
use crate::table::RawTable;
use crate::window::QueryWindow;

/// Upper bound on rows fetched per upstream call, matching the report
/// API's page-size cap.
pub const MAX_PAGE_SIZE: usize = 100_000;

/// Window-independent query parameters shared by both periods of a
/// comparison run.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub filter: Option<FilterExpr>,
    pub order_by: Option<String>,
    pub limit: usize,
}

impl QueryParams {
    pub fn from_spec(spec: &ReportSpec) -> Result<Self, ReportError> {
        let filter = filter::build(spec.filter_in.as_ref(), spec.filter_contains.as_ref())?;
        Ok(Self {
            dimensions: spec.dimensions.clone(),
            metrics: spec.metrics.clone(),
            filter,
            order_by: spec.order_by_metric.clone(),
            limit: spec.limit,
        })
    }
}

/// Executes one windowed query, paging through the source in bounded
/// batches until the data runs out or `limit` rows are accumulated.
#[derive(Clone)]
pub struct QueryRunner {
    source: Arc<dyn ReportSource>,
    page_size: usize,
}

impl QueryRunner {
    pub fn new(source: Arc<dyn ReportSource>) -> Self {
        Self::with_page_size(source, MAX_PAGE_SIZE)
    }

    pub fn with_page_size(source: Arc<dyn ReportSource>, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
        }
    }

    /// Run the query over `window`, returning raw string-valued rows with
    /// column order `dimensions ++ metrics`. Upstream errors propagate;
    /// retry policy (if any) belongs to an outer resilience layer.
    pub async fn run(
        &self,
        window: QueryWindow,
        params: &QueryParams,
    ) -> Result<RawTable, ReportError> {
        let mut columns = params.dimensions.clone();
        columns.extend(params.metrics.iter().cloned());
        let mut out = RawTable::new(columns);

        if params.limit == 0 {
            return Ok(out);
        }

        let page_size = self.page_size.min(params.limit);
        let mut offset = 0usize;

        loop {
            let req = ReportRequest {
                window,
                dimensions: params.dimensions.clone(),
                metrics: params.metrics.clone(),
                filter: params.filter.clone(),
                order_by: params.order_by.clone(),
                limit: page_size,
                offset,
            };

            let page = self
                .source
                .run_report(&req)
                .await
                .map_err(ReportError::Upstream)?;

            if page.columns() != out.columns() {
                return Err(ReportError::Upstream(anyhow!(
                    "source returned columns {:?}, expected {:?}",
                    page.columns(),
                    out.columns()
                )));
            }

            let fetched = page.len();
            if fetched == 0 {
                break;
            }
            for row in page.into_rows() {
                out.push_row(row);
            }
            // A short page means the upstream is exhausted.
            if fetched < page_size || out.len() >= params.limit {
                break;
            }
            offset += page_size;
        }

        out.truncate(params.limit);
        tracing::debug!(
            rows = out.len(),
            start = %window.start,
            end = %window.end,
            "query complete"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Source with a fixed row pool, served in offset/limit slices.
    struct PoolSource {
        total: usize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ReportSource for PoolSource {
        async fn run_report(&self, req: &ReportRequest) -> anyhow::Result<RawTable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut table = RawTable::new(
                req.dimensions
                    .iter()
                    .chain(req.metrics.iter())
                    .cloned()
                    .collect(),
            );
            let end = (req.offset + req.limit).min(self.total);
            for i in req.offset..end {
                table.push_row(vec![format!("row{i}"), i.to_string()]);
            }
            Ok(table)
        }
    }

    fn params(limit: usize) -> QueryParams {
        QueryParams {
            dimensions: vec!["pagePath".into()],
            metrics: vec!["screenPageViews".into()],
            filter: None,
            order_by: None,
            limit,
        }
    }

    fn window() -> QueryWindow {
        let end = chrono::NaiveDate::from_ymd_opt(2024, 3, 30).unwrap();
        QueryWindow::new(end - chrono::Duration::days(29), end).unwrap()
    }

    #[tokio::test]
    async fn paginates_in_bounded_batches() {
        let source = Arc::new(PoolSource {
            total: 1000,
            calls: AtomicUsize::new(0),
        });
        let runner = QueryRunner::with_page_size(source.clone(), 100);

        let table = runner.run(window(), &params(250)).await.unwrap();
        // limit=250 with pages of 100 → exactly 3 upstream calls, 250 rows.
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(table.len(), 250);
    }

    #[tokio::test]
    async fn short_page_stops_pagination() {
        let source = Arc::new(PoolSource {
            total: 42,
            calls: AtomicUsize::new(0),
        });
        let runner = QueryRunner::with_page_size(source.clone(), 100);

        let table = runner.run(window(), &params(250)).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.len(), 42);
    }

    #[tokio::test]
    async fn empty_upstream_yields_empty_table() {
        let source = Arc::new(PoolSource {
            total: 0,
            calls: AtomicUsize::new(0),
        });
        let runner = QueryRunner::new(source);
        let table = runner.run(window(), &params(100)).await.unwrap();
        assert!(table.is_empty());
        assert_eq!(
            table.columns(),
            &["pagePath".to_string(), "screenPageViews".to_string()]
        );
    }

    struct FailingSource;

    #[async_trait::async_trait]
    impl ReportSource for FailingSource {
        async fn run_report(&self, _req: &ReportRequest) -> anyhow::Result<RawTable> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn upstream_errors_propagate() {
        let runner = QueryRunner::new(Arc::new(FailingSource));
        let err = runner.run(window(), &params(10)).await.unwrap_err();
        assert!(matches!(err, ReportError::Upstream(_)));
        assert!(!err.is_configuration());
    }
}
