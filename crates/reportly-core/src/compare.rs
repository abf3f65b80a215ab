//! Two-window period comparison.

use chrono::NaiveDate;

use crate::error::ReportError;
use crate::runner::{QueryParams, QueryRunner};
use crate::table::RawTable;
use crate::window::{current_window, previous_window};

/// Runs the same query over the current window and the immediately
/// preceding window of equal length. Merging the two results is the
/// postprocessor's job — this component only does window arithmetic and
/// the two sequential runner invocations.
pub struct PeriodComparator {
    runner: QueryRunner,
}

impl PeriodComparator {
    pub fn new(runner: QueryRunner) -> Self {
        Self { runner }
    }

    pub async fn compare(
        &self,
        today: NaiveDate,
        days: u32,
        params: &QueryParams,
    ) -> Result<(RawTable, RawTable), ReportError> {
        let cur = self.runner.run(current_window(today, days)?, params).await?;
        let prev = self
            .runner
            .run(previous_window(today, days)?, params)
            .await?;
        Ok((cur, prev))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::source::{ReportRequest, ReportSource};
    use crate::window::QueryWindow;

    #[derive(Default)]
    struct WindowRecorder {
        windows: Mutex<Vec<QueryWindow>>,
    }

    #[async_trait::async_trait]
    impl ReportSource for WindowRecorder {
        async fn run_report(&self, req: &ReportRequest) -> anyhow::Result<RawTable> {
            self.windows.lock().unwrap().push(req.window);
            Ok(RawTable::new(
                req.dimensions
                    .iter()
                    .chain(req.metrics.iter())
                    .cloned()
                    .collect(),
            ))
        }
    }

    #[tokio::test]
    async fn queries_both_windows_with_identical_params() {
        let source = Arc::new(WindowRecorder::default());
        let comparator = PeriodComparator::new(QueryRunner::new(source.clone()));

        let today = NaiveDate::from_ymd_opt(2024, 3, 30).unwrap();
        let params = QueryParams {
            dimensions: vec!["date".into()],
            metrics: vec!["sessions".into()],
            filter: None,
            order_by: None,
            limit: 1000,
        };
        comparator.compare(today, 7, &params).await.unwrap();

        let windows = source.windows.lock().unwrap();
        assert_eq!(windows.len(), 2);
        let (cur, prev) = (windows[0], windows[1]);
        assert_eq!(cur.end, today);
        assert_eq!(cur.days(), 7);
        assert_eq!(prev.days(), 7);
        assert_eq!(prev.end + chrono::Duration::days(1), cur.start);
    }
}
