//! Report resolution orchestration.
//!
//! Per request the resolver inspects the catalog entry, picks the
//! single-window, comparison or video execution path, runs the queries and
//! hands raw results to the postprocessor. Failures are confined to the
//! report that caused them — a bad key never blocks the rest of a batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::catalog::{ReportCatalog, ReportSpec, SpecialReport};
use crate::coerce::{coerce_metric, parse_date};
use crate::compare::PeriodComparator;
use crate::error::ReportError;
use crate::filter::FilterExpr;
use crate::postprocess::{self, ShapeInput};
use crate::runner::{QueryParams, QueryRunner};
use crate::source::ReportSource;
use crate::table::{CanonicalTable, RawTable, VideoEventRow};
use crate::window::{current_window, QueryWindow};

/// Row cap for the broad video-event query.
const VIDEO_LIMIT: usize = 10_000;
/// Row cap for per-event video queries.
const VIDEO_SPECIFIC_LIMIT: usize = 1_000_000;

/// Candidate dimension names for the video title/percent fields. The
/// upstream schema varies by property configuration, so the resolver
/// probes these in order and falls back to an event/date/count-only shape
/// when none is accepted.
const TITLE_CANDIDATES: &[&str] = &["videoTitle", "customEvent:video_title", "customEvent:title"];
const PERCENT_CANDIDATES: &[&str] = &[
    "percent",
    "videoPercent",
    "customEvent:percent",
    "customEvent:video_percent",
];

/// The canonical table for one resolved report, plus the sink filename
/// its catalog entry names.
#[derive(Debug, Clone)]
pub struct ResolvedReport {
    pub key: String,
    pub filename: String,
    pub table: CanonicalTable,
}

pub struct ReportResolver {
    catalog: ReportCatalog,
    runner: QueryRunner,
    comparator: PeriodComparator,
}

impl ReportResolver {
    pub fn new(catalog: ReportCatalog, source: Arc<dyn ReportSource>) -> Self {
        let runner = QueryRunner::new(source);
        let comparator = PeriodComparator::new(runner.clone());
        Self {
            catalog,
            runner,
            comparator,
        }
    }

    pub fn catalog(&self) -> &ReportCatalog {
        &self.catalog
    }

    /// Resolve one report over the last `days` days ending today.
    pub async fn resolve(&self, key: &str, days: u32) -> Result<ResolvedReport, ReportError> {
        self.resolve_at(key, days, Utc::now().date_naive()).await
    }

    /// Deterministic entry point: `today` pins the window arithmetic.
    pub async fn resolve_at(
        &self,
        key: &str,
        days: u32,
        today: NaiveDate,
    ) -> Result<ResolvedReport, ReportError> {
        let spec = self.catalog.get(key)?;
        let window = current_window(today, days)?;

        let table = match spec.special {
            Some(SpecialReport::Video) => {
                CanonicalTable::VideoEvents(self.video_events(window).await?)
            }
            Some(SpecialReport::VideoSpecific) => CanonicalTable::VideoEvents(
                self.video_events_specific(window, &spec.event_names)
                    .await?,
            ),
            None => self.resolve_generic(spec, days, today, window).await?,
        };

        tracing::info!(key, rows = table.len(), "report resolved");
        Ok(ResolvedReport {
            key: key.to_string(),
            filename: spec.filename.clone(),
            table,
        })
    }

    /// Resolve several reports sequentially. Each entry carries its own
    /// outcome; one failing key degrades that entry only.
    pub async fn resolve_batch(
        &self,
        keys: &[String],
        days: u32,
    ) -> BTreeMap<String, Result<ResolvedReport, ReportError>> {
        self.resolve_batch_at(keys, days, Utc::now().date_naive())
            .await
    }

    pub async fn resolve_batch_at(
        &self,
        keys: &[String],
        days: u32,
        today: NaiveDate,
    ) -> BTreeMap<String, Result<ResolvedReport, ReportError>> {
        let mut outcome = BTreeMap::new();
        for key in keys {
            let result = self.resolve_at(key, days, today).await;
            if let Err(err) = &result {
                tracing::error!(key = %key, error = %err, "report resolution failed");
            }
            outcome.insert(key.clone(), result);
        }
        outcome
    }

    async fn resolve_generic(
        &self,
        spec: &ReportSpec,
        days: u32,
        today: NaiveDate,
        window: QueryWindow,
    ) -> Result<CanonicalTable, ReportError> {
        let params = QueryParams::from_spec(spec)?;
        let primary_metric = spec.metrics.first().map(String::as_str);

        if spec.compare_periods {
            let (current, previous) = self.comparator.compare(today, days, &params).await?;
            match spec.postprocess {
                Some(tag) => postprocess::apply(
                    tag,
                    ShapeInput::Pair { current, previous },
                    primary_metric,
                ),
                // No merge rule: return both periods side by side, tagged.
                None => Ok(CanonicalTable::Raw(concat_periods(current, previous))),
            }
        } else {
            let raw = self.runner.run(window, &params).await?;
            match spec.postprocess {
                Some(tag) => postprocess::apply(tag, ShapeInput::Single(raw), primary_metric),
                None => Ok(CanonicalTable::Raw(raw)),
            }
        }
    }

    /// Broad video query: every `video_*` event with title and percent.
    async fn video_events(&self, window: QueryWindow) -> Result<Vec<VideoEventRow>, ReportError> {
        let params = QueryParams {
            dimensions: vec![
                "date".into(),
                "eventName".into(),
                "customEvent:video_title".into(),
                "customEvent:video_percent".into(),
            ],
            metrics: vec!["eventCount".into()],
            filter: Some(FilterExpr::Contains {
                dimension: "eventName".into(),
                substring: "video_".into(),
            }),
            order_by: None,
            limit: VIDEO_LIMIT,
        };
        let raw = self.runner.run(window, &params).await?;
        Ok(video_rows(
            &raw,
            Some("customEvent:video_title"),
            Some("customEvent:video_percent"),
        ))
    }

    /// Per-event video query, probing title/percent dimension-name
    /// candidates. A candidate pair the upstream rejects (or that returns
    /// nothing) is skipped; the final fallback query propagates errors.
    async fn video_events_specific(
        &self,
        window: QueryWindow,
        event_names: &[String],
    ) -> Result<Vec<VideoEventRow>, ReportError> {
        let filter = FilterExpr::InList {
            dimension: "eventName".into(),
            values: event_names.to_vec(),
        };

        for title_dim in TITLE_CANDIDATES {
            for percent_dim in PERCENT_CANDIDATES {
                let params = QueryParams {
                    dimensions: vec![
                        "date".into(),
                        "eventName".into(),
                        (*title_dim).into(),
                        (*percent_dim).into(),
                    ],
                    metrics: vec!["eventCount".into()],
                    filter: Some(filter.clone()),
                    order_by: None,
                    limit: VIDEO_SPECIFIC_LIMIT,
                };
                match self.runner.run(window, &params).await {
                    Ok(raw) if !raw.is_empty() => {
                        return Ok(video_rows(&raw, Some(title_dim), Some(percent_dim)));
                    }
                    Ok(_) => continue,
                    Err(err) => {
                        tracing::debug!(
                            title_dim,
                            percent_dim,
                            error = %err,
                            "video dimension probe rejected"
                        );
                        continue;
                    }
                }
            }
        }

        // No candidate pair matched: event/date/count-only shape.
        let params = QueryParams {
            dimensions: vec!["date".into(), "eventName".into()],
            metrics: vec!["eventCount".into()],
            filter: Some(filter),
            order_by: None,
            limit: VIDEO_SPECIFIC_LIMIT,
        };
        let raw = self.runner.run(window, &params).await?;
        Ok(video_rows(&raw, None, None))
    }
}

fn video_rows(
    raw: &RawTable,
    title_column: Option<&str>,
    percent_column: Option<&str>,
) -> Vec<VideoEventRow> {
    let cell = |i: usize, column: Option<&str>| {
        column
            .and_then(|c| raw.value(i, c))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    (0..raw.len())
        .filter_map(|i| {
            let date = raw.value(i, "date").and_then(parse_date)?;
            Some(VideoEventRow {
                date,
                event_name: raw.value(i, "eventName").unwrap_or("").to_string(),
                video_title: cell(i, title_column),
                video_percent: cell(i, percent_column),
                event_count: raw
                    .value(i, "eventCount")
                    .map(coerce_metric)
                    .unwrap_or(0.0)
                    .round() as i64,
            })
        })
        .collect()
}

fn concat_periods(current: RawTable, previous: RawTable) -> RawTable {
    let current = current.with_column("period", "current");
    let previous = previous.with_column("period", "previous");
    let mut out = RawTable::new(current.columns().to_vec());
    for row in current.into_rows() {
        out.push_row(row);
    }
    for row in previous.into_rows() {
        out.push_row(row);
    }
    out
}
