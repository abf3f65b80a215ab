//! Shape-tag dispatch: reshaping raw query results into canonical tables.
//!
//! Each tag maps to one pure transform. Single-window tags take one raw
//! table; comparison tags take the (current, previous) pair produced by
//! [`crate::compare::PeriodComparator`]. Metric coercion is lenient
//! throughout — see [`crate::coerce`].

use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::coerce::{coerce_metric, parse_date};
use crate::error::ReportError;
use crate::table::{
    AcquisitionRow, CanonicalTable, CompareRow, DailyRow, DayUsersRow, DeviceRow, HeatmapRow,
    PageCompareRow, PageRow, RawTable,
};

/// How many rows `days_top` keeps.
const DAYS_TOP_LIMIT: usize = 30;

/// Day names shown next to the weekday heatmap, Monday first.
/// Portuguese, matching the dashboards this feeds.
const DAY_NAMES: [&str; 7] = ["Seg", "Ter", "Qua", "Qui", "Sex", "Sáb", "Dom"];

/// Identifies which transform applies to a report's raw results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeTag {
    Daily,
    Pages,
    PagesCompare,
    Devices,
    FirstUser,
    DaysTop,
    WeekdayHeatmap,
    CompareSum,
    CompareAvgDuration,
}

impl ShapeTag {
    /// Comparison shapes consume a (current, previous) pair.
    pub fn needs_pair(self) -> bool {
        matches!(
            self,
            ShapeTag::PagesCompare | ShapeTag::CompareSum | ShapeTag::CompareAvgDuration
        )
    }
}

/// Input to [`apply`]: one window or a comparison pair.
#[derive(Debug)]
pub enum ShapeInput {
    Single(RawTable),
    Pair {
        current: RawTable,
        previous: RawTable,
    },
}

/// Dispatch on the shape tag. `primary_metric` names the metric summed by
/// `compare_sum` (the spec's first metric); other tags ignore it.
pub fn apply(
    tag: ShapeTag,
    input: ShapeInput,
    primary_metric: Option<&str>,
) -> Result<CanonicalTable, ReportError> {
    match (tag, input) {
        (ShapeTag::Daily, ShapeInput::Single(raw)) => Ok(CanonicalTable::Daily(daily(&raw))),
        (ShapeTag::Pages, ShapeInput::Single(raw)) => Ok(CanonicalTable::Pages(pages(&raw)?)),
        (ShapeTag::Devices, ShapeInput::Single(raw)) => {
            Ok(CanonicalTable::Devices(devices(&raw)?))
        }
        (ShapeTag::FirstUser, ShapeInput::Single(raw)) => {
            Ok(CanonicalTable::FirstUser(first_user(&raw)?))
        }
        (ShapeTag::DaysTop, ShapeInput::Single(raw)) => {
            Ok(CanonicalTable::DaysTop(days_top(&raw)))
        }
        (ShapeTag::WeekdayHeatmap, ShapeInput::Single(raw)) => {
            Ok(CanonicalTable::WeekdayHeatmap(weekday_heatmap(&raw)))
        }
        (ShapeTag::PagesCompare, ShapeInput::Pair { current, previous }) => Ok(
            CanonicalTable::PagesCompare(pages_compare(&current, &previous)?),
        ),
        (ShapeTag::CompareSum, ShapeInput::Pair { current, previous }) => {
            let metric = primary_metric.ok_or_else(|| {
                ReportError::Postprocess("compare_sum requires a metric name".into())
            })?;
            Ok(CanonicalTable::CompareSummary(compare_sum(
                metric, &current, &previous,
            )))
        }
        (ShapeTag::CompareAvgDuration, ShapeInput::Pair { current, previous }) => Ok(
            CanonicalTable::CompareSummary(compare_avg_duration(&current, &previous)),
        ),
        (tag, input) => Err(ReportError::Postprocess(format!(
            "shape `{tag:?}` cannot process {} input",
            match input {
                ShapeInput::Single(_) => "single-window",
                ShapeInput::Pair { .. } => "two-window",
            }
        ))),
    }
}

fn metric_at(raw: &RawTable, row: usize, column: &str) -> f64 {
    raw.value(row, column).map(coerce_metric).unwrap_or(0.0)
}

fn require_column(raw: &RawTable, name: &str) -> Result<(), ReportError> {
    if raw.column_index(name).is_none() {
        return Err(ReportError::Postprocess(format!(
            "required column `{name}` missing from raw result"
        )));
    }
    Ok(())
}

/// Rows whose date cell does not parse are dropped, not errored.
fn date_at(raw: &RawTable, row: usize) -> Option<chrono::NaiveDate> {
    match raw.value(row, "date") {
        Some(cell) => {
            let parsed = parse_date(cell);
            if parsed.is_none() {
                tracing::warn!(value = cell, "unparseable date dropped from report");
            }
            parsed
        }
        None => None,
    }
}

/// Daily users/sessions/pageviews series, sorted by date ascending.
/// Missing metric columns contribute 0.
fn daily(raw: &RawTable) -> Vec<DailyRow> {
    let mut rows: Vec<DailyRow> = (0..raw.len())
        .filter_map(|i| {
            let date = date_at(raw, i)?;
            Some(DailyRow {
                date,
                users: metric_at(raw, i, "totalUsers").round() as i64,
                sessions: metric_at(raw, i, "sessions").round() as i64,
                pageviews: metric_at(raw, i, "screenPageViews").round() as i64,
            })
        })
        .collect();
    rows.sort_by_key(|r| r.date);
    rows
}

/// Pageviews grouped by page path, descending.
fn pages(raw: &RawTable) -> Result<Vec<PageRow>, ReportError> {
    require_column(raw, "pagePath")?;
    let mut grouped: HashMap<String, f64> = HashMap::new();
    for i in 0..raw.len() {
        let page = raw.value(i, "pagePath").unwrap_or("").to_string();
        *grouped.entry(page).or_default() += metric_at(raw, i, "screenPageViews");
    }
    let mut rows: Vec<PageRow> = grouped
        .into_iter()
        .map(|(page, pageviews)| PageRow {
            page,
            pageviews: pageviews.round() as i64,
        })
        .collect();
    rows.sort_by(|a, b| b.pageviews.cmp(&a.pageviews).then(a.page.cmp(&b.page)));
    Ok(rows)
}

/// Outer join of the two per-period page rankings: a page missing from one
/// side counts 0 there; `pct` is null when the previous count is 0.
fn pages_compare(
    current: &RawTable,
    previous: &RawTable,
) -> Result<Vec<PageCompareRow>, ReportError> {
    let cur = pages(current)?;
    let prev = pages(previous)?;

    let mut merged: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for row in cur {
        merged.entry(row.page).or_insert((0, 0)).0 = row.pageviews;
    }
    for row in prev {
        merged.entry(row.page).or_insert((0, 0)).1 = row.pageviews;
    }

    let mut rows: Vec<PageCompareRow> = merged
        .into_iter()
        .map(|(page, (cur, prev))| {
            let diff = cur - prev;
            let pct = (prev != 0).then(|| diff as f64 / prev as f64 * 100.0);
            PageCompareRow {
                page,
                pageviews_cur: cur,
                pageviews_prev: prev,
                diff,
                pct,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.pageviews_cur
            .cmp(&a.pageviews_cur)
            .then(a.page.cmp(&b.page))
    });
    Ok(rows)
}

/// Users grouped by device category, device name ascending.
fn devices(raw: &RawTable) -> Result<Vec<DeviceRow>, ReportError> {
    require_column(raw, "deviceCategory")?;
    let mut grouped: BTreeMap<String, f64> = BTreeMap::new();
    for i in 0..raw.len() {
        let device = raw.value(i, "deviceCategory").unwrap_or("").to_string();
        *grouped.entry(device).or_default() += metric_at(raw, i, "totalUsers");
    }
    Ok(grouped
        .into_iter()
        .map(|(device, users)| DeviceRow {
            device,
            users: users.round() as i64,
        })
        .collect())
}

/// First-touch acquisition ranking, users descending.
fn first_user(raw: &RawTable) -> Result<Vec<AcquisitionRow>, ReportError> {
    require_column(raw, "firstUserSource")?;
    require_column(raw, "firstUserMedium")?;
    require_column(raw, "firstUserCampaignName")?;
    let mut rows: Vec<AcquisitionRow> = (0..raw.len())
        .map(|i| AcquisitionRow {
            source: raw.value(i, "firstUserSource").unwrap_or("").to_string(),
            medium: raw.value(i, "firstUserMedium").unwrap_or("").to_string(),
            campaign: raw
                .value(i, "firstUserCampaignName")
                .unwrap_or("")
                .to_string(),
            users: metric_at(raw, i, "totalUsers").round() as i64,
        })
        .collect();
    rows.sort_by(|a, b| b.users.cmp(&a.users));
    Ok(rows)
}

/// Days ranked by users, truncated to the top 30.
fn days_top(raw: &RawTable) -> Vec<DayUsersRow> {
    let mut rows: Vec<DayUsersRow> = (0..raw.len())
        .filter_map(|i| {
            let date = date_at(raw, i)?;
            Some(DayUsersRow {
                date,
                users: metric_at(raw, i, "totalUsers").round() as i64,
            })
        })
        .collect();
    rows.sort_by(|a, b| b.users.cmp(&a.users).then(a.date.cmp(&b.date)));
    rows.truncate(DAYS_TOP_LIMIT);
    rows
}

/// (ISO week × weekday) user totals for the heatmap, sorted by week then
/// weekday; weekday 0 = Monday.
fn weekday_heatmap(raw: &RawTable) -> Vec<HeatmapRow> {
    let mut grouped: BTreeMap<(u32, u32), f64> = BTreeMap::new();
    for i in 0..raw.len() {
        let Some(date) = date_at(raw, i) else { continue };
        let key = (date.iso_week().week(), date.weekday().num_days_from_monday());
        *grouped.entry(key).or_default() += metric_at(raw, i, "totalUsers");
    }
    grouped
        .into_iter()
        .map(|((week, day_of_week), users)| HeatmapRow {
            week,
            day_of_week,
            users: users.round() as i64,
            day_name: DAY_NAMES[day_of_week as usize].to_string(),
        })
        .collect()
}

fn column_sum(raw: &RawTable, column: &str) -> f64 {
    if raw.column_index(column).is_none() {
        return 0.0;
    }
    (0..raw.len()).map(|i| metric_at(raw, i, column)).sum()
}

fn delta(metric: &str, cur: f64, prev: f64) -> CompareRow {
    let diff = cur - prev;
    let pct = (prev != 0.0).then(|| diff / prev * 100.0);
    CompareRow {
        metric: metric.to_string(),
        cur,
        prev,
        diff,
        pct,
    }
}

/// Metric summed over each window, with delta and percent change.
fn compare_sum(metric: &str, current: &RawTable, previous: &RawTable) -> CompareRow {
    delta(metric, column_sum(current, metric), column_sum(previous, metric))
}

const DURATION_METRIC: &str = "averageSessionDuration";

/// Session-weighted average duration for one window; plain mean when the
/// sessions column is absent or sums to zero.
fn weighted_avg_duration(raw: &RawTable) -> f64 {
    if raw.is_empty() {
        return 0.0;
    }
    let sessions_sum = column_sum(raw, "sessions");
    if raw.column_index("sessions").is_some() && sessions_sum > 0.0 {
        let weighted: f64 = (0..raw.len())
            .map(|i| metric_at(raw, i, DURATION_METRIC) * metric_at(raw, i, "sessions"))
            .sum();
        weighted / sessions_sum
    } else {
        column_sum(raw, DURATION_METRIC) / raw.len() as f64
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn compare_avg_duration(current: &RawTable, previous: &RawTable) -> CompareRow {
    let cur = weighted_avg_duration(current);
    let prev = weighted_avg_duration(previous);
    let mut row = delta(DURATION_METRIC, cur, prev);
    row.cur = round2(row.cur);
    row.prev = round2(row.prev);
    row.diff = round2(row.diff);
    row
}
