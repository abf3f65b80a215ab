//! Deterministic synthetic dataset.
//!
//! Stands in for the live analytics API in development and demos. Rows are
//! generated from a seed plus the calendar date, so the same window always
//! yields the same report and comparison windows see genuinely different
//! traffic.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use reportly_core::source::{ReportRequest, ReportSource};
use reportly_core::table::RawTable;

const PAGES: &[&str] = &[
    "/",
    "/classes/algebra",
    "/classes/geometria",
    "/classes/fracoes",
    "/blog/como-estudar",
    "/sobre",
];
const DEVICES: &[&str] = &["desktop", "mobile", "tablet"];
const COUNTRIES: &[&str] = &["Brazil", "Portugal", "United States"];
// (source, medium, campaign)
const CHANNELS: &[(&str, &str, &str)] = &[
    ("google", "organic", "(organic)"),
    ("(direct)", "(none)", "(direct)"),
    ("instagram", "social", "bio_link"),
    ("newsletter", "email", "turma_2024"),
];
const VIDEO_TITLES: &[&str] = &["Introdução à Álgebra", "Geometria Básica", "Frações"];

const PAGE_DIMENSIONS: &[&str] = &[
    "date",
    "pagePath",
    "deviceCategory",
    "country",
    "firstUserSource",
    "firstUserMedium",
    "firstUserCampaignName",
];
const EVENT_DIMENSIONS: &[&str] = &[
    "date",
    "eventName",
    "customEvent:video_title",
    "customEvent:video_percent",
];

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    seed: u64,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn day_rng(&self, date: NaiveDate, salt: u64) -> StdRng {
        let mixed = self
            .seed
            .wrapping_add(salt)
            .wrapping_add((date.num_days_from_ce() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        StdRng::seed_from_u64(mixed)
    }

    fn page_samples(&self, date: NaiveDate) -> Vec<PageSample> {
        let mut rng = self.day_rng(date, 1);
        let mut samples = Vec::new();
        for page in PAGES {
            for device in DEVICES {
                for country in COUNTRIES {
                    for (source, medium, campaign) in CHANNELS {
                        let users = rng.gen_range(0..60);
                        if users == 0 {
                            continue;
                        }
                        let sessions = users + rng.gen_range(0..users + 1);
                        let pageviews = sessions + rng.gen_range(0..sessions * 2 + 1);
                        samples.push(PageSample {
                            date,
                            page,
                            device,
                            country,
                            source,
                            medium,
                            campaign,
                            users,
                            sessions,
                            pageviews,
                            avg_duration: rng.gen_range(30.0..420.0),
                        });
                    }
                }
            }
        }
        samples
    }

    fn event_samples(&self, date: NaiveDate) -> Vec<EventSample> {
        let mut rng = self.day_rng(date, 2);
        let mut samples = Vec::new();
        for title in VIDEO_TITLES {
            let starts = rng.gen_range(5..80);
            samples.push(EventSample {
                date,
                event: "video_start",
                title,
                percent: "0",
                count: starts,
            });
            for percent in ["25", "50", "75"] {
                samples.push(EventSample {
                    date,
                    event: "video_progress",
                    title,
                    percent,
                    count: rng.gen_range(0..starts),
                });
            }
            samples.push(EventSample {
                date,
                event: "video_complete",
                title,
                percent: "100",
                count: rng.gen_range(0..starts),
            });
        }
        samples
    }
}

struct PageSample {
    date: NaiveDate,
    page: &'static str,
    device: &'static str,
    country: &'static str,
    source: &'static str,
    medium: &'static str,
    campaign: &'static str,
    users: i64,
    sessions: i64,
    pageviews: i64,
    avg_duration: f64,
}

impl PageSample {
    fn dimension(&self, name: &str) -> Option<String> {
        match name {
            "date" => Some(self.date.format("%Y%m%d").to_string()),
            "pagePath" => Some(self.page.to_string()),
            "deviceCategory" => Some(self.device.to_string()),
            "country" => Some(self.country.to_string()),
            "firstUserSource" => Some(self.source.to_string()),
            "firstUserMedium" => Some(self.medium.to_string()),
            "firstUserCampaignName" => Some(self.campaign.to_string()),
            _ => None,
        }
    }

    fn metric(&self, name: &str) -> Option<Metric> {
        match name {
            "totalUsers" => Some(Metric::Sum(self.users as f64)),
            "sessions" => Some(Metric::Sum(self.sessions as f64)),
            "screenPageViews" => Some(Metric::Sum(self.pageviews as f64)),
            "averageSessionDuration" => Some(Metric::Mean(self.avg_duration)),
            _ => None,
        }
    }
}

struct EventSample {
    date: NaiveDate,
    event: &'static str,
    title: &'static str,
    percent: &'static str,
    count: i64,
}

impl EventSample {
    fn dimension(&self, name: &str) -> Option<String> {
        match name {
            "date" => Some(self.date.format("%Y%m%d").to_string()),
            "eventName" => Some(self.event.to_string()),
            "customEvent:video_title" => Some(self.title.to_string()),
            "customEvent:video_percent" => Some(self.percent.to_string()),
            _ => None,
        }
    }

    fn metric(&self, name: &str) -> Option<Metric> {
        match name {
            "eventCount" => Some(Metric::Sum(self.count as f64)),
            _ => None,
        }
    }
}

/// How a metric aggregates when rows collapse into one group.
#[derive(Debug, Clone, Copy)]
enum Metric {
    Sum(f64),
    Mean(f64),
}

#[async_trait::async_trait]
impl ReportSource for SyntheticSource {
    async fn run_report(&self, req: &ReportRequest) -> anyhow::Result<RawTable> {
        let event_query = req.metrics.iter().any(|m| m == "eventCount")
            || req.dimensions.iter().any(|d| d == "eventName");

        let known_dims: &[&str] = if event_query {
            EVENT_DIMENSIONS
        } else {
            PAGE_DIMENSIONS
        };
        for dim in &req.dimensions {
            if !known_dims.contains(&dim.as_str()) {
                anyhow::bail!("unknown dimension: {dim}");
            }
        }

        let mut days = Vec::new();
        let mut day = req.window.start;
        while day <= req.window.end {
            days.push(day);
            day += chrono::Duration::days(1);
        }

        let mut rows: Vec<(Vec<String>, Vec<f64>)> = Vec::new();
        if event_query {
            for date in &days {
                for sample in self.event_samples(*date) {
                    collect_row(req, &mut rows, |d| sample.dimension(d), |m| {
                        sample.metric(m)
                    })?;
                }
            }
        } else {
            for date in &days {
                for sample in self.page_samples(*date) {
                    collect_row(req, &mut rows, |d| sample.dimension(d), |m| {
                        sample.metric(m)
                    })?;
                }
            }
        }

        let grouped = group_rows(req, rows);
        Ok(finish(req, grouped))
    }
}

fn collect_row(
    req: &ReportRequest,
    rows: &mut Vec<(Vec<String>, Vec<f64>)>,
    dimension: impl Fn(&str) -> Option<String>,
    metric: impl Fn(&str) -> Option<Metric>,
) -> anyhow::Result<()> {
    if let Some(filter) = &req.filter {
        if !filter.matches(&|name| dimension(name)) {
            return Ok(());
        }
    }
    let key: Vec<String> = req
        .dimensions
        .iter()
        .filter_map(|d| dimension(d))
        .collect();
    let mut values = Vec::with_capacity(req.metrics.len());
    for name in &req.metrics {
        match metric(name) {
            Some(Metric::Sum(v)) | Some(Metric::Mean(v)) => values.push(v),
            None => anyhow::bail!("unknown metric: {name}"),
        }
    }
    rows.push((key, values));
    Ok(())
}

fn group_rows(
    req: &ReportRequest,
    rows: Vec<(Vec<String>, Vec<f64>)>,
) -> Vec<(Vec<String>, Vec<f64>)> {
    let mut groups: BTreeMap<Vec<String>, (Vec<f64>, usize)> = BTreeMap::new();
    for (key, values) in rows {
        let entry = groups
            .entry(key)
            .or_insert_with(|| (vec![0.0; values.len()], 0));
        for (acc, v) in entry.0.iter_mut().zip(&values) {
            *acc += v;
        }
        entry.1 += 1;
    }

    let mut out: Vec<(Vec<String>, Vec<f64>)> = groups
        .into_iter()
        .map(|(key, (mut sums, n))| {
            for (i, name) in req.metrics.iter().enumerate() {
                if name == "averageSessionDuration" && n > 0 {
                    sums[i] /= n as f64;
                }
            }
            (key, sums)
        })
        .collect();

    if let Some(order_by) = &req.order_by {
        if let Some(idx) = req.metrics.iter().position(|m| m == order_by) {
            out.sort_by(|a, b| b.1[idx].total_cmp(&a.1[idx]));
        }
    }
    out
}

fn finish(req: &ReportRequest, grouped: Vec<(Vec<String>, Vec<f64>)>) -> RawTable {
    let columns: Vec<String> = req
        .dimensions
        .iter()
        .chain(req.metrics.iter())
        .cloned()
        .collect();
    let mut table = RawTable::new(columns);
    for (key, values) in grouped.into_iter().skip(req.offset).take(req.limit) {
        let mut cells = key;
        for (value, name) in values.iter().zip(&req.metrics) {
            if name == "averageSessionDuration" {
                cells.push(format!("{value:.1}"));
            } else {
                cells.push(format!("{}", *value as i64));
            }
        }
        table.push_row(cells);
    }
    table
}

#[cfg(test)]
mod tests {
    use reportly_core::filter::FilterExpr;
    use reportly_core::window::QueryWindow;

    use super::*;

    fn window() -> QueryWindow {
        QueryWindow::new(
            NaiveDate::from_ymd_opt(2024, 3, 24).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 30).unwrap(),
        )
        .unwrap()
    }

    fn request(dimensions: &[&str], metrics: &[&str]) -> ReportRequest {
        ReportRequest {
            window: window(),
            dimensions: dimensions.iter().map(|s| s.to_string()).collect(),
            metrics: metrics.iter().map(|s| s.to_string()).collect(),
            filter: None,
            order_by: None,
            limit: 100_000,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn same_seed_same_data() {
        let req = request(&["date"], &["totalUsers", "sessions"]);
        let a = SyntheticSource::new(7).run_report(&req).await.unwrap();
        let b = SyntheticSource::new(7).run_report(&req).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 7);
    }

    #[tokio::test]
    async fn different_days_differ() {
        let source = SyntheticSource::new(7);
        let req = request(&["date"], &["totalUsers"]);
        let table = source.run_report(&req).await.unwrap();
        let values: Vec<&str> = (0..table.len())
            .filter_map(|i| table.value(i, "totalUsers"))
            .collect();
        assert!(values.windows(2).any(|w| w[0] != w[1]));
    }

    #[tokio::test]
    async fn contains_filter_restricts_pages() {
        let source = SyntheticSource::new(1);
        let mut req = request(&["pagePath"], &["screenPageViews"]);
        req.filter = Some(FilterExpr::Contains {
            dimension: "pagePath".into(),
            substring: "/classes".into(),
        });
        let table = source.run_report(&req).await.unwrap();
        assert!(!table.is_empty());
        for i in 0..table.len() {
            let page = table.value(i, "pagePath").unwrap();
            assert!(page.contains("/classes"), "unexpected page {page}");
        }
    }

    #[tokio::test]
    async fn order_by_sorts_descending() {
        let source = SyntheticSource::new(1);
        let mut req = request(&["pagePath"], &["screenPageViews"]);
        req.order_by = Some("screenPageViews".into());
        let table = source.run_report(&req).await.unwrap();
        let views: Vec<i64> = (0..table.len())
            .map(|i| table.value(i, "screenPageViews").unwrap().parse().unwrap())
            .collect();
        assert!(views.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn limit_and_offset_slice_the_grouping() {
        let source = SyntheticSource::new(1);
        let full = source
            .run_report(&request(&["pagePath"], &["totalUsers"]))
            .await
            .unwrap();

        let mut req = request(&["pagePath"], &["totalUsers"]);
        req.offset = 1;
        req.limit = 2;
        let page = source.run_report(&req).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.value(0, "pagePath"), full.value(1, "pagePath"));
    }

    #[tokio::test]
    async fn unknown_dimension_is_rejected() {
        let source = SyntheticSource::new(1);
        let req = request(&["date", "eventName", "videoTitle"], &["eventCount"]);
        let err = source.run_report(&req).await.unwrap_err();
        assert!(err.to_string().contains("videoTitle"));
    }

    #[tokio::test]
    async fn video_events_carry_percent_buckets() {
        let source = SyntheticSource::new(1);
        let req = request(
            &["eventName", "customEvent:video_percent"],
            &["eventCount"],
        );
        let table = source.run_report(&req).await.unwrap();
        for i in 0..table.len() {
            let event = table.value(i, "eventName").unwrap();
            let percent = table.value(i, "customEvent:video_percent").unwrap();
            match event {
                "video_start" => assert_eq!(percent, "0"),
                "video_complete" => assert_eq!(percent, "100"),
                "video_progress" => assert!(["25", "50", "75"].contains(&percent)),
                other => panic!("unexpected event {other}"),
            }
        }
    }
}
