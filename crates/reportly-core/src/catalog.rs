//! Declarative report catalog: report key → query specification.
//!
//! The catalog is static data — loadable from JSON, no code execution
//! needed to interpret it. Validation happens once at construction so a
//! malformed entry fails fast instead of at resolution time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::filter::{self, FilterContains, FilterIn};
use crate::postprocess::ShapeTag;

/// Default row cap, aligned with the report API's page-size limit.
pub const DEFAULT_LIMIT: usize = 100_000;

/// Report keys refreshed when a dashboard refresh names none explicitly.
pub const DASHBOARD_KEYS: &[&str] = &[
    "kpis_daily",
    "pages_top",
    "first_user_acquisition",
    "video_events",
    "devices",
];

/// Entries tagged `special` bypass the generic dimensions/metrics path
/// and use the dedicated video-event query routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialReport {
    Video,
    VideoSpecific,
}

/// One catalog entry. Immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSpec {
    /// Output file stem for the CSV sink (`data/<filename>.csv`).
    pub filename: String,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub filter_in: Option<FilterIn>,
    #[serde(default)]
    pub filter_contains: Option<FilterContains>,
    #[serde(default)]
    pub order_by_metric: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub compare_periods: bool,
    #[serde(default)]
    pub postprocess: Option<ShapeTag>,
    #[serde(default)]
    pub special: Option<SpecialReport>,
    #[serde(default)]
    pub event_names: Vec<String>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Read-only mapping of report key → [`ReportSpec`], validated on
/// construction and safely shared across resolutions.
#[derive(Debug, Clone)]
pub struct ReportCatalog {
    entries: BTreeMap<String, ReportSpec>,
}

impl ReportCatalog {
    pub fn from_entries(entries: BTreeMap<String, ReportSpec>) -> Result<Self, ReportError> {
        for (key, spec) in &entries {
            validate(key, spec)?;
        }
        Ok(Self { entries })
    }

    /// Load a catalog from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        let entries: BTreeMap<String, ReportSpec> =
            serde_json::from_str(json).map_err(|e| ReportError::InvalidSpec {
                key: "<catalog>".into(),
                reason: e.to_string(),
            })?;
        Self::from_entries(entries)
    }

    pub fn get(&self, key: &str) -> Result<&ReportSpec, ReportError> {
        self.entries
            .get(key)
            .ok_or_else(|| ReportError::UnknownReport(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReportSpec)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The built-in catalog backing the standard dashboard.
    pub fn builtin() -> Self {
        match Self::from_entries(builtin_entries()) {
            Ok(catalog) => catalog,
            Err(err) => unreachable!("builtin catalog must validate: {err}"),
        }
    }
}

fn validate(key: &str, spec: &ReportSpec) -> Result<(), ReportError> {
    let invalid = |reason: String| ReportError::InvalidSpec {
        key: key.to_string(),
        reason,
    };

    if key.trim().is_empty() {
        return Err(invalid("report key must be non-empty".into()));
    }
    if spec.filename.trim().is_empty() {
        return Err(invalid("filename must be non-empty".into()));
    }
    if spec.limit == 0 {
        return Err(invalid("limit must be at least 1".into()));
    }

    match spec.special {
        Some(SpecialReport::VideoSpecific) => {
            if spec.event_names.is_empty() {
                return Err(invalid(
                    "special=video_specific requires event_names".into(),
                ));
            }
            return Ok(()); // special entries bypass dimensions/metrics
        }
        Some(SpecialReport::Video) => return Ok(()),
        None => {}
    }

    if spec.dimensions.is_empty() {
        return Err(invalid("at least one dimension is required".into()));
    }
    if spec.metrics.is_empty() {
        return Err(invalid("at least one metric is required".into()));
    }
    if let Some(order_by) = &spec.order_by_metric {
        if !spec.metrics.contains(order_by) {
            return Err(invalid(format!(
                "order_by_metric `{order_by}` is not among the requested metrics"
            )));
        }
    }
    if let Some(tag) = spec.postprocess {
        if tag.needs_pair() != spec.compare_periods {
            return Err(invalid(format!(
                "postprocess `{tag:?}` requires compare_periods={}",
                tag.needs_pair()
            )));
        }
    }
    filter::build(spec.filter_in.as_ref(), spec.filter_contains.as_ref())
        .map_err(|e| invalid(e.to_string()))?;
    Ok(())
}

fn base(filename: &str) -> ReportSpec {
    ReportSpec {
        filename: filename.to_string(),
        dimensions: Vec::new(),
        metrics: Vec::new(),
        filter_in: None,
        filter_contains: None,
        order_by_metric: None,
        limit: DEFAULT_LIMIT,
        compare_periods: false,
        postprocess: None,
        special: None,
        event_names: Vec::new(),
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn builtin_entries() -> BTreeMap<String, ReportSpec> {
    let mut entries = BTreeMap::new();

    // KPI series and Δ-cards.
    entries.insert(
        "kpis_daily".into(),
        ReportSpec {
            dimensions: names(&["date"]),
            metrics: names(&["totalUsers", "sessions", "screenPageViews"]),
            postprocess: Some(ShapeTag::Daily),
            ..base("kpis_daily")
        },
    );
    for (key, metric) in [
        ("users_compare", "totalUsers"),
        ("sessions_compare", "sessions"),
        ("pageviews_compare", "screenPageViews"),
    ] {
        entries.insert(
            key.into(),
            ReportSpec {
                dimensions: names(&["date"]),
                metrics: names(&[metric]),
                postprocess: Some(ShapeTag::CompareSum),
                compare_periods: true,
                ..base(key)
            },
        );
    }
    entries.insert(
        "avg_session_duration_compare".into(),
        ReportSpec {
            dimensions: names(&["date"]),
            // sessions is fetched alongside so the average can be
            // session-weighted rather than a plain mean of daily means.
            metrics: names(&["averageSessionDuration", "sessions"]),
            postprocess: Some(ShapeTag::CompareAvgDuration),
            compare_periods: true,
            ..base("avg_session_duration_compare")
        },
    );

    // Page rankings.
    entries.insert(
        "pages_top".into(),
        ReportSpec {
            dimensions: names(&["pagePath"]),
            metrics: names(&["screenPageViews"]),
            order_by_metric: Some("screenPageViews".into()),
            postprocess: Some(ShapeTag::Pages),
            ..base("pages_top")
        },
    );
    entries.insert(
        "pages_top_compare".into(),
        ReportSpec {
            dimensions: names(&["pagePath"]),
            metrics: names(&["screenPageViews"]),
            order_by_metric: Some("screenPageViews".into()),
            postprocess: Some(ShapeTag::PagesCompare),
            compare_periods: true,
            ..base("pages_top_compare")
        },
    );
    entries.insert(
        "classes_pages_compare".into(),
        ReportSpec {
            dimensions: names(&["pagePath"]),
            metrics: names(&["screenPageViews"]),
            order_by_metric: Some("screenPageViews".into()),
            postprocess: Some(ShapeTag::PagesCompare),
            compare_periods: true,
            filter_contains: Some(FilterContains {
                dimension: "pagePath".into(),
                contains: "/classes".into(),
            }),
            ..base("classes_pages_compare")
        },
    );

    // Acquisition.
    entries.insert(
        "first_user_acquisition".into(),
        ReportSpec {
            dimensions: names(&["firstUserSource", "firstUserMedium", "firstUserCampaignName"]),
            metrics: names(&["totalUsers"]),
            order_by_metric: Some("totalUsers".into()),
            postprocess: Some(ShapeTag::FirstUser),
            ..base("first_user_acquisition")
        },
    );

    // Day rankings and the weekday heatmap.
    entries.insert(
        "days_with_most_users".into(),
        ReportSpec {
            dimensions: names(&["date"]),
            metrics: names(&["totalUsers"]),
            postprocess: Some(ShapeTag::DaysTop),
            ..base("days_with_most_users")
        },
    );
    entries.insert(
        "weekday_heatmap".into(),
        ReportSpec {
            dimensions: names(&["date"]),
            metrics: names(&["totalUsers"]),
            postprocess: Some(ShapeTag::WeekdayHeatmap),
            ..base("weekday_heatmap")
        },
    );

    // Video events.
    entries.insert(
        "video_events".into(),
        ReportSpec {
            special: Some(SpecialReport::Video),
            ..base("video_events")
        },
    );
    for event in ["video_start", "video_progress", "video_complete"] {
        entries.insert(
            event.into(),
            ReportSpec {
                special: Some(SpecialReport::VideoSpecific),
                event_names: names(&[event]),
                ..base(event)
            },
        );
    }

    // Devices.
    entries.insert(
        "devices".into(),
        ReportSpec {
            dimensions: names(&["deviceCategory"]),
            metrics: names(&["totalUsers"]),
            postprocess: Some(ShapeTag::Devices),
            ..base("devices")
        },
    );

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_validates() {
        let catalog = ReportCatalog::builtin();
        assert_eq!(catalog.len(), 16);
        for key in DASHBOARD_KEYS {
            assert!(catalog.get(key).is_ok(), "missing dashboard key {key}");
        }
    }

    #[test]
    fn unknown_key_is_a_configuration_error() {
        let err = ReportCatalog::builtin().get("nope").unwrap_err();
        assert!(matches!(err, ReportError::UnknownReport(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn rejects_spec_without_metrics() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "bad".to_string(),
            ReportSpec {
                dimensions: names(&["date"]),
                ..base("bad")
            },
        );
        assert!(ReportCatalog::from_entries(entries).is_err());
    }

    #[test]
    fn rejects_order_by_outside_metrics() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "bad".to_string(),
            ReportSpec {
                dimensions: names(&["date"]),
                metrics: names(&["sessions"]),
                order_by_metric: Some("totalUsers".into()),
                ..base("bad")
            },
        );
        assert!(ReportCatalog::from_entries(entries).is_err());
    }

    #[test]
    fn rejects_pair_shape_without_compare_periods() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "bad".to_string(),
            ReportSpec {
                dimensions: names(&["pagePath"]),
                metrics: names(&["screenPageViews"]),
                postprocess: Some(ShapeTag::PagesCompare),
                ..base("bad")
            },
        );
        assert!(ReportCatalog::from_entries(entries).is_err());
    }

    #[test]
    fn rejects_video_specific_without_event_names() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "bad".to_string(),
            ReportSpec {
                special: Some(SpecialReport::VideoSpecific),
                ..base("bad")
            },
        );
        assert!(ReportCatalog::from_entries(entries).is_err());
    }

    #[test]
    fn loads_from_json() {
        let json = r#"{
            "country_pages": {
                "filename": "country_pages",
                "dimensions": ["pagePath"],
                "metrics": ["screenPageViews"],
                "filter_in": {"dimension": "country", "values": ["Brazil", "Brasil"]},
                "postprocess": "pages"
            }
        }"#;
        let catalog = ReportCatalog::from_json(json).unwrap();
        let spec = catalog.get("country_pages").unwrap();
        assert_eq!(spec.limit, DEFAULT_LIMIT);
        assert_eq!(spec.postprocess, Some(ShapeTag::Pages));
        assert_eq!(spec.filter_in.as_ref().unwrap().values.len(), 2);
    }

    #[test]
    fn json_round_trip_preserves_specs() {
        let catalog = ReportCatalog::builtin();
        let spec = catalog.get("classes_pages_compare").unwrap();
        let json = serde_json::to_string(spec).unwrap();
        let parsed: ReportSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(&parsed, spec);
    }
}
