//! Tabular values exchanged between the runner, postprocessor and sinks.

use chrono::NaiveDate;
use serde::Serialize;

/// Raw query result: string-valued cells, column order = dimensions then
/// metrics as requested. Metric coercion happens later, in the postprocessor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row, padding or truncating it to the column count so a
    /// short upstream row never shifts later cells.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }

    pub fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    /// Add a constant-valued column to every row (used to tag comparison
    /// periods when no merge rule applies).
    pub fn with_column(mut self, name: &str, value: &str) -> Self {
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(value.to_string());
        }
        self
    }

    pub fn to_records(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (col, cell) in self.columns.iter().zip(row) {
                    obj.insert(col.clone(), serde_json::Value::String(cell.clone()));
                }
                serde_json::Value::Object(obj)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    pub users: i64,
    pub sessions: i64,
    pub pageviews: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRow {
    pub page: String,
    pub pageviews: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageCompareRow {
    pub page: String,
    pub pageviews_cur: i64,
    pub pageviews_prev: i64,
    pub diff: i64,
    /// `None` whenever the previous period had zero pageviews for the page.
    pub pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRow {
    pub device: String,
    pub users: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionRow {
    pub source: String,
    pub medium: String,
    pub campaign: String,
    pub users: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayUsersRow {
    pub date: NaiveDate,
    pub users: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapRow {
    pub week: u32,
    /// 0 = Monday .. 6 = Sunday.
    pub day_of_week: u32,
    pub users: i64,
    pub day_name: String,
}

/// Single derived comparison row: current vs previous window for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareRow {
    pub metric: String,
    pub cur: f64,
    pub prev: f64,
    pub diff: f64,
    /// `None` iff `prev == 0` — never a computed infinity.
    pub pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoEventRow {
    pub date: NaiveDate,
    pub event_name: String,
    pub video_title: Option<String>,
    pub video_percent: Option<String>,
    pub event_count: i64,
}

/// Normalized output of resolving one report. One variant per output
/// schema, so the set of shapes is closed and checked at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalTable {
    Daily(Vec<DailyRow>),
    Pages(Vec<PageRow>),
    PagesCompare(Vec<PageCompareRow>),
    Devices(Vec<DeviceRow>),
    FirstUser(Vec<AcquisitionRow>),
    DaysTop(Vec<DayUsersRow>),
    WeekdayHeatmap(Vec<HeatmapRow>),
    CompareSummary(CompareRow),
    VideoEvents(Vec<VideoEventRow>),
    /// Pass-through for catalog entries without a postprocess tag.
    Raw(RawTable),
}

fn records_of<T: Serialize>(rows: &[T]) -> Result<Vec<serde_json::Value>, serde_json::Error> {
    rows.iter().map(serde_json::to_value).collect()
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        match self {
            CanonicalTable::Daily(rows) => rows.len(),
            CanonicalTable::Pages(rows) => rows.len(),
            CanonicalTable::PagesCompare(rows) => rows.len(),
            CanonicalTable::Devices(rows) => rows.len(),
            CanonicalTable::FirstUser(rows) => rows.len(),
            CanonicalTable::DaysTop(rows) => rows.len(),
            CanonicalTable::WeekdayHeatmap(rows) => rows.len(),
            CanonicalTable::CompareSummary(_) => 1,
            CanonicalTable::VideoEvents(rows) => rows.len(),
            CanonicalTable::Raw(raw) => raw.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize to JSON records; the core stays format-agnostic, sinks
    /// decide how these are written out.
    pub fn to_records(&self) -> Result<Vec<serde_json::Value>, serde_json::Error> {
        match self {
            CanonicalTable::Daily(rows) => records_of(rows),
            CanonicalTable::Pages(rows) => records_of(rows),
            CanonicalTable::PagesCompare(rows) => records_of(rows),
            CanonicalTable::Devices(rows) => records_of(rows),
            CanonicalTable::FirstUser(rows) => records_of(rows),
            CanonicalTable::DaysTop(rows) => records_of(rows),
            CanonicalTable::WeekdayHeatmap(rows) => records_of(rows),
            CanonicalTable::CompareSummary(row) => Ok(vec![serde_json::to_value(row)?]),
            CanonicalTable::VideoEvents(rows) => records_of(rows),
            CanonicalTable::Raw(raw) => Ok(raw.to_records()),
        }
    }
}
