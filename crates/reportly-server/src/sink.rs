//! CSV persistence for resolved reports.
//!
//! One file per report under the configured data directory. Writes go
//! through a temp file and an atomic rename so a crashed refresh never
//! leaves a half-written report behind.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use reportly_core::table::CanonicalTable;

pub fn report_path(data_dir: &str, filename: &str) -> PathBuf {
    Path::new(data_dir).join(format!("{filename}.csv"))
}

pub fn write_report(data_dir: &str, filename: &str, table: &CanonicalTable) -> anyhow::Result<PathBuf> {
    let path = report_path(data_dir, filename);
    let tmp = path.with_extension("csv.tmp");

    {
        let mut writer = csv::Writer::from_path(&tmp)
            .with_context(|| format!("failed to open {}", tmp.display()))?;
        write_rows(&mut writer, table)?;
        writer.flush()?;
    }
    std::fs::rename(&tmp, &path)
        .with_context(|| format!("failed to move report into place at {}", path.display()))?;
    Ok(path)
}

fn write_rows<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    table: &CanonicalTable,
) -> anyhow::Result<()> {
    fn typed<W: std::io::Write, T: Serialize>(
        writer: &mut csv::Writer<W>,
        rows: &[T],
    ) -> anyhow::Result<()> {
        for row in rows {
            writer.serialize(row)?;
        }
        Ok(())
    }

    match table {
        CanonicalTable::Daily(rows) => typed(writer, rows),
        CanonicalTable::Pages(rows) => typed(writer, rows),
        CanonicalTable::PagesCompare(rows) => typed(writer, rows),
        CanonicalTable::Devices(rows) => typed(writer, rows),
        CanonicalTable::FirstUser(rows) => typed(writer, rows),
        CanonicalTable::DaysTop(rows) => typed(writer, rows),
        CanonicalTable::WeekdayHeatmap(rows) => typed(writer, rows),
        CanonicalTable::CompareSummary(row) => typed(writer, std::slice::from_ref(row)),
        CanonicalTable::VideoEvents(rows) => typed(writer, rows),
        CanonicalTable::Raw(raw) => {
            writer.write_record(raw.columns())?;
            for row in raw.rows() {
                writer.write_record(row)?;
            }
            Ok(())
        }
    }
}

/// Read a persisted report back as JSON records. Cells that parse as
/// numbers come back numeric; empty cells come back as `null`.
pub fn read_report(path: &Path) -> anyhow::Result<Vec<serde_json::Value>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut obj = serde_json::Map::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            obj.insert(header.to_string(), cell_value(cell));
        }
        records.push(serde_json::Value::Object(obj));
    }
    Ok(records)
}

fn cell_value(cell: &str) -> serde_json::Value {
    if cell.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(n) = cell.parse::<i64>() {
        return serde_json::Value::Number(n.into());
    }
    if let Ok(f) = cell.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return serde_json::Value::Number(n);
        }
    }
    serde_json::Value::String(cell.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use reportly_core::table::{CompareRow, DailyRow, PageCompareRow};

    use super::*;

    fn temp_dir(tag: &str) -> String {
        let dir = std::env::temp_dir().join(format!("reportly-sink-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.to_string_lossy().into_owned()
    }

    #[test]
    fn daily_report_round_trips() {
        let dir = temp_dir("daily");
        let table = CanonicalTable::Daily(vec![
            DailyRow {
                date: NaiveDate::from_ymd_opt(2024, 3, 29).unwrap(),
                users: 12,
                sessions: 15,
                pageviews: 40,
            },
            DailyRow {
                date: NaiveDate::from_ymd_opt(2024, 3, 30).unwrap(),
                users: 9,
                sessions: 11,
                pageviews: 31,
            },
        ]);

        let path = write_report(&dir, "kpis_daily", &table).unwrap();
        let records = read_report(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["date"], "2024-03-29");
        assert_eq!(records[0]["users"], 12);
    }

    #[test]
    fn null_pct_round_trips_as_null() {
        let dir = temp_dir("pct");
        let table = CanonicalTable::PagesCompare(vec![PageCompareRow {
            page: "/novo".into(),
            pageviews_cur: 10,
            pageviews_prev: 0,
            diff: 10,
            pct: None,
        }]);

        let path = write_report(&dir, "pages_compare", &table).unwrap();
        let records = read_report(&path).unwrap();
        assert_eq!(records[0]["pct"], serde_json::Value::Null);
    }

    #[test]
    fn compare_summary_writes_one_row() {
        let dir = temp_dir("summary");
        let table = CanonicalTable::CompareSummary(CompareRow {
            metric: "sessions".into(),
            cur: 120.0,
            prev: 100.0,
            diff: 20.0,
            pct: Some(20.0),
        });

        let path = write_report(&dir, "sessions_compare", &table).unwrap();
        let records = read_report(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["metric"], "sessions");
        assert_eq!(records[0]["pct"], 20.0);
    }
}
