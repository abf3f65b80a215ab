//! Lenient numeric coercion at the system boundary.
//!
//! The reporting API delivers every metric as a string, and analytics
//! exports routinely contain placeholders like `"N/A"` or empty cells.
//! Coercion never fails: anything unparseable becomes 0 and is logged at
//! warn level. All internal computation works on real numbers.

use chrono::NaiveDate;

/// Parse a raw metric value, defaulting to 0 on anything non-numeric.
pub fn coerce_metric(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            tracing::warn!(value = trimmed, "non-numeric metric value coerced to 0");
            0.0
        }
    }
}

/// Parse a date dimension value. The reporting API returns `YYYYMMDD`;
/// file-based sources use ISO `YYYY-MM-DD`. Both are accepted.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_numbers_pass_through() {
        assert_eq!(coerce_metric("42"), 42.0);
        assert_eq!(coerce_metric(" 3.5 "), 3.5);
        assert_eq!(coerce_metric("-7"), -7.0);
    }

    #[test]
    fn placeholders_become_zero() {
        assert_eq!(coerce_metric(""), 0.0);
        assert_eq!(coerce_metric("N/A"), 0.0);
        assert_eq!(coerce_metric("None"), 0.0);
        assert_eq!(coerce_metric("  "), 0.0);
        assert_eq!(coerce_metric("12abc"), 0.0);
    }

    #[test]
    fn non_finite_becomes_zero() {
        assert_eq!(coerce_metric("NaN"), 0.0);
        assert_eq!(coerce_metric("inf"), 0.0);
    }

    #[test]
    fn both_date_formats_accepted() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("20240115"), Some(expected));
        assert_eq!(parse_date("2024-01-15"), Some(expected));
        assert_eq!(parse_date("yesterday"), None);
    }
}
