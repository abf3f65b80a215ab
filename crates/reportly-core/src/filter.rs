//! Compound dimension filter construction.

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Exact-membership filter: dimension value must be in `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterIn {
    pub dimension: String,
    pub values: Vec<String>,
}

/// Case-insensitive substring filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterContains {
    pub dimension: String,
    pub contains: String,
}

/// A compound boolean filter expression handed to the report source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    InList {
        dimension: String,
        values: Vec<String>,
    },
    Contains {
        dimension: String,
        substring: String,
    },
    And(Vec<FilterExpr>),
}

/// Combine the two optional filter specs into a single expression.
///
/// Both present → AND of both; one → that one alone; neither → `None`
/// (match all rows). A malformed spec is a configuration error.
pub fn build(
    filter_in: Option<&FilterIn>,
    filter_contains: Option<&FilterContains>,
) -> Result<Option<FilterExpr>, ReportError> {
    let f_in = filter_in.map(in_list).transpose()?;
    let f_ct = filter_contains.map(contains).transpose()?;

    Ok(match (f_in, f_ct) {
        (Some(a), Some(b)) => Some(FilterExpr::And(vec![a, b])),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    })
}

fn in_list(spec: &FilterIn) -> Result<FilterExpr, ReportError> {
    if spec.dimension.trim().is_empty() {
        return Err(ReportError::InvalidFilter(
            "filter_in requires a dimension name".into(),
        ));
    }
    if spec.values.is_empty() {
        return Err(ReportError::InvalidFilter(format!(
            "filter_in on `{}` requires at least one value",
            spec.dimension
        )));
    }
    Ok(FilterExpr::InList {
        dimension: spec.dimension.clone(),
        values: spec.values.clone(),
    })
}

fn contains(spec: &FilterContains) -> Result<FilterExpr, ReportError> {
    if spec.dimension.trim().is_empty() {
        return Err(ReportError::InvalidFilter(
            "filter_contains requires a dimension name".into(),
        ));
    }
    if spec.contains.is_empty() {
        return Err(ReportError::InvalidFilter(format!(
            "filter_contains on `{}` requires a non-empty substring",
            spec.dimension
        )));
    }
    Ok(FilterExpr::Contains {
        dimension: spec.dimension.clone(),
        substring: spec.contains.clone(),
    })
}

impl FilterExpr {
    /// Evaluate the expression against a row, where `get` looks up a
    /// dimension value by name. A missing dimension never matches.
    /// Used by in-process sources and tests; the HTTP source translates
    /// the expression to the wire format instead.
    pub fn matches(&self, get: &dyn Fn(&str) -> Option<String>) -> bool {
        match self {
            FilterExpr::InList { dimension, values } => get(dimension)
                .map(|v| values.iter().any(|candidate| candidate == &v))
                .unwrap_or(false),
            FilterExpr::Contains {
                dimension,
                substring,
            } => get(dimension)
                .map(|v| v.to_lowercase().contains(&substring.to_lowercase()))
                .unwrap_or(false),
            FilterExpr::And(parts) => parts.iter().all(|p| p.matches(get)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn country_filter() -> FilterIn {
        FilterIn {
            dimension: "country".into(),
            values: vec!["Brazil".into()],
        }
    }

    fn classes_filter() -> FilterContains {
        FilterContains {
            dimension: "pagePath".into(),
            contains: "/classes".into(),
        }
    }

    #[test]
    fn both_specs_combine_with_and() {
        let expr = build(Some(&country_filter()), Some(&classes_filter()))
            .unwrap()
            .unwrap();
        match expr {
            FilterExpr::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn single_spec_used_alone() {
        let expr = build(None, Some(&classes_filter())).unwrap().unwrap();
        assert!(matches!(expr, FilterExpr::Contains { .. }));
    }

    #[test]
    fn no_specs_means_no_filter() {
        assert_eq!(build(None, None).unwrap(), None);
    }

    #[test]
    fn malformed_spec_fails_fast() {
        let bad = FilterIn {
            dimension: "country".into(),
            values: vec![],
        };
        assert!(build(Some(&bad), None).is_err());

        let bad = FilterContains {
            dimension: "".into(),
            contains: "/classes".into(),
        };
        assert!(build(None, Some(&bad)).is_err());
    }

    #[test]
    fn contains_is_case_insensitive() {
        let expr = build(None, Some(&classes_filter())).unwrap().unwrap();
        let get = |name: &str| (name == "pagePath").then(|| "/CLASSES/algebra".to_string());
        assert!(expr.matches(&get));
    }

    #[test]
    fn in_list_is_exact_membership() {
        let expr = build(Some(&country_filter()), None).unwrap().unwrap();
        let brazil = |name: &str| (name == "country").then(|| "Brazil".to_string());
        let brasil = |name: &str| (name == "country").then(|| "Brasil".to_string());
        assert!(expr.matches(&brazil));
        assert!(!expr.matches(&brasil));
    }

    #[test]
    fn and_requires_all_parts() {
        let expr = build(Some(&country_filter()), Some(&classes_filter()))
            .unwrap()
            .unwrap();
        let get = |name: &str| match name {
            "country" => Some("Brazil".to_string()),
            "pagePath" => Some("/blog".to_string()),
            _ => None,
        };
        assert!(!expr.matches(&get));
    }
}
