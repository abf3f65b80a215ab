//! Live analytics API backend.
//!
//! Translates a [`ReportRequest`] into the property-scoped `runReport`
//! wire format and the JSON response back into a [`RawTable`]. One HTTP
//! call per page; pagination and retries live upstream.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use reportly_core::filter::FilterExpr;
use reportly_core::source::{ReportRequest, ReportSource};
use reportly_core::table::RawTable;

/// Longest error-body excerpt carried into an error message.
const BODY_SNIPPET_LEN: usize = 300;

pub struct HttpReportSource {
    client: reqwest::Client,
    base_url: String,
    property_id: String,
}

impl HttpReportSource {
    pub fn new(
        base_url: impl Into<String>,
        property_id: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            property_id: property_id.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/properties/{}:runReport",
            self.base_url, self.property_id
        )
    }
}

#[async_trait::async_trait]
impl ReportSource for HttpReportSource {
    async fn run_report(&self, req: &ReportRequest) -> anyhow::Result<RawTable> {
        let body = RunReportBody::from_request(req);
        let url = self.endpoint();
        tracing::debug!(
            %url,
            dimensions = ?req.dimensions,
            metrics = ?req.metrics,
            offset = req.offset,
            "running report page"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("report request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(BODY_SNIPPET_LEN).collect();
            anyhow::bail!("analytics API returned {status}: {snippet}");
        }

        let parsed: RunReportResponse = response
            .json()
            .await
            .context("malformed report response")?;
        parsed.into_table(req)
    }
}

// ---- wire types ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReportBody {
    date_ranges: Vec<WireDateRange>,
    dimensions: Vec<WireName>,
    metrics: Vec<WireName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimension_filter: Option<WireFilterExpr>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    order_bys: Vec<WireOrderBy>,
    limit: usize,
    offset: usize,
}

impl RunReportBody {
    fn from_request(req: &ReportRequest) -> Self {
        Self {
            date_ranges: vec![WireDateRange {
                start_date: req.window.start.format("%Y-%m-%d").to_string(),
                end_date: req.window.end.format("%Y-%m-%d").to_string(),
            }],
            dimensions: req.dimensions.iter().map(WireName::from).collect(),
            metrics: req.metrics.iter().map(WireName::from).collect(),
            dimension_filter: req.filter.as_ref().map(wire_filter),
            order_bys: req
                .order_by
                .iter()
                .map(|metric| WireOrderBy {
                    metric: WireMetricOrder {
                        metric_name: metric.clone(),
                    },
                    desc: true,
                })
                .collect(),
            limit: req.limit,
            offset: req.offset,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDateRange {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Serialize)]
struct WireName {
    name: String,
}

impl From<&String> for WireName {
    fn from(name: &String) -> Self {
        Self { name: name.clone() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireOrderBy {
    metric: WireMetricOrder,
    desc: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMetricOrder {
    metric_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireFilterExpr {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<WireFieldFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    and_group: Option<WireFilterList>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireFilterList {
    expressions: Vec<WireFilterExpr>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireFieldFilter {
    field_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_list_filter: Option<WireInListFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    string_filter: Option<WireStringFilter>,
}

#[derive(Debug, Serialize)]
struct WireInListFilter {
    values: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireStringFilter {
    match_type: &'static str,
    value: String,
    case_sensitive: bool,
}

fn wire_filter(expr: &FilterExpr) -> WireFilterExpr {
    match expr {
        FilterExpr::InList { dimension, values } => WireFilterExpr {
            filter: Some(WireFieldFilter {
                field_name: dimension.clone(),
                in_list_filter: Some(WireInListFilter {
                    values: values.clone(),
                }),
                string_filter: None,
            }),
            and_group: None,
        },
        FilterExpr::Contains {
            dimension,
            substring,
        } => WireFilterExpr {
            filter: Some(WireFieldFilter {
                field_name: dimension.clone(),
                in_list_filter: None,
                string_filter: Some(WireStringFilter {
                    match_type: "CONTAINS",
                    value: substring.clone(),
                    case_sensitive: false,
                }),
            }),
            and_group: None,
        },
        FilterExpr::And(parts) => WireFilterExpr {
            filter: None,
            and_group: Some(WireFilterList {
                expressions: parts.iter().map(wire_filter).collect(),
            }),
        },
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunReportResponse {
    #[serde(default)]
    dimension_headers: Vec<WireHeader>,
    #[serde(default)]
    metric_headers: Vec<WireHeader>,
    #[serde(default)]
    rows: Vec<WireRow>,
}

#[derive(Debug, Deserialize)]
struct WireHeader {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRow {
    #[serde(default)]
    dimension_values: Vec<WireValue>,
    #[serde(default)]
    metric_values: Vec<WireValue>,
}

#[derive(Debug, Deserialize)]
struct WireValue {
    #[serde(default)]
    value: String,
}

impl RunReportResponse {
    /// Re-order response columns into request order. The API echoes
    /// headers in request order in practice, but the lookup is by name so
    /// a reordering upstream cannot silently shift values.
    fn into_table(self, req: &ReportRequest) -> anyhow::Result<RawTable> {
        let dim_index = |name: &str| {
            self.dimension_headers
                .iter()
                .position(|h| h.name == name)
                .with_context(|| format!("response is missing dimension `{name}`"))
        };
        let metric_index = |name: &str| {
            self.metric_headers
                .iter()
                .position(|h| h.name == name)
                .with_context(|| format!("response is missing metric `{name}`"))
        };

        let dim_order = req
            .dimensions
            .iter()
            .map(|d| dim_index(d))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let metric_order = req
            .metrics
            .iter()
            .map(|m| metric_index(m))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let columns: Vec<String> = req
            .dimensions
            .iter()
            .chain(req.metrics.iter())
            .cloned()
            .collect();
        let mut table = RawTable::new(columns);
        for row in &self.rows {
            let mut cells = Vec::with_capacity(dim_order.len() + metric_order.len());
            for &i in &dim_order {
                cells.push(row.dimension_values.get(i).map_or_else(String::new, |v| v.value.clone()));
            }
            for &i in &metric_order {
                cells.push(row.metric_values.get(i).map_or_else(String::new, |v| v.value.clone()));
            }
            table.push_row(cells);
        }
        Ok(table)
    }
}
