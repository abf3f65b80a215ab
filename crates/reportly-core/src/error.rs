use thiserror::Error;

/// Error taxonomy for report resolution.
///
/// Configuration problems (unknown key, malformed spec or filter) fail fast
/// and are never retried. Upstream failures are propagated to the resolver,
/// which confines them to the report that triggered them.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unknown report key: {0}")]
    UnknownReport(String),

    #[error("invalid report spec `{key}`: {reason}")]
    InvalidSpec { key: String, reason: String },

    #[error("invalid filter spec: {0}")]
    InvalidFilter(String),

    #[error("invalid window: {0}")]
    InvalidWindow(String),

    #[error("postprocess error: {0}")]
    Postprocess(String),

    #[error("upstream query failed: {0}")]
    Upstream(#[source] anyhow::Error),
}

impl ReportError {
    /// Configuration errors are programmer/operator mistakes, not runtime
    /// conditions — callers surface them as 4xx, not 5xx.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, ReportError::Upstream(_))
    }
}
