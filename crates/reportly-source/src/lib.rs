//! Report source backends.
//!
//! Two implementations of [`reportly_core::ReportSource`]: a live HTTP
//! client for the analytics data API and a deterministic synthetic dataset
//! for development and demos. The resolver is handed exactly one of them
//! at startup.

pub mod http;
pub mod synthetic;

pub use http::HttpReportSource;
pub use synthetic::SyntheticSource;
