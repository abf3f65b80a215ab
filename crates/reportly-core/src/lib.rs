pub mod catalog;
pub mod coerce;
pub mod compare;
pub mod error;
pub mod filter;
pub mod postprocess;
pub mod resolver;
pub mod runner;
pub mod source;
pub mod table;
pub mod window;

pub use catalog::{ReportCatalog, ReportSpec, SpecialReport};
pub use error::ReportError;
pub use resolver::{ReportResolver, ResolvedReport};
pub use runner::{QueryParams, QueryRunner};
pub use source::{ReportRequest, ReportSource};
pub use table::{CanonicalTable, RawTable};
pub use window::QueryWindow;
