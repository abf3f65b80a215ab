use std::sync::Arc;

use reportly_core::ReportResolver;

use crate::config::Config;

/// Shared handler state: the resolver (catalog + backend) and the server
/// configuration.
pub struct AppState {
    pub resolver: ReportResolver,
    pub config: Config,
}

impl AppState {
    pub fn new(resolver: ReportResolver, config: Config) -> Arc<Self> {
        Arc::new(Self { resolver, config })
    }
}
