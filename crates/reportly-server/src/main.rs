use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use reportly_core::{ReportCatalog, ReportResolver, ReportSource};
use reportly_server::config::{Config, SourceKind};
use reportly_server::state::AppState;
use reportly_source::{HttpReportSource, SyntheticSource};

#[tokio::main]
async fn main() -> Result<()> {
    // Structured JSON logging. Level controlled via RUST_LOG env var.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reportly=info".parse()?),
        )
        .json()
        .init();

    let cfg = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Reports are persisted as CSV under the data directory.
    std::fs::create_dir_all(&cfg.data_dir)?;

    let source: Arc<dyn ReportSource> = match &cfg.source {
        SourceKind::Live(property_id) => {
            info!(api_url = %cfg.api_url, property_id = %property_id, "using live report source");
            Arc::new(HttpReportSource::new(
                cfg.api_url.clone(),
                property_id.clone(),
                cfg.request_timeout(),
            )?)
        }
        SourceKind::Synthetic => {
            info!(seed = cfg.seed, "using synthetic report source");
            Arc::new(SyntheticSource::new(cfg.seed))
        }
    };

    let resolver = ReportResolver::new(ReportCatalog::builtin(), source);
    let state = AppState::new(resolver, cfg.clone());

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = reportly_server::app::build_app(state);

    info!(port = cfg.port, data_dir = %cfg.data_dir, "reportly listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
