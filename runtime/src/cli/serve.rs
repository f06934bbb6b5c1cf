//! Run the HTTP service until Ctrl-C.

use crate::audit::DiagnosticLog;
use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::rest::{self, AppState};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Start the service: warm the browser session, then serve HTTP.
///
/// A failed warm-up is not fatal; the first sync establishes the session
/// again under the same retry policy.
pub async fn run(config: Config, log: DiagnosticLog) -> Result<()> {
    info!("starting damlog v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let sessions = Arc::clone(pipeline.sessions());

    match sessions.ensure(&config.session_retry).await {
        Ok(_) => info!("browser session ready"),
        Err(e) => warn!("browser warm-up failed, will retry on first sync: {e}"),
    }

    let state = Arc::new(AppState { pipeline, log });
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
    };

    let result = rest::start(config.port, state, shutdown).await;

    sessions.dispose().await;
    info!("damlog stopped");
    result
}
