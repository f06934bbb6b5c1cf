//! Acquisition gate: render the source page and read its table.

use super::session::SessionManager;
use crate::config::SourceConfig;
use crate::renderer::RenderContext;
use damlog::{AcquisitionError, RawGrid, RetryPolicy};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How the content-ready wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// The page logged the ready marker.
    Signalled,
    /// The marker never came; the grace period was waited out instead.
    GraceElapsed,
}

/// The raw material of one run.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub grid: RawGrid,
    pub page_text: String,
    pub readiness: Readiness,
    pub final_url: String,
}

/// Wait until `signal` yields a message containing `marker`, for at most
/// `budget`. Falls back to sleeping `grace` if it does not.
///
/// Readiness is best-effort: this never fails.
pub async fn wait_ready(
    mut signal: BoxStream<'static, String>,
    marker: &str,
    budget: Duration,
    grace: Duration,
) -> Readiness {
    let seen = tokio::time::timeout(budget, async {
        while let Some(message) = signal.next().await {
            if message.contains(marker) {
                return true;
            }
        }
        false
    })
    .await;

    match seen {
        Ok(true) => Readiness::Signalled,
        _ => {
            debug!(grace_ms = grace.as_millis() as u64, "ready marker not seen, waiting grace period");
            tokio::time::sleep(grace).await;
            Readiness::GraceElapsed
        }
    }
}

/// Obtains the raw grid from the renderer.
pub struct AcquisitionGate {
    source: SourceConfig,
    session_retry: RetryPolicy,
}

impl AcquisitionGate {
    pub fn new(source: SourceConfig, session_retry: RetryPolicy) -> Self {
        Self {
            source,
            session_retry,
        }
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    /// Render the configured page in a fresh tab of the shared session and
    /// read its table. The tab is closed whatever the outcome; the session
    /// stays up for the next run.
    pub async fn acquire(&self, sessions: &SessionManager) -> Result<Acquired, AcquisitionError> {
        let renderer = sessions.ensure(&self.session_retry).await?;
        let mut ctx = renderer
            .new_context()
            .await
            .map_err(|e| AcquisitionError::Read(format!("could not open tab: {e:#}")))?;

        let result = self.acquire_in(ctx.as_mut()).await;
        if let Err(e) = ctx.close().await {
            warn!("closing tab failed: {e:#}");
        }
        result
    }

    async fn acquire_in(&self, ctx: &mut dyn RenderContext) -> Result<Acquired, AcquisitionError> {
        let url = &self.source.url;
        let navigation_error = |e: anyhow::Error| AcquisitionError::Navigation {
            url: url.clone(),
            reason: format!("{e:#}"),
        };

        let signal = match ctx.ready_signal().await {
            Ok(signal) => signal,
            Err(e) => {
                warn!("ready signal unavailable, relying on grace period: {e:#}");
                futures::stream::empty::<String>().boxed()
            }
        };

        let nav = ctx
            .navigate(url, self.source.navigation_timeout)
            .await
            .map_err(navigation_error)?;
        info!(url = %nav.final_url, load_time_ms = nav.load_time_ms, "page loaded");

        if let Err(e) = ctx.scroll_to_end().await {
            debug!("scroll failed: {e:#}");
        }

        let readiness = wait_ready(
            signal,
            &self.source.ready_marker,
            self.source.ready_budget,
            self.source.ready_grace,
        )
        .await;

        let grid = ctx
            .read_table_grid(&self.source.row_selector)
            .await
            .map_err(|e| AcquisitionError::Read(format!("{e:#}")))?;
        let page_text = ctx
            .page_text()
            .await
            .map_err(|e| AcquisitionError::Read(format!("{e:#}")))?;

        info!(rows = grid.len(), ?readiness, "table read");
        Ok(Acquired {
            grid,
            page_text,
            readiness,
            final_url: nav.final_url,
        })
    }
}
