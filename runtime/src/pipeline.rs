//! One sync run: acquire → check shape → normalize → plan → append.

use crate::acquisition::{Acquired, AcquisitionGate, Readiness, SessionManager};
use crate::config::{Config, ConfigError};
use crate::renderer::chromium::ChromiumFactory;
use crate::store::{SheetsStore, Store};
use chrono::{DateTime, Datelike, FixedOffset, SecondsFormat, Utc};
use damlog::{check_shape, normalize, plan, to_rows, PipelineError, SortOrder};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, Instrument};

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Plan the batch but do not append it.
    pub dry_run: bool,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub fetched_at: String,
    /// Page address after redirects.
    pub final_url: String,
    pub readiness: Readiness,
    /// Rows in the rendered table.
    pub rows_read: usize,
    /// Rows that normalized into observations.
    pub observed: usize,
    /// Rows dropped by the normalizer.
    pub skipped: usize,
    /// Observations the store already had.
    pub duplicates: usize,
    /// Rows written (or that would be written, on a dry run).
    pub appended: usize,
    pub dry_run: bool,
}

/// Runs the sync pipeline against a shared browser session and a store.
pub struct Pipeline {
    gate: AcquisitionGate,
    sessions: Arc<SessionManager>,
    store: Arc<dyn Store>,
    utc_offset: FixedOffset,
    /// Held for a whole run, so no two runs plan against the same existing keys.
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        gate: AcquisitionGate,
        sessions: Arc<SessionManager>,
        store: Arc<dyn Store>,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            gate,
            sessions,
            store,
            utc_offset,
            run_lock: Mutex::new(()),
        }
    }

    /// Headless Chromium for rendering, Google Sheets for storage.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.require_store()?;
        let factory = Arc::new(ChromiumFactory::new(config.chromium_path.clone()));
        Ok(Self::new(
            AcquisitionGate::new(config.source.clone(), config.session_retry),
            Arc::new(SessionManager::new(factory)),
            Arc::new(SheetsStore::new(config.store.clone())),
            config.utc_offset,
        ))
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Run once, reading the clock now.
    pub async fn run(&self, options: RunOptions) -> Result<RunReport, PipelineError> {
        let now = Utc::now().with_timezone(&self.utc_offset);
        self.run_at(now, options).await
    }

    /// Run once as if the clock read `now`. `now` supplies the year for
    /// date cells and the fetch timestamp written with every row.
    pub async fn run_at(
        &self,
        now: DateTime<FixedOffset>,
        options: RunOptions,
    ) -> Result<RunReport, PipelineError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", run_id = %run_id);
        async {
            let _guard = self.run_lock.lock().await;
            info!(dry_run = options.dry_run, "sync run started");

            let acquired = self.gate.acquire(&self.sessions).await?;
            let report = self.sync(run_id.clone(), now, acquired, options).await?;

            info!(
                appended = report.appended,
                duplicates = report.duplicates,
                skipped = report.skipped,
                "sync run finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn sync(
        &self,
        run_id: String,
        now: DateTime<FixedOffset>,
        acquired: Acquired,
        options: RunOptions,
    ) -> Result<RunReport, PipelineError> {
        let source = self.gate.source();
        check_shape(&acquired.grid, &acquired.page_text, &source.page_marker)?;

        let normalized = normalize(&acquired.grid, &source.normalize_config(now.year()));
        let existing = self.store.query_existing_timestamps().await?;
        let planned = plan(&normalized.observations, &existing, SortOrder::Ascending);

        if !planned.batch.is_empty() && !options.dry_run {
            self.store.append_rows(&to_rows(&planned.batch, now)).await?;
        }

        Ok(RunReport {
            run_id,
            fetched_at: now.to_rfc3339_opts(SecondsFormat::Secs, false),
            final_url: acquired.final_url,
            readiness: acquired.readiness,
            rows_read: acquired.grid.len(),
            observed: normalized.observations.len(),
            skipped: normalized.skipped.len(),
            duplicates: planned.already_stored + planned.repeated,
            appended: planned.batch.len(),
            dry_run: options.dry_run,
        })
    }
}
