//! Fake renderer and store shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use damlog::{RawGrid, RetryPolicy, SyncError};
use damlog_runtime::acquisition::{table, AcquisitionGate, SessionManager};
use damlog_runtime::config::{Config, SourceConfig};
use damlog_runtime::pipeline::Pipeline;
use damlog_runtime::renderer::{NavigationResult, RenderContext, Renderer, RendererFactory};
use damlog_runtime::store::Store;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Page builders ──

const MEASUREMENTS: [&str; 9] = [
    "210.5", "12,345", "80.1", "75.0", "60.2", "3.45", "2.10", "0", "12",
];

/// One 11-cell table row.
pub fn row(date: &str, time: &str) -> String {
    let mut cells = format!("<td>{date}</td><td>{time}</td>");
    for v in MEASUREMENTS {
        cells.push_str(&format!("<td>{v}</td>"));
    }
    format!("<tr>{cells}</tr>")
}

/// A page titled like the real one, with `rows` in its table body.
pub fn page(rows: &[String]) -> String {
    format!(
        "<html><body><h1>宇奈月ダム 貯水位・流量</h1>\
         <table><thead><tr><th>日付</th><th>時刻</th></tr></thead>\
         <tbody>{}</tbody></table></body></html>",
        rows.concat()
    )
}

/// Store row written for an observation at `key`.
pub fn stored_row(fetched_at: &str, key: &str) -> Vec<String> {
    let mut row = vec![fetched_at.to_string(), key.to_string()];
    row.extend(MEASUREMENTS.iter().map(|s| s.to_string()));
    row
}

pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// 2025-03-11 09:15 JST.
pub fn now() -> DateTime<FixedOffset> {
    jst().with_ymd_and_hms(2025, 3, 11, 9, 15, 0).unwrap()
}

pub const FETCHED_AT: &str = "2025-03-11T09:15:00+09:00";

// ── Fake browser ──

#[derive(Default)]
pub struct SiteState {
    html: Mutex<String>,
    console: Mutex<Vec<String>>,
    fail_navigation: AtomicBool,
    launch_failures: AtomicU32,
    launches: AtomicU32,
    open_tabs: AtomicUsize,
}

/// A scripted website plus the browser that renders it.
#[derive(Clone, Default)]
pub struct FakeSite(Arc<SiteState>);

impl FakeSite {
    pub fn serving(html: String) -> Self {
        let site = Self::default();
        site.set_html(html);
        site
    }

    pub fn set_html(&self, html: String) {
        *self.0.html.lock().unwrap() = html;
    }

    /// Console messages the page logs after navigation.
    pub fn set_console(&self, messages: &[&str]) {
        *self.0.console.lock().unwrap() = messages.iter().map(|s| s.to_string()).collect();
    }

    pub fn fail_navigation(&self, fail: bool) {
        self.0.fail_navigation.store(fail, Ordering::SeqCst);
    }

    /// Make the next `n` browser launches fail.
    pub fn fail_launches(&self, n: u32) {
        self.0.launch_failures.store(n, Ordering::SeqCst);
    }

    pub fn launches(&self) -> u32 {
        self.0.launches.load(Ordering::SeqCst)
    }

    pub fn open_tabs(&self) -> usize {
        self.0.open_tabs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RendererFactory for FakeSite {
    async fn establish(&self) -> anyhow::Result<Arc<dyn Renderer>> {
        self.0.launches.fetch_add(1, Ordering::SeqCst);
        let remaining = self.0.launch_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.0.launch_failures.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("Chromium exited during startup");
        }
        Ok(Arc::new(FakeRenderer { site: self.clone() }))
    }
}

struct FakeRenderer {
    site: FakeSite,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self) -> anyhow::Result<Box<dyn RenderContext>> {
        self.site.0.open_tabs.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTab {
            site: self.site.clone(),
            loaded: None,
        }))
    }

    async fn is_alive(&self) -> bool {
        true
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.site.open_tabs()
    }
}

struct FakeTab {
    site: FakeSite,
    loaded: Option<String>,
}

#[async_trait]
impl RenderContext for FakeTab {
    async fn ready_signal(&self) -> anyhow::Result<BoxStream<'static, String>> {
        let messages = self.site.0.console.lock().unwrap().clone();
        Ok(stream::iter(messages).boxed())
    }

    async fn navigate(&mut self, url: &str, _timeout: Duration) -> anyhow::Result<NavigationResult> {
        if self.site.0.fail_navigation.load(Ordering::SeqCst) {
            anyhow::bail!("net::ERR_CONNECTION_REFUSED");
        }
        self.loaded = Some(self.site.0.html.lock().unwrap().clone());
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 1,
        })
    }

    async fn scroll_to_end(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn read_table_grid(&self, row_selector: &str) -> anyhow::Result<RawGrid> {
        table::parse_grid(self.loaded.as_deref().unwrap_or_default(), row_selector)
    }

    async fn page_text(&self) -> anyhow::Result<String> {
        Ok(table::document_text(self.loaded.as_deref().unwrap_or_default()))
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.site.0.open_tabs.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Fake store ──

/// Rows kept in memory; column B is the key, as in the sheet.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Vec<String>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    appends: AtomicU32,
}

impl MemoryStore {
    pub fn with_rows(rows: Vec<Vec<String>>) -> Arc<Self> {
        let store = Self::default();
        *store.rows.lock().unwrap() = rows;
        Arc::new(store)
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.rows().into_iter().map(|r| r[1].clone()).collect()
    }

    pub fn appends(&self) -> u32 {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn query_existing_timestamps(&self) -> Result<HashSet<String>, SyncError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::Status {
                status: 503,
                body: "backend unavailable".into(),
            });
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.get(1).cloned())
            .collect())
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), SyncError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("connection reset".into()));
        }
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(())
    }
}

// ── Wiring ──

pub fn source() -> SourceConfig {
    let mut source = Config::default().source;
    source.ready_budget = Duration::from_millis(50);
    source.ready_grace = Duration::from_millis(1);
    source.navigation_timeout = Duration::from_secs(5);
    source
}

pub fn pipeline(site: &FakeSite, store: &Arc<MemoryStore>) -> Pipeline {
    let store: Arc<dyn Store> = store.clone();
    Pipeline::new(
        AcquisitionGate::new(source(), RetryPolicy::new(3, Duration::from_millis(1))),
        Arc::new(SessionManager::new(Arc::new(site.clone()))),
        store,
        jst(),
    )
}
