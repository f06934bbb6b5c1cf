//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, RenderContext, Renderer, RendererFactory};
use crate::acquisition::table;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetCacheDisabledParams;
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::page::Page;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// How long a liveness check may take before the browser counts as dead.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    // 1. configured path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // 2. ~/.damlog/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = [
            home.join(".damlog/chromium/chrome-linux64/chrome"),
            home.join(".damlog/chromium/chrome"),
        ];
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Launches headless Chromium sessions.
pub struct ChromiumFactory {
    chromium_path: Option<PathBuf>,
}

impl ChromiumFactory {
    pub fn new(chromium_path: Option<PathBuf>) -> Self {
        Self { chromium_path }
    }
}

#[async_trait]
impl RendererFactory for ChromiumFactory {
    async fn establish(&self) -> Result<Arc<dyn Renderer>> {
        let renderer = ChromiumRenderer::launch(self.chromium_path.as_ref()).await?;
        Ok(Arc::new(renderer))
    }
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn launch(chromium_path: Option<&PathBuf>) -> Result<Self> {
        let chrome_path = find_chromium(chromium_path)
            .context("Chromium not found. Set DAMLOG_CHROMIUM_PATH or install Chromium.")?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--no-zygote")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // The handler drives the CDP connection; it ends when the browser goes away.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("chromium handler: {e}");
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn is_alive(&self) -> bool {
        if self.handler.is_finished() {
            return false;
        }
        let browser = self.browser.lock().await;
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, browser.version()).await,
            Ok(Ok(_))
        )
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let result = browser.close().await;
        self.handler.abort();
        result.map(|_| ()).context("failed to close Chromium")
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))
    }
}

/// Render a console call's arguments the way devtools prints them.
fn console_text(event: &EventConsoleApiCalled) -> String {
    event
        .args
        .iter()
        .filter_map(|arg| match &arg.value {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => arg.description.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn ready_signal(&self) -> Result<BoxStream<'static, String>> {
        let events = self
            .page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .context("failed to subscribe to console events")?;
        Ok(events.map(|event| console_text(&event)).boxed())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult> {
        if let Err(e) = self.page.execute(SetCacheDisabledParams::new(true)).await {
            tracing::debug!("could not disable page cache: {e}");
        }

        let start = Instant::now();
        let result = tokio::time::timeout(timeout, async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(())) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {}ms", timeout.as_millis()),
        }
    }

    async fn scroll_to_end(&self) -> Result<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .context("scroll failed")?;
        Ok(())
    }

    async fn read_table_grid(&self, row_selector: &str) -> Result<damlog::RawGrid> {
        let html = self.html().await?;
        table::parse_grid(&html, row_selector)
    }

    async fn page_text(&self) -> Result<String> {
        let html = self.html().await?;
        Ok(table::document_text(&html))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}
