//! Renderer abstraction for browser-based page rendering.
//!
//! A [`Renderer`] is one live browser session; each pipeline run opens its
//! own [`RenderContext`] (tab) inside it and closes the tab when done. The
//! browser engine behind it (currently Chromium via chromiumoxide) is
//! created through a [`RendererFactory`].

pub mod chromium;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Creates browser sessions.
#[async_trait]
pub trait RendererFactory: Send + Sync {
    /// Launch a new browser session.
    async fn establish(&self) -> Result<Arc<dyn Renderer>>;
}

/// A live browser session that can open isolated tabs.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a new tab.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Whether the browser still answers.
    async fn is_alive(&self) -> bool;
    /// Shut down the browser.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open tabs.
    fn active_contexts(&self) -> usize;
}

/// A single tab.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Stream of console messages logged by the page from now on.
    ///
    /// Subscribe before navigating so early messages are not missed.
    async fn ready_signal(&self) -> Result<BoxStream<'static, String>>;
    /// Navigate to a URL, failing if it takes longer than `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult>;
    /// Scroll to the end of the document so lazily painted rows render.
    async fn scroll_to_end(&self) -> Result<()>;
    /// Cell texts of every row matching `row_selector`.
    async fn read_table_grid(&self, row_selector: &str) -> Result<damlog::RawGrid>;
    /// The page's visible text.
    async fn page_text(&self) -> Result<String>;
    /// Close this tab.
    async fn close(self: Box<Self>) -> Result<()>;
}
