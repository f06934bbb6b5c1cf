//! Lifecycle of the shared browser session.
//!
//! One browser is kept alive across runs. It is created lazily (with
//! retry), health-checked before every use, and replaced when it has died.
//! The handle sits behind a mutex so concurrent callers never establish two
//! browsers or race on a half-created one. Health reads never wait on that
//! mutex: while a session is being established it reports not alive.

use crate::renderer::{Renderer, RendererFactory};
use damlog::{AcquisitionError, RetryPolicy};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

struct Live {
    renderer: Arc<dyn Renderer>,
    created_at: Instant,
}

/// Owns the browser handle: create, health-check, dispose.
pub struct SessionManager {
    factory: Arc<dyn RendererFactory>,
    current: Mutex<Option<Live>>,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn RendererFactory>) -> Self {
        Self {
            factory,
            current: Mutex::new(None),
        }
    }

    /// Return the live session, establishing a new one if there is none or
    /// the current one stopped answering.
    ///
    /// If every attempt fails the handle stays unset, so the next call tries
    /// again from scratch.
    pub async fn ensure(&self, policy: &RetryPolicy) -> Result<Arc<dyn Renderer>, AcquisitionError> {
        let mut current = self.current.lock().await;

        if let Some(live) = current.as_ref() {
            if live.renderer.is_alive().await {
                return Ok(Arc::clone(&live.renderer));
            }
            warn!(
                age_secs = live.created_at.elapsed().as_secs(),
                "browser session is no longer alive, replacing it"
            );
            if let Some(dead) = current.take() {
                if let Err(e) = dead.renderer.shutdown().await {
                    warn!("shutting down dead browser failed: {e:#}");
                }
            }
        }

        let attempts = policy.max_attempts.max(1);
        let renderer = policy
            .run(|attempt| {
                info!(attempt, "establishing browser session");
                self.factory.establish()
            })
            .await
            .map_err(|e| AcquisitionError::SessionUnavailable {
                attempts,
                reason: format!("{e:#}"),
            })?;

        info!("browser session established");
        *current = Some(Live {
            renderer: Arc::clone(&renderer),
            created_at: Instant::now(),
        });
        Ok(renderer)
    }

    /// Whether a session exists and still answers. Returns `false` without
    /// waiting if a session is being established or replaced.
    pub async fn is_alive(&self) -> bool {
        let renderer = match self.current.try_lock() {
            Ok(current) => current.as_ref().map(|live| Arc::clone(&live.renderer)),
            Err(_) => return false,
        };
        match renderer {
            Some(renderer) => renderer.is_alive().await,
            None => false,
        }
    }

    /// Shut down and forget the current session, if any.
    pub async fn dispose(&self) {
        if let Some(live) = self.current.lock().await.take() {
            if let Err(e) = live.renderer.shutdown().await {
                warn!("browser shutdown failed: {e:#}");
            }
            info!("browser session disposed");
        }
    }
}
