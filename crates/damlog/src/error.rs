//! Error types for the acquisition → normalization → sync pipeline.

use serde::Serialize;

/// The pipeline phase an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Acquisition,
    Shape,
    Sync,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Acquisition => write!(f, "acquisition"),
            Phase::Shape => write!(f, "shape"),
            Phase::Sync => write!(f, "sync"),
        }
    }
}

/// The rendered table could not be obtained.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("session could not be established after {attempts} attempts: {reason}")]
    SessionUnavailable { attempts: u32, reason: String },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("page could not be read: {0}")]
    Read(String),
}

/// The rendered content is not the page this pipeline expects.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentShapeError {
    #[error("rendered table has no rows")]
    EmptyGrid,

    #[error("page identity marker {marker:?} not found in rendered text")]
    MarkerMissing { marker: String },
}

/// A single row could not be normalized. Always recovered by skipping the row.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("row {row} skipped: {reason}")]
pub struct ParseError {
    pub row: usize,
    pub reason: String,
}

/// The store could not be read or written.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("store request failed: {0}")]
    Transport(String),

    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("store response could not be decoded: {0}")]
    Decode(String),

    #[error("store access token unavailable: {0}")]
    Auth(String),
}

/// A run-fatal failure, tagged with the phase that produced it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Shape(#[from] ContentShapeError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl PipelineError {
    pub fn phase(&self) -> Phase {
        match self {
            PipelineError::Acquisition(_) => Phase::Acquisition,
            PipelineError::Shape(_) => Phase::Shape,
            PipelineError::Sync(_) => Phase::Sync,
        }
    }
}
