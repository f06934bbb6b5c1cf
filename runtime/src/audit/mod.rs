//! Diagnostic log retained in memory for the `/getlog` endpoint.

pub mod logger;

pub use logger::{DiagnosticLayer, DiagnosticLog, LogEntry};
