//! Page acquisition: browser session lifecycle, rendering, and table
//! extraction.

pub mod gate;
pub mod session;
pub mod table;

pub use gate::{wait_ready, Acquired, AcquisitionGate, Readiness};
pub use session::SessionManager;
