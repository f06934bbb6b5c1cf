//! damlog: reservoir table normalization and incremental sync planning.
//!
//! Everything here is synchronous and clock-free except [`RetryPolicy`],
//! which sleeps between attempts. Callers pass the run year and fetch
//! time in explicitly.

pub mod error;
pub mod normalize;
pub mod retry;
pub mod sync;
pub mod types;

pub use error::{AcquisitionError, ContentShapeError, ParseError, Phase, PipelineError, SyncError};
pub use normalize::{check_shape, normalize, serial_to_month_day, NormalizeConfig, Normalizer};
pub use retry::RetryPolicy;
pub use sync::{plan, sync, to_rows, SortOrder, SyncPlan};
pub use types::*;
