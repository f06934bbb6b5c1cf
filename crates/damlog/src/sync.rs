//! Incremental sync planning against an append-only store.
//!
//! The store is keyed by the formatted observation timestamp. A run reads
//! the keys already present, then appends only what is missing, oldest
//! first.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::types::Observation;

/// Order of rows in an append batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// The batch to append, plus what was filtered out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub batch: Vec<Observation>,
    /// Observations whose timestamp the store already holds.
    pub already_stored: usize,
    /// Observations repeating a timestamp seen earlier in the same input.
    pub repeated: usize,
}

/// Select the observations the store does not have yet.
///
/// The result is sorted by timestamp (stable, so among equal timestamps the
/// first in source order is the one kept) and contains no key from
/// `existing` and no key twice.
pub fn plan(observations: &[Observation], existing: &HashSet<String>, order: SortOrder) -> SyncPlan {
    let mut sorted: Vec<&Observation> = observations.iter().collect();
    sorted.sort_by_key(|o| o.timestamp);

    let mut out = SyncPlan::default();
    let mut seen: HashSet<String> = HashSet::with_capacity(sorted.len());
    for obs in sorted {
        let key = obs.timestamp_key();
        if existing.contains(&key) {
            out.already_stored += 1;
            continue;
        }
        if !seen.insert(key) {
            out.repeated += 1;
            continue;
        }
        out.batch.push(obs.clone());
    }

    if order == SortOrder::Descending {
        out.batch.reverse();
    }
    out
}

/// Ascending-order shorthand for [`plan`] returning only the batch.
pub fn sync(observations: &[Observation], existing: &HashSet<String>) -> Vec<Observation> {
    plan(observations, existing, SortOrder::Ascending).batch
}

/// Store rows for a batch: fetch time, observation timestamp, then the
/// nine measurements.
pub fn to_rows(batch: &[Observation], fetched_at: DateTime<FixedOffset>) -> Vec<Vec<String>> {
    let fetched = fetched_at.to_rfc3339_opts(SecondsFormat::Secs, false);
    batch
        .iter()
        .map(|obs| {
            let mut row = Vec::with_capacity(2 + obs.measurements().len());
            row.push(fetched.clone());
            row.push(obs.timestamp_key());
            row.extend(obs.measurements().iter().map(|m| m.to_string()));
            row
        })
        .collect()
}
