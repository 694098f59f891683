//! Tunable constants shared read-only across every query.
//!
//! Built once alongside the [`crate::Timetable`] and held by the
//! [`crate::RaptorEngine`], mirroring `blaise`'s `MAX_ROUNDS` constant and
//! `ferrobus-core`'s `TransitModelConfig`.

use serde::{Deserialize, Serialize};

use crate::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaptorConfig {
    /// Minimum dwell time at a stop before boarding a different trip, used
    /// when the stop has no explicit per-stop interchange override
    /// (same-stop [`crate::model::Transfer`] entries are folded into this
    /// default at build time).
    ///
    /// Settles on 120s as the default (see DESIGN.md).
    pub min_interchange: Duration,

    /// Round cap for `scan_depart_after` / `scan_arrive_by`: the maximum
    /// number of trips a candidate journey may use.
    pub max_rounds: usize,

    /// Day-stacking cap for the group-station multi-day query.
    pub max_search_days: usize,

    /// Seconds shifted between consecutive service days when stitching a
    /// journey across midnight.
    pub day_rollover_offset: Duration,
}

impl Default for RaptorConfig {
    fn default() -> Self {
        Self {
            min_interchange: 120,
            max_rounds: 8,
            max_search_days: 3,
            day_rollover_offset: 86_400,
        }
    }
}
