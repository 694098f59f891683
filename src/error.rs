//! Error types for the RAPTOR core.
//!
//! A single enum covers both load-time failures (which abort preparation)
//! and per-request failures (which are returned to the caller without
//! touching the shared [`crate::RaptorEngine`] state).

use thiserror::Error;

use crate::model::StopId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RaptorError {
    /// The feed failed a structural invariant at preparation time
    /// (non-monotonic stop-times, unresolved `service_id`, a trip with
    /// fewer than two stop-times, ...). The engine refuses to build.
    #[error("malformed feed: {0}")]
    MalformedFeed(String),

    /// A query referenced a stop id absent from the timetable. Reported
    /// to the caller, not treated as fatal; the caller decides whether to
    /// drop the stop or abort.
    #[error("unknown stop id: {0}")]
    UnknownStop(StopId),

    /// A route index, trip index, or round index was out of the bounds
    /// established at preparation time. Always a programming error.
    #[error("invalid route index {0}")]
    InvalidRoute(u32),
    #[error("invalid trip index {0}")]
    InvalidTrip(u32),

    /// The result factory tried to extract a leg whose recorded boarding
    /// position does not precede its alighting position in trip order.
    /// A programming error, fatal within the request, never silently
    /// corrected.
    #[error("invalid subsequence: board position {board_pos} does not precede alight position {alight_pos} on trip {trip}")]
    InvalidSubsequence {
        trip: u32,
        board_pos: usize,
        alight_pos: usize,
    },

    /// `reMatch` found no trip realising `leg_index`'s stop sequence at
    /// the requested anchor. The prior journey is left untouched.
    #[error("no trip matches leg {leg_index} at the requested anchor")]
    ReMatchFailed { leg_index: usize },

    /// The round cap (`max_rounds`) was hit before the scan converged.
    /// Not necessarily an error for the caller (an empty/partial result
    /// is still returned), but surfaced so callers can log it.
    #[error("round cap ({0}) reached before the scan converged")]
    MaxRoundsExceeded(usize),
}

pub type Result<T> = std::result::Result<T, RaptorError>;
