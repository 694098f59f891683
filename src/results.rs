//! Journey reconstruction: walks a [`ScanResult`]'s connection chain
//! backward from a target (or forward from a source, for the reverse
//! scan) into an ordered [`Journey`] of [`Leg`]s.
//!
//! Grounded on `ferrobus-core`'s `traced_raptor`/`reconstruct_journey`:
//! the `Predecessor`-chase walk and the synthesized `Waiting` leg between
//! two legs that don't abut in time.

use serde::{Deserialize, Serialize};

use crate::model::{DirectionId, RouteId, StopId, Timetable};
use crate::scanner::{Connection, ScanResult};
use crate::time::{Duration, Time};

/// A single hop of a [`Journey`], serialisable so a caller can hand a
/// planned journey straight to an HTTP client or cache it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leg {
    Transit {
        route: RouteId,
        trip_id: String,
        direction_id: DirectionId,
        board_stop: StopId,
        board_pos: usize,
        departure: Time,
        /// Whether the trip picks up riders at `board_stop`. Preserved for
        /// downstream consumers, not enforced by the scanner.
        pickup: bool,
        alight_stop: StopId,
        alight_pos: usize,
        arrival: Time,
        /// Whether the trip drops riders off at `alight_stop`.
        drop_off: bool,
        headsign: Option<String>,
        /// Every stop the trip calls at between `board_stop` and
        /// `alight_stop`, inclusive of both endpoints, in travel order.
        /// Lets a re-match disambiguate two routes that share a boarding
        /// and alighting position but diverge in between.
        stop_sequence: Vec<StopId>,
    },
    Transfer {
        from_stop: StopId,
        to_stop: StopId,
        duration: Duration,
    },
    Waiting {
        stop: StopId,
        duration: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journey {
    pub legs: Vec<Leg>,
    pub departure: Time,
    pub arrival: Time,
    /// Number of transit (trip-board) legs; the round index that produced
    /// this journey in the scan.
    pub transfers: usize,
}

/// Finds the smallest round whose recorded time at `stop` equals the
/// overall best, i.e. the fewest trip-boardings needed to achieve it.
fn minimal_round(result: &ScanResult, stop: usize, best: Time) -> Option<usize> {
    (0..=result.rounds_used).find(|&r| result.k_times[r][stop] == best)
}

/// Builds the earliest-arrival [`Journey`] from `source` to `target` out of
/// a [`crate::scanner::scan_depart_after`] result. Returns `None` if
/// `target` was never reached.
pub fn build_forward_journey(
    tt: &Timetable,
    result: &ScanResult,
    target: crate::model::StopIndex,
) -> crate::error::Result<Option<Journey>> {
    let best = result.best_times[target as usize];
    if best >= crate::time::TIME_POS_INFINITY {
        return Ok(None);
    }
    let Some(round) = minimal_round(result, target as usize, best) else {
        return Ok(None);
    };
    build_forward_journey_at_round(tt, result, target, round)
}

/// Reconstructs the journey that achieves `result.k_times[round][target]`
/// specifically — used by [`crate::filters`] to build one candidate per
/// round for the Pareto (arrival, transfers) front, rather than only the
/// single overall-best journey.
pub fn build_forward_journey_at_round(
    tt: &Timetable,
    result: &ScanResult,
    target: crate::model::StopIndex,
    round: usize,
) -> crate::error::Result<Option<Journey>> {
    let arrival_at_round = result.k_times[round][target as usize];
    if arrival_at_round >= crate::time::TIME_POS_INFINITY {
        return Ok(None);
    }
    let mut legs_reversed = Vec::new();
    let mut cursor = target;
    while let Some(connection) = result.k_connections[round][cursor as usize] {
        legs_reversed.push(leg_from_connection(tt, connection)?);
        cursor = match connection {
            Connection::Board { board_stop, .. } => board_stop,
            Connection::Transfer { from_stop, .. } => from_stop,
        };
    }
    let source = cursor;
    legs_reversed.reverse();

    if legs_reversed.is_empty() {
        return Ok(None);
    }

    let departure = result.k_times[0][source as usize];
    let legs = insert_waiting_legs(legs_reversed);
    let transfers = legs
        .iter()
        .filter(|l| matches!(l, Leg::Transit { .. }))
        .count();

    Ok(Some(Journey {
        legs,
        departure,
        arrival: arrival_at_round,
        transfers,
    }))
}

/// Mirror of [`build_forward_journey`] for [`crate::scanner::scan_arrive_by`]
/// results: walks forward from `source` toward the implicit target,
/// re-emitting legs in departure order (the reverse scan's connection
/// chain runs target→source, so legs come out already in travel order
/// once collected without reversal).
pub fn build_reverse_journey(
    tt: &Timetable,
    result: &ScanResult,
    source: crate::model::StopIndex,
) -> crate::error::Result<Option<Journey>> {
    let best = result.best_times[source as usize];
    if best <= crate::time::TIME_NEG_INFINITY {
        return Ok(None);
    }
    let Some(round) = minimal_round(result, source as usize, best) else {
        return Ok(None);
    };
    build_reverse_journey_at_round(tt, result, source, round)
}

/// Explicit-round counterpart of [`build_forward_journey_at_round`] for
/// reverse scans.
pub fn build_reverse_journey_at_round(
    tt: &Timetable,
    result: &ScanResult,
    source: crate::model::StopIndex,
    round: usize,
) -> crate::error::Result<Option<Journey>> {
    let departure_at_round = result.k_times[round][source as usize];
    if departure_at_round <= crate::time::TIME_NEG_INFINITY {
        return Ok(None);
    }

    let mut legs = Vec::new();
    let mut cursor = source;
    while let Some(connection) = result.k_connections[round][cursor as usize] {
        legs.push(leg_from_connection(tt, connection)?);
        cursor = match connection {
            Connection::Board { alight_stop, .. } => alight_stop,
            Connection::Transfer { to_stop, .. } => to_stop,
        };
    }
    let target = cursor;

    if legs.is_empty() {
        return Ok(None);
    }

    let arrival = result.k_times[0][target as usize];
    let legs = insert_waiting_legs(legs);
    let transfers = legs
        .iter()
        .filter(|l| matches!(l, Leg::Transit { .. }))
        .count();

    Ok(Some(Journey {
        legs,
        departure: departure_at_round,
        arrival,
        transfers,
    }))
}

fn leg_from_connection(tt: &Timetable, connection: Connection) -> crate::error::Result<Leg> {
    match connection {
        Connection::Board {
            trip,
            board_stop,
            board_pos,
            alight_stop,
            alight_pos,
            ..
        } => {
            if board_pos >= alight_pos {
                return Err(crate::error::RaptorError::InvalidSubsequence {
                    trip: trip as u32,
                    board_pos,
                    alight_pos,
                });
            }
            let t = tt.trip(trip);
            let stop_sequence = t.stop_times[board_pos..=alight_pos]
                .iter()
                .map(|st| tt.stop_id(st.stop).to_owned())
                .collect();
            Ok(Leg::Transit {
                route: t.route_id.clone(),
                trip_id: t.trip_id.clone(),
                direction_id: t.direction_id,
                board_stop: tt.stop_id(board_stop).to_owned(),
                board_pos,
                departure: t.stop_times[board_pos].departure,
                pickup: t.stop_times[board_pos].pickup,
                alight_stop: tt.stop_id(alight_stop).to_owned(),
                alight_pos,
                arrival: t.stop_times[alight_pos].arrival,
                drop_off: t.stop_times[alight_pos].drop_off,
                headsign: t.stop_times[board_pos].headsign.clone(),
                stop_sequence,
            })
        }
        Connection::Transfer {
            from_stop,
            to_stop,
            duration,
        } => Ok(Leg::Transfer {
            from_stop: tt.stop_id(from_stop).to_owned(),
            to_stop: tt.stop_id(to_stop).to_owned(),
            duration,
        }),
    }
}

/// Inserts a synthesized `Waiting` leg wherever one leg's arrival at a stop
/// doesn't abut the next leg's departure from that stop — e.g. the
/// interchange dwell before boarding a later trip. Transfer legs carry no
/// intrinsic clock, so a gap either side of one is folded into the
/// neighboring transit leg's waiting time instead.
pub(crate) fn insert_waiting_legs(legs: Vec<Leg>) -> Vec<Leg> {
    let mut out = Vec::with_capacity(legs.len());
    for i in 0..legs.len() {
        if i > 0
            && let (Leg::Transit { alight_stop, arrival, .. }, Leg::Transit { board_stop, departure, .. }) =
                (&legs[i - 1], &legs[i])
            && alight_stop == board_stop
            && *departure > *arrival
        {
            out.push(Leg::Waiting {
                stop: alight_stop.clone(),
                duration: departure - arrival,
            });
        }
        out.push(legs[i].clone());
    }
    out
}
