//! Trip re-matching: given a previously computed [`Journey`], find the
//! concrete trips that realize the same sequence of
//! `(route_id, direction_id, board_stop, alight_stop)` legs relative to a
//! new anchor time, advancing the anchor by each leg's interchange or
//! transfer duration in turn.
//!
//! Used to refresh a journey a rider bookmarked yesterday against today's
//! service, without re-running the full scan.

use crate::calendar::{Date, DayOfWeek};
use crate::error::{RaptorError, Result};
use crate::model::{DirectionId, RouteId, RouteIndex, StopIndex, Timetable};
use crate::results::{insert_waiting_legs, Journey, Leg};
use crate::time::Time;

/// Finds the route serving `board_stop` at `board_pos` and `alight_stop`
/// at `alight_pos` whose full stop pattern between those positions matches
/// `stop_sequence` — not just its two endpoints, since two branches of the
/// same marketed line can share a boarding and alighting position while
/// diverging in between.
fn locate_route(
    tt: &Timetable,
    route_id: &RouteId,
    direction_id: DirectionId,
    board_stop: StopIndex,
    board_pos: usize,
    alight_stop: StopIndex,
    alight_pos: usize,
    stop_sequence: &[crate::model::StopId],
) -> Option<RouteIndex> {
    tt.routes_serving_stop(board_stop)
        .iter()
        .find_map(|&(route_idx, offset)| {
            if offset as usize != board_pos {
                return None;
            }
            let route = tt.route(route_idx);
            if route.stops.get(alight_pos) != Some(&alight_stop) {
                return None;
            }
            let candidate = route.stops.get(board_pos..=alight_pos)?;
            if candidate.len() != stop_sequence.len()
                || !candidate
                    .iter()
                    .zip(stop_sequence)
                    .all(|(&idx, id)| tt.stop_id(idx) == id)
            {
                return None;
            }
            let sample_trip = tt.trip(*route.trips.first()?);
            if sample_trip.route_id == *route_id && sample_trip.direction_id == direction_id {
                Some(route_idx)
            } else {
                None
            }
        })
}

/// Re-finds every transit leg of `journey` departing no earlier than
/// `anchor` on `date`, preserving the original leg order. Transfer legs
/// are replayed verbatim (a footpath doesn't change with the calendar);
/// `Waiting` legs are dropped and recomputed from the new timings.
pub fn re_match_depart_after(
    tt: &Timetable,
    journey: &Journey,
    date: Date,
    day_of_week: DayOfWeek,
    anchor: Time,
) -> Result<Journey> {
    let mut legs = Vec::with_capacity(journey.legs.len());
    let mut cursor = anchor;
    let mut previous_was_transit = false;

    for (leg_index, leg) in journey.legs.iter().enumerate() {
        match leg {
            Leg::Transit {
                route,
                direction_id,
                board_stop,
                board_pos,
                alight_stop,
                alight_pos,
                stop_sequence,
                ..
            } => {
                let board_idx = tt
                    .stop_index(board_stop)
                    .ok_or_else(|| RaptorError::UnknownStop(board_stop.clone()))?;
                let alight_idx = tt
                    .stop_index(alight_stop)
                    .ok_or_else(|| RaptorError::UnknownStop(alight_stop.clone()))?;

                let earliest = if previous_was_transit {
                    cursor + tt.interchange(board_idx)
                } else {
                    cursor
                };

                let route_idx = locate_route(
                    tt,
                    route,
                    *direction_id,
                    board_idx,
                    *board_pos,
                    alight_idx,
                    *alight_pos,
                    stop_sequence,
                )
                .ok_or(RaptorError::ReMatchFailed { leg_index })?;

                let (trip_idx, _) = tt
                    .earliest_trip(route_idx, *board_pos, earliest, date, day_of_week)
                    .ok_or(RaptorError::ReMatchFailed { leg_index })?;

                let trip = tt.trip(trip_idx);
                let departure = trip.stop_times[*board_pos].departure;
                let arrival = trip.stop_times[*alight_pos].arrival;
                let new_stop_sequence = trip.stop_times[*board_pos..=*alight_pos]
                    .iter()
                    .map(|st| tt.stop_id(st.stop).to_owned())
                    .collect();

                legs.push(Leg::Transit {
                    route: route.clone(),
                    trip_id: trip.trip_id.clone(),
                    direction_id: *direction_id,
                    board_stop: board_stop.clone(),
                    board_pos: *board_pos,
                    departure,
                    pickup: trip.stop_times[*board_pos].pickup,
                    alight_stop: alight_stop.clone(),
                    alight_pos: *alight_pos,
                    arrival,
                    drop_off: trip.stop_times[*alight_pos].drop_off,
                    headsign: trip.stop_times[*board_pos].headsign.clone(),
                    stop_sequence: new_stop_sequence,
                });
                cursor = arrival;
                previous_was_transit = true;
            }
            Leg::Transfer {
                from_stop,
                to_stop,
                duration,
            } => {
                legs.push(Leg::Transfer {
                    from_stop: from_stop.clone(),
                    to_stop: to_stop.clone(),
                    duration: *duration,
                });
                cursor += duration;
                previous_was_transit = false;
            }
            Leg::Waiting { .. } => {}
        }
    }

    finish(legs, anchor)
}

/// Mirror of [`re_match_depart_after`]: re-finds every transit leg arriving
/// no later than `anchor`, walking the journey from its last leg to its
/// first.
pub fn re_match_arrive_by(
    tt: &Timetable,
    journey: &Journey,
    date: Date,
    day_of_week: DayOfWeek,
    anchor: Time,
) -> Result<Journey> {
    let mut legs_reversed = Vec::with_capacity(journey.legs.len());
    let mut cursor = anchor;
    let mut previous_was_transit = false;

    for (leg_index, leg) in journey.legs.iter().enumerate().rev() {
        match leg {
            Leg::Transit {
                route,
                direction_id,
                board_stop,
                board_pos,
                alight_stop,
                alight_pos,
                stop_sequence,
                ..
            } => {
                let board_idx = tt
                    .stop_index(board_stop)
                    .ok_or_else(|| RaptorError::UnknownStop(board_stop.clone()))?;
                let alight_idx = tt
                    .stop_index(alight_stop)
                    .ok_or_else(|| RaptorError::UnknownStop(alight_stop.clone()))?;

                let latest = if previous_was_transit {
                    cursor - tt.interchange(alight_idx)
                } else {
                    cursor
                };

                let route_idx = locate_route(
                    tt,
                    route,
                    *direction_id,
                    board_idx,
                    *board_pos,
                    alight_idx,
                    *alight_pos,
                    stop_sequence,
                )
                .ok_or(RaptorError::ReMatchFailed { leg_index })?;

                let (trip_idx, _) = tt
                    .latest_trip(route_idx, *alight_pos, latest, date, day_of_week)
                    .ok_or(RaptorError::ReMatchFailed { leg_index })?;

                let trip = tt.trip(trip_idx);
                let departure = trip.stop_times[*board_pos].departure;
                let arrival = trip.stop_times[*alight_pos].arrival;
                let new_stop_sequence = trip.stop_times[*board_pos..=*alight_pos]
                    .iter()
                    .map(|st| tt.stop_id(st.stop).to_owned())
                    .collect();

                legs_reversed.push(Leg::Transit {
                    route: route.clone(),
                    trip_id: trip.trip_id.clone(),
                    direction_id: *direction_id,
                    board_stop: board_stop.clone(),
                    board_pos: *board_pos,
                    departure,
                    pickup: trip.stop_times[*board_pos].pickup,
                    alight_stop: alight_stop.clone(),
                    alight_pos: *alight_pos,
                    arrival,
                    drop_off: trip.stop_times[*alight_pos].drop_off,
                    headsign: trip.stop_times[*board_pos].headsign.clone(),
                    stop_sequence: new_stop_sequence,
                });
                cursor = departure;
                previous_was_transit = true;
            }
            Leg::Transfer {
                from_stop,
                to_stop,
                duration,
            } => {
                legs_reversed.push(Leg::Transfer {
                    from_stop: from_stop.clone(),
                    to_stop: to_stop.clone(),
                    duration: *duration,
                });
                cursor -= duration;
                previous_was_transit = false;
            }
            Leg::Waiting { .. } => {}
        }
    }

    legs_reversed.reverse();
    finish(legs_reversed, anchor)
}

fn finish(legs: Vec<Leg>, anchor: Time) -> Result<Journey> {
    if legs.is_empty() {
        return Err(RaptorError::ReMatchFailed { leg_index: 0 });
    }
    let legs = insert_waiting_legs(legs);
    let departure = legs
        .iter()
        .find_map(|l| match l {
            Leg::Transit { departure, .. } => Some(*departure),
            _ => None,
        })
        .unwrap_or(anchor);
    let arrival = legs
        .iter()
        .rev()
        .find_map(|l| match l {
            Leg::Transit { arrival, .. } => Some(*arrival),
            _ => None,
        })
        .unwrap_or(anchor);
    let transfers = legs
        .iter()
        .filter(|l| matches!(l, Leg::Transit { .. }))
        .count();

    Ok(Journey {
        legs,
        departure,
        arrival,
        transfers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Service;
    use crate::model::{StopTime, TimetableBuilder};

    fn always_running_service() -> Service {
        Service {
            start_date: 20250101,
            end_date: 20251231,
            weekday_mask: [true; 7],
            include_dates: vec![],
            exclude_dates: vec![],
        }
    }

    fn st(stop: StopIndex, seq: u32, arr: Time, dep: Time) -> StopTime {
        StopTime {
            stop,
            arrival: arr,
            departure: dep,
            stop_sequence: seq,
            pickup: true,
            drop_off: true,
            headsign: None,
        }
    }

    #[test]
    fn re_matches_a_direct_trip_onto_a_new_anchor() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        b.add_trip("YESTERDAY", "L1", 0, svc, vec![st(a, 1, 0, 1000), st(c, 2, 2000, 2000)]);
        let tt = b.build(120).unwrap();

        let original = Journey {
            legs: vec![Leg::Transit {
                route: "L1".into(),
                trip_id: "YESTERDAY".into(),
                direction_id: 0,
                board_stop: "A".into(),
                board_pos: 0,
                departure: 1000,
                pickup: true,
                alight_stop: "C".into(),
                alight_pos: 1,
                arrival: 2000,
                drop_off: true,
                headsign: None,
                stop_sequence: vec!["A".into(), "C".into()],
            }],
            departure: 1000,
            arrival: 2000,
            transfers: 1,
        };

        let refreshed = re_match_depart_after(&tt, &original, 20250107, 2, 1000).unwrap();
        assert_eq!(refreshed.departure, 1000);
        assert_eq!(refreshed.arrival, 2000);
    }

    #[test]
    fn re_match_fails_when_no_trip_covers_the_new_anchor() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        b.add_trip("ONLY", "L1", 0, svc, vec![st(a, 1, 0, 1000), st(c, 2, 2000, 2000)]);
        let tt = b.build(120).unwrap();

        let original = Journey {
            legs: vec![Leg::Transit {
                route: "L1".into(),
                trip_id: "ONLY".into(),
                direction_id: 0,
                board_stop: "A".into(),
                board_pos: 0,
                departure: 1000,
                pickup: true,
                alight_stop: "C".into(),
                alight_pos: 1,
                arrival: 2000,
                drop_off: true,
                headsign: None,
                stop_sequence: vec!["A".into(), "C".into()],
            }],
            departure: 1000,
            arrival: 2000,
            transfers: 1,
        };

        let err = re_match_depart_after(&tt, &original, 20250107, 2, 5000).unwrap_err();
        assert!(matches!(err, RaptorError::ReMatchFailed { .. }));
    }
}
