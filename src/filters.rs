//! Journey filters: collapsing a round-by-round scan into the
//! Pareto-optimal (time, transfers) front, and discarding journeys that
//! revisit the same marketed route twice.
//!
//! Route-uniqueness forbids a repeated `route_id` regardless of
//! `direction_id` (see DESIGN.md) — a looped journey that rides the same
//! line out and back is never a useful result here.

use crate::model::StopIndex;
use crate::results::{
    build_forward_journey_at_round, build_reverse_journey_at_round, Journey, Leg,
};
use crate::scanner::ScanResult;
use crate::time::{TIME_NEG_INFINITY, TIME_POS_INFINITY};

/// `true` if no two `Leg::Transit` entries in `journey` share a
/// `route_id`, independent of `direction_id`.
pub fn is_route_unique(journey: &Journey) -> bool {
    let mut seen = std::collections::HashSet::new();
    journey.legs.iter().all(|leg| match leg {
        Leg::Transit { route, .. } => seen.insert(route.clone()),
        _ => true,
    })
}

/// Builds the Pareto-optimal set of forward journeys to `target`: one
/// candidate per round whose arrival strictly improves on every
/// lower-round candidate, keeping earlier (fewer-transfer) journeys even
/// when a later round arrives sooner only by using more trips — both
/// points belong on the front. Rejects non-route-unique candidates before
/// they can dominate a worse-but-valid one.
pub fn forward_pareto_front(
    tt: &crate::model::Timetable,
    result: &ScanResult,
    target: StopIndex,
) -> crate::error::Result<Vec<Journey>> {
    let mut front: Vec<Journey> = Vec::new();
    let mut best_arrival_seen = TIME_POS_INFINITY;

    for round in 0..=result.rounds_used {
        let arrival = result.k_times[round][target as usize];
        if arrival >= TIME_POS_INFINITY || arrival >= best_arrival_seen {
            continue;
        }
        let Some(journey) = build_forward_journey_at_round(tt, result, target, round)? else {
            continue;
        };
        if !is_route_unique(&journey) {
            continue;
        }
        best_arrival_seen = arrival;
        front.push(journey);
    }

    Ok(front)
}

/// Mirror of [`forward_pareto_front`] for reverse scans: candidates
/// improve by departing strictly later as transfers increase.
pub fn reverse_pareto_front(
    tt: &crate::model::Timetable,
    result: &ScanResult,
    source: StopIndex,
) -> crate::error::Result<Vec<Journey>> {
    let mut front: Vec<Journey> = Vec::new();
    let mut best_departure_seen = TIME_NEG_INFINITY;

    for round in 0..=result.rounds_used {
        let departure = result.k_times[round][source as usize];
        if departure <= TIME_NEG_INFINITY || departure <= best_departure_seen {
            continue;
        }
        let Some(journey) = build_reverse_journey_at_round(tt, result, source, round)? else {
            continue;
        };
        if !is_route_unique(&journey) {
            continue;
        }
        best_departure_seen = departure;
        front.push(journey);
    }

    Ok(front)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Service;
    use crate::config::RaptorConfig;
    use crate::model::{StopTime, TimetableBuilder, Transfer};
    use crate::scanner::scan_depart_after;

    fn always_running_service() -> Service {
        Service {
            start_date: 20250101,
            end_date: 20251231,
            weekday_mask: [true; 7],
            include_dates: vec![],
            exclude_dates: vec![],
        }
    }

    fn st(stop: StopIndex, seq: u32, arr: crate::time::Time, dep: crate::time::Time) -> StopTime {
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
    fn pareto_front_prefers_fewer_transfers_at_equal_or_later_arrival() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let m = b.add_stop("M");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        // Direct trip arrives later than the (irrelevant) transfer route.
        b.add_trip("DIRECT", "L1", 0, svc, vec![st(a, 1, 0, 0), st(c, 2, 5000, 5000)]);
        b.add_trip("LEG1", "L2", 0, svc, vec![st(a, 1, 0, 0), st(m, 2, 1000, 1000)]);
        b.add_trip("LEG2", "L3", 0, svc, vec![st(m, 1, 1100, 1100), st(c, 2, 2000, 2000)]);
        let tt = b.build(120).unwrap();

        let result = scan_depart_after(&tt, &RaptorConfig::default(), a, 0, 20250106, 1, Some(c));
        let front = forward_pareto_front(&tt, &result, c).unwrap();
        // The two-transit journey to C (2000) strictly beats the direct
        // one (5000), so only the faster candidate should survive.
        assert_eq!(front.len(), 1);
        assert_eq!(front[0].arrival, 2000);
    }

    #[test]
    fn route_uniqueness_rejects_a_looped_journey() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let m = b.add_stop("M");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        b.add_trip("T1", "SAME_LINE", 0, svc, vec![st(a, 1, 0, 0), st(m, 2, 1000, 1000)]);
        b.add_trip(
            "T2",
            "SAME_LINE",
            1,
            svc,
            vec![st(m, 1, 1200, 1200), st(c, 2, 2000, 2000)],
        );
        b.add_transfer(Transfer {
            origin: m,
            destination: m,
            duration: 60,
            start_time: None,
            end_time: None,
        });
        let tt = b.build(120).unwrap();

        let result = scan_depart_after(&tt, &RaptorConfig::default(), a, 0, 20250106, 1, Some(c));
        let front = forward_pareto_front(&tt, &result, c).unwrap();
        assert!(front.is_empty());
    }
}
