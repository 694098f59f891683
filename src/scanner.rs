//! The RAPTOR round scanner: forward (`scan_depart_after`) and reverse
//! (`scan_arrive_by`) multi-round relaxation over the route/stop index.
//!
//! Grounded on `ferrobus-core`'s `default_raptor`/`traced_raptor` (the
//! route-queue construction, earliest-trip binary search, and per-round
//! marking) and `blaise`'s `explore_routes`/`explore_routes_reverse` split
//! between trip and transfer relaxation — run single-threaded per query,
//! not through `rayon` as `blaise` does.

use std::collections::{HashMap, HashSet};

use crate::calendar::{Date, DayOfWeek};
use crate::config::RaptorConfig;
use crate::model::{RouteIndex, StopIndex, Timetable, TripIndex};
use crate::time::{Time, TIME_NEG_INFINITY, TIME_POS_INFINITY};

/// A single hop in a reconstructed journey. `board_pos < alight_pos`
/// always holds for `Board`, regardless of whether it was discovered by a
/// forward or reverse scan: the reverse scanner records the same physical
/// boarding/alighting positions a forward scan would have, just
/// discovered in the opposite order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Board {
        route: RouteIndex,
        trip: TripIndex,
        board_stop: StopIndex,
        board_pos: usize,
        alight_stop: StopIndex,
        alight_pos: usize,
    },
    Transfer {
        from_stop: StopIndex,
        to_stop: StopIndex,
        duration: crate::time::Duration,
    },
}

/// Per-round arrival/departure times and the connection that produced
/// each, indexed `[round][stop]`. Shape mirrors `ferrobus-core`'s
/// `RaptorState`.
#[derive(Debug)]
pub struct ScanResult {
    /// `k_times[r][s]`: best time achievable at stop `s` using at most `r`
    /// trips. Forward scans store arrival times (ascending-better); reverse
    /// scans store departure times (descending-better).
    pub k_times: Vec<Vec<Time>>,
    pub k_connections: Vec<Vec<Option<Connection>>>,
    /// Best time at each stop across all rounds scanned so far; used both
    /// for dominance pruning and as the final per-stop result.
    pub best_times: Vec<Time>,
    /// Number of rounds actually populated (`<= config.max_rounds`).
    pub rounds_used: usize,
    pub round_cap_hit: bool,
}

impl ScanResult {
    fn new(num_stops: usize, max_rounds: usize, sentinel: Time) -> Self {
        Self {
            k_times: vec![vec![sentinel; num_stops]; max_rounds + 1],
            k_connections: vec![vec![None; num_stops]; max_rounds + 1],
            best_times: vec![sentinel; num_stops],
            rounds_used: 0,
            round_cap_hit: false,
        }
    }
}

/// Forward earliest-arrival scan: "depart `source` at or after
/// `departure`, reach every stop as early as possible."
///
/// `target`, when given, bounds the search: stops that cannot beat the
/// current best arrival at `target` stop relaxing further.
pub fn scan_depart_after(
    tt: &Timetable,
    config: &RaptorConfig,
    source: StopIndex,
    departure: Time,
    date: Date,
    day_of_week: DayOfWeek,
    target: Option<StopIndex>,
) -> ScanResult {
    let n = tt.num_stops();
    let mut result = ScanResult::new(n, config.max_rounds, TIME_POS_INFINITY);

    result.k_times[0][source as usize] = departure;
    result.best_times[source as usize] = departure;
    let mut marked: HashSet<StopIndex> = HashSet::new();
    marked.insert(source);
    relax_transfers_forward(tt, 0, &mut result, &mut marked, target);

    let mut round = 0;
    while round < config.max_rounds && !marked.is_empty() {
        round += 1;
        result.k_times[round] = result.k_times[round - 1].clone();
        result.k_connections[round] = result.k_connections[round - 1].clone();

        let queue = build_route_queue(tt, &marked);
        marked.clear();

        for (route_idx, start_offset) in queue {
            scan_route_forward(
                tt,
                route_idx,
                start_offset,
                round,
                date,
                day_of_week,
                &mut result,
                &mut marked,
                target,
            );
        }

        relax_transfers_forward(tt, round, &mut result, &mut marked, target);
        result.rounds_used = round;
    }

    if round == config.max_rounds && !marked.is_empty() {
        tracing::warn!(max_rounds = config.max_rounds, "hit round cap with stops still marked");
        result.round_cap_hit = true;
    }
    result
}

fn scan_route_forward(
    tt: &Timetable,
    route_idx: RouteIndex,
    start_offset: usize,
    round: usize,
    date: Date,
    day_of_week: DayOfWeek,
    result: &mut ScanResult,
    marked: &mut HashSet<StopIndex>,
    target: Option<StopIndex>,
) {
    let route = tt.route(route_idx);
    let mut boarded: Option<(TripIndex, StopIndex, usize)> = None; // (trip, board_stop, board_pos)

    for offset in start_offset..route.stops.len() {
        let stop = route.stops[offset];
        let bound = target
            .map(|t| result.best_times[t as usize])
            .unwrap_or(TIME_POS_INFINITY);

        if let Some((trip_idx, board_stop, board_pos)) = boarded {
            let trip = tt.trip(trip_idx);
            let arrival = trip.stop_times[offset].arrival;
            if arrival + tt.interchange(stop) < result.best_times[stop as usize].min(bound) {
                result.k_times[round][stop as usize] = arrival;
                result.best_times[stop as usize] = arrival;
                result.k_connections[round][stop as usize] = Some(Connection::Board {
                    route: route_idx,
                    trip: trip_idx,
                    board_stop,
                    board_pos,
                    alight_stop: stop,
                    alight_pos: offset,
                });
                marked.insert(stop);
            }
        }

        let prev_round_arrival = result.k_times[round - 1][stop as usize];
        if prev_round_arrival >= TIME_POS_INFINITY {
            continue;
        }
        let earliest_departure = prev_round_arrival + tt.interchange(stop);
        let needs_lookup = match boarded {
            None => true,
            Some((trip_idx, _, _)) => {
                earliest_departure > tt.trip(trip_idx).stop_times[offset].departure
            }
        };
        if needs_lookup
            && let Some((trip_idx, trip_offset)) =
                tt.earliest_trip(route_idx, offset, earliest_departure, date, day_of_week)
        {
            boarded = Some((trip_idx, stop, trip_offset));
        }
    }
}

fn relax_transfers_forward(
    tt: &Timetable,
    round: usize,
    result: &mut ScanResult,
    marked: &mut HashSet<StopIndex>,
    target: Option<StopIndex>,
) {
    let sources: Vec<StopIndex> = marked.iter().copied().collect();
    for from_stop in sources {
        let arrival = result.k_times[round][from_stop as usize];
        if arrival >= TIME_POS_INFINITY {
            continue;
        }
        for transfer in tt.transfers_from(from_stop) {
            if !transfer.valid_at(arrival) {
                continue;
            }
            let to_stop = transfer.destination;
            let candidate = arrival + transfer.duration;
            let bound = target
                .map(|t| result.best_times[t as usize])
                .unwrap_or(TIME_POS_INFINITY);
            if candidate < result.best_times[to_stop as usize].min(bound) {
                result.k_times[round][to_stop as usize] = candidate;
                result.best_times[to_stop as usize] = candidate;
                result.k_connections[round][to_stop as usize] = Some(Connection::Transfer {
                    from_stop,
                    to_stop,
                    duration: transfer.duration,
                });
                marked.insert(to_stop);
            }
        }
    }
}

/// Reverse latest-departure scan: "arrive `target` at or before `arrival`,
/// depart every stop as late as possible." Mirrors `scan_depart_after`
/// with time flowing backward: trips are searched by latest arrival,
/// transfers are subtracted rather than added.
pub fn scan_arrive_by(
    tt: &Timetable,
    config: &RaptorConfig,
    target: StopIndex,
    arrival: Time,
    date: Date,
    day_of_week: DayOfWeek,
    source: Option<StopIndex>,
) -> ScanResult {
    let n = tt.num_stops();
    let mut result = ScanResult::new(n, config.max_rounds, TIME_NEG_INFINITY);

    result.k_times[0][target as usize] = arrival;
    result.best_times[target as usize] = arrival;
    let mut marked: HashSet<StopIndex> = HashSet::new();
    marked.insert(target);
    relax_transfers_backward(tt, 0, &mut result, &mut marked, source);

    let mut round = 0;
    while round < config.max_rounds && !marked.is_empty() {
        round += 1;
        result.k_times[round] = result.k_times[round - 1].clone();
        result.k_connections[round] = result.k_connections[round - 1].clone();

        let queue = build_route_queue_latest(tt, &marked);
        marked.clear();

        for (route_idx, latest_offset) in queue {
            scan_route_backward(
                tt,
                route_idx,
                latest_offset,
                round,
                date,
                day_of_week,
                &mut result,
                &mut marked,
                source,
            );
        }

        relax_transfers_backward(tt, round, &mut result, &mut marked, source);
        result.rounds_used = round;
    }

    if round == config.max_rounds && !marked.is_empty() {
        tracing::warn!(max_rounds = config.max_rounds, "hit round cap with stops still marked");
        result.round_cap_hit = true;
    }
    result
}

fn scan_route_backward(
    tt: &Timetable,
    route_idx: RouteIndex,
    latest_offset: usize,
    round: usize,
    date: Date,
    day_of_week: DayOfWeek,
    result: &mut ScanResult,
    marked: &mut HashSet<StopIndex>,
    source: Option<StopIndex>,
) {
    let route = tt.route(route_idx);
    let mut boarded: Option<(TripIndex, StopIndex, usize)> = None; // (trip, alight_stop, alight_pos)

    for offset in (0..=latest_offset).rev() {
        let stop = route.stops[offset];
        let bound = source
            .map(|s| result.best_times[s as usize])
            .unwrap_or(TIME_NEG_INFINITY);

        if let Some((trip_idx, alight_stop, alight_pos)) = boarded {
            let trip = tt.trip(trip_idx);
            let departure = trip.stop_times[offset].departure;
            if departure - tt.interchange(stop) > result.best_times[stop as usize].max(bound) {
                result.k_times[round][stop as usize] = departure;
                result.best_times[stop as usize] = departure;
                result.k_connections[round][stop as usize] = Some(Connection::Board {
                    route: route_idx,
                    trip: trip_idx,
                    board_stop: stop,
                    board_pos: offset,
                    alight_stop,
                    alight_pos,
                });
                marked.insert(stop);
            }
        }

        let prev_round_departure = result.k_times[round - 1][stop as usize];
        if prev_round_departure <= TIME_NEG_INFINITY {
            continue;
        }
        let latest_arrival = prev_round_departure - tt.interchange(stop);
        let needs_lookup = match boarded {
            None => true,
            Some((trip_idx, _, _)) => {
                latest_arrival < tt.trip(trip_idx).stop_times[offset].arrival
            }
        };
        if needs_lookup
            && let Some((trip_idx, trip_offset)) =
                tt.latest_trip(route_idx, offset, latest_arrival, date, day_of_week)
        {
            boarded = Some((trip_idx, stop, trip_offset));
        }
    }
}

fn relax_transfers_backward(
    tt: &Timetable,
    round: usize,
    result: &mut ScanResult,
    marked: &mut HashSet<StopIndex>,
    source: Option<StopIndex>,
) {
    let destinations: Vec<StopIndex> = marked.iter().copied().collect();
    for to_stop in destinations {
        let departure = result.k_times[round][to_stop as usize];
        if departure <= TIME_NEG_INFINITY {
            continue;
        }
        for transfer in tt.transfers_to(to_stop) {
            let candidate = departure - transfer.duration;
            if !transfer.valid_at(candidate) {
                continue;
            }
            let from_stop = transfer.origin;
            let bound = source
                .map(|s| result.best_times[s as usize])
                .unwrap_or(TIME_NEG_INFINITY);
            if candidate > result.best_times[from_stop as usize].max(bound) {
                result.k_times[round][from_stop as usize] = candidate;
                result.best_times[from_stop as usize] = candidate;
                result.k_connections[round][from_stop as usize] = Some(Connection::Transfer {
                    from_stop,
                    to_stop,
                    duration: transfer.duration,
                });
                marked.insert(from_stop);
            }
        }
    }
}

/// Collapses the marked-stop set into one queue entry per route, keeping
/// only the earliest stop offset reached on that route — a trip scan
/// started further downstream is always dominated by one starting
/// upstream. A route's `stops` array is stored in a single canonical
/// (timetable/forward) order regardless of scan direction.
fn build_route_queue(tt: &Timetable, marked: &HashSet<StopIndex>) -> HashMap<RouteIndex, usize> {
    let mut queue: HashMap<RouteIndex, usize> = HashMap::new();
    for &stop in marked {
        for &(route_idx, offset) in tt.routes_serving_stop(stop) {
            queue
                .entry(route_idx)
                .and_modify(|o| {
                    if (offset as usize) < *o {
                        *o = offset as usize;
                    }
                })
                .or_insert(offset as usize);
        }
    }
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Service;
    use crate::model::{StopTime, TimetableBuilder, Transfer};

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
    fn direct_trip_reaches_destination_in_round_one() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        b.add_trip("T1", "L1", 0, svc, vec![st(a, 1, 0, 1000), st(c, 2, 2000, 2000)]);
        let tt = b.build(120).unwrap();

        let result = scan_depart_after(&tt, &RaptorConfig::default(), a, 1000, 20250106, 1, Some(c));
        assert_eq!(result.best_times[c as usize], 2000);
    }

    #[test]
    fn one_transfer_journey_uses_two_routes() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let m = b.add_stop("M");
        let n = b.add_stop("N");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        b.add_trip("T1", "L1", 0, svc, vec![st(a, 1, 0, 0), st(m, 2, 1000, 1000)]);
        b.add_trip("T2", "L2", 0, svc, vec![st(n, 1, 1200, 1200), st(c, 2, 2200, 2200)]);
        b.add_transfer(Transfer {
            origin: m,
            destination: n,
            duration: 60,
            start_time: None,
            end_time: None,
        });
        let tt = b.build(120).unwrap();

        let result = scan_depart_after(&tt, &RaptorConfig::default(), a, 0, 20250106, 1, Some(c));
        assert_eq!(result.best_times[c as usize], 2200);
        assert!(matches!(
            result.k_connections[0][n as usize],
            Some(Connection::Transfer { from_stop, to_stop, .. }) if from_stop == m && to_stop == n
        ));
    }

    #[test]
    fn missing_connection_leaves_stop_unreached() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        b.add_trip("T1", "L1", 0, svc, vec![st(a, 1, 0, 0), st(c, 2, 1000, 1000)]);
        let tt = b.build(120).unwrap();

        // Depart after the only trip has already left: C is unreachable.
        let result = scan_depart_after(&tt, &RaptorConfig::default(), a, 5000, 20250106, 1, Some(c));
        assert_eq!(result.best_times[c as usize], TIME_POS_INFINITY);
    }

    #[test]
    fn reverse_scan_is_symmetric_with_forward() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        b.add_trip("T1", "L1", 0, svc, vec![st(a, 1, 0, 1000), st(c, 2, 2000, 2000)]);
        let tt = b.build(120).unwrap();

        let result = scan_arrive_by(&tt, &RaptorConfig::default(), c, 3000, 20250106, 1, Some(a));
        assert_eq!(result.best_times[a as usize], 1000);
    }

    #[test]
    fn interchange_blocks_same_stop_reboarding_too_soon() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let m = b.add_stop("M");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        b.add_trip("T1", "L1", 0, svc, vec![st(a, 1, 0, 0), st(m, 2, 1000, 1000)]);
        // Departs only 30s after arrival at M; default interchange is 120s.
        b.add_trip("T2", "L2", 0, svc, vec![st(m, 1, 1030, 1030), st(c, 2, 2000, 2000)]);
        let tt = b.build(120).unwrap();

        let result = scan_depart_after(&tt, &RaptorConfig::default(), a, 0, 20250106, 1, Some(c));
        assert_eq!(result.best_times[c as usize], TIME_POS_INFINITY);
    }
}

/// Mirror of [`build_route_queue`] for the reverse scan: keeps the latest
/// (highest-index) stop offset reached on each route, since the backward
/// walk along a route proceeds from high offsets toward low ones.
fn build_route_queue_latest(
    tt: &Timetable,
    marked: &HashSet<StopIndex>,
) -> HashMap<RouteIndex, usize> {
    let mut queue: HashMap<RouteIndex, usize> = HashMap::new();
    for &stop in marked {
        for &(route_idx, offset) in tt.routes_serving_stop(stop) {
            queue
                .entry(route_idx)
                .and_modify(|o| {
                    if (offset as usize) > *o {
                        *o = offset as usize;
                    }
                })
                .or_insert(offset as usize);
        }
    }
    queue
}
