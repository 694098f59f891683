//! Immutable timetable model: stops, trips, RAPTOR routes, transfers.
//!
//! Built once at startup and shared read-only across every query. Every
//! stop, route, and trip reference outside of the public API is a dense
//! `u32` index rather than a string key, the same representation
//! `ferrobus-core`'s `PublicTransitData` uses for its network. The
//! `StopId ⇄ StopIndex` translation table is the only place string keys
//! survive past preparation time.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::calendar::Calendar;
use crate::error::{RaptorError, Result};
use crate::time::{Duration, Time};

/// Opaque external stop token (e.g. a GTFS `stop_id`).
pub type StopId = String;
/// Dense index into [`Timetable`]'s stop tables.
pub type StopIndex = u32;

/// External, "marketed" route identifier (e.g. a GTFS `route_id`). Distinct
/// from the RAPTOR-sense route below — see the crate's glossary.
pub type RouteId = String;
/// Dense index into [`Timetable::routes`], identifying a RAPTOR route: the
/// maximal set of trips sharing one exact ordered stop sequence.
pub type RouteIndex = u32;

pub type DirectionId = u8;

/// Dense index into [`Timetable::trips`].
pub type TripIndex = u32;
/// Dense index into the [`Calendar`].
pub type ServiceIndex = u32;

/// Small inline capacity: most stops are served by a handful of routes, so
/// this avoids a heap allocation per stop in the common case.
pub type RouteStopList = SmallVec<[(RouteIndex, u32); 4]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTime {
    pub stop: StopIndex,
    pub arrival: Time,
    pub departure: Time,
    pub stop_sequence: u32,
    pub pickup: bool,
    pub drop_off: bool,
    pub headsign: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: RouteId,
    pub direction_id: DirectionId,
    pub service: ServiceIndex,
    pub stop_times: Vec<StopTime>,
}

impl Trip {
    pub fn first_departure(&self) -> Time {
        self.stop_times[0].departure
    }

    pub fn last_arrival(&self) -> Time {
        self.stop_times[self.stop_times.len() - 1].arrival
    }
}

/// A RAPTOR route: the trips sharing `stops` as their exact ordered stop
/// pattern, stored in ascending order of first-stop departure time (ties
/// broken by `trip_id`).
#[derive(Debug, Clone)]
pub struct RaptorRoute {
    pub stops: Vec<StopIndex>,
    pub trips: Vec<TripIndex>,
}

impl RaptorRoute {
    pub fn stop_offset(&self, stop: StopIndex) -> Option<usize> {
        self.stops.iter().position(|&s| s == stop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub origin: StopIndex,
    pub destination: StopIndex,
    pub duration: Duration,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
}

impl Transfer {
    /// `[start_time, end_time]` validity window; absent bounds mean
    /// "always valid".
    pub fn valid_at(&self, t: Time) -> bool {
        self.start_time.is_none_or(|s| t >= s) && self.end_time.is_none_or(|e| t <= e)
    }
}

/// The fully-prepared, immutable timetable. Construct via
/// [`TimetableBuilder`].
#[derive(Debug)]
pub struct Timetable {
    stop_id_to_idx: HashMap<StopId, StopIndex>,
    idx_to_stop_id: Vec<StopId>,
    trips: Vec<Trip>,
    routes: Vec<RaptorRoute>,
    routes_by_stop: Vec<RouteStopList>,
    transfers_by_origin: Vec<Vec<Transfer>>,
    transfers_by_destination: Vec<Vec<Transfer>>,
    interchange: HashMap<StopIndex, Duration>,
    default_interchange: Duration,
    calendar: Calendar,
}

impl Timetable {
    pub fn num_stops(&self) -> usize {
        self.idx_to_stop_id.len()
    }

    pub fn stop_index(&self, id: &str) -> Option<StopIndex> {
        self.stop_id_to_idx.get(id).copied()
    }

    pub fn stop_id(&self, idx: StopIndex) -> &str {
        &self.idx_to_stop_id[idx as usize]
    }

    pub fn trip(&self, idx: TripIndex) -> &Trip {
        &self.trips[idx as usize]
    }

    pub fn route(&self, idx: RouteIndex) -> &RaptorRoute {
        &self.routes[idx as usize]
    }

    pub fn num_routes(&self) -> usize {
        self.routes.len()
    }

    pub fn routes_serving_stop(&self, stop: StopIndex) -> &[(RouteIndex, u32)] {
        &self.routes_by_stop[stop as usize]
    }

    pub fn transfers_from(&self, stop: StopIndex) -> &[Transfer] {
        &self.transfers_by_origin[stop as usize]
    }

    pub fn transfers_to(&self, stop: StopIndex) -> &[Transfer] {
        &self.transfers_by_destination[stop as usize]
    }

    pub fn interchange(&self, stop: StopIndex) -> Duration {
        self.interchange
            .get(&stop)
            .copied()
            .unwrap_or(self.default_interchange)
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Binary search for the earliest trip on `route` that departs `stop`
    /// at or after `earliest`, restricted to trips whose service runs on
    /// `date`/`day_of_week`: the route's trips are sorted by departure at
    /// that stop, and service filtering narrows candidates found by the
    /// search.
    pub fn earliest_trip(
        &self,
        route_idx: RouteIndex,
        stop_offset: usize,
        earliest: Time,
        date: crate::calendar::Date,
        day_of_week: crate::calendar::DayOfWeek,
    ) -> Option<(TripIndex, usize)> {
        let route = &self.routes[route_idx as usize];
        let pos = route.trips.partition_point(|&trip_idx| {
            self.trips[trip_idx as usize].stop_times[stop_offset].departure < earliest
        });
        route.trips[pos..]
            .iter()
            .find(|&&trip_idx| {
                let trip = &self.trips[trip_idx as usize];
                self.calendar.runs_on(trip.service, date, day_of_week)
            })
            .map(|&trip_idx| (trip_idx, stop_offset))
    }

    /// Mirror of [`Self::earliest_trip`] for the reverse scan: the latest
    /// trip on `route` that arrives `stop` at or before `latest`.
    pub fn latest_trip(
        &self,
        route_idx: RouteIndex,
        stop_offset: usize,
        latest: Time,
        date: crate::calendar::Date,
        day_of_week: crate::calendar::DayOfWeek,
    ) -> Option<(TripIndex, usize)> {
        let route = &self.routes[route_idx as usize];
        let pos = route.trips.partition_point(|&trip_idx| {
            self.trips[trip_idx as usize].stop_times[stop_offset].arrival <= latest
        });
        route.trips[..pos]
            .iter()
            .rev()
            .find(|&&trip_idx| {
                let trip = &self.trips[trip_idx as usize];
                self.calendar.runs_on(trip.service, date, day_of_week)
            })
            .map(|&trip_idx| (trip_idx, stop_offset))
    }
}

#[derive(Debug, Clone)]
struct PendingTrip {
    trip_id: String,
    route_id: RouteId,
    direction_id: DirectionId,
    service: ServiceIndex,
    stop_times: Vec<StopTime>,
}

/// Accumulates stops, trips, and transfers from a loader collaborator
/// (GTFS or otherwise), then derives the RAPTOR routes / indices in one
/// [`TimetableBuilder::build`] call, so callers see the finished
/// timetable as a single initialisation step rather than partial state.
#[derive(Debug, Default)]
pub struct TimetableBuilder {
    stop_id_to_idx: HashMap<StopId, StopIndex>,
    idx_to_stop_id: Vec<StopId>,
    trips: Vec<PendingTrip>,
    transfers: Vec<Transfer>,
    interchange: HashMap<StopIndex, Duration>,
    services: Vec<crate::calendar::Service>,
}

impl TimetableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stop(&mut self, id: impl Into<StopId>) -> StopIndex {
        let id = id.into();
        if let Some(&idx) = self.stop_id_to_idx.get(&id) {
            return idx;
        }
        let idx = self.idx_to_stop_id.len() as StopIndex;
        self.idx_to_stop_id.push(id.clone());
        self.stop_id_to_idx.insert(id, idx);
        idx
    }

    pub fn add_service(&mut self, service: crate::calendar::Service) -> ServiceIndex {
        self.services.push(service);
        (self.services.len() - 1) as ServiceIndex
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_trip(
        &mut self,
        trip_id: impl Into<String>,
        route_id: impl Into<RouteId>,
        direction_id: DirectionId,
        service: ServiceIndex,
        stop_times: Vec<StopTime>,
    ) {
        self.trips.push(PendingTrip {
            trip_id: trip_id.into(),
            route_id: route_id.into(),
            direction_id,
            service,
            stop_times,
        });
    }

    /// Registers a transfer between two distinct stops. If `origin ==
    /// destination`, `build` folds it into the interchange map instead of
    /// the transfers-by-origin index.
    pub fn add_transfer(&mut self, transfer: Transfer) {
        self.transfers.push(transfer);
    }

    pub fn build(self, default_interchange: Duration) -> Result<Timetable> {
        let num_stops = self.idx_to_stop_id.len();

        let mut trips = Vec::with_capacity(self.trips.len());
        for pending in &self.trips {
            validate_trip(pending)?;
        }
        for pending in self.trips {
            trips.push(Trip {
                trip_id: pending.trip_id,
                route_id: pending.route_id,
                direction_id: pending.direction_id,
                service: pending.service,
                stop_times: pending.stop_times,
            });
        }

        let routes = derive_routes(&trips);

        let mut routes_by_stop: Vec<RouteStopList> = vec![RouteStopList::new(); num_stops];
        for (route_idx, route) in routes.iter().enumerate() {
            for (offset, &stop) in route.stops.iter().enumerate() {
                routes_by_stop[stop as usize].push((route_idx as RouteIndex, offset as u32));
            }
        }

        let mut transfers_by_origin: Vec<Vec<Transfer>> = vec![Vec::new(); num_stops];
        let mut transfers_by_destination: Vec<Vec<Transfer>> = vec![Vec::new(); num_stops];
        let mut interchange = self.interchange;
        for t in self.transfers {
            if t.origin == t.destination {
                let entry = interchange.entry(t.origin).or_insert(t.duration);
                if t.duration < *entry {
                    *entry = t.duration;
                }
                continue;
            }
            transfers_by_origin[t.origin as usize].push(t);
            transfers_by_destination[t.destination as usize].push(t);
        }

        Ok(Timetable {
            stop_id_to_idx: self.stop_id_to_idx,
            idx_to_stop_id: self.idx_to_stop_id,
            trips,
            routes,
            routes_by_stop,
            transfers_by_origin,
            transfers_by_destination,
            interchange,
            default_interchange,
            calendar: Calendar::new(self.services),
        })
    }
}

fn validate_trip(trip: &PendingTrip) -> Result<()> {
    if trip.stop_times.len() < 2 {
        return Err(RaptorError::MalformedFeed(format!(
            "trip {} has fewer than two stop-times",
            trip.trip_id
        )));
    }
    let mut prev_sequence = None;
    for (i, st) in trip.stop_times.iter().enumerate() {
        if st.arrival > st.departure {
            return Err(RaptorError::MalformedFeed(format!(
                "trip {} stop-time {i} has arrival after departure",
                trip.trip_id
            )));
        }
        if let Some(prev) = prev_sequence
            && st.stop_sequence <= prev
        {
            return Err(RaptorError::MalformedFeed(format!(
                "trip {} stop_sequence is not strictly increasing at index {i}",
                trip.trip_id
            )));
        }
        prev_sequence = Some(st.stop_sequence);
        if i > 0 && trip.stop_times[i - 1].departure > st.arrival {
            return Err(RaptorError::MalformedFeed(format!(
                "trip {} departure at stop-time {} is after arrival at stop-time {i}",
                trip.trip_id,
                i - 1
            )));
        }
    }
    Ok(())
}

/// Groups trips by their exact ordered stop sequence into RAPTOR routes,
/// then sorts each route's trips by first-stop departure time (ties broken
/// by `trip_id`, for deterministic results).
fn derive_routes(trips: &[Trip]) -> Vec<RaptorRoute> {
    let mut signature_to_route: HashMap<Vec<StopIndex>, RouteIndex> = HashMap::new();
    let mut routes: Vec<RaptorRoute> = Vec::new();

    for (trip_idx, trip) in trips.iter().enumerate() {
        let signature: Vec<StopIndex> = trip.stop_times.iter().map(|st| st.stop).collect();
        let route_idx = *signature_to_route.entry(signature.clone()).or_insert_with(|| {
            routes.push(RaptorRoute {
                stops: signature,
                trips: Vec::new(),
            });
            (routes.len() - 1) as RouteIndex
        });
        routes[route_idx as usize].trips.push(trip_idx as TripIndex);
    }

    for route in &mut routes {
        route.trips.sort_by(|&a, &b| {
            let ta = &trips[a as usize];
            let tb = &trips[b as usize];
            ta.first_departure()
                .cmp(&tb.first_departure())
                .then_with(|| ta.trip_id.cmp(&tb.trip_id))
        });
    }

    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Service;

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
    fn trips_on_the_same_stop_sequence_share_a_route() {
        let mut b = TimetableBuilder::new();
        let s1 = b.add_stop("S1");
        let s2 = b.add_stop("S2");
        let svc = b.add_service(always_running_service());

        b.add_trip(
            "T1",
            "L1",
            0,
            svc,
            vec![st(s1, 1, 0, 0), st(s2, 2, 300, 300)],
        );
        b.add_trip(
            "T2",
            "L1",
            0,
            svc,
            vec![st(s1, 1, 600, 600), st(s2, 2, 900, 900)],
        );

        let tt = b.build(120).unwrap();
        assert_eq!(tt.num_routes(), 1);
        let route = tt.route(0);
        assert_eq!(route.trips, vec![0, 1]);
    }

    #[test]
    fn route_trips_are_sorted_by_departure_then_trip_id() {
        let mut b = TimetableBuilder::new();
        let s1 = b.add_stop("S1");
        let s2 = b.add_stop("S2");
        let svc = b.add_service(always_running_service());

        b.add_trip(
            "T_later",
            "L1",
            0,
            svc,
            vec![st(s1, 1, 600, 600), st(s2, 2, 900, 900)],
        );
        b.add_trip(
            "T_earlier",
            "L1",
            0,
            svc,
            vec![st(s1, 1, 0, 0), st(s2, 2, 300, 300)],
        );

        let tt = b.build(120).unwrap();
        let route = tt.route(0);
        assert_eq!(tt.trip(route.trips[0]).trip_id, "T_earlier");
        assert_eq!(tt.trip(route.trips[1]).trip_id, "T_later");
    }

    #[test]
    fn distinct_stop_sequences_become_distinct_routes() {
        let mut b = TimetableBuilder::new();
        let s1 = b.add_stop("S1");
        let s2 = b.add_stop("S2");
        let s3 = b.add_stop("S3");
        let svc = b.add_service(always_running_service());

        b.add_trip("T1", "L1", 0, svc, vec![st(s1, 1, 0, 0), st(s2, 2, 300, 300)]);
        b.add_trip(
            "T2",
            "L2",
            0,
            svc,
            vec![st(s1, 1, 0, 0), st(s3, 2, 300, 300)],
        );

        let tt = b.build(120).unwrap();
        assert_eq!(tt.num_routes(), 2);
    }

    #[test]
    fn rejects_non_monotonic_stop_times() {
        let mut b = TimetableBuilder::new();
        let s1 = b.add_stop("S1");
        let s2 = b.add_stop("S2");
        let svc = b.add_service(always_running_service());

        b.add_trip(
            "T1",
            "L1",
            0,
            svc,
            vec![st(s1, 1, 0, 500), st(s2, 2, 100, 100)],
        );

        assert!(b.build(120).is_err());
    }

    #[test]
    fn same_stop_self_transfer_becomes_interchange() {
        let mut b = TimetableBuilder::new();
        let s1 = b.add_stop("S1");
        b.add_transfer(Transfer {
            origin: s1,
            destination: s1,
            duration: 90,
            start_time: None,
            end_time: None,
        });

        let tt = b.build(120).unwrap();
        assert_eq!(tt.interchange(s1), 90);
    }

    #[test]
    fn default_interchange_applies_when_absent() {
        let b = TimetableBuilder::new();
        let tt = b.build(120).unwrap();
        assert_eq!(tt.interchange(0), 120);
    }
}
