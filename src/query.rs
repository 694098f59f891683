//! Group-station queries and multi-day stitching.
//!
//! A "group" is a set of stops a caller treats as interchangeable access
//! points to the same place — e.g. every platform of one station. Each
//! member stop may carry its own access/egress walk time to the group's
//! notional front door.
//!
//! Service days are tried one at a time rather than folded into a single
//! scan, and results from a day other than the one literally requested
//! are shifted back into the caller's frame before being returned. The
//! "-1 / 0" pair catches post-midnight trips recorded under the *other*
//! calendar day's numbering (GTFS allows `HH >= 24`); the remaining days
//! are a "nothing served the request, try the next available day"
//! fallback.

use std::collections::HashMap;

use crate::calendar::{shift_days, Date};
use crate::config::RaptorConfig;
use crate::error::Result;
use crate::model::{StopId, StopIndex, Timetable};
use crate::results::{build_forward_journey, build_reverse_journey, Journey, Leg};
use crate::scanner::{scan_arrive_by, scan_depart_after};
use crate::time::{Duration, Time};

/// A group of interchangeable stops, each with its own access/egress time
/// to the group's notional entrance (zero if the caller doesn't care).
pub struct StopGroup<'a> {
    pub stops: &'a [StopId],
    pub access_times: Option<&'a HashMap<StopId, Duration>>,
}

impl<'a> StopGroup<'a> {
    pub fn single(stop: &'a StopId) -> Self {
        Self {
            stops: std::slice::from_ref(stop),
            access_times: None,
        }
    }

    fn access_time(&self, stop_id: &str) -> Duration {
        self.access_times
            .and_then(|m| m.get(stop_id))
            .copied()
            .unwrap_or(0)
    }

    /// Resolves every member stop that exists in `tt`, dropping (and
    /// logging) any that don't rather than failing the whole group: an
    /// unknown origin/destination is treated as absent, not an error.
    fn resolve(&self, tt: &Timetable) -> Vec<(StopIndex, Duration)> {
        self.stops
            .iter()
            .filter_map(|id| match tt.stop_index(id) {
                Some(idx) => Some((idx, self.access_time(id))),
                None => {
                    tracing::warn!(stop_id = %id, "dropping unknown stop from query group");
                    None
                }
            })
            .collect()
    }
}

fn shift_journey(journey: &mut Journey, delta: Time) {
    journey.departure += delta;
    journey.arrival += delta;
    for leg in &mut journey.legs {
        if let Leg::Transit {
            departure, arrival, ..
        } = leg
        {
            *departure += delta;
            *arrival += delta;
        }
    }
}

fn better_forward(a: &Journey, b: &Journey) -> bool {
    (a.arrival, a.transfers) < (b.arrival, b.transfers)
}

fn better_reverse(a: &Journey, b: &Journey) -> bool {
    (std::cmp::Reverse(a.departure), a.transfers) < (std::cmp::Reverse(b.departure), b.transfers)
}

/// Earliest-arrival group query: leave any stop in `source` at or after
/// `departure` on `date`, reach any stop in `target`.
pub fn plan_depart_after(
    tt: &Timetable,
    config: &RaptorConfig,
    source: &StopGroup,
    target: &StopGroup,
    date: Date,
    departure: Time,
) -> Result<Option<Journey>> {
    let sources = source.resolve(tt);
    let targets = target.resolve(tt);
    if sources.is_empty() || targets.is_empty() {
        return Ok(None);
    }

    for day_offset in [0_i64, -1] {
        let anchor = departure - day_offset * config.day_rollover_offset;
        if let Some(journey) =
            scan_group_forward(tt, config, &sources, &targets, date, day_offset, anchor)?
        {
            return Ok(Some(journey));
        }
    }

    for day_offset in 1..config.max_search_days as i64 {
        tracing::trace!(day_offset, "falling through to a later service day");
        if let Some(journey) =
            scan_group_forward(tt, config, &sources, &targets, date, day_offset, 0)?
        {
            return Ok(Some(journey));
        }
    }

    Ok(None)
}

#[allow(clippy::too_many_arguments)]
fn scan_group_forward(
    tt: &Timetable,
    config: &RaptorConfig,
    sources: &[(StopIndex, Duration)],
    targets: &[(StopIndex, Duration)],
    date: Date,
    day_offset: i64,
    anchor: Time,
) -> Result<Option<Journey>> {
    let (shifted_date, shifted_dow) = shift_days(date, day_offset);
    let mut best: Option<Journey> = None;

    for &(source_stop, access) in sources {
        let departure = anchor + access;
        let result = scan_depart_after(
            tt,
            config,
            source_stop,
            departure,
            shifted_date,
            shifted_dow,
            Some(targets[0].0),
        );
        for &(target_stop, egress) in targets {
            if let Some(mut journey) = build_forward_journey(tt, &result, target_stop)? {
                journey.arrival += egress;
                let delta = day_offset * config.day_rollover_offset;
                if delta != 0 {
                    shift_journey(&mut journey, delta);
                }
                if best.as_ref().is_none_or(|b| better_forward(&journey, b)) {
                    best = Some(journey);
                }
            }
        }
    }

    Ok(best)
}

/// Latest-departure group query: arrive at any stop in `target` at or
/// before `arrival` on `date`, leave any stop in `source`.
pub fn plan_arrive_by(
    tt: &Timetable,
    config: &RaptorConfig,
    source: &StopGroup,
    target: &StopGroup,
    date: Date,
    arrival: Time,
) -> Result<Option<Journey>> {
    let sources = source.resolve(tt);
    let targets = target.resolve(tt);
    if sources.is_empty() || targets.is_empty() {
        return Ok(None);
    }

    for day_offset in [0_i64, 1] {
        let anchor = arrival - day_offset * config.day_rollover_offset;
        if let Some(journey) =
            scan_group_reverse(tt, config, &sources, &targets, date, day_offset, anchor)?
        {
            return Ok(Some(journey));
        }
    }

    for day_offset in 1..config.max_search_days as i64 {
        tracing::trace!(day_offset = -day_offset, "falling through to an earlier service day");
        let anchor = config.day_rollover_offset;
        if let Some(journey) =
            scan_group_reverse(tt, config, &sources, &targets, date, -day_offset, anchor)?
        {
            return Ok(Some(journey));
        }
    }

    Ok(None)
}

#[allow(clippy::too_many_arguments)]
fn scan_group_reverse(
    tt: &Timetable,
    config: &RaptorConfig,
    sources: &[(StopIndex, Duration)],
    targets: &[(StopIndex, Duration)],
    date: Date,
    day_offset: i64,
    anchor: Time,
) -> Result<Option<Journey>> {
    let (shifted_date, shifted_dow) = shift_days(date, day_offset);
    let mut best: Option<Journey> = None;

    for &(target_stop, egress) in targets {
        let arrival = anchor - egress;
        let result = scan_arrive_by(
            tt,
            config,
            target_stop,
            arrival,
            shifted_date,
            shifted_dow,
            Some(sources[0].0),
        );
        for &(source_stop, access) in sources {
            if let Some(mut journey) = build_reverse_journey(tt, &result, source_stop)? {
                journey.departure -= access;
                let delta = day_offset * config.day_rollover_offset;
                if delta != 0 {
                    shift_journey(&mut journey, delta);
                }
                if best.as_ref().is_none_or(|b| better_reverse(&journey, b)) {
                    best = Some(journey);
                }
            }
        }
    }

    Ok(best)
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
    fn finds_a_direct_trip_within_a_group() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        b.add_trip("T1", "L1", 0, svc, vec![st(a, 1, 0, 1000), st(c, 2, 2000, 2000)]);
        let tt = b.build(120).unwrap();

        let a_id = "A".to_string();
        let c_id = "C".to_string();
        let source = StopGroup::single(&a_id);
        let target = StopGroup::single(&c_id);

        let journey = plan_depart_after(&tt, &RaptorConfig::default(), &source, &target, 20250106, 1000)
            .unwrap()
            .unwrap();
        assert_eq!(journey.arrival, 2000);
    }

    #[test]
    fn falls_through_to_the_next_service_day_when_nothing_runs_today() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        // Only a single early trip; any later-in-the-day departure request
        // must fall through to the next calendar day's first trip.
        b.add_trip("T1", "L1", 0, svc, vec![st(a, 1, 0, 100), st(c, 2, 900, 900)]);
        let tt = b.build(120).unwrap();

        let a_id = "A".to_string();
        let c_id = "C".to_string();
        let source = StopGroup::single(&a_id);
        let target = StopGroup::single(&c_id);

        let journey = plan_depart_after(&tt, &RaptorConfig::default(), &source, &target, 20250106, 50_000)
            .unwrap()
            .unwrap();
        // One full day later, expressed back in the requested day's frame.
        assert_eq!(journey.departure, 100 + 86_400);
        assert_eq!(journey.arrival, 900 + 86_400);
    }

    #[test]
    fn unknown_stop_is_treated_as_absent_not_an_error() {
        let b = TimetableBuilder::new();
        let tt = b.build(120).unwrap();
        let missing = "NOPE".to_string();
        let target = missing.clone();
        let source = StopGroup::single(&missing);
        let target_group = StopGroup::single(&target);
        let journey = plan_depart_after(&tt, &RaptorConfig::default(), &source, &target_group, 20250106, 0)
            .unwrap();
        assert!(journey.is_none());
    }

    #[test]
    fn unknown_member_of_a_group_is_dropped_not_fatal() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        b.add_trip("T1", "L1", 0, svc, vec![st(a, 1, 0, 1000), st(c, 2, 2000, 2000)]);
        let tt = b.build(120).unwrap();

        let a_id = "A".to_string();
        let missing_id = "NOPE".to_string();
        let c_id = "C".to_string();
        let source_stops = [a_id, missing_id];
        let source = StopGroup {
            stops: &source_stops,
            access_times: None,
        };
        let target = StopGroup::single(&c_id);

        let journey = plan_depart_after(&tt, &RaptorConfig::default(), &source, &target, 20250106, 1000)
            .unwrap()
            .unwrap();
        assert_eq!(journey.arrival, 2000);
    }
}
