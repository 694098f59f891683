//! Thin adapter from a parsed [`gtfs_structures::Gtfs`] feed into a
//! [`TimetableBuilder`]. GTFS ingestion itself (CSV parsing, zip handling)
//! is out of scope — `gtfs_structures` does that; this module only
//! re-shapes its already-parsed structures into the dense index form the
//! scanner expects.

use std::collections::HashMap;

use gtfs_structures::{Calendar as GtfsCalendar, CalendarDate, Exception, Gtfs};

use crate::calendar::{Date, Service};
use crate::error::{RaptorError, Result};
use crate::model::{StopTime, TimetableBuilder, Transfer};

fn naive_to_compact(date: chrono::NaiveDate) -> Date {
    use chrono::Datelike;
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

fn weekday_mask(calendar: &GtfsCalendar) -> [bool; 7] {
    // gtfs_structures::Calendar is Monday-first; `Service::weekday_mask` is
    // Sunday = 0 .. Saturday = 6.
    [
        calendar.sunday,
        calendar.monday,
        calendar.tuesday,
        calendar.wednesday,
        calendar.thursday,
        calendar.friday,
        calendar.saturday,
    ]
}

fn build_service(calendar: Option<&GtfsCalendar>, dates: &[CalendarDate]) -> Service {
    let (start_date, end_date, mask) = match calendar {
        Some(c) => (
            naive_to_compact(c.start_date),
            naive_to_compact(c.end_date),
            weekday_mask(c),
        ),
        // A feed may define a service purely through calendar_dates.txt.
        None => (0, 99_999_999, [false; 7]),
    };

    let mut include_dates = Vec::new();
    let mut exclude_dates = Vec::new();
    for exception in dates {
        let date = naive_to_compact(exception.date);
        match exception.exception_type {
            Exception::Added => include_dates.push(date),
            Exception::Deleted => exclude_dates.push(date),
        }
    }

    Service {
        start_date,
        end_date,
        weekday_mask: mask,
        include_dates,
        exclude_dates,
    }
}

/// Builds a [`TimetableBuilder`] from an already-parsed GTFS feed. Call
/// [`TimetableBuilder::build`] on the result to get a [`crate::Timetable`].
pub fn from_gtfs(gtfs: &Gtfs) -> Result<TimetableBuilder> {
    let mut builder = TimetableBuilder::new();

    for stop in gtfs.stops.values() {
        builder.add_stop(stop.id.clone());
    }

    let mut service_index: HashMap<String, u32> = HashMap::new();
    let mut service_ids: Vec<&String> = gtfs
        .calendar
        .keys()
        .chain(gtfs.calendar_dates.keys())
        .collect();
    service_ids.sort();
    service_ids.dedup();
    for service_id in service_ids {
        let calendar = gtfs.calendar.get(service_id);
        let dates = gtfs
            .calendar_dates
            .get(service_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let idx = builder.add_service(build_service(calendar, dates));
        service_index.insert(service_id.clone(), idx);
    }

    for trip in gtfs.trips.values() {
        let service_id = service_index.get(&trip.service_id).copied().ok_or_else(|| {
            RaptorError::MalformedFeed(format!(
                "trip {} references unknown service {}",
                trip.id, trip.service_id
            ))
        })?;

        let mut stop_times = Vec::with_capacity(trip.stop_times.len());
        for st in &trip.stop_times {
            let stop_idx = builder.add_stop(st.stop.id.clone());
            let arrival = st
                .arrival_time
                .ok_or_else(|| {
                    RaptorError::MalformedFeed(format!(
                        "trip {} stop-time missing arrival_time",
                        trip.id
                    ))
                })
                .map(|secs| secs as i64)?;
            let departure = st
                .departure_time
                .ok_or_else(|| {
                    RaptorError::MalformedFeed(format!(
                        "trip {} stop-time missing departure_time",
                        trip.id
                    ))
                })
                .map(|secs| secs as i64)?;

            stop_times.push(StopTime {
                stop: stop_idx,
                arrival,
                departure,
                stop_sequence: st.stop_sequence as u32,
                pickup: st.pickup_type == gtfs_structures::PickupDropOffType::Regular,
                drop_off: st.drop_off_type == gtfs_structures::PickupDropOffType::Regular,
                headsign: st.stop_headsign.clone(),
            });
        }
        stop_times.sort_by_key(|st| st.stop_sequence);

        let route_id = trip.route_id.clone();
        let direction_id = trip.direction_id.map(|d| d as u8).unwrap_or(0);

        builder.add_trip(trip.id.clone(), route_id, direction_id, service_id, stop_times);
    }

    for stop in gtfs.stops.values() {
        for transfer in &stop.transfers {
            let origin = builder.add_stop(stop.id.clone());
            let destination = builder.add_stop(transfer.to_stop_id.clone());
            let duration = transfer.min_transfer_time.map(|d| d as i64).unwrap_or(0);
            builder.add_transfer(Transfer {
                origin,
                destination,
                duration,
                start_time: None,
                end_time: None,
            });
        }
    }

    Ok(builder)
}
