//! Walks through a small synthetic feed exercising this crate's end-to-end
//! behaviour: a direct trip, an explicit one-transfer itinerary, arrive-by
//! symmetry, a missed-same-day rollover onto the next service day, the
//! Pareto front, route-uniqueness rejecting a looped journey, and
//! re-matching a journey onto a new day.
//!
//! Run with `cargo run --example scenarios`.

use std::time::Duration as StdDuration;

use anyhow::Context;
use raptor::calendar::Service;
use raptor::model::{StopTime, TimetableBuilder};
use raptor::{RaptorConfig, RaptorEngine};

fn fmt_seconds_since_midnight(t: i64) -> String {
    humantime::format_duration(StdDuration::from_secs(t.rem_euclid(86_400) as u64)).to_string()
}

fn always_running() -> Service {
    Service {
        start_date: 20250101,
        end_date: 20251231,
        weekday_mask: [true; 7],
        include_dates: vec![],
        exclude_dates: vec![],
    }
}

fn st(stop: u32, seq: u32, arrival: i64, departure: i64) -> StopTime {
    StopTime {
        stop,
        arrival,
        departure,
        stop_sequence: seq,
        pickup: true,
        drop_off: true,
        headsign: None,
    }
}

fn build_engine() -> anyhow::Result<RaptorEngine> {
    let mut b = TimetableBuilder::new();
    let s1 = b.add_stop("S1");
    let s2 = b.add_stop("S2");
    let s3 = b.add_stop("S3");
    let s4 = b.add_stop("S4");
    let svc = b.add_service(always_running());

    // L1: S1 -> S2 -> S3, departures 08:00, 08:05, 08:10.
    b.add_trip(
        "L1-1",
        "L1",
        0,
        svc,
        vec![st(s1, 1, 28_800, 28_800), st(s2, 2, 29_100, 29_100), st(s3, 3, 29_400, 29_400)],
    );
    // L2: S2 -> S3, departures 08:10, arrival 08:20 (transfer scenario).
    b.add_trip("L2-1", "L2", 0, svc, vec![st(s2, 1, 29_400, 29_400), st(s3, 2, 30_000, 30_000)]);
    // L3: S4 -> S2, the only line serving S4, forcing a transfer onto L2
    // for anyone travelling from S4 to S3 (it arrives S2 too late to catch
    // L1's 08:05 departure there once the minimum interchange is added).
    b.add_trip("L3-1", "L3", 0, svc, vec![st(s4, 1, 28_700, 28_700), st(s2, 2, 29_000, 29_000)]);
    // A same-day-only trip so a departure request late in the day has
    // nothing left to catch and must roll over onto the next service day.
    b.add_trip("L1-2", "L1", 0, svc, vec![st(s1, 1, 72_000, 72_000), st(s2, 2, 72_300, 72_300)]);

    b.add_transfer(raptor::model::Transfer {
        origin: s2,
        destination: s2,
        duration: 120,
        start_time: None,
        end_time: None,
    });

    let tt = b.build(120).context("building timetable")?;
    Ok(RaptorEngine::new(tt, RaptorConfig::default()))
}

/// A second, disconnected feed whose only path between its two stops rides
/// the same marketed line out and back (`SAME_LINE` west-bound, then
/// `SAME_LINE` east-bound), transferring in between. Kept separate from
/// [`build_engine`]'s feed so this loop shape can't interfere with the
/// other scenarios' results.
fn build_loop_engine() -> anyhow::Result<RaptorEngine> {
    let mut b = TimetableBuilder::new();
    let a = b.add_stop("LOOP_A");
    let m = b.add_stop("LOOP_M");
    let c = b.add_stop("LOOP_C");
    let svc = b.add_service(always_running());

    b.add_trip("OUT", "SAME_LINE", 0, svc, vec![st(a, 1, 0, 0), st(m, 2, 1000, 1000)]);
    b.add_trip("BACK", "SAME_LINE", 1, svc, vec![st(m, 1, 1200, 1200), st(c, 2, 2000, 2000)]);
    b.add_transfer(raptor::model::Transfer {
        origin: m,
        destination: m,
        duration: 60,
        start_time: None,
        end_time: None,
    });

    let tt = b.build(120).context("building loop timetable")?;
    Ok(RaptorEngine::new(tt, RaptorConfig::default()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let engine = build_engine()?;

    let direct = engine.plan_depart_after("S1", "S3", 20250101, 27_000)?;
    if let Some(j) = &direct {
        println!(
            "direct trip: departs {}, arrives {}",
            fmt_seconds_since_midnight(j.departure),
            fmt_seconds_since_midnight(j.arrival)
        );
    }

    // Scenario: S4 is only served by L3, so reaching S3 requires boarding
    // L3 to S2 and transferring onto L1 or L2 — an itinerary with an
    // explicit transfer leg rather than a ride that happens to dominate.
    let one_transfer = engine.plan_depart_after("S4", "S3", 20250101, 28_600)?;
    if let Some(j) = &one_transfer {
        println!(
            "one-transfer itinerary: departs {}, arrives {}, {} leg(s)",
            fmt_seconds_since_midnight(j.departure),
            fmt_seconds_since_midnight(j.arrival),
            j.legs.len()
        );
        for leg in &j.legs {
            println!("  {leg:?}");
        }
    }

    let arrive_by = engine.plan_arrive_by("S1", "S3", 20250101, 30_000)?;
    println!("arrive-by symmetry: {arrive_by:#?}");

    // Scenario: nothing departs S1 after L1-2's 20:00 run, so a request
    // later in the day must roll over onto the next service day's first
    // trip, with the result shifted back into the requested day's frame.
    let missed_same_day = engine.plan_depart_after("S1", "S3", 20250101, 73_000)?;
    if let Some(j) = &missed_same_day {
        println!(
            "missed-same-day catch: departs {} (+{} day(s)), arrives {} (+{} day(s))",
            fmt_seconds_since_midnight(j.departure),
            j.departure.div_euclid(86_400),
            fmt_seconds_since_midnight(j.arrival),
            j.arrival.div_euclid(86_400)
        );
    }

    let pareto = engine.plan_depart_after_pareto("S1", "S3", 20250101, 27_000)?;
    println!("pareto front ({} candidates): {pareto:#?}", pareto.len());

    // Scenario: the only path from LOOP_A to LOOP_C rides SAME_LINE out,
    // transfers, then rides SAME_LINE back — route-uniqueness rejects it,
    // so the front comes back empty rather than returning a looped journey.
    let loop_engine = build_loop_engine()?;
    let loop_front = loop_engine.plan_depart_after_pareto("LOOP_A", "LOOP_C", 20250101, 0)?;
    println!(
        "route-uniqueness rejects the loop: {} candidate(s) survive",
        loop_front.len()
    );

    if let Some(journey) = direct {
        let re_matched = engine.re_match_depart_after(&journey, 20250102, 28_800)?;
        println!("re-matched onto 2025-01-02: {re_matched:#?}");
    }

    Ok(())
}
