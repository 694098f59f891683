//! A multi-round RAPTOR journey planner over scheduled transit timetables.
//!
//! [`RaptorEngine`] owns one prepared [`Timetable`] plus a [`RaptorConfig`]
//! and answers depart-after / arrive-by queries against it. Build one
//! engine per feed at startup; query it from as many callers as you like —
//! it never mutates its own state.
//!
//! ```no_run
//! use raptor::{RaptorEngine, RaptorConfig};
//!
//! let gtfs = gtfs_structures::Gtfs::new("feed.zip").unwrap();
//! let engine = RaptorEngine::from_gtfs(&gtfs, RaptorConfig::default()).unwrap();
//! let journey = engine.plan_depart_after("STOP_A", "STOP_B", 20250106, 8 * 3600);
//! ```

pub mod calendar;
pub mod config;
pub mod error;
pub mod filters;
pub mod gtfs;
pub mod model;
pub mod query;
pub mod rematch;
pub mod results;
pub mod scanner;
pub mod time;

pub use calendar::{day_of_week, Date, DayOfWeek};
pub use config::RaptorConfig;
pub use error::{RaptorError, Result};
pub use model::{RouteId, StopId, Timetable, TimetableBuilder};
pub use query::StopGroup;
pub use results::{Journey, Leg};
pub use time::Time;

/// Single immutable handle on a prepared timetable and its query
/// configuration. Mirrors `blaise`'s `Repository` → `Raptor` builder
/// pattern, folded into one type that owns the timetable outright rather
/// than holding it as process-wide global state.
pub struct RaptorEngine {
    timetable: Timetable,
    config: RaptorConfig,
}

impl RaptorEngine {
    pub fn new(timetable: Timetable, config: RaptorConfig) -> Self {
        Self { timetable, config }
    }

    /// Ingests an already-parsed GTFS feed and prepares it for querying.
    pub fn from_gtfs(feed: &gtfs_structures::Gtfs, config: RaptorConfig) -> Result<Self> {
        let builder = gtfs::from_gtfs(feed)?;
        let timetable = builder.build(config.min_interchange)?;
        Ok(Self::new(timetable, config))
    }

    pub fn timetable(&self) -> &Timetable {
        &self.timetable
    }

    pub fn config(&self) -> &RaptorConfig {
        &self.config
    }

    /// Earliest-arrival query between two single stops. For stations with
    /// multiple platforms, use [`Self::plan_depart_after_group`].
    pub fn plan_depart_after(
        &self,
        source: &str,
        target: &str,
        date: Date,
        departure: Time,
    ) -> Result<Option<Journey>> {
        let source_id = source.to_string();
        let target_id = target.to_string();
        self.plan_depart_after_group(
            &StopGroup::single(&source_id),
            &StopGroup::single(&target_id),
            date,
            departure,
        )
    }

    pub fn plan_depart_after_group(
        &self,
        source: &StopGroup,
        target: &StopGroup,
        date: Date,
        departure: Time,
    ) -> Result<Option<Journey>> {
        query::plan_depart_after(&self.timetable, &self.config, source, target, date, departure)
    }

    /// Latest-departure query between two single stops.
    pub fn plan_arrive_by(
        &self,
        source: &str,
        target: &str,
        date: Date,
        arrival: Time,
    ) -> Result<Option<Journey>> {
        let source_id = source.to_string();
        let target_id = target.to_string();
        self.plan_arrive_by_group(
            &StopGroup::single(&source_id),
            &StopGroup::single(&target_id),
            date,
            arrival,
        )
    }

    pub fn plan_arrive_by_group(
        &self,
        source: &StopGroup,
        target: &StopGroup,
        date: Date,
        arrival: Time,
    ) -> Result<Option<Journey>> {
        query::plan_arrive_by(&self.timetable, &self.config, source, target, date, arrival)
    }

    /// All Pareto-optimal (arrival, transfers) journeys from `source` to
    /// `target` on `date`, departing no earlier than `departure`.
    pub fn plan_depart_after_pareto(
        &self,
        source: &str,
        target: &str,
        date: Date,
        departure: Time,
    ) -> Result<Vec<Journey>> {
        let source_idx = self
            .timetable
            .stop_index(source)
            .ok_or_else(|| RaptorError::UnknownStop(source.to_string()))?;
        let target_idx = self
            .timetable
            .stop_index(target)
            .ok_or_else(|| RaptorError::UnknownStop(target.to_string()))?;
        let dow = day_of_week(date);
        let result = scanner::scan_depart_after(
            &self.timetable,
            &self.config,
            source_idx,
            departure,
            date,
            dow,
            Some(target_idx),
        );
        filters::forward_pareto_front(&self.timetable, &result, target_idx)
    }

    /// Re-finds the concrete trips of `journey` against `date`, departing
    /// no earlier than `anchor`.
    pub fn re_match_depart_after(
        &self,
        journey: &Journey,
        date: Date,
        anchor: Time,
    ) -> Result<Journey> {
        rematch::re_match_depart_after(&self.timetable, journey, date, day_of_week(date), anchor)
    }

    /// Re-finds the concrete trips of `journey` against `date`, arriving no
    /// later than `anchor`.
    pub fn re_match_arrive_by(
        &self,
        journey: &Journey,
        date: Date,
        anchor: Time,
    ) -> Result<Journey> {
        rematch::re_match_arrive_by(&self.timetable, journey, date, day_of_week(date), anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Service;
    use crate::model::StopTime;

    fn always_running_service() -> Service {
        Service {
            start_date: 20250101,
            end_date: 20251231,
            weekday_mask: [true; 7],
            include_dates: vec![],
            exclude_dates: vec![],
        }
    }

    fn st(stop: model::StopIndex, seq: u32, arr: Time, dep: Time) -> StopTime {
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
    fn engine_answers_a_direct_query_end_to_end() {
        let mut b = TimetableBuilder::new();
        let a = b.add_stop("A");
        let c = b.add_stop("C");
        let svc = b.add_service(always_running_service());
        b.add_trip("T1", "L1", 0, svc, vec![st(a, 1, 0, 1000), st(c, 2, 2000, 2000)]);
        let tt = b.build(120).unwrap();

        let engine = RaptorEngine::new(tt, RaptorConfig::default());
        let journey = engine
            .plan_depart_after("A", "C", 20250106, 1000)
            .unwrap()
            .unwrap();
        assert_eq!(journey.arrival, 2000);
    }

    #[test]
    fn engine_treats_unknown_stops_as_absent() {
        let b = TimetableBuilder::new();
        let tt = b.build(120).unwrap();
        let engine = RaptorEngine::new(tt, RaptorConfig::default());
        let journey = engine
            .plan_depart_after("NOPE", "ALSO_NOPE", 20250106, 0)
            .unwrap();
        assert!(journey.is_none());
    }

    #[test]
    fn pareto_query_still_reports_unknown_stops() {
        let b = TimetableBuilder::new();
        let tt = b.build(120).unwrap();
        let engine = RaptorEngine::new(tt, RaptorConfig::default());
        let err = engine
            .plan_depart_after_pareto("NOPE", "ALSO_NOPE", 20250106, 0)
            .unwrap_err();
        assert!(matches!(err, RaptorError::UnknownStop(_)));
    }
}
