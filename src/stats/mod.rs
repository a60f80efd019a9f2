//!
//! A set of structs that help with the collection of statistical data.
//!
//! [`Statistics`] is the sink every [`MacSim`](crate::sim::MacSim) carries.
//! It folds the notification stream into counters and accumulators and
//! exports them as a serializable [`Summary`].
//!
#![allow(clippy::cast_precision_loss)]

use crate::observer::{Notification, Observer};
use crate::station::StationId;
use crate::time::{Duration, SimTime};
use serde::Serialize;

mod stddev;
pub use stddev::*;

///
/// A type that allows for statistical datacollection
/// inside a given runtime.
///
pub trait Statistic {
    ///
    /// The type of values that should be collected by
    /// this statistic.
    ///
    type Value;

    ///
    /// Collects  a datapoint at a given time with a given weight.
    /// This function is required since it is the core of the data collection.
    ///
    fn collect_weighted_at(&mut self, value: Self::Value, weight: f64, sim_time: SimTime);

    ///
    /// Collects a non-weighted (w=1) datapoint at a given time.
    ///
    fn collect_at(&mut self, value: Self::Value, sim_time: SimTime) {
        self.collect_weighted_at(value, 1.0, sim_time);
    }

    ///
    /// Collects a non.weighted datapoint at the current time.
    ///
    fn collect(&mut self, value: Self::Value) {
        self.collect_weighted_at(value, 1.0, SimTime::now());
    }

    /// Indicates whether the statistical object has received any datapoints.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of datapoints used in the statistical object.
    fn len(&self) -> usize;

    /// Returns the sum of all datapoints.
    fn sum(&self) -> Self::Value;

    /// Returns the smalles datapoint.
    fn min(&self) -> Self::Value;

    /// Returns the biggest datapoint.
    fn max(&self) -> Self::Value;

    /// Retuns the mean of all datapoints.
    fn mean(&self) -> Self::Value;

    /// Returns the standard derivation.
    fn std_derivation(&self) -> Self::Value;

    /// Returns the variance of all datapoints.
    fn variance(&self) -> Self::Value;
}

/// Per-station counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StationReport {
    /// Data frames put on the medium.
    pub sent: usize,
    /// Retries scheduled.
    pub backoffs: usize,
    /// Failures while the attempt counter sat at its ceiling.
    pub ceilings: usize,
    /// Reservation requests sent.
    pub requests: usize,
    /// Grant waits that timed out.
    pub timeouts: usize,
}

/// Reservation handshake counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReservationReport {
    /// Requests sent by all stations.
    pub requested: usize,
    /// Grants issued by the arbiter.
    pub granted: usize,
    /// Requests that arrived while another one was pending.
    pub conflicts: usize,
    /// Grant waits that timed out.
    pub timeouts: usize,
}

///
/// The aggregated result of a run.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Simulated time covered by the statistics, in seconds.
    pub elapsed: f64,
    /// Frames received without overlap.
    pub receptions: usize,
    /// Overlap episodes at the arbiter.
    pub collisions: usize,
    /// Frames lost in collisions.
    pub collided_frames: usize,
    /// Share of `elapsed` spent on successful receptions.
    pub throughput: f64,
    /// Share of `elapsed` the arbiter saw a busy medium.
    pub utilization: f64,
    /// Seconds of successful reception.
    pub success_time: f64,
    /// Seconds of collision.
    pub collision_time: f64,
    /// Length of collision episodes, in seconds.
    pub collision_length: StdDevReport,
    /// Drawn backoff delays, in seconds.
    pub backoff_delay: StdDevReport,
    /// Handshake counters.
    pub reservations: ReservationReport,
    /// Per-station counters, indexed by station id.
    pub stations: Vec<StationReport>,
}

///
/// The bundled statistics sink.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    start: SimTime,

    receptions: usize,
    collisions: usize,
    collided_frames: usize,
    success_time: Duration,
    collision_time: Duration,

    collision_length: StdDev,
    backoff_delay: StdDev,

    reservations: ReservationReport,
    stations: Vec<StationReport>,
}

impl Statistics {
    /// Creates an empty sink for `stations` stations, counting from `start`.
    #[must_use]
    pub fn new(stations: usize, start: SimTime) -> Self {
        Self {
            start,
            receptions: 0,
            collisions: 0,
            collided_frames: 0,
            success_time: Duration::ZERO,
            collision_time: Duration::ZERO,
            collision_length: StdDev::new(),
            backoff_delay: StdDev::new(),
            reservations: ReservationReport::default(),
            stations: vec![StationReport::default(); stations],
        }
    }

    /// Frames received without overlap.
    #[must_use]
    pub fn receptions(&self) -> usize {
        self.receptions
    }

    /// Overlap episodes.
    #[must_use]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Counters of one station.
    #[must_use]
    pub fn station(&self, id: StationId) -> Option<&StationReport> {
        self.stations.get(id.0)
    }

    fn station_mut(&mut self, id: StationId) -> &mut StationReport {
        if self.stations.len() <= id.0 {
            self.stations.resize(id.0 + 1, StationReport::default());
        }
        &mut self.stations[id.0]
    }

    ///
    /// Exports the collected data for a run that ended at `end`.
    ///
    #[must_use]
    pub fn summary(&self, end: SimTime) -> Summary {
        let elapsed = end.saturating_duration_since(self.start).as_secs_f64();
        let success_time = self.success_time.as_secs_f64();
        let collision_time = self.collision_time.as_secs_f64();
        let share = |t: f64| if elapsed > 0.0 { t / elapsed } else { 0.0 };

        Summary {
            elapsed,
            receptions: self.receptions,
            collisions: self.collisions,
            collided_frames: self.collided_frames,
            throughput: share(success_time),
            utilization: share(success_time + collision_time),
            success_time,
            collision_time,
            collision_length: self.collision_length.report(),
            backoff_delay: self.backoff_delay.report(),
            reservations: self.reservations,
            stations: self.stations.clone(),
        }
    }
}

impl Observer for Statistics {
    fn notify(&mut self, time: SimTime, notification: &Notification) {
        match *notification {
            Notification::Reception { duration, .. } => {
                self.receptions += 1;
                self.success_time += duration;
            }
            Notification::Collision {
                frames, duration, ..
            } => {
                self.collisions += 1;
                self.collided_frames += frames;
                self.collision_time += duration;
                self.collision_length
                    .collect_at(duration.as_secs_f64(), time);
            }
            Notification::FrameSent { station, .. } => {
                self.station_mut(station).sent += 1;
            }
            Notification::BackoffScheduled { station, delay, .. } => {
                self.station_mut(station).backoffs += 1;
                self.backoff_delay.collect_at(delay.as_secs_f64(), time);
            }
            Notification::BackoffCeiling { station, .. } => {
                self.station_mut(station).ceilings += 1;
            }
            Notification::ReservationRequested { station, .. } => {
                self.station_mut(station).requests += 1;
                self.reservations.requested += 1;
            }
            Notification::GrantIssued { .. } => self.reservations.granted += 1,
            Notification::ReservationConflict { .. } => self.reservations.conflicts += 1,
            Notification::ReservationTimeout { station } => {
                self.station_mut(station).timeouts += 1;
                self.reservations.timeouts += 1;
            }
            Notification::ChannelState { .. } | Notification::StationState { .. } => {}
        }
    }
}
