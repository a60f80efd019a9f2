//!
//! Signal propagation between stations and the arbiter.
//!

use crate::config::secs;
use crate::station::StationId;
use crate::time::Duration;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

///
/// A point on the simulation plane, in meters.
///
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The euclidean distance to another position.
    #[must_use]
    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

///
/// The static delay table of a run.
///
/// Computed once from the positions, `delay(i, j) = |p_i - p_j| / speed`.
/// Each station also gets the explicit list of its peers, so that
/// broadcasts never have to exclude the sender by index arithmetic.
///
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationModel {
    speed: f64,
    positions: Vec<Position>,
    arbiter: Position,

    delays: Vec<Vec<Duration>>,
    arbiter_delays: Vec<Duration>,
    peers: Vec<Vec<StationId>>,
}

impl PropagationModel {
    ///
    /// Builds the delay table for the given station positions.
    ///
    /// The speed must be positive, which [`SimConfig::validate`](crate::config::SimConfig::validate)
    /// guarantees.
    ///
    #[must_use]
    pub fn new(stations: &[Position], arbiter: Position, speed: f64) -> Self {
        let delays = stations
            .iter()
            .map(|a| {
                stations
                    .iter()
                    .map(|b| secs(a.distance(b) / speed))
                    .collect()
            })
            .collect();

        let arbiter_delays = stations
            .iter()
            .map(|p| secs(p.distance(&arbiter) / speed))
            .collect();

        let peers = (0..stations.len())
            .map(|me| {
                (0..stations.len())
                    .filter(|&other| other != me)
                    .map(StationId)
                    .collect()
            })
            .collect();

        Self {
            speed,
            positions: stations.to_vec(),
            arbiter,
            delays,
            arbiter_delays,
            peers,
        }
    }

    /// The number of stations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether there are no stations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The signal speed in m/s.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The position of a station.
    #[must_use]
    pub fn position(&self, station: StationId) -> Position {
        self.positions[station.0]
    }

    /// The position of the arbiter.
    #[must_use]
    pub fn arbiter_position(&self) -> Position {
        self.arbiter
    }

    /// The delay between two stations.
    #[must_use]
    pub fn delay(&self, from: StationId, to: StationId) -> Duration {
        self.delays[from.0][to.0]
    }

    /// The delay between a station and the arbiter.
    #[must_use]
    pub fn arbiter_delay(&self, station: StationId) -> Duration {
        self.arbiter_delays[station.0]
    }

    /// All stations except the given one.
    #[must_use]
    pub fn peers(&self, station: StationId) -> &[StationId] {
        &self.peers[station.0]
    }

    /// Every peer together with its delay from `station`.
    pub fn peer_delays(&self, station: StationId) -> impl Iterator<Item = (StationId, Duration)> + '_ {
        self.peers(station)
            .iter()
            .map(move |&peer| (peer, self.delay(station, peer)))
    }
}
