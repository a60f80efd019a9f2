//!
//! Error taxonomy of the simulation.
//!
//! Contention outcomes (collisions, retries, grant timeouts) are not
//! errors, they drive normal state transitions. Everything in here is
//! fatal: configuration errors never reach the event loop, protocol
//! errors abort the run they occur in.
//!

use crate::station::{MacState, StationId, TimerKind};
use crate::time::SimTime;
use std::path::PathBuf;

///
/// A violated invariant of the MAC protocol.
///
/// Every variant carries enough context to reconstruct what went wrong:
/// the station, its state and the simulated time of the violation.
///
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// An event arrived in a state with no defined transition for it.
    #[error("{station} received {event} in state {state:?} at {time}")]
    UnexpectedEvent {
        /// The receiving station.
        station: StationId,
        /// The state the station was in.
        state: MacState,
        /// A description of the offending event.
        event: String,
        /// The simulation time.
        time: SimTime,
    },

    /// More transmission ends were observed than transmission starts.
    #[error("{station} observed the end of a foreign frame with an idle medium ({state:?}) at {time}")]
    BusyUnderflow {
        /// The receiving station.
        station: StationId,
        /// The state the station was in.
        state: MacState,
        /// The simulation time.
        time: SimTime,
    },

    /// A timer was armed while a previous instance was still pending.
    #[error("{station} armed its {timer:?} timer twice (state {state:?}) at {time}")]
    TimerAlreadyArmed {
        /// The owning station.
        station: StationId,
        /// The logical purpose of the timer.
        timer: TimerKind,
        /// The state the station was in.
        state: MacState,
        /// The simulation time.
        time: SimTime,
    },

    /// A timer fired that the station no longer considered pending.
    #[error("{station} received a stale {timer:?} timer in state {state:?} at {time}")]
    StaleTimer {
        /// The owning station.
        station: StationId,
        /// The logical purpose of the timer.
        timer: TimerKind,
        /// The state the station was in.
        state: MacState,
        /// The simulation time.
        time: SimTime,
    },

    /// The arbiter was told a reception ended while it was receiving nothing.
    #[error("arbiter reception ended while idle at {time}")]
    ArbiterIdle {
        /// The simulation time.
        time: SimTime,
    },

    /// The arbiter's grant timer fired without a pending reservation.
    #[error("arbiter grant fired without a pending reservation at {time}")]
    NoPendingReservation {
        /// The simulation time.
        time: SimTime,
    },

    /// An event was addressed to a station that does not exist.
    #[error("event addressed to unknown {station} at {time}")]
    UnknownStation {
        /// The addressed station.
        station: StationId,
        /// The simulation time.
        time: SimTime,
    },
}

///
/// A rejected configuration. Raised at setup, before any event is scheduled.
///
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The path that was read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid YAML or does not match the schema.
    #[error("malformed configuration: {0}")]
    Yaml(#[from] serde_yml::Error),

    /// A parameter lies outside its valid range.
    #[error("parameter `{field}` is out of range: {reason}")]
    OutOfRange {
        /// The parameter name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The declared station count does not match the given positions.
    #[error("declared {declared} stations but {provided} positions were given")]
    StationCountMismatch {
        /// The value of `station_count`.
        declared: usize,
        /// The number of entries in `stations`.
        provided: usize,
    },

    /// A simulation needs at least one station.
    #[error("no stations configured")]
    NoStations,

    /// The reservation policy was selected without its timing constants.
    #[error("policy `reservation` requires a `reservation` timing block")]
    MissingReservationTiming,

    /// The slotted policy was selected without a slot duration.
    #[error("policy `slotted` requires a positive `slot_time`")]
    MissingSlotTime,

    /// Neither `limit.time` nor `limit.events` is set.
    #[error("the run is unbounded, set `limit.time` or `limit.events`")]
    Unbounded,
}

impl ConfigError {
    pub(crate) fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            reason: reason.into(),
        }
    }
}
