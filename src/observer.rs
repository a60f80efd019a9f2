//!
//! The notification contract between the simulation core and its sinks.
//!
//! Stations and the arbiter push typed, timestamped [`Notification`]s,
//! sinks implement [`Observer`]. The core never depends on what a sink
//! does with them.
//!

use crate::arbiter::ChannelState;
use crate::config::ReservationConflict;
use crate::station::{MacState, StationId};
use crate::stats::Statistics;
use crate::time::{Duration, SimTime};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

///
/// An observable transition of the simulation.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Notification {
    /// The arbiter changed its channel state.
    ChannelState {
        /// The new state.
        state: ChannelState,
    },
    /// A frame was received without overlap.
    Reception {
        /// The first bit arrived at the arbiter.
        start: SimTime,
        /// Length of the occupancy interval.
        duration: Duration,
        /// The number of overlapping frames, always 0.
        overlap: usize,
    },
    /// Two or more frames overlapped at the arbiter.
    Collision {
        /// The first bit of the first frame arrived at the arbiter.
        start: SimTime,
        /// The number of overlapping frames.
        frames: usize,
        /// Length of the union of all overlapping intervals.
        duration: Duration,
    },
    /// A station changed its MAC state.
    StationState {
        /// The station.
        station: StationId,
        /// The new state.
        state: MacState,
    },
    /// A station started a data transmission.
    FrameSent {
        /// The sender.
        station: StationId,
        /// Frame length in bits.
        bits: u64,
        /// Air time.
        duration: Duration,
    },
    /// A station scheduled a retry.
    BackoffScheduled {
        /// The station.
        station: StationId,
        /// Its attempt counter after the bump.
        attempts: u32,
        /// The drawn backoff.
        delay: Duration,
    },
    /// A station failed again while its attempt counter sat at the ceiling.
    BackoffCeiling {
        /// The station.
        station: StationId,
        /// The ceiling.
        attempts: u32,
    },
    /// A station sent a reservation request.
    ReservationRequested {
        /// The requester.
        station: StationId,
        /// The requested data duration.
        duration: Duration,
    },
    /// The arbiter granted a reservation.
    GrantIssued {
        /// The addressee.
        station: StationId,
        /// The granted data duration.
        duration: Duration,
    },
    /// A request arrived at the arbiter while another one was pending.
    ReservationConflict {
        /// The request that was pending.
        pending: StationId,
        /// The request that just arrived.
        requester: StationId,
        /// How the conflict was resolved.
        policy: ReservationConflict,
    },
    /// A station gave up waiting for its grant.
    ReservationTimeout {
        /// The station.
        station: StationId,
    },
}

impl Notification {
    /// A short name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChannelState { .. } => "channel-state",
            Self::Reception { .. } => "reception",
            Self::Collision { .. } => "collision",
            Self::StationState { .. } => "station-state",
            Self::FrameSent { .. } => "frame-sent",
            Self::BackoffScheduled { .. } => "backoff-scheduled",
            Self::BackoffCeiling { .. } => "backoff-ceiling",
            Self::ReservationRequested { .. } => "reservation-requested",
            Self::GrantIssued { .. } => "grant-issued",
            Self::ReservationConflict { .. } => "reservation-conflict",
            Self::ReservationTimeout { .. } => "reservation-timeout",
        }
    }

    ///
    /// The number of overlapping frames of a reception record:
    /// 0 for a clean reception, at least 2 for a collision.
    ///
    #[must_use]
    pub fn overlap(&self) -> Option<usize> {
        match self {
            Self::Reception { overlap, .. } => Some(*overlap),
            Self::Collision { frames, .. } => Some(*frames),
            _ => None,
        }
    }
}

///
/// A sink for notifications.
///
pub trait Observer {
    /// Receives a notification emitted at simulation time `time`.
    fn notify(&mut self, time: SimTime, notification: &Notification);
}

impl<O: Observer> Observer for Rc<RefCell<O>> {
    fn notify(&mut self, time: SimTime, notification: &Notification) {
        self.borrow_mut().notify(time, notification);
    }
}

impl<O: Observer + ?Sized> Observer for Box<O> {
    fn notify(&mut self, time: SimTime, notification: &Notification) {
        (**self).notify(time, notification);
    }
}

///
/// An observer that keeps every notification.
///
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    /// All notifications in emission order.
    pub events: Vec<(SimTime, Notification)>,
}

impl Recorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications matching a predicate.
    pub fn filter<'a>(
        &'a self,
        mut f: impl FnMut(&Notification) -> bool + 'a,
    ) -> impl Iterator<Item = &'a (SimTime, Notification)> + 'a {
        self.events.iter().filter(move |(_, n)| f(n))
    }
}

impl Observer for Recorder {
    fn notify(&mut self, time: SimTime, notification: &Notification) {
        self.events.push((time, notification.clone()));
    }
}

///
/// Fans notifications out to the bundled [`Statistics`] and all
/// attached observers.
///
pub(crate) struct Notifier {
    pub(crate) stats: Statistics,
    sinks: Vec<Box<dyn Observer>>,
}

impl Notifier {
    pub(crate) fn new(stats: Statistics) -> Self {
        Self {
            stats,
            sinks: Vec::new(),
        }
    }

    pub(crate) fn attach(&mut self, observer: Box<dyn Observer>) {
        self.sinks.push(observer);
    }

    pub(crate) fn notify(&mut self, time: SimTime, notification: Notification) {
        tracing::trace!(kind = notification.kind(), "{notification:?}");
        self.stats.notify(time, &notification);
        for sink in &mut self.sinks {
            sink.notify(time, &notification);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("stats", &self.stats)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reception_records_carry_their_overlap() {
        let clean = Notification::Reception {
            start: SimTime::from(1.0),
            duration: Duration::from_secs(2),
            overlap: 0,
        };
        let collision = Notification::Collision {
            start: SimTime::from(1.0),
            frames: 3,
            duration: Duration::from_secs(2),
        };
        assert_eq!(clean.overlap(), Some(0));
        assert_eq!(collision.overlap(), Some(3));
        assert_eq!(
            Notification::ReservationTimeout {
                station: StationId(0)
            }
            .overlap(),
            None
        );

        let yaml = serde_yml::to_string(&clean).unwrap();
        assert!(yaml.contains("kind: reception"), "{yaml}");
        assert!(yaml.contains("overlap: 0"), "{yaml}");
    }
}
