use super::{EventHandle, FutureEventSet, SchedulingError};
use crate::time::{Duration, SimTime};
use rand::rngs::StdRng;
use std::fmt::Debug;

///
/// The global event queue of a simulation.
///
/// Every component schedules its follow-up work through this type.
/// The [`Runtime`](super::Runtime) pops the minimum-time event, advances the
/// clock and hands the event to its handler. The scheduler also owns the
/// random number generator of the run, so that a fixed seed reproduces a
/// run exactly.
///
pub struct Scheduler<E> {
    pub(super) future_event_set: FutureEventSet<E>,
    pub(super) num_cancelled: usize,
    rng: StdRng,
}

impl<E> Scheduler<E> {
    pub(crate) fn new(start: SimTime, rng: StdRng) -> Self {
        Self {
            future_event_set: FutureEventSet::new(start),
            num_cancelled: 0,
            rng,
        }
    }

    ///
    /// Returns the current simulation time.
    ///
    #[allow(clippy::unused_self)]
    #[must_use]
    pub fn now(&self) -> SimTime {
        SimTime::now()
    }

    ///
    /// Schedules an event at the given absolute time.
    ///
    /// # Errors
    ///
    /// Scheduling an event strictly before the current time is a
    /// programming error and is reported as [`SchedulingError::TimeTravel`].
    ///
    pub fn schedule_at(
        &mut self,
        event: impl Into<E>,
        time: SimTime,
    ) -> Result<EventHandle, SchedulingError> {
        let now = self.now();
        if time < now || time < self.future_event_set.last_event_simtime() {
            return Err(SchedulingError::TimeTravel {
                requested: time,
                now,
            });
        }

        Ok(self.future_event_set.add(time, event.into()))
    }

    ///
    /// Schedules an event `delay` time units from now.
    ///
    pub fn schedule_in(&mut self, event: impl Into<E>, delay: Duration) -> EventHandle {
        let time = self.now() + delay;
        self.future_event_set.add(time, event.into())
    }

    ///
    /// Cancels a scheduled event. Returns `true` if the event was still
    /// pending, cancelling a fired or already cancelled event does nothing.
    ///
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        let cancelled = self.future_event_set.cancel(handle);
        if cancelled {
            self.num_cancelled += 1;
        }
        cancelled
    }

    ///
    /// Whether the event is neither fired nor cancelled.
    ///
    #[must_use]
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.future_event_set.is_live(handle)
    }

    ///
    /// The number of pending events.
    ///
    #[must_use]
    pub fn len(&self) -> usize {
        self.future_event_set.len()
    }

    ///
    /// Whether no events are pending.
    ///
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.future_event_set.is_empty()
    }

    ///
    /// The random number generator of this run.
    ///
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl<E> Debug for Scheduler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now())
            .field("pending", &self.future_event_set.len())
            .field("scheduled", &self.future_event_set.num_scheduled())
            .field("cancelled", &self.num_cancelled)
            .finish()
    }
}
