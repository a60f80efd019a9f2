use crate::runtime::{EventHandle, Scheduler};
use serde::Serialize;

///
/// The logical purpose of a station timer.
///
/// A station holds at most one live event per purpose.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimerKind {
    /// The next frame is due.
    Arrival,
    /// Retry after backoff, or the end of the inter-frame gap plus backoff.
    Access,
    /// No grant arrived in time.
    Timeout,
    /// Start or end of a transmission.
    Tx,
    /// The end of a foreign reservation.
    Nav,
}

///
/// The handle slots of one station.
///
/// Arming a slot that still holds a live event is an error, replacing a
/// slot always cancels its previous event first.
///
#[derive(Debug, Default)]
pub(crate) struct Timers {
    arrival: Option<EventHandle>,
    access: Option<EventHandle>,
    timeout: Option<EventHandle>,
    tx: Option<EventHandle>,
    nav: Option<EventHandle>,
}

impl Timers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<EventHandle> {
        match kind {
            TimerKind::Arrival => &mut self.arrival,
            TimerKind::Access => &mut self.access,
            TimerKind::Timeout => &mut self.timeout,
            TimerKind::Tx => &mut self.tx,
            TimerKind::Nav => &mut self.nav,
        }
    }

    /// The handle of a pending timer.
    pub(crate) fn get(&self, kind: TimerKind) -> Option<EventHandle> {
        match kind {
            TimerKind::Arrival => self.arrival,
            TimerKind::Access => self.access,
            TimerKind::Timeout => self.timeout,
            TimerKind::Tx => self.tx,
            TimerKind::Nav => self.nav,
        }
    }

    pub(crate) fn is_armed(&self, kind: TimerKind) -> bool {
        self.get(kind).is_some()
    }

    /// Whether the timer holds an event that has neither fired nor been cancelled.
    pub(crate) fn is_live<E>(&self, kind: TimerKind, sched: &Scheduler<E>) -> bool {
        self.get(kind).is_some_and(|handle| sched.is_pending(handle))
    }

    /// Stores a freshly scheduled event. The caller checks [`Timers::is_live`] first.
    pub(crate) fn set(&mut self, kind: TimerKind, handle: EventHandle) {
        *self.slot(kind) = Some(handle);
    }

    /// Cancels a timer. Returns whether a live event was cancelled.
    pub(crate) fn cancel<E>(&mut self, kind: TimerKind, sched: &mut Scheduler<E>) -> bool {
        self.slot(kind)
            .take()
            .is_some_and(|handle| sched.cancel(handle))
    }

    ///
    /// Clears the slot of a timer that just fired.
    ///
    /// Returns `false` if the slot was empty or still references a live event,
    /// which means the firing event was not the one the station expected.
    ///
    pub(crate) fn fired<E>(&mut self, kind: TimerKind, sched: &Scheduler<E>) -> bool {
        let slot = self.slot(kind);
        match *slot {
            Some(handle) if !sched.is_pending(handle) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Duration, SimTime};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn cancel_before_replace() {
        let mut sched = Scheduler::<()>::new(SimTime::ZERO, StdRng::seed_from_u64(0));
        let mut timers = Timers::default();

        assert!(!timers.is_live(TimerKind::Tx, &sched));
        let handle = sched.schedule_in((), Duration::from_secs(1));
        timers.set(TimerKind::Tx, handle);
        assert!(timers.is_armed(TimerKind::Tx));
        assert!(timers.is_live(TimerKind::Tx, &sched));
        assert!(!timers.is_armed(TimerKind::Access));

        assert!(timers.cancel(TimerKind::Tx, &mut sched));
        assert!(!sched.is_pending(handle));
        assert!(!timers.is_armed(TimerKind::Tx));
        assert!(!timers.cancel(TimerKind::Tx, &mut sched));
    }

    #[test]
    fn fired_requires_a_consumed_event() {
        let mut sched = Scheduler::<()>::new(SimTime::ZERO, StdRng::seed_from_u64(0));
        let mut timers = Timers::default();

        // Nothing armed, nothing may fire.
        assert!(!timers.fired(TimerKind::Timeout, &sched));

        // Still pending, so the firing event is some other one.
        let handle = sched.schedule_in((), Duration::from_secs(1));
        timers.set(TimerKind::Timeout, handle);
        assert!(!timers.fired(TimerKind::Timeout, &sched));
        assert_eq!(timers.get(TimerKind::Timeout), Some(handle));

        // Once the scheduler no longer holds it, the slot is cleared.
        sched.cancel(handle);
        assert!(timers.fired(TimerKind::Timeout, &sched));
        assert!(!timers.is_armed(TimerKind::Timeout));
    }
}
