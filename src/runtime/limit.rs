use crate::time::SimTime;
use std::fmt::Display;

///
/// Bounds on the event execution of a runtime.
///
/// A run stops as soon as either bound is exceeded. Adding a bound of a
/// kind that is already set keeps the tighter of the two.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeLimit {
    /// Stop before the event with this 1-based index is dispatched,
    /// if it exceeds the bound.
    pub events: Option<usize>,
    /// Stop once no event at or before this time is left.
    pub time: Option<SimTime>,
}

impl RuntimeLimit {
    /// A limit that never applies, runs end when the queue drains.
    pub const UNBOUNDED: Self = Self {
        events: None,
        time: None,
    };

    /// Bounds the number of dispatched events.
    #[must_use]
    pub fn events(n: usize) -> Self {
        Self {
            events: Some(n),
            time: None,
        }
    }

    /// Bounds the simulation time.
    #[must_use]
    pub fn until(time: SimTime) -> Self {
        Self {
            events: None,
            time: Some(time),
        }
    }

    /// Whether neither bound is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.events.is_none() && self.time.is_none()
    }

    pub(crate) fn applies(&self, itr_count: usize, time: SimTime) -> bool {
        self.events.is_some_and(|e| itr_count > e) || self.time.is_some_and(|t| time > t)
    }

    pub(crate) fn add(&mut self, other: RuntimeLimit) {
        self.events = tighter(self.events, other.events);
        self.time = tighter(self.time, other.time);
    }
}

fn tighter<T: Ord>(lhs: Option<T>, rhs: Option<T>) -> Option<T> {
    match (lhs, rhs) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl Display for RuntimeLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.events, self.time) {
            (None, None) => write!(f, "unbounded"),
            (Some(e), None) => write!(f, "{e} events"),
            (None, Some(t)) => write!(f, "until {t}"),
            (Some(e), Some(t)) => write!(f, "{e} events or until {t}"),
        }
    }
}
