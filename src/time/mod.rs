//!
//! Temporal quantification in a simulation context.
//!
//! A [`SimTime`] is a point on the simulated time axis, a [`Duration`]
//! a span between two such points. Both are backed by integer nanoseconds,
//! so that adding the same span to the same point always yields the same
//! result, regardless of how often an event was cancelled and rescheduled.
//!
//! ```rust
//! # use csma_sim::time::*;
//! let start = SimTime::from_duration(Duration::from_millis(250));
//! let end = start + Duration::from_secs(1);
//! assert_eq!(end - start, Duration::from_secs(1));
//! assert_eq!(f64::from(end), 1.25);
//! ```

mod duration;
pub use duration::*;

use serde::de::Visitor;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::ops::{Deref, Sub};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

static SIMTIME: (AtomicU64, AtomicU32) = (AtomicU64::new(0), AtomicU32::new(0));

///
/// A specific point of time in the simulation.
///
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(Duration);

impl SimTime {
    /// Returns an instant corresponding to "now" in the simulation context.
    ///
    /// The clock is shared process-wide and is only ever advanced by the
    /// [`Runtime`](crate::runtime::Runtime) when it dequeues the next event.
    #[must_use]
    pub fn now() -> Self {
        SimTime(Duration::new(
            SIMTIME.0.load(Ordering::SeqCst),
            SIMTIME.1.load(Ordering::SeqCst),
        ))
    }

    ///
    /// Sets the sim time
    ///
    pub(crate) fn set_now(time: SimTime) {
        SIMTIME.0.store(time.as_secs(), Ordering::SeqCst);
        SIMTIME.1.store(time.subsec_nanos(), Ordering::SeqCst);
    }

    ///
    /// Constructs an instance of `SimTime` from a give duration since `SimTime::ZERO`.
    ///
    #[must_use]
    pub const fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    /// Returns the amount of time elapsed from another instant to this one.
    ///
    /// # Panics
    ///
    /// This function  panics if `earlier` is later than `self`.
    #[must_use]
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        self.checked_duration_since(earlier)
            .expect("duration subtraction invalid")
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or None if that instant is later than this one.
    #[must_use]
    pub fn checked_duration_since(&self, earlier: SimTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or zero duration if that instant is later than this one.
    #[must_use]
    pub fn saturating_duration_since(&self, earlier: SimTime) -> Duration {
        self.checked_duration_since(earlier).unwrap_or_default()
    }

    /// Returns `Some(t)` where `t` is the time `self + duration` if `t` can be represented,
    /// `None` otherwise.
    #[must_use]
    pub fn checked_add(&self, duration: Duration) -> Option<SimTime> {
        self.0.checked_add(duration).map(SimTime)
    }

    /// Returns `Some(t)` where `t` is the time `self - duration` if `t` can be represented,
    /// `None` otherwise.
    #[must_use]
    pub fn checked_sub(&self, duration: Duration) -> Option<SimTime> {
        self.0.checked_sub(duration).map(SimTime)
    }

    ///
    /// Rounds this instant up to the next multiple of `slot`.
    ///
    /// Instants already on a slot boundary are left untouched, a zero
    /// slot disables alignment.
    ///
    #[must_use]
    pub fn align_up(&self, slot: Duration) -> SimTime {
        let slot = slot.as_nanos();
        if slot == 0 {
            return *self;
        }

        let nanos = self.0.as_nanos();
        let aligned = nanos.div_ceil(slot) * slot;
        let secs = u64::try_from(aligned / 1_000_000_000).unwrap_or(u64::MAX);
        #[allow(clippy::cast_possible_truncation)]
        let subsec = (aligned % 1_000_000_000) as u32;
        SimTime(Duration::new(secs, subsec))
    }
}

// # Custom Additions
impl SimTime {
    /// The smallest instance of a [`SimTime`].
    pub const ZERO: SimTime = SimTime(Duration::ZERO);
    /// The smallest valid instance of a [`SimTime`].
    pub const MIN: SimTime = SimTime(Duration::ZERO);
    /// The greatest instance of a [`SimTime`].
    pub const MAX: SimTime = SimTime(Duration::MAX);
}

// Serialize

impl Serialize for SimTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SimTimeVisitor;
        impl<'de> Visitor<'de> for SimTimeVisitor {
            type Value = SimTime;
            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a positive number of seconds")
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Duration::try_from_secs_f64(v)
                    .map(SimTime::from_duration)
                    .map_err(|_| E::custom(format!("invalid simulation time {v}")))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(SimTime::from_duration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|v| SimTime::from_duration(Duration::from_secs(v)))
                    .map_err(|_| E::custom(format!("invalid simulation time {v}")))
            }
        }

        deserializer.deserialize_any(SimTimeVisitor)
    }
}

// CMP

impl PartialEq<f64> for SimTime {
    fn eq(&self, other: &f64) -> bool {
        let diff = (self.0.as_secs_f64() - *other).abs();
        diff < f64::EPSILON
    }
}

// OPS

impl Sub<Duration> for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Duration) -> Self::Output {
        self.checked_sub(rhs)
            .expect("Overflow when substracting Duration from SimTime")
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

// DEREF

impl Deref for SimTime {
    type Target = Duration;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// FMT

impl Debug for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

// FROM

impl From<SimTime> for f64 {
    fn from(this: SimTime) -> Self {
        this.0.as_secs_f64()
    }
}

impl From<f64> for SimTime {
    fn from(value: f64) -> Self {
        SimTime(Duration::from_secs_f64(value))
    }
}

impl From<Duration> for SimTime {
    fn from(value: Duration) -> Self {
        SimTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops() {
        assert_eq!(
            f64::from(SimTime::from_duration(Duration::from_millis(300))),
            0.3
        );

        assert_eq!(
            SimTime::from(30.0) - SimTime::from(10.0),
            Duration::from_secs(20)
        );
        assert_eq!(SimTime::from(30.0) - Duration::from_secs(10), 20.0);
        assert_eq!(
            SimTime::from(10.0).saturating_duration_since(SimTime::from(30.0)),
            Duration::ZERO
        );
    }

    #[test]
    fn slot_alignment() {
        let slot = Duration::from_millis(100);
        let t = SimTime::from_duration(Duration::from_millis(250));
        assert_eq!(t.align_up(slot), SimTime::from_duration(Duration::from_millis(300)));

        let on_boundary = SimTime::from_duration(Duration::from_millis(400));
        assert_eq!(on_boundary.align_up(slot), on_boundary);

        assert_eq!(t.align_up(Duration::ZERO), t);
        assert_eq!(SimTime::ZERO.align_up(slot), SimTime::ZERO);

        let t = SimTime::from_duration(Duration::new(3, 1));
        assert_eq!(t.align_up(Duration::from_secs(1)), SimTime::from(4.0));
    }

    #[test]
    fn serde_seconds() {
        let t: SimTime = serde_yml::from_str("1.5").unwrap();
        assert_eq!(t, SimTime::from_duration(Duration::from_millis(1_500)));

        let t: SimTime = serde_yml::from_str("3").unwrap();
        assert_eq!(t, SimTime::from(3.0));

        assert!(serde_yml::from_str::<SimTime>("-1.0").is_err());
    }
}
