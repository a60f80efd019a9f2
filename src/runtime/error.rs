use crate::time::SimTime;
use std::{any::Any, error::Error as StdError, fmt::Display};

/// An error that occurred during the simulation.
///
/// Any error type can be converted into a `RuntimeError`, the original
/// value can be recovered with [`RuntimeError::downcast_ref`].
#[derive(Debug)]
pub struct RuntimeError {
    inner: Box<dyn StdErrorAny>,
}

impl RuntimeError {
    /// As any
    pub fn as_any(&self) -> &dyn Any {
        self.inner.as_any()
    }

    /// Returns the wrapped error, if it is of type `T`.
    #[must_use]
    pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Whether the wrapped error is of type `T`.
    #[must_use]
    pub fn is<T: StdError + 'static>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T: StdError + Any + 'static> From<T> for RuntimeError {
    fn from(err: T) -> Self {
        RuntimeError {
            inner: Box::new(err),
        }
    }
}

trait StdErrorAny: StdError + Any {
    fn as_any(&self) -> &dyn Any;
}
impl<T: StdError + Any + 'static> StdErrorAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Misuse of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    /// An event was scheduled before the current simulation time.
    #[error("cannot schedule an event at {requested} while the clock reads {now}")]
    TimeTravel {
        /// The requested deadline.
        requested: SimTime,
        /// The clock when the request was made.
        now: SimTime,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcasting() {
        let err = RuntimeError::from(SchedulingError::TimeTravel {
            requested: SimTime::ZERO,
            now: SimTime::from(1.0),
        });

        assert!(err.is::<SchedulingError>());
        assert!(!err.is::<std::io::Error>());
        assert_eq!(
            err.downcast_ref::<SchedulingError>(),
            Some(&SchedulingError::TimeTravel {
                requested: SimTime::ZERO,
                now: SimTime::from(1.0),
            })
        );
        assert_eq!(
            err.to_string(),
            "cannot schedule an event at 0ns while the clock reads 1s"
        );
    }
}
