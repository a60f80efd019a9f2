use std::{
    fmt::Debug,
    sync::{Mutex, TryLockError},
};

use rand::{rngs::StdRng, SeedableRng};

use crate::time::SimTime;

use super::{Application, Profiler, Runtime, RuntimeLimit, Scheduler, State};

/// A lock the ensures only one runtime exits at a time.
static SIMULATION_LOCK: Mutex<()> = Mutex::new(());

/// A builder for a runtime instance.
#[must_use]
pub struct Builder {
    pub(super) quiet: bool,
    pub(super) rng: StdRng,
    pub(super) limit: RuntimeLimit,
    pub(super) start_time: SimTime,
}

impl Builder {
    /// Creates a new unconfigured builder, with a RNG seeded from the OS.
    pub fn new() -> Builder {
        Builder {
            quiet: false,
            rng: StdRng::from_entropy(),
            limit: RuntimeLimit::UNBOUNDED,

            start_time: SimTime::MIN,
        }
    }

    /// Creates a `Builder` with a static seeded RNG.
    pub fn seeded(seed: u64) -> Builder {
        Builder {
            quiet: false,
            rng: StdRng::seed_from_u64(seed),
            limit: RuntimeLimit::UNBOUNDED,

            start_time: SimTime::MIN,
        }
    }

    ///
    /// Replaces the RNG with one seeded from `seed`.
    ///
    pub fn reseed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    ///
    /// Suppressed runtime messages from the simulation framework.
    ///
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    ///
    /// Changes the time the simulation starts at.
    ///
    pub fn start_time(mut self, time: SimTime) -> Self {
        self.start_time = time;
        self
    }

    ///
    /// Changes the maximum iteration number of a runtime.
    ///
    pub fn max_itr(mut self, max_itr: usize) -> Self {
        self.limit.add(RuntimeLimit::events(max_itr));
        self
    }

    ///
    /// Changes the maximum time of the runtime (default: inf).
    ///
    pub fn max_time(mut self, max_time: SimTime) -> Self {
        self.limit.add(RuntimeLimit::until(max_time));
        self
    }

    ///
    /// Adds the bounds of `limit`, keeping the tighter of any bound
    /// already set by `max_itr` or `max_time`.
    ///
    pub fn limit(mut self, limit: RuntimeLimit) -> Self {
        self.limit.add(limit);
        self
    }

    ///
    /// Builds a new [`Runtime`] instance, using an application as core.
    ///
    /// Since the simulation clock is process-wide, this call blocks until
    /// every other runtime of the process was dropped.
    ///
    pub fn build<A: Application>(self, app: A) -> Runtime<A> {
        let permit = match SIMULATION_LOCK.try_lock() {
            Ok(permit) => permit,
            Err(TryLockError::WouldBlock) => {
                tracing::warn!("another runtime allready exists ... waiting for simlock");
                SIMULATION_LOCK
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
            }
            Err(TryLockError::Poisoned(p)) => {
                tracing::warn!("another runtime poisoned the simlock ... cleaning up");
                p.into_inner()
            }
        };

        // Set SimTime
        SimTime::set_now(self.start_time);

        Runtime {
            app,
            scheduler: Scheduler::new(self.start_time, self.rng),

            state: State::Ready,
            limit: self.limit,
            itr: 0,

            quiet: self.quiet,
            profiler: Profiler::default(),

            permit,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("quiet", &self.quiet)
            .field("limit", &self.limit)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}
