//!
//! Central primitives for running a discrete event simulation.
//!
//! A [`Runtime`] owns an [`Application`] (the simulated system) and a
//! [`Scheduler`] (the global, time-ordered event queue). Running the
//! runtime repeatedly pops the earliest pending event, advances the
//! process-wide clock to its deadline and hands it to [`EventSet::handle`].
//! Handlers run to completion one at a time; waiting is expressed purely
//! by scheduling a future event.
//!

use crate::time::{Duration, SimTime};
use std::{
    any::type_name,
    fmt::{Debug, Display},
    mem,
    sync::MutexGuard,
};

mod event;
pub use self::event::*;

mod limit;
pub use self::limit::*;

mod builder;
pub use builder::*;

mod error;
pub use error::*;

mod profiler;
pub use profiler::*;

mod scheduler;
pub use scheduler::*;

///
/// The central managment point for a generic
/// instance of a discrete event based simulation.
///
/// # Generic usage
///
/// - Create an 'App' struct that implements the trait [`Application`].
///   This struct will hold the systems state and define the event set used in the simulation.
/// - Create an enum that implements [`EventSet`] that holds all your events.
/// - Build the runtime with a [`Builder`] and [`run`](Runtime::run) it.
///
/// ```
/// use csma_sim::runtime::*;
/// use csma_sim::time::*;
///
/// struct Counter(usize);
/// enum Tick { Once }
///
/// impl Application for Counter {
///     type EventSet = Tick;
/// }
/// impl EventSet<Counter> for Tick {
///     fn handle(self, rt: &mut Runtime<Counter>) -> Result<(), RuntimeError> {
///         rt.app.0 += 1;
///         Ok(())
///     }
/// }
///
/// let mut rt = Builder::seeded(1).quiet().build(Counter(0));
/// rt.add_event_in(Tick::Once, Duration::from_secs(2));
/// let (app, time, profiler) = rt.run().unwrap();
/// assert_eq!(app.0, 1);
/// assert_eq!(time, SimTime::from(2.0));
/// assert_eq!(profiler.event_count, 1);
/// ```
pub struct Runtime<App>
where
    App: Application,
{
    /// The contained runtime application, defining globals and the used event set.
    pub app: App,

    scheduler: Scheduler<App::EventSet>,

    state: State,

    // Rt limits
    limit: RuntimeLimit,
    itr: usize,

    // Misc
    quiet: bool,
    profiler: Profiler,

    #[allow(dead_code)]
    permit: MutexGuard<'static, ()>,
}

#[derive(Debug, PartialEq, Eq)]
enum State {
    Ready,
    Running,
}

impl<A> Runtime<A>
where
    A: Application,
{
    ///
    /// Returns the number of events that were scheduled on this [`Runtime`] instance.
    ///
    #[inline]
    pub fn num_events_scheduled(&self) -> u64 {
        self.scheduler.future_event_set.num_scheduled()
    }

    ///
    /// Returns the number of events that were recieved & handled on this [`Runtime`] instance.
    ///
    pub fn num_events_dispatched(&self) -> usize {
        self.itr
    }

    ///
    /// Returns the current simulation time.
    ///
    #[allow(clippy::unused_self)]
    pub fn sim_time(&self) -> SimTime {
        SimTime::now()
    }

    ///
    /// A read-only view of the event queue.
    ///
    pub fn scheduler(&self) -> &Scheduler<A::EventSet> {
        &self.scheduler
    }

    ///
    /// The event queue.
    ///
    pub fn scheduler_mut(&mut self) -> &mut Scheduler<A::EventSet> {
        &mut self.scheduler
    }

    ///
    /// Splits the runtime into the application and the event queue,
    /// so that handlers can mutate state and schedule events at once.
    ///
    pub fn parts(&mut self) -> (&mut A, &mut Scheduler<A::EventSet>) {
        (&mut self.app, &mut self.scheduler)
    }

    ///
    /// Adds and event to the future event set that will be handled at the given time.
    ///
    /// # Errors
    ///
    /// Fails if `time` lies before the current simulation time.
    ///
    pub fn add_event(
        &mut self,
        event: impl Into<A::EventSet>,
        time: SimTime,
    ) -> Result<EventHandle, SchedulingError> {
        self.scheduler.schedule_at(event, time)
    }

    ///
    /// Adds and event to the future event set, that will be handled in 'duration'
    /// time units.
    ///
    pub fn add_event_in(
        &mut self,
        event: impl Into<A::EventSet>,
        duration: impl Into<Duration>,
    ) -> EventHandle {
        self.scheduler.schedule_in(event, duration.into())
    }

    ///
    /// Cancels a pending event. See [`Scheduler::cancel`].
    ///
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.scheduler.cancel(handle)
    }
}

impl<A> Runtime<A>
where
    A: Application,
{
    /// Runs the application until it terminates or a breaking condition
    /// is reached.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an event handler or by the
    /// application lifecycle. The run is aborted at that point.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation was allready started.
    pub fn run(mut self) -> Result<(A, SimTime, Profiler), RuntimeError> {
        // (0) Start sim-start
        self.start()?;

        // (1) Event main loop
        self.dispatch_all()?;

        // (2) Finish sim-end
        self.finish()
    }

    /// Starts the simulation manually. If `Runtime::run` is not used, use the combination
    /// of start, dispatch and finish to complete a full execution cycle.
    ///
    /// # Errors
    ///
    /// Forwards errors from [`Application::at_sim_start`].
    ///
    /// # Panics
    ///
    /// This function panics if the simulation was allready started.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        assert_eq!(
            self.state,
            State::Ready,
            "Runtime::start can only be used for simulations in the ready state"
        );

        // (0) Publish sim-start message
        if !self.quiet {
            println!("\u{23A1}");
            println!("\u{23A2} Simulation starting");
            println!("\u{23A2}  Application := {}", type_name::<A>());
            println!(
                "\u{23A2}  Executor := {}",
                self.scheduler.future_event_set.descriptor()
            );
            println!("\u{23A2}  Event limit := {}", self.limit);
            println!("\u{23A3}");
        }

        // (1) Start profiler
        self.profiler.start();

        // (2) sim-starting on application object
        self.state = State::Running;
        A::at_sim_start(self)
    }

    /// Executes the next n events in the runtime queue.
    ///
    /// # Errors
    ///
    /// Forwards the first handler error.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation has not been started.
    pub fn dispatch_n_events(&mut self, n: usize) -> Result<(), RuntimeError> {
        let limit = RuntimeLimit::events(self.num_events_dispatched() + n);
        self.dispatch_with_limit(limit)
    }

    /// Executes runtime events until the runtime reaches the designated time.
    ///
    /// # Errors
    ///
    /// Forwards the first handler error.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation has not been started.
    pub fn dispatch_events_until(&mut self, t: SimTime) -> Result<(), RuntimeError> {
        self.dispatch_with_limit(RuntimeLimit::until(t))
    }

    fn dispatch_with_limit(&mut self, mut limit: RuntimeLimit) -> Result<(), RuntimeError> {
        mem::swap(&mut self.limit, &mut limit);
        let result = self.dispatch_all();
        self.limit = limit;
        result
    }

    /// Executes runtime events until the queue is drained or the limit applies.
    ///
    /// # Errors
    ///
    /// Forwards the first handler error.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation has not been started.
    pub fn dispatch_all(&mut self) -> Result<(), RuntimeError> {
        assert_eq!(
            self.state,
            State::Running,
            "dispatching is only allowed for running simulations"
        );
        while !self.dispatch_event()? {}
        Ok(())
    }

    /// Decontructs the runtime and returns the application and the final `sim_time`.
    ///
    /// # Errors
    ///
    /// Returns an error if the application has determined that a simulation critical
    /// failure has occurred.
    ///
    /// # Panics
    ///
    /// This function panics if the runtime is has not yet been started.
    pub fn finish(mut self) -> Result<(A, SimTime, Profiler), RuntimeError> {
        assert_eq!(
            self.state,
            State::Running,
            "only a running simulation can be finished"
        );

        // Call the fin-handler on the allocated application
        A::at_sim_end(&mut self)?;
        self.profiler.finish(self.itr, self.scheduler.num_cancelled);

        let time = self.sim_time();
        if !self.quiet {
            println!("\u{23A1}");
            if self.scheduler.is_empty() {
                println!("\u{23A2} Simulation ended");
                println!("\u{23A2}  Ended at event #{} after {}", self.itr, time);
            } else {
                println!("\u{23A2} Simulation ended prematurly");
                println!(
                    "\u{23A2}  Ended at event #{} with {} active events after {}",
                    self.itr,
                    self.scheduler.len(),
                    time
                );
            }
            println!("\u{23A3}");
        }

        Ok((self.app, time, self.profiler))
    }

    /// Processes the next event in the future event list by calling its handler.
    /// Returns `true` if the simulation should stop.
    fn dispatch_event(&mut self) -> Result<bool, RuntimeError> {
        let Some(time) = self.scheduler.future_event_set.peek_time() else {
            return Ok(true);
        };

        if self.limit.applies(self.itr + 1, time) {
            return Ok(true);
        }

        let Some(node) = self.scheduler.future_event_set.fetch_next() else {
            return Ok(true);
        };

        self.itr += 1;

        // Let this be the only position where SimTime is changed
        SimTime::set_now(node.time);

        node.event.handle(self).map(|()| false).inspect_err(|e| {
            tracing::error!(
                event = self.itr,
                "simulation aborted at {}: {e}",
                SimTime::now()
            );
        })
    }
}

impl<A> Debug for Runtime<A>
where
    A: Application,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl<A> Display for Runtime<A>
where
    A: Application,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Runtime<{}> {{ sim_time: {} (itr {} / {}) dispached: {} enqueued: {} }}",
            type_name::<A>(),
            self.sim_time(),
            self.num_events_dispatched(),
            self.limit,
            self.num_events_scheduled(),
            self.scheduler.len()
        )
    }
}
