use crate::runtime::{Runtime, RuntimeError};
use crate::time::SimTime;
use std::{
    cmp,
    fmt::{Debug, Display},
};

///
/// A trait that defines an runtime application
/// that depends on a event set to be processed by the
/// runtime.
///
pub trait Application: Sized {
    ///
    /// The set of events used in the simulation.
    ///
    type EventSet: EventSet<Self>;

    ///
    /// A function that is called only once at the start of the simulation.
    ///
    /// # Errors
    ///
    /// An error aborts the simulation before the first event is dispatched.
    ///
    fn at_sim_start(_rt: &mut Runtime<Self>) -> Result<(), RuntimeError> {
        Ok(())
    }

    ///
    /// A function that is called once the simulation reachted its limit.
    ///
    /// # Errors
    ///
    /// This function may return an error, if some situation occured, that
    /// indicates an overall failure of the simulation. This error will be propagated
    /// to [`Runtime::run`].
    ///
    fn at_sim_end(_rt: &mut Runtime<Self>) -> Result<(), RuntimeError> {
        Ok(())
    }
}

///
/// A type that can be used as a wrapper around all events
/// handled by an application A.
///
/// Note that ther is a cyclic dependecy between the event set
/// and the application, since handlers mutate the application
/// and schedule follow-up events of the same set.
///
pub trait EventSet<App>: Sized
where
    App: Application<EventSet = Self>,
{
    ///
    /// A function to handle an upcoming event represented as a instance
    /// of the event set.
    ///
    /// # Errors
    ///
    /// Returning an error aborts the run. The error is handed back
    /// to the caller of [`Runtime::run`] unchanged.
    ///
    fn handle(self, rt: &mut Runtime<App>) -> Result<(), RuntimeError>;
}

///
/// A runtime unqiue identifier for a event.
///
pub(crate) type EventId = u64;

///
/// A token that identifies a scheduled event.
///
/// The handle is a plain value, holding it does not keep the event alive.
/// It can be used to cancel the event before it fires, cancelling a fired
/// or already cancelled event is a no-op.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHandle {
    pub(crate) id: EventId,
    pub(crate) time: SimTime,
}

impl EventHandle {
    /// The time the referenced event is (or was) due.
    #[must_use]
    pub fn due(&self) -> SimTime {
        self.time
    }
}

impl Display for EventHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}@{}", self.id, self.time)
    }
}

///
/// A bin-heap node of a event from the applicaitons event set.
///
/// Nodes are ordered by their deadline, ties are broken by the
/// scheduling order (the id), so that simultaneous events fire FIFO.
///
pub(crate) struct EventNode<E> {
    /// The deadline timestamp for the event.
    pub(crate) time: SimTime,
    /// A runtime-specific unique identifier.
    pub(crate) id: EventId,
    /// The actual event.
    pub(crate) event: E,
}

impl<E> EventNode<E> {
    pub(crate) fn handle(&self) -> EventHandle {
        EventHandle {
            id: self.id,
            time: self.time,
        }
    }
}

impl<E> cmp::PartialEq for EventNode<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> cmp::Eq for EventNode<E> {}

impl<E> cmp::PartialOrd for EventNode<E> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> cmp::Ord for EventNode<E> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        // Inverted call should act as reverse
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl<E> Debug for EventNode<E>
where
    E: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EventNode {{ id: {} time: {} event: {:?} }}",
            self.id, self.time, self.event
        )
    }
}
