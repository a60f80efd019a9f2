use super::{EventHandle, EventId, EventNode};
use crate::time::SimTime;
use fxhash::FxHashSet;
use std::collections::{BinaryHeap, VecDeque};

///
/// The time-ordered set of all pending events.
///
/// Events due at the instant of the last dispatched event are kept in a
/// FIFO side queue, everything else lives in a binary heap. Cancellation
/// is lazy: a cancelled node stays in its container until it reaches the
/// front, where it is dropped without being handed out.
///
pub(crate) struct FutureEventSet<E> {
    heap: BinaryHeap<EventNode<E>>,
    zero_queue: VecDeque<EventNode<E>>,

    /// Ids of all events that were scheduled but neither fired nor cancelled.
    live: FxHashSet<EventId>,
    next_id: EventId,

    last_event_simtime: SimTime,
}

impl<E> FutureEventSet<E> {
    pub(crate) fn descriptor(&self) -> String {
        "FutureEventSet::BinaryHeap()".to_string()
    }

    pub(crate) fn new(start: SimTime) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(64),
            zero_queue: VecDeque::with_capacity(32),

            live: FxHashSet::default(),
            next_id: 0,

            last_event_simtime: start,
        }
    }

    /// The number of live (not yet fired, not cancelled) events.
    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// The number of events ever added.
    pub(crate) fn num_scheduled(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn last_event_simtime(&self) -> SimTime {
        self.last_event_simtime
    }

    pub(crate) fn is_live(&self, handle: EventHandle) -> bool {
        self.live.contains(&handle.id)
    }

    ///
    /// Adds an event. The caller must guarantee that `time` is not
    /// earlier than the last dispatched event.
    ///
    pub(crate) fn add(&mut self, time: SimTime, event: E) -> EventHandle {
        debug_assert!(
            time >= self.last_event_simtime,
            "Sorry we cannot timetravel yet"
        );

        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id);

        let node = EventNode { time, id, event };
        let handle = node.handle();

        if self.last_event_simtime == time {
            self.zero_queue.push_back(node);
        } else {
            self.heap.push(node);
        }

        handle
    }

    /// Marks an event as cancelled. Returns whether the event was still live.
    pub(crate) fn cancel(&mut self, handle: EventHandle) -> bool {
        self.live.remove(&handle.id)
    }

    /// The deadline of the next live event, dropping cancelled nodes on the way.
    pub(crate) fn peek_time(&mut self) -> Option<SimTime> {
        self.purge_front();
        match (self.zero_queue.front(), self.heap.peek()) {
            (Some(zero), Some(heap)) => Some(zero.time.min(heap.time)),
            (Some(zero), None) => Some(zero.time),
            (None, Some(heap)) => Some(heap.time),
            (None, None) => None,
        }
    }

    ///
    /// Removes and returns the next live event.
    ///
    /// Events are handed out by ascending time, events with equal time
    /// by ascending id (scheduling order).
    ///
    pub(crate) fn fetch_next(&mut self) -> Option<EventNode<E>> {
        self.purge_front();

        let take_heap = match (self.zero_queue.front(), self.heap.peek()) {
            (Some(zero), Some(heap)) => (heap.time, heap.id) < (zero.time, zero.id),
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => return None,
        };

        let node = if take_heap {
            self.heap.pop()
        } else {
            self.zero_queue.pop_front()
        }?;

        self.live.remove(&node.id);
        self.last_event_simtime = node.time;
        Some(node)
    }

    /// Drops cancelled nodes sitting at the front of either container.
    fn purge_front(&mut self) {
        while let Some(node) = self.zero_queue.front() {
            if self.live.contains(&node.id) {
                break;
            }
            self.zero_queue.pop_front();
        }
        while let Some(node) = self.heap.peek() {
            if self.live.contains(&node.id) {
                break;
            }
            self.heap.pop();
        }
    }
}
