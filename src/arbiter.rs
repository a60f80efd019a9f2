//!
//! The shared receiver all stations transmit into.
//!

use crate::config::ReservationConflict;
use crate::error::ProtocolError;
use crate::observer::Notification;
use crate::runtime::{EventHandle, RuntimeError};
use crate::sim::{Context, MacEvent};
use crate::station::{StationEvent, StationId};
use crate::time::{Duration, SimTime};
use serde::Serialize;

///
/// The state of the medium as seen by the arbiter.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChannelState {
    /// Nothing is being received.
    Idle,
    /// Exactly one frame occupies the medium.
    Busy,
    /// Two or more frames overlap.
    Colliding,
}

///
/// An event addressed to the arbiter.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterEvent {
    /// The first bit of a frame arrived.
    FrameArrival {
        /// The sender.
        from: StationId,
        /// The frame's air time.
        duration: Duration,
    },
    /// The last bit of the latest overlapping frame arrived.
    ReceptionEnd,
    /// A reservation request arrived.
    Reservation {
        /// The requester.
        from: StationId,
        /// The requested data duration.
        duration: Duration,
    },
    /// The gap before a grant elapsed.
    GrantDue,
}

#[derive(Debug, Clone, Copy)]
struct PendingGrant {
    requester: StationId,
    duration: Duration,
    handle: EventHandle,
}

///
/// Aggregates concurrent transmissions, detects collisions and grants
/// reservations.
///
/// The arrival counter is 0 while `Idle`, 1 while `Busy` and at least 2
/// while `Colliding`. The medium stays occupied until the latest end of
/// all overlapping frames, regardless of the order the arrivals came in.
///
#[derive(Debug)]
pub struct ChannelArbiter {
    state: ChannelState,
    arrivals: usize,

    rx_start: SimTime,
    rx_end: SimTime,
    rx_timer: Option<EventHandle>,

    pending: Option<PendingGrant>,
}

impl ChannelArbiter {
    /// Creates an idle arbiter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ChannelState::Idle,
            arrivals: 0,
            rx_start: SimTime::ZERO,
            rx_end: SimTime::ZERO,
            rx_timer: None,
            pending: None,
        }
    }

    /// The current channel state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// The number of frames overlapping in the current reception.
    #[must_use]
    pub fn arrivals(&self) -> usize {
        self.arrivals
    }

    /// The requester whose grant is scheduled, if any.
    #[must_use]
    pub fn pending_requester(&self) -> Option<StationId> {
        self.pending.map(|p| p.requester)
    }

    /// When the current reception ends, if the medium is occupied.
    #[must_use]
    pub fn reception_end(&self) -> Option<SimTime> {
        (self.state != ChannelState::Idle).then_some(self.rx_end)
    }

    fn set_state(&mut self, state: ChannelState, ctx: &mut Context<'_>) {
        if self.state != state {
            tracing::debug!("channel {:?} -> {state:?}", self.state);
            self.state = state;
            ctx.notify(Notification::ChannelState { state });
        }
    }

    pub(crate) fn handle(
        &mut self,
        event: ArbiterEvent,
        ctx: &mut Context<'_>,
    ) -> Result<(), RuntimeError> {
        match event {
            ArbiterEvent::FrameArrival { from, duration } => self.arrival(from, duration, ctx),
            ArbiterEvent::ReceptionEnd => {
                if self.state == ChannelState::Idle || self.rx_timer.take().is_none() {
                    let err = ProtocolError::ArbiterIdle { time: ctx.now() };
                    tracing::error!("{err}");
                    return Err(err.into());
                }
                self.finish_reception(ctx);
                Ok(())
            }
            ArbiterEvent::Reservation { from, duration } => {
                self.reservation(from, duration, ctx);
                Ok(())
            }
            ArbiterEvent::GrantDue => self.grant(ctx),
        }
    }

    fn arrival(
        &mut self,
        from: StationId,
        duration: Duration,
        ctx: &mut Context<'_>,
    ) -> Result<(), RuntimeError> {
        let now = ctx.now();

        // A reception ending at this very instant does not overlap.
        if self.state != ChannelState::Idle && now >= self.rx_end {
            if let Some(timer) = self.rx_timer.take() {
                ctx.sched.cancel(timer);
            }
            self.finish_reception(ctx);
        }

        let end = now + duration;
        tracing::trace!(%from, "frame arrival until {end}");

        match self.state {
            ChannelState::Idle => {
                self.arrivals = 1;
                self.rx_start = now;
                self.rx_end = end;
                self.rx_timer = Some(
                    ctx.sched
                        .schedule_at(MacEvent::Arbiter(ArbiterEvent::ReceptionEnd), end)?,
                );
                self.set_state(ChannelState::Busy, ctx);
            }
            ChannelState::Busy | ChannelState::Colliding => {
                self.arrivals += 1;
                if end > self.rx_end {
                    if let Some(timer) = self.rx_timer.take() {
                        ctx.sched.cancel(timer);
                    }
                    self.rx_end = end;
                    self.rx_timer = Some(
                        ctx.sched
                            .schedule_at(MacEvent::Arbiter(ArbiterEvent::ReceptionEnd), end)?,
                    );
                }
                self.set_state(ChannelState::Colliding, ctx);
            }
        }
        Ok(())
    }

    fn finish_reception(&mut self, ctx: &mut Context<'_>) {
        let start = self.rx_start;
        let duration = self.rx_end.saturating_duration_since(start);
        let frames = std::mem::take(&mut self.arrivals);

        self.set_state(ChannelState::Idle, ctx);
        if frames >= 2 {
            tracing::debug!(frames, "collision from {start} for {duration:?}");
            ctx.notify(Notification::Collision {
                start,
                frames,
                duration,
            });
        } else {
            ctx.notify(Notification::Reception {
                start,
                duration,
                overlap: 0,
            });
        }
    }

    fn reservation(&mut self, from: StationId, duration: Duration, ctx: &mut Context<'_>) {
        let gap = ctx.timing.rts + ctx.timing.sifs;

        let Some(pending) = self.pending.take() else {
            let handle = ctx
                .sched
                .schedule_in(MacEvent::Arbiter(ArbiterEvent::GrantDue), gap);
            self.pending = Some(PendingGrant {
                requester: from,
                duration,
                handle,
            });
            tracing::debug!(%from, "reservation pending");
            return;
        };

        let policy = ctx.timing.conflict;
        tracing::debug!(
            pending = %pending.requester,
            requester = %from,
            "reservation conflict, resolved by {policy:?}"
        );
        ctx.notify(Notification::ReservationConflict {
            pending: pending.requester,
            requester: from,
            policy,
        });

        match policy {
            ReservationConflict::DropAll => {
                ctx.sched.cancel(pending.handle);
            }
            ReservationConflict::FirstWins => {
                self.pending = Some(pending);
            }
            ReservationConflict::LastWins => {
                ctx.sched.cancel(pending.handle);
                let handle = ctx
                    .sched
                    .schedule_in(MacEvent::Arbiter(ArbiterEvent::GrantDue), gap);
                self.pending = Some(PendingGrant {
                    requester: from,
                    duration,
                    handle,
                });
            }
        }
    }

    fn grant(&mut self, ctx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let Some(pending) = self.pending.take() else {
            let err = ProtocolError::NoPendingReservation { time: ctx.now() };
            tracing::error!("{err}");
            return Err(err.into());
        };

        for i in 0..ctx.propagation.len() {
            let station = StationId(i);
            ctx.sched.schedule_in(
                MacEvent::Station(
                    station,
                    StationEvent::Grant {
                        to: pending.requester,
                        duration: pending.duration,
                    },
                ),
                ctx.propagation.arbiter_delay(station),
            );
        }

        tracing::debug!(to = %pending.requester, "grant for {:?}", pending.duration);
        ctx.notify(Notification::GrantIssued {
            station: pending.requester,
            duration: pending.duration,
        });
        Ok(())
    }
}

impl Default for ChannelArbiter {
    fn default() -> Self {
        Self::new()
    }
}
