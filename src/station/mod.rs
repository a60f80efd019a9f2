//!
//! The per-station MAC state machine.
//!
//! A [`Station`] is split into a policy independent core (busy counter,
//! attempt counter, timers, the pending frame) and the policy specific
//! state machine, either `AlohaMac` for the backoff-on-generation
//! policies or `ReservationMac` for the RTS/CTS handshake. Each machine
//! matches exhaustively on `(state, event)`, every pair without a
//! transition is a [`ProtocolError`].
//!

use crate::arbiter::ArbiterEvent;
use crate::config::MacPolicy;
use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::observer::Notification;
use crate::runtime::{EventHandle, RuntimeError};
use crate::sim::{Context, MacEvent};
use crate::time::{Duration, SimTime};
use serde::Serialize;
use std::fmt::Display;

pub mod backoff;

mod timer;
pub use timer::TimerKind;
pub(crate) use timer::Timers;

mod aloha;
pub(crate) use aloha::AlohaMac;

mod reservation;
pub(crate) use reservation::ReservationMac;

///
/// The identity of a station, its index in the configuration.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StationId(pub usize);

impl Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "station[{}]", self.0)
    }
}

///
/// The union of all station states across policies.
///
/// The backoff-on-generation policies use `Idle`, `Backoff` and
/// `Transmitting` only.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MacState {
    /// No frame pending.
    Idle,
    /// A frame is pending and waits for the medium (frozen or counting down).
    Backoff,
    /// A reservation request was sent, waiting for the grant.
    WaitReservation,
    /// The grant arrived, the data frame starts after a short gap.
    ReadyToSend,
    /// A data frame is on the air.
    Transmitting,
}

///
/// An event addressed to a station.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationEvent {
    /// One of the station's own timers fired.
    Timer(TimerKind),
    /// The first bit of a foreign frame arrived.
    FrameStart {
        /// The sender.
        from: StationId,
    },
    /// The last bit of a foreign frame arrived.
    FrameEnd {
        /// The sender.
        from: StationId,
    },
    /// A foreign reservation request was heard.
    Reservation {
        /// The requester.
        from: StationId,
        /// The requested data duration.
        duration: Duration,
    },
    /// The arbiter broadcast a grant.
    Grant {
        /// The addressee.
        to: StationId,
        /// The granted data duration.
        duration: Duration,
    },
}

///
/// The policy independent part of a station.
///
#[derive(Debug)]
pub(crate) struct StationCore {
    pub(crate) id: StationId,
    /// Foreign transmissions currently overlapping at this station.
    pub(crate) busy: u32,
    pub(crate) attempts: u32,
    pub(crate) timers: Timers,
    /// The frame waiting for (or in) transmission.
    pub(crate) frame: Option<Frame>,
    /// The most recently transmitted frame, kept for rendering.
    pub(crate) last_frame: Option<Frame>,
}

impl StationCore {
    fn new(id: StationId) -> Self {
        Self {
            id,
            busy: 0,
            attempts: 0,
            timers: Timers::default(),
            frame: None,
            last_frame: None,
        }
    }

    fn event(&self, event: StationEvent) -> MacEvent {
        MacEvent::Station(self.id, event)
    }

    ///
    /// Schedules a timer at an absolute time.
    ///
    /// Fails if a live event of the same purpose exists, the caller must
    /// cancel it first.
    ///
    pub(crate) fn arm(
        &mut self,
        kind: TimerKind,
        at: SimTime,
        state: MacState,
        ctx: &mut Context<'_>,
    ) -> Result<EventHandle, RuntimeError> {
        if self.timers.is_live(kind, ctx.sched) {
            return Err(ProtocolError::TimerAlreadyArmed {
                station: self.id,
                timer: kind,
                state,
                time: ctx.now(),
            }
            .into());
        }

        let handle = ctx
            .sched
            .schedule_at(self.event(StationEvent::Timer(kind)), at)?;
        self.timers.set(kind, handle);
        Ok(handle)
    }

    /// Cancels a timer, a no-op if it is not armed.
    pub(crate) fn disarm(&mut self, kind: TimerKind, ctx: &mut Context<'_>) -> bool {
        self.timers.cancel(kind, ctx.sched)
    }

    /// Whether a timer is pending.
    pub(crate) fn is_armed(&self, kind: TimerKind) -> bool {
        self.timers.is_armed(kind)
    }

    ///
    /// Consumes the slot of a timer that just fired.
    ///
    fn fired(
        &mut self,
        kind: TimerKind,
        state: MacState,
        ctx: &Context<'_>,
    ) -> Result<(), ProtocolError> {
        if self.timers.fired(kind, ctx.sched) {
            Ok(())
        } else {
            Err(ProtocolError::StaleTimer {
                station: self.id,
                timer: kind,
                state,
                time: ctx.now(),
            })
        }
    }

    /// An error for an event without a transition in `state`.
    pub(crate) fn unexpected(
        &self,
        state: MacState,
        event: impl std::fmt::Debug,
        ctx: &Context<'_>,
    ) -> RuntimeError {
        let err = ProtocolError::UnexpectedEvent {
            station: self.id,
            state,
            event: format!("{event:?}"),
            time: ctx.now(),
        };
        tracing::error!("{err}");
        err.into()
    }

    /// Accounts for a foreign frame start.
    pub(crate) fn foreign_start(&mut self, from: StationId) {
        self.busy += 1;
        tracing::trace!(station = %self.id, %from, busy = self.busy, "medium busy");
    }

    /// Accounts for a foreign frame end.
    pub(crate) fn foreign_end(
        &mut self,
        from: StationId,
        state: MacState,
        ctx: &Context<'_>,
    ) -> Result<(), ProtocolError> {
        let Some(busy) = self.busy.checked_sub(1) else {
            return Err(ProtocolError::BusyUnderflow {
                station: self.id,
                state,
                time: ctx.now(),
            });
        };
        self.busy = busy;
        tracing::trace!(station = %self.id, %from, busy = self.busy, "foreign frame ended");
        Ok(())
    }

    ///
    /// Increments the attempt counter, reporting a hit ceiling.
    ///
    pub(crate) fn bump_attempts(&mut self, ctx: &mut Context<'_>) {
        if !backoff::bump_attempts(&mut self.attempts, ctx.config.max_backoffs) {
            tracing::warn!(
                station = %self.id,
                attempts = self.attempts,
                "backoff ceiling reached"
            );
            ctx.notify(Notification::BackoffCeiling {
                station: self.id,
                attempts: self.attempts,
            });
        }
    }

    /// Draws a new frame, stamped with the current time.
    pub(crate) fn generate_frame(&mut self, ctx: &mut Context<'_>) -> Frame {
        let sample = ctx.config.frame_bits.sample(ctx.sched.rng());
        let frame = Frame::new(
            self.id,
            Frame::bits_from_sample(sample),
            ctx.config.bit_rate,
            ctx.now(),
        );
        tracing::debug!(station = %self.id, bits = frame.bits, "generated frame");
        self.frame = Some(frame);
        frame
    }

    /// The pending frame, restamped with the current time.
    pub(crate) fn take_off(
        &mut self,
        state: MacState,
        ctx: &Context<'_>,
    ) -> Result<Frame, RuntimeError> {
        match self.frame.as_mut() {
            Some(frame) => {
                frame.sent = ctx.now();
                Ok(*frame)
            }
            None => Err(self.unexpected(state, "transmission without a pending frame", ctx)),
        }
    }

    ///
    /// Arms the arrival timer of the next frame.
    ///
    /// The first frame of a run may follow its own distribution. Arrivals are
    /// aligned to the slot grid whenever a slot duration is configured.
    ///
    pub(crate) fn schedule_arrival(
        &mut self,
        first: bool,
        state: MacState,
        ctx: &mut Context<'_>,
    ) -> Result<(), RuntimeError> {
        let dist = match ctx.config.first_arrival {
            Some(first_arrival) if first => first_arrival,
            _ => ctx.config.inter_arrival,
        };
        let at = (ctx.now() + dist.sample_duration(ctx.sched.rng())).align_up(ctx.timing.slot);
        self.arm(TimerKind::Arrival, at, state, ctx)?;
        Ok(())
    }

    ///
    /// Puts a frame on the air: delivers it to the arbiter and announces
    /// its first bit to every peer, each with its own propagation delay.
    ///
    pub(crate) fn broadcast_start(&mut self, frame: Frame, ctx: &mut Context<'_>) {
        let delay = ctx.propagation.arbiter_delay(self.id);
        ctx.sched.schedule_in(
            MacEvent::Arbiter(ArbiterEvent::FrameArrival {
                from: self.id,
                duration: frame.duration,
            }),
            delay,
        );
        for (peer, delay) in ctx.propagation.peer_delays(self.id) {
            ctx.sched.schedule_in(
                MacEvent::Station(peer, StationEvent::FrameStart { from: self.id }),
                delay,
            );
        }

        tracing::debug!(
            station = %self.id,
            bits = frame.bits,
            "transmitting until {}",
            frame.end()
        );
        ctx.notify(Notification::FrameSent {
            station: self.id,
            bits: frame.bits,
            duration: frame.duration,
        });
        self.last_frame = Some(frame);
    }

    /// Announces the last bit of the current frame to every peer.
    pub(crate) fn broadcast_end(&mut self, ctx: &mut Context<'_>) {
        for (peer, delay) in ctx.propagation.peer_delays(self.id) {
            ctx.sched.schedule_in(
                MacEvent::Station(peer, StationEvent::FrameEnd { from: self.id }),
                delay,
            );
        }
    }

    /// Sends a reservation request to the arbiter and every peer.
    pub(crate) fn broadcast_reservation(&mut self, duration: Duration, ctx: &mut Context<'_>) {
        let delay = ctx.propagation.arbiter_delay(self.id);
        ctx.sched.schedule_in(
            MacEvent::Arbiter(ArbiterEvent::Reservation {
                from: self.id,
                duration,
            }),
            delay,
        );
        for (peer, delay) in ctx.propagation.peer_delays(self.id) {
            ctx.sched.schedule_in(
                MacEvent::Station(
                    peer,
                    StationEvent::Reservation {
                        from: self.id,
                        duration,
                    },
                ),
                delay,
            );
        }
        ctx.notify(Notification::ReservationRequested {
            station: self.id,
            duration,
        });
    }

    /// Reports a state change.
    pub(crate) fn announce(&self, from: MacState, to: MacState, ctx: &mut Context<'_>) {
        if from != to {
            tracing::debug!(station = %self.id, "{from:?} -> {to:?}");
            ctx.notify(Notification::StationState {
                station: self.id,
                state: to,
            });
        }
    }
}

#[derive(Debug)]
enum StationMac {
    Aloha(AlohaMac),
    Reservation(ReservationMac),
}

///
/// A station attached to the shared medium.
///
#[derive(Debug)]
pub struct Station {
    core: StationCore,
    mac: StationMac,
}

impl Station {
    ///
    /// Creates an idle station following `policy`.
    ///
    #[must_use]
    pub fn new(id: StationId, policy: MacPolicy) -> Self {
        let mac = match policy {
            MacPolicy::Aloha => StationMac::Aloha(AlohaMac::new(false)),
            MacPolicy::Slotted => StationMac::Aloha(AlohaMac::new(true)),
            MacPolicy::Reservation => StationMac::Reservation(ReservationMac::new()),
        };
        Self {
            core: StationCore::new(id),
            mac,
        }
    }

    /// The station's identity.
    #[must_use]
    pub fn id(&self) -> StationId {
        self.core.id
    }

    /// The current MAC state.
    #[must_use]
    pub fn state(&self) -> MacState {
        match &self.mac {
            StationMac::Aloha(mac) => mac.state(),
            StationMac::Reservation(mac) => mac.state(),
        }
    }

    /// The number of foreign transmissions currently overlapping at this station.
    #[must_use]
    pub fn channel_busy(&self) -> u32 {
        self.core.busy
    }

    /// The attempt counter driving the backoff.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.core.attempts
    }

    /// The frame waiting for or in transmission.
    #[must_use]
    pub fn pending_frame(&self) -> Option<&Frame> {
        self.core.frame.as_ref()
    }

    /// The most recently transmitted frame.
    #[must_use]
    pub fn last_frame(&self) -> Option<&Frame> {
        self.core.last_frame.as_ref()
    }

    /// Whether a timer of the given purpose is pending.
    #[must_use]
    pub fn is_timer_armed(&self, kind: TimerKind) -> bool {
        self.core.is_armed(kind)
    }

    /// Arms the first arrival.
    pub(crate) fn start(&mut self, ctx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let state = self.state();
        self.core.schedule_arrival(true, state, ctx)
    }

    ///
    /// Processes an event addressed to this station.
    ///
    pub(crate) fn handle(
        &mut self,
        event: StationEvent,
        ctx: &mut Context<'_>,
    ) -> Result<(), RuntimeError> {
        if let StationEvent::Timer(kind) = event {
            let state = self.state();
            self.core.fired(kind, state, ctx)?;
        }

        match &mut self.mac {
            StationMac::Aloha(mac) => mac.handle(&mut self.core, event, ctx),
            StationMac::Reservation(mac) => mac.handle(&mut self.core, event, ctx),
        }
    }
}
