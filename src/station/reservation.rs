use super::{backoff, MacState, StationCore, StationEvent, TimerKind};
use crate::config::ReservationConflict;
use crate::observer::Notification;
use crate::runtime::RuntimeError;
use crate::sim::Context;
use crate::time::{Duration, SimTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReservationState {
    Idle,
    Backoff,
    WaitReservation,
    ReadyToSend,
    Transmitting,
}

impl From<ReservationState> for MacState {
    fn from(state: ReservationState) -> Self {
        match state {
            ReservationState::Idle => MacState::Idle,
            ReservationState::Backoff => MacState::Backoff,
            ReservationState::WaitReservation => MacState::WaitReservation,
            ReservationState::ReadyToSend => MacState::ReadyToSend,
            ReservationState::Transmitting => MacState::Transmitting,
        }
    }
}

///
/// Carrier sense with an RTS/CTS reservation handshake.
///
/// A station with a pending frame waits for the medium to be idle for
/// `DIFS` plus its remaining backoff (the access timer). The countdown
/// freezes whenever the medium turns busy and resumes once it is idle
/// again. When it expires the station sends a reservation request and
/// waits for a grant addressed to it. Foreign requests and grants set the
/// network allocation vector (NAV), during which the medium counts as busy.
///
/// While waiting, a foreign grant or the timeout fails the attempt. A
/// foreign request fails it only if the arbiter drops all conflicting
/// requests, otherwise one of them is still granted and the station waits
/// for the verdict.
///
#[derive(Debug)]
pub(crate) struct ReservationMac {
    state: ReservationState,
    /// Backoff left to count down after the next `DIFS`.
    remaining: Duration,
    /// Start of the current countdown, `None` while frozen.
    gap_start: Option<SimTime>,
    /// The data duration of the last grant.
    granted: Duration,
}

impl ReservationMac {
    pub(crate) fn new() -> Self {
        Self {
            state: ReservationState::Idle,
            remaining: Duration::ZERO,
            gap_start: None,
            granted: Duration::ZERO,
        }
    }

    pub(crate) fn state(&self) -> MacState {
        self.state.into()
    }

    fn set_state(&mut self, state: ReservationState, core: &StationCore, ctx: &mut Context<'_>) {
        let from = self.state();
        self.state = state;
        core.announce(from, self.state(), ctx);
    }

    fn medium_idle(core: &StationCore) -> bool {
        core.busy == 0 && !core.is_armed(TimerKind::Nav)
    }

    pub(crate) fn handle(
        &mut self,
        core: &mut StationCore,
        event: StationEvent,
        ctx: &mut Context<'_>,
    ) -> Result<(), RuntimeError> {
        use ReservationState as S;
        use StationEvent as E;

        match (self.state, event) {
            (S::Idle, E::Timer(TimerKind::Arrival)) => {
                core.generate_frame(ctx);
                self.remaining = Duration::ZERO;
                if Self::medium_idle(core) {
                    self.set_state(S::Backoff, core, ctx);
                    self.resume(core, ctx)
                } else {
                    // Medium busy on arrival, contend once it clears.
                    self.draw_backoff(core, ctx);
                    Ok(())
                }
            }

            (S::Backoff, E::Timer(TimerKind::Access)) => self.request(core, ctx),

            (S::WaitReservation, E::Timer(TimerKind::Timeout)) => {
                tracing::debug!(station = %core.id, "no grant in time");
                ctx.notify(Notification::ReservationTimeout { station: core.id });
                self.fail(core, ctx)
            }

            (S::ReadyToSend, E::Timer(TimerKind::Tx)) => self.transmit(core, ctx),

            (S::Transmitting, E::Timer(TimerKind::Tx)) => {
                core.broadcast_end(ctx);
                core.attempts = 0;
                core.frame = None;
                self.set_state(S::Idle, core, ctx);
                core.schedule_arrival(false, self.state(), ctx)
            }

            (_, E::Timer(TimerKind::Nav)) => self.try_resume(core, ctx),

            (state, E::FrameStart { from }) => {
                core.foreign_start(from);
                match state {
                    S::WaitReservation => self.fail(core, ctx),
                    S::Backoff => {
                        self.freeze(core, ctx);
                        Ok(())
                    }
                    S::Idle | S::ReadyToSend | S::Transmitting => Ok(()),
                }
            }

            (_, E::FrameEnd { from }) => {
                core.foreign_end(from, self.state(), ctx)?;
                self.try_resume(core, ctx)
            }

            (state, E::Reservation { from, duration }) => {
                let t = ctx.timing;
                let until = ctx.now() + t.rts + t.sifs + t.cts + t.sifs + duration;
                tracing::trace!(station = %core.id, %from, "deferring to a foreign request until {until}");
                self.extend_nav(core, until, ctx)?;
                if state == S::WaitReservation && ctx.timing.conflict != ReservationConflict::DropAll {
                    tracing::debug!(station = %core.id, %from, "competing request, awaiting the arbiter");
                    return Ok(());
                }
                self.contended(state, core, ctx)
            }

            (state, E::Grant { to, duration }) if to == core.id => {
                if state == S::WaitReservation {
                    core.disarm(TimerKind::Timeout, ctx);
                    self.granted = duration;
                    self.set_state(S::ReadyToSend, core, ctx);
                    let at = ctx.now() + ctx.timing.cts + ctx.timing.sifs;
                    core.arm(TimerKind::Tx, at, self.state(), ctx)?;
                } else {
                    tracing::debug!(station = %core.id, "ignoring a late grant in state {state:?}");
                }
                Ok(())
            }

            (state, E::Grant { to, duration }) => {
                let until = ctx.now() + ctx.timing.cts + ctx.timing.sifs + duration;
                tracing::trace!(station = %core.id, %to, "deferring to a foreign grant until {until}");
                self.extend_nav(core, until, ctx)?;
                self.contended(state, core, ctx)
            }

            (_, event) => Err(core.unexpected(self.state(), event, ctx)),
        }
    }

    /// Reaction to a competing request or grant.
    fn contended(
        &mut self,
        state: ReservationState,
        core: &mut StationCore,
        ctx: &mut Context<'_>,
    ) -> Result<(), RuntimeError> {
        match state {
            ReservationState::WaitReservation => self.fail(core, ctx),
            ReservationState::Backoff => {
                self.freeze(core, ctx);
                Ok(())
            }
            ReservationState::Idle
            | ReservationState::ReadyToSend
            | ReservationState::Transmitting => Ok(()),
        }
    }

    /// Bumps the attempt counter and draws a fresh contention backoff.
    fn draw_backoff(&mut self, core: &mut StationCore, ctx: &mut Context<'_>) {
        core.bump_attempts(ctx);

        let slot = if ctx.timing.slot.is_zero() {
            ctx.timing.backoff_unit
        } else {
            ctx.timing.slot
        };
        self.remaining = backoff::contention(slot, core.attempts, ctx.sched.rng());
        self.gap_start = None;

        tracing::debug!(
            station = %core.id,
            attempts = core.attempts,
            "backoff {:?}",
            self.remaining
        );
        ctx.notify(Notification::BackoffScheduled {
            station: core.id,
            attempts: core.attempts,
            delay: self.remaining,
        });
        self.set_state(ReservationState::Backoff, core, ctx);
    }

    /// The attempt failed: stop waiting for a grant and back off.
    fn fail(&mut self, core: &mut StationCore, ctx: &mut Context<'_>) -> Result<(), RuntimeError> {
        core.disarm(TimerKind::Timeout, ctx);
        self.draw_backoff(core, ctx);
        self.try_resume(core, ctx)
    }

    /// Restarts the countdown if it is frozen and the medium is idle.
    fn try_resume(&mut self, core: &mut StationCore, ctx: &mut Context<'_>) -> Result<(), RuntimeError> {
        if self.state == ReservationState::Backoff
            && Self::medium_idle(core)
            && !core.is_armed(TimerKind::Access)
        {
            self.resume(core, ctx)
        } else {
            Ok(())
        }
    }

    fn resume(&mut self, core: &mut StationCore, ctx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let now = ctx.now();
        self.gap_start = Some(now);
        let at = now + ctx.timing.difs + self.remaining;
        core.arm(TimerKind::Access, at, self.state(), ctx)?;
        Ok(())
    }

    ///
    /// Stops the countdown, keeping the backoff not yet counted down.
    ///
    /// Only time past the `DIFS` gap counts, so
    /// `remaining = max(0, remaining - (elapsed - DIFS))`.
    ///
    fn freeze(&mut self, core: &mut StationCore, ctx: &mut Context<'_>) {
        if !core.disarm(TimerKind::Access, ctx) {
            return;
        }
        if let Some(gap_start) = self.gap_start.take() {
            let elapsed = ctx.now().saturating_duration_since(gap_start);
            let counted = elapsed.saturating_sub(ctx.timing.difs);
            self.remaining = self.remaining.saturating_sub(counted);
        }
        tracing::trace!(station = %core.id, "frozen with {:?} left", self.remaining);
    }

    /// Defers until at least `until`, extending a shorter NAV.
    fn extend_nav(
        &mut self,
        core: &mut StationCore,
        until: SimTime,
        ctx: &mut Context<'_>,
    ) -> Result<(), RuntimeError> {
        if let Some(nav) = core.timers.get(TimerKind::Nav) {
            if nav.due() >= until {
                return Ok(());
            }
            core.disarm(TimerKind::Nav, ctx);
        }
        core.arm(TimerKind::Nav, until, self.state(), ctx)?;
        Ok(())
    }

    /// Sends the reservation request for the pending frame.
    fn request(&mut self, core: &mut StationCore, ctx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let Some(frame) = core.frame else {
            return Err(core.unexpected(self.state(), "reservation without a pending frame", ctx));
        };

        self.remaining = Duration::ZERO;
        self.gap_start = None;
        core.broadcast_reservation(frame.duration, ctx);

        let t = ctx.timing;
        let timeout = t.rts + t.cts + ctx.propagation.arbiter_delay(core.id) * 2 + t.sifs * 5;

        self.set_state(ReservationState::WaitReservation, core, ctx);
        core.arm(TimerKind::Timeout, ctx.now() + timeout, self.state(), ctx)?;
        Ok(())
    }

    /// Puts the granted data frame on the air.
    fn transmit(&mut self, core: &mut StationCore, ctx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let mut frame = core.take_off(self.state(), ctx)?;
        frame.duration = self.granted;

        self.set_state(ReservationState::Transmitting, core, ctx);
        core.arm(TimerKind::Tx, frame.end(), self.state(), ctx)?;
        core.broadcast_start(frame, ctx);
        Ok(())
    }
}
