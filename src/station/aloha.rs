use super::{backoff, MacState, StationCore, StationEvent, TimerKind};
use crate::observer::Notification;
use crate::runtime::RuntimeError;
use crate::sim::Context;
use crate::time::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlohaState {
    Idle,
    Backoff,
    Transmitting,
}

impl From<AlohaState> for MacState {
    fn from(state: AlohaState) -> Self {
        match state {
            AlohaState::Idle => MacState::Idle,
            AlohaState::Backoff => MacState::Backoff,
            AlohaState::Transmitting => MacState::Transmitting,
        }
    }
}

///
/// Backoff-on-generation access, optionally slotted.
///
/// A station transmits as soon as a frame is due and it hears no foreign
/// transmission. It listens while transmitting: a foreign frame start
/// heard before its own frame ended marks the frame collided, which is
/// retried after `2^attempts` backoff units.
///
#[derive(Debug)]
pub(crate) struct AlohaMac {
    state: AlohaState,
    slotted: bool,
    collided: bool,
    tx_end: SimTime,
}

impl AlohaMac {
    pub(crate) fn new(slotted: bool) -> Self {
        Self {
            state: AlohaState::Idle,
            slotted,
            collided: false,
            tx_end: SimTime::ZERO,
        }
    }

    pub(crate) fn state(&self) -> MacState {
        self.state.into()
    }

    fn set_state(&mut self, state: AlohaState, core: &StationCore, ctx: &mut Context<'_>) {
        let from = self.state();
        self.state = state;
        core.announce(from, self.state(), ctx);
    }

    pub(crate) fn handle(
        &mut self,
        core: &mut StationCore,
        event: StationEvent,
        ctx: &mut Context<'_>,
    ) -> Result<(), RuntimeError> {
        use AlohaState as S;
        use StationEvent as E;

        match (self.state, event) {
            (S::Idle, E::Timer(TimerKind::Arrival)) => {
                core.generate_frame(ctx);
                if core.busy > 0 {
                    core.bump_attempts(ctx);
                    self.backoff(core, ctx)
                } else {
                    self.transmit(core, ctx)
                }
            }

            (S::Backoff, E::Timer(TimerKind::Access)) => {
                if core.busy == 0 {
                    self.transmit(core, ctx)
                } else {
                    core.bump_attempts(ctx);
                    self.backoff(core, ctx)
                }
            }

            (S::Transmitting, E::Timer(TimerKind::Tx)) => self.end_transmission(core, ctx),

            (state, E::FrameStart { from }) => {
                core.foreign_start(from);
                if state == S::Transmitting && ctx.now() < self.tx_end && !self.collided {
                    tracing::debug!(station = %core.id, %from, "heard a foreign frame while sending");
                    self.collided = true;
                }
                Ok(())
            }

            (_, E::FrameEnd { from }) => Ok(core.foreign_end(from, self.state(), ctx)?),

            (_, event) => Err(core.unexpected(self.state(), event, ctx)),
        }
    }

    fn transmit(&mut self, core: &mut StationCore, ctx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let frame = core.take_off(self.state(), ctx)?;

        self.collided = false;
        self.tx_end = frame.end();

        self.set_state(AlohaState::Transmitting, core, ctx);
        core.arm(TimerKind::Tx, frame.end(), self.state(), ctx)?;
        core.broadcast_start(frame, ctx);
        Ok(())
    }

    fn end_transmission(
        &mut self,
        core: &mut StationCore,
        ctx: &mut Context<'_>,
    ) -> Result<(), RuntimeError> {
        core.broadcast_end(ctx);

        if self.collided {
            core.bump_attempts(ctx);
            self.backoff(core, ctx)
        } else {
            core.attempts = 0;
            core.frame = None;
            self.set_state(AlohaState::Idle, core, ctx);
            core.schedule_arrival(false, self.state(), ctx)
        }
    }

    ///
    /// Arms the retry timer `2^attempts` units ahead, on the next slot
    /// boundary if slotted.
    ///
    fn backoff(&mut self, core: &mut StationCore, ctx: &mut Context<'_>) -> Result<(), RuntimeError> {
        let now = ctx.now();
        let delay = backoff::exponential(
            ctx.timing.backoff_unit,
            core.attempts,
            ctx.config.randomize_backoff,
            ctx.sched.rng(),
        );

        let mut at = now + delay;
        if self.slotted {
            at = at.align_up(ctx.timing.slot);
        }

        self.set_state(AlohaState::Backoff, core, ctx);
        core.arm(TimerKind::Access, at, self.state(), ctx)?;

        tracing::debug!(station = %core.id, attempts = core.attempts, "retry at {at}");
        ctx.notify(Notification::BackoffScheduled {
            station: core.id,
            attempts: core.attempts,
            delay: at - now,
        });
        Ok(())
    }
}
