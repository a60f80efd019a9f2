//!
//! Wiring of stations, arbiter and sinks into a runnable [`Application`].
//!

use crate::arbiter::{ArbiterEvent, ChannelArbiter, ChannelState};
use crate::config::{SimConfig, Timing};
use crate::error::{ConfigError, ProtocolError};
use crate::frame::Ring;
use crate::observer::{Notification, Notifier, Observer};
use crate::propagation::{Position, PropagationModel};
use crate::runtime::{Application, Builder, EventSet, Runtime, RuntimeError, Scheduler};
use crate::station::{MacState, Station, StationEvent, StationId};
use crate::stats::{Statistics, Summary};
use crate::time::SimTime;
use serde::Serialize;

///
/// The event set of the simulation.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacEvent {
    /// An event for one station.
    Station(StationId, StationEvent),
    /// An event for the arbiter.
    Arbiter(ArbiterEvent),
}

impl From<ArbiterEvent> for MacEvent {
    fn from(event: ArbiterEvent) -> Self {
        MacEvent::Arbiter(event)
    }
}

///
/// Everything a handler may touch besides its own state.
///
pub(crate) struct Context<'a> {
    pub(crate) sched: &'a mut Scheduler<MacEvent>,
    pub(crate) config: &'a SimConfig,
    pub(crate) timing: &'a Timing,
    pub(crate) propagation: &'a PropagationModel,
    pub(crate) notifier: &'a mut Notifier,
}

impl Context<'_> {
    pub(crate) fn now(&self) -> SimTime {
        self.sched.now()
    }

    pub(crate) fn notify(&mut self, notification: Notification) {
        let now = self.now();
        self.notifier.notify(now, notification);
    }
}

///
/// A shared medium contended by a fixed set of stations.
///
/// ```
/// use csma_sim::prelude::*;
///
/// let config = SimConfig::from_yaml(r"
/// policy: aloha
/// bit_rate: 1000
/// backoff_unit: 0.5
/// max_backoffs: 4
/// inter_arrival: { kind: exponential, mean: 5.0 }
/// frame_bits: { kind: constant, value: 500 }
/// station_count: 2
/// stations: [{ x: 0.0, y: 0.0 }, { x: 100.0, y: 0.0 }]
/// ").unwrap();
///
/// let sim = MacSim::new(config).unwrap();
/// let rt = sim.builder().reseed(7).max_time(SimTime::from(60.0)).quiet().build(sim);
/// let (sim, end, _) = rt.run().unwrap();
/// assert!(sim.summary(end).receptions > 0);
/// ```
pub struct MacSim {
    config: SimConfig,
    timing: Timing,
    propagation: PropagationModel,
    stations: Vec<Station>,
    arbiter: ChannelArbiter,
    notifier: Notifier,
}

impl MacSim {
    ///
    /// Sets up stations and arbiter for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violation found by [`SimConfig::validate`].
    ///
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let timing = config.timing();
        let propagation =
            PropagationModel::new(&config.stations, config.arbiter, config.propagation_speed);
        let stations = (0..config.station_count)
            .map(|i| Station::new(StationId(i), config.policy))
            .collect();
        let notifier = Notifier::new(Statistics::new(config.station_count, SimTime::ZERO));

        Ok(Self {
            config,
            timing,
            propagation,
            stations,
            arbiter: ChannelArbiter::new(),
            notifier,
        })
    }

    ///
    /// A runtime builder seeded and bounded as configured.
    ///
    pub fn builder(&self) -> Builder {
        let mut builder = match self.config.seed {
            Some(seed) => Builder::seeded(seed),
            None => Builder::new(),
        };
        if let Some(time) = self.config.limit.time {
            builder = builder.max_time(time);
        }
        if let Some(events) = self.config.limit.events {
            builder = builder.max_itr(events);
        }
        builder
    }

    /// Attaches an observer that receives every notification.
    pub fn observe(&mut self, observer: impl Observer + 'static) {
        self.notifier.attach(Box::new(observer));
    }

    /// The configuration of this run.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The delay table.
    #[must_use]
    pub fn propagation(&self) -> &PropagationModel {
        &self.propagation
    }

    /// All stations, indexed by id.
    #[must_use]
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// One station.
    #[must_use]
    pub fn station(&self, id: StationId) -> Option<&Station> {
        self.stations.get(id.0)
    }

    /// The arbiter.
    #[must_use]
    pub fn arbiter(&self) -> &ChannelArbiter {
        &self.arbiter
    }

    /// The bundled statistics.
    #[must_use]
    pub fn statistics(&self) -> &Statistics {
        &self.notifier.stats
    }

    /// The statistics of a run that ended at `end`.
    #[must_use]
    pub fn summary(&self, end: SimTime) -> Summary {
        self.notifier.stats.summary(end)
    }

    ///
    /// A read-only view for renderers, taken at the current simulation time.
    ///
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let now = SimTime::now();
        let speed = self.propagation.speed();
        let stations = self
            .stations
            .iter()
            .map(|station| StationView {
                id: station.id(),
                position: self.propagation.position(station.id()),
                state: station.state(),
                channel_busy: station.channel_busy(),
                attempts: station.attempts(),
                ring: station
                    .last_frame()
                    .and_then(|frame| frame.ring(now, speed, self.config.ring_radius)),
            })
            .collect();

        Snapshot {
            time: now,
            channel: self.arbiter.state(),
            stations,
        }
    }

    fn dispatch(
        &mut self,
        event: MacEvent,
        sched: &mut Scheduler<MacEvent>,
    ) -> Result<(), RuntimeError> {
        let MacSim {
            config,
            timing,
            propagation,
            stations,
            arbiter,
            notifier,
        } = self;
        let mut ctx = Context {
            sched,
            config,
            timing,
            propagation,
            notifier,
        };

        match event {
            MacEvent::Station(id, event) => {
                let Some(station) = stations.get_mut(id.0) else {
                    return Err(ProtocolError::UnknownStation {
                        station: id,
                        time: ctx.now(),
                    }
                    .into());
                };
                station.handle(event, &mut ctx)
            }
            MacEvent::Arbiter(event) => arbiter.handle(event, &mut ctx),
        }
    }

    fn start(&mut self, sched: &mut Scheduler<MacEvent>) -> Result<(), RuntimeError> {
        let MacSim {
            config,
            timing,
            propagation,
            stations,
            notifier,
            ..
        } = self;
        let mut ctx = Context {
            sched,
            config,
            timing,
            propagation,
            notifier,
        };
        stations
            .iter_mut()
            .try_for_each(|station| station.start(&mut ctx))
    }
}

impl Application for MacSim {
    type EventSet = MacEvent;

    fn at_sim_start(rt: &mut Runtime<Self>) -> Result<(), RuntimeError> {
        let (app, sched) = rt.parts();
        tracing::info!(
            policy = ?app.config.policy,
            stations = app.stations.len(),
            "simulation starting"
        );
        app.start(sched)
    }

    fn at_sim_end(rt: &mut Runtime<Self>) -> Result<(), RuntimeError> {
        let summary = rt.app.summary(rt.sim_time());
        tracing::info!(
            receptions = summary.receptions,
            collisions = summary.collisions,
            throughput = summary.throughput,
            "simulation ended"
        );
        Ok(())
    }
}

impl EventSet<MacSim> for MacEvent {
    fn handle(self, rt: &mut Runtime<MacSim>) -> Result<(), RuntimeError> {
        let (app, sched) = rt.parts();
        app.dispatch(self, sched)
    }
}

///
/// A read-only view of the simulation for renderers.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// The time the snapshot was taken.
    pub time: SimTime,
    /// The arbiter's view of the medium.
    pub channel: ChannelState,
    /// One entry per station.
    pub stations: Vec<StationView>,
}

///
/// The renderable state of one station.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationView {
    /// The station.
    pub id: StationId,
    /// Where it sits.
    pub position: Position,
    /// Its MAC state.
    pub state: MacState,
    /// Foreign transmissions it currently hears.
    pub channel_busy: u32,
    /// Its attempt counter.
    pub attempts: u32,
    /// The ring of its last frame, if still visible.
    pub ring: Option<Ring>,
}
