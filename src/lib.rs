#![allow(clippy::module_name_repetitions)]
//!
//! A discrete event simulation of a shared broadcast medium.
//!
//! A fixed set of stations contends for one channel. Each station follows
//! one [`MacPolicy`](crate::config::MacPolicy): unslotted ALOHA, slotted
//! backoff-on-generation, or carrier sense with an RTS/CTS reservation
//! handshake. A central [`ChannelArbiter`](crate::arbiter::ChannelArbiter)
//! receives every frame, tells clean receptions from collisions and grants
//! reservations. Signals travel at a finite speed, so every station sees
//! every frame at its own time.
//!
//! # Running a simulation
//!
//! The simulation is an [`Application`](crate::runtime::Application) for
//! the event [`Runtime`](crate::runtime::Runtime). Build it from a
//! [`SimConfig`](crate::config::SimConfig), attach observers if needed and
//! run it to completion.
//!
//! ```
//! use csma_sim::prelude::*;
//! use std::{cell::RefCell, rc::Rc};
//!
//! let config = SimConfig::from_yaml(r"
//! policy: slotted
//! bit_rate: 1000
//! slot_time: 1.0
//! backoff_unit: 1.0
//! max_backoffs: 6
//! inter_arrival: { kind: exponential, mean: 8.0 }
//! frame_bits: { kind: constant, value: 1000 }
//! station_count: 3
//! stations: [{ x: 0.0, y: 0.0 }, { x: 50.0, y: 0.0 }, { x: 0.0, y: 50.0 }]
//! ").unwrap();
//!
//! let recorder = Rc::new(RefCell::new(Recorder::new()));
//! let mut sim = MacSim::new(config).unwrap();
//! sim.observe(recorder.clone());
//!
//! let rt = sim.builder().reseed(42).max_time(SimTime::from(100.0)).quiet().build(sim);
//! let (sim, end, _) = rt.run().unwrap();
//!
//! let summary = sim.summary(end);
//! assert_eq!(summary.receptions, recorder.borrow().filter(|n| n.overlap() == Some(0)).count());
//! ```
//!
//! Every [`Notification`](crate::observer::Notification) a run produces is
//! also folded into the bundled [`Statistics`](crate::stats::Statistics).
//! Protocol violations abort the run with a
//! [`RuntimeError`](crate::runtime::RuntimeError) wrapping a
//! [`ProtocolError`](crate::error::ProtocolError).
//!

pub mod prelude;

pub mod arbiter;
pub mod config;
pub mod error;
pub mod frame;
pub mod logger;
pub mod observer;
pub mod propagation;
pub mod runtime;
pub mod sim;
pub mod station;
pub mod stats;
pub mod time;
