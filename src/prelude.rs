//!
//! Convenience re-export of common members.
//!

//
// # Runtime core
//

pub use crate::runtime::Application;
pub use crate::runtime::Builder;
pub use crate::runtime::EventHandle;
pub use crate::runtime::EventSet;
pub use crate::runtime::Runtime;
pub use crate::runtime::RuntimeError;
pub use crate::runtime::Scheduler;

pub use crate::time::Duration;
pub use crate::time::SimTime;

//
// # Simulation
//

pub use crate::config::Distribution;
pub use crate::config::MacPolicy;
pub use crate::config::ReservationConflict;
pub use crate::config::SimConfig;

pub use crate::arbiter::ChannelState;
pub use crate::sim::MacEvent;
pub use crate::sim::MacSim;
pub use crate::sim::Snapshot;
pub use crate::station::MacState;
pub use crate::station::StationId;

pub use crate::error::ConfigError;
pub use crate::error::ProtocolError;

//
// # Observation
//

pub use crate::observer::Notification;
pub use crate::observer::Observer;
pub use crate::observer::Recorder;
pub use crate::stats::Statistics;
pub use crate::stats::Summary;
