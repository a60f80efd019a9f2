#![allow(dead_code)]

use csma_sim::prelude::*;
use std::{cell::RefCell, rc::Rc};

pub fn ms(millis: u64) -> SimTime {
    SimTime::from_duration(Duration::from_millis(millis))
}

///
/// A 1 kbit/s medium where every station holds exactly one frame at
/// the start of the run and the next one only much later.
///
pub fn co_located(policy: &str, stations: usize, extra: &str) -> SimConfig {
    let positions = vec!["{ x: 0.0, y: 0.0 }"; stations].join(", ");
    let yaml = format!(
        r"
policy: {policy}
bit_rate: 1000
backoff_unit: 1.0
max_backoffs: 6
inter_arrival: {{ kind: constant, value: 1000.0 }}
first_arrival: {{ kind: constant, value: 0.0 }}
frame_bits: {{ kind: constant, value: 1000 }}
station_count: {stations}
stations: [{positions}]
{extra}
"
    );
    SimConfig::from_yaml(&yaml).unwrap()
}

///
/// Builds a runtime with a recorder attached.
///
pub fn build(config: SimConfig, seed: u64) -> (Runtime<MacSim>, Rc<RefCell<Recorder>>) {
    let recorder = Rc::new(RefCell::new(Recorder::new()));
    let mut sim = MacSim::new(config).unwrap();
    sim.observe(recorder.clone());
    let rt = sim.builder().reseed(seed).quiet().build(sim);
    (rt, recorder)
}

/// The times of all notifications of one kind.
pub fn times_of(recorder: &Recorder, kind: &str) -> Vec<SimTime> {
    recorder
        .filter(|n| n.kind() == kind)
        .map(|(t, _)| *t)
        .collect()
}

/// In-place tweaks of a value inside an expression.
pub trait Tap: Sized {
    fn tap(mut self, f: impl FnOnce(&mut Self)) -> Self {
        f(&mut self);
        self
    }
}

impl Tap for SimConfig {}
