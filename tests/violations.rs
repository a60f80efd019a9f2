mod common;

use common::*;
use csma_sim::arbiter::ArbiterEvent;
use csma_sim::prelude::*;
use csma_sim::station::{StationEvent, TimerKind};
use serial_test::serial;

fn late_start() -> SimConfig {
    let mut config = co_located("aloha", 2, "");
    config.first_arrival = Some(Distribution::Constant { value: 5.0 });
    config
}

fn abort(rt: Runtime<MacSim>) -> ProtocolError {
    let err = rt.run().map(|_| ()).unwrap_err();
    let protocol = err
        .downcast_ref::<ProtocolError>()
        .cloned()
        .unwrap_or_else(|| panic!("not a protocol error: {err}"));
    protocol
}

#[test]
#[serial]
fn reception_end_while_idle() {
    let (mut rt, _) = build(late_start(), 1);
    rt.add_event(ArbiterEvent::ReceptionEnd, SimTime::from(1.0))
        .unwrap();

    assert_eq!(
        abort(rt),
        ProtocolError::ArbiterIdle {
            time: SimTime::from(1.0)
        }
    );
}

#[test]
#[serial]
fn grant_without_request() {
    let (mut rt, _) = build(late_start(), 1);
    rt.add_event(ArbiterEvent::GrantDue, SimTime::from(2.0))
        .unwrap();

    assert_eq!(
        abort(rt),
        ProtocolError::NoPendingReservation {
            time: SimTime::from(2.0)
        }
    );
}

#[test]
#[serial]
fn frame_end_without_start() {
    let (mut rt, _) = build(late_start(), 1);
    rt.add_event(
        MacEvent::Station(StationId(1), StationEvent::FrameEnd { from: StationId(0) }),
        SimTime::from(1.0),
    )
    .unwrap();

    assert_eq!(
        abort(rt),
        ProtocolError::BusyUnderflow {
            station: StationId(1),
            state: MacState::Idle,
            time: SimTime::from(1.0),
        }
    );
}

#[test]
#[serial]
fn timer_nobody_armed() {
    let (mut rt, _) = build(late_start(), 1);
    rt.add_event(
        MacEvent::Station(StationId(0), StationEvent::Timer(TimerKind::Tx)),
        SimTime::from(1.0),
    )
    .unwrap();

    assert_eq!(
        abort(rt),
        ProtocolError::StaleTimer {
            station: StationId(0),
            timer: TimerKind::Tx,
            state: MacState::Idle,
            time: SimTime::from(1.0),
        }
    );
}

#[test]
#[serial]
fn duplicate_arrival_timer() {
    // The first arrival is pending until 5 s, a second copy of the event
    // fires while the real one is still live.
    let (mut rt, _) = build(late_start(), 1);
    rt.add_event(
        MacEvent::Station(StationId(0), StationEvent::Timer(TimerKind::Arrival)),
        SimTime::from(1.0),
    )
    .unwrap();

    assert!(matches!(
        abort(rt),
        ProtocolError::StaleTimer {
            station: StationId(0),
            timer: TimerKind::Arrival,
            ..
        }
    ));
}

#[test]
#[serial]
fn grant_in_backoff_on_generation_policy() {
    let (mut rt, _) = build(late_start(), 1);
    rt.add_event(
        MacEvent::Station(
            StationId(0),
            StationEvent::Grant {
                to: StationId(0),
                duration: Duration::from_secs(1),
            },
        ),
        SimTime::from(1.0),
    )
    .unwrap();

    let err = abort(rt);
    assert!(
        matches!(
            &err,
            ProtocolError::UnexpectedEvent {
                station: StationId(0),
                state: MacState::Idle,
                event,
                ..
            } if event.starts_with("Grant")
        ),
        "{err}"
    );
}

#[test]
#[serial]
fn unknown_station() {
    let (mut rt, _) = build(late_start(), 1);
    rt.add_event(
        MacEvent::Station(StationId(7), StationEvent::FrameStart { from: StationId(0) }),
        SimTime::ZERO,
    )
    .unwrap();

    assert_eq!(
        abort(rt),
        ProtocolError::UnknownStation {
            station: StationId(7),
            time: SimTime::ZERO,
        }
    );
}

#[test]
#[serial]
fn runs_stop_at_the_violation() {
    let (mut rt, recorder) = build(late_start(), 1);
    rt.add_event(ArbiterEvent::ReceptionEnd, SimTime::from(1.0))
        .unwrap();

    rt.start().unwrap();
    assert!(rt.dispatch_all().is_err());
    assert_eq!(rt.sim_time(), SimTime::from(1.0));
    assert!(recorder.borrow().events.is_empty());
}

#[test]
fn configuration_errors_never_reach_the_runtime() {
    let mut config = co_located("aloha", 2, "");
    config.stations.pop();
    assert!(matches!(
        MacSim::new(config),
        Err(ConfigError::StationCountMismatch {
            declared: 2,
            provided: 1
        })
    ));

    let mut config = co_located("aloha", 1, "");
    config.bit_rate = 0;
    assert!(matches!(
        MacSim::new(config),
        Err(ConfigError::OutOfRange {
            field: "bit_rate",
            ..
        })
    ));

    let mut config = co_located("aloha", 1, "");
    config.policy = MacPolicy::Reservation;
    assert!(matches!(
        MacSim::new(config),
        Err(ConfigError::MissingReservationTiming)
    ));

    let mut config = co_located("aloha", 1, "");
    config.policy = MacPolicy::Slotted;
    assert!(matches!(
        MacSim::new(config),
        Err(ConfigError::MissingSlotTime)
    ));

    // Backoffs that would push the clock past its range.
    for (unit, max_backoffs) in [(1.0e12, 29), (1.0e6, 29), (1.0e30, 0)] {
        let mut config = co_located("aloha", 2, "");
        config.backoff_unit = unit;
        config.max_backoffs = max_backoffs;
        assert!(matches!(
            MacSim::new(config),
            Err(ConfigError::OutOfRange {
                field: "backoff_unit",
                ..
            })
        ));
    }

    let mut config = co_located("aloha", 1, "");
    config.limit = Default::default();
    assert!(matches!(config.ensure_bounded(), Err(ConfigError::Unbounded)));

    assert!(matches!(
        SimConfig::load("does/not/exist.yaml"),
        Err(ConfigError::Io { .. })
    ));
}
