mod common;

use common::*;
use csma_sim::arbiter::ArbiterEvent;
use csma_sim::prelude::*;
use csma_sim::station::{StationEvent, TimerKind};
use serial_test::serial;

/// 10 s data frames, zero-length control frames and a 100 ms short gap.
fn handshake(stations: usize, conflict: &str) -> SimConfig {
    co_located(
        "reservation",
        stations,
        &format!(
            "reservation: {{ difs: 0.0, sifs: 0.1, rts: 0.0, cts: 0.0, conflict: {conflict} }}\n"
        ),
    )
    .tap(|c| c.frame_bits = Distribution::Constant { value: 10_000.0 })
}

#[test]
#[serial]
fn granted_frame_follows_two_short_gaps() {
    let (mut rt, recorder) = build(handshake(1, "drop-all"), 1);
    rt.start().unwrap();

    rt.dispatch_events_until(ms(150)).unwrap();
    let station = &rt.app.stations()[0];
    assert_eq!(station.state(), MacState::ReadyToSend);
    assert!(!station.is_timer_armed(TimerKind::Timeout));
    assert!(station.is_timer_armed(TimerKind::Tx));

    rt.dispatch_events_until(SimTime::from(20.0)).unwrap();
    assert_eq!(rt.app.stations()[0].state(), MacState::Idle);
    assert_eq!(rt.app.stations()[0].attempts(), 0);

    let (sim, end, _) = rt.finish().unwrap();
    assert_eq!(end, ms(10_200));

    let recorder = recorder.borrow();
    let protocol = recorder
        .filter(|n| {
            !matches!(
                n,
                Notification::StationState { .. } | Notification::ChannelState { .. }
            )
        })
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(
        protocol,
        vec![
            (
                SimTime::ZERO,
                Notification::ReservationRequested {
                    station: StationId(0),
                    duration: Duration::from_secs(10),
                }
            ),
            (
                ms(100),
                Notification::GrantIssued {
                    station: StationId(0),
                    duration: Duration::from_secs(10),
                }
            ),
            (
                ms(200),
                Notification::FrameSent {
                    station: StationId(0),
                    bits: 10_000,
                    duration: Duration::from_secs(10),
                }
            ),
            (
                ms(10_200),
                Notification::Reception {
                    start: ms(200),
                    duration: Duration::from_secs(10),
                    overlap: 0,
                }
            ),
        ]
    );

    let states = recorder
        .filter(|n| matches!(n, Notification::StationState { .. }))
        .map(|(_, n)| match n {
            Notification::StationState { state, .. } => *state,
            _ => unreachable!(),
        })
        .collect::<Vec<_>>();
    assert_eq!(
        states,
        vec![
            MacState::Backoff,
            MacState::WaitReservation,
            MacState::ReadyToSend,
            MacState::Transmitting,
            MacState::Idle,
        ]
    );

    let summary = sim.summary(end);
    assert_eq!(summary.reservations.requested, 1);
    assert_eq!(summary.reservations.granted, 1);
    assert_eq!(summary.reservations.conflicts, 0);
    assert_eq!(summary.stations[0].requests, 1);
}

#[test]
#[serial]
fn concurrent_requests_are_dropped() {
    let (mut rt, recorder) = build(handshake(2, "drop-all"), 1);
    rt.start().unwrap();
    rt.dispatch_events_until(SimTime::from(1.0)).unwrap();

    // Each station heard the other's request while waiting for its own
    // grant, both treat that as a failed attempt and defer.
    for station in rt.app.stations() {
        assert_eq!(station.state(), MacState::Backoff);
        assert_eq!(station.attempts(), 1);
        assert!(station.is_timer_armed(TimerKind::Nav));
        assert!(!station.is_timer_armed(TimerKind::Access));
        assert!(!station.is_timer_armed(TimerKind::Timeout));
    }
    assert_eq!(rt.app.arbiter().pending_requester(), None);

    {
        let recorder = recorder.borrow();
        let conflicts = recorder
            .filter(|n| matches!(n, Notification::ReservationConflict { .. }))
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(
            conflicts,
            vec![(
                SimTime::ZERO,
                Notification::ReservationConflict {
                    pending: StationId(0),
                    requester: StationId(1),
                    policy: ReservationConflict::DropAll,
                }
            )]
        );
        assert!(times_of(&recorder, "grant-issued").is_empty());
    }

    // Nobody touches the medium before the deferral ends at
    // rts + sifs + cts + sifs + 10 s.
    rt.dispatch_events_until(ms(10_199)).unwrap();
    assert!(times_of(&recorder.borrow(), "frame-sent").is_empty());
    assert!(times_of(&recorder.borrow(), "reservation-requested").len() == 2);

    let (sim, end, _) = rt.finish().unwrap();
    assert_eq!(sim.summary(end).reservations.conflicts, 1);
}

/// Both stations request at 0 s, the arbiter grants one of them.
fn conflict_winner_transmits(conflict: &str, winner: StationId) {
    let (mut rt, recorder) = build(handshake(2, conflict), 1);
    rt.start().unwrap();
    rt.dispatch_events_until(SimTime::from(10.0)).unwrap();

    let loser = StationId(1 - winner.0);
    assert_eq!(rt.app.station(winner).unwrap().state(), MacState::Transmitting);
    assert_eq!(rt.app.station(winner).unwrap().attempts(), 0);
    assert_eq!(rt.app.station(loser).unwrap().state(), MacState::Backoff);
    assert_eq!(rt.app.station(loser).unwrap().attempts(), 1);
    assert!(rt.app.station(loser).unwrap().is_timer_armed(TimerKind::Nav));

    {
        let recorder = recorder.borrow();
        let protocol = recorder
            .filter(|n| {
                matches!(
                    n,
                    Notification::GrantIssued { .. } | Notification::FrameSent { .. }
                )
            })
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(
            protocol,
            vec![
                (
                    ms(100),
                    Notification::GrantIssued {
                        station: winner,
                        duration: Duration::from_secs(10),
                    }
                ),
                (
                    ms(200),
                    Notification::FrameSent {
                        station: winner,
                        bits: 10_000,
                        duration: Duration::from_secs(10),
                    }
                ),
            ]
        );
        assert!(times_of(&recorder, "reservation-timeout").is_empty());
    }

    rt.dispatch_events_until(ms(10_200)).unwrap();
    let (sim, end, _) = rt.finish().unwrap();
    let summary = sim.summary(end);
    assert_eq!(summary.receptions, 1);
    assert_eq!(summary.collisions, 0);
    assert_eq!(summary.reservations.conflicts, 1);
}

#[test]
#[serial]
fn first_request_wins_the_grant() {
    conflict_winner_transmits("first-wins", StationId(0));
}

#[test]
#[serial]
fn last_request_wins_the_grant() {
    conflict_winner_transmits("last-wins", StationId(1));
}

#[test]
#[serial]
fn unanswered_request_times_out() {
    let (mut rt, recorder) = build(handshake(1, "drop-all"), 3);
    // A second request at the arbiter drops the station's own.
    rt.add_event(
        ArbiterEvent::Reservation {
            from: StationId(0),
            duration: Duration::from_secs(10),
        },
        SimTime::ZERO,
    )
    .unwrap();

    rt.start().unwrap();
    rt.dispatch_events_until(SimTime::from(20.0)).unwrap();

    let recorder = recorder.borrow();
    // rts + cts + 2 * 0 m + 5 * sifs
    assert_eq!(times_of(&recorder, "reservation-timeout"), vec![ms(500)]);

    let backoffs = recorder
        .filter(|n| matches!(n, Notification::BackoffScheduled { .. }))
        .map(|(t, n)| (*t, n.clone()))
        .collect::<Vec<_>>();
    assert_eq!(backoffs.len(), 1);
    let (at, Notification::BackoffScheduled { attempts, delay, .. }) = &backoffs[0] else {
        unreachable!()
    };
    let delay = *delay;
    assert_eq!(*at, ms(500));
    assert_eq!(*attempts, 1);
    // [0, 2^3 - 1] slots of one backoff unit
    assert!(delay <= Duration::from_secs(7));
    assert_eq!(delay.as_nanos() % 1_000_000_000, 0);

    let retry = ms(500) + delay;
    assert_eq!(
        times_of(&recorder, "reservation-requested"),
        vec![SimTime::ZERO, retry]
    );
    assert_eq!(times_of(&recorder, "grant-issued"), vec![retry + Duration::from_millis(100)]);
    assert_eq!(times_of(&recorder, "frame-sent"), vec![retry + Duration::from_millis(200)]);
    drop(recorder);

    assert_eq!(rt.app.stations()[0].state(), MacState::Idle);
    assert_eq!(rt.app.stations()[0].attempts(), 0);
    rt.finish().unwrap();
}

#[test]
#[serial]
fn backoff_freezes_while_the_medium_is_busy() {
    let config = co_located(
        "reservation",
        1,
        "reservation: { difs: 1.0, sifs: 0.1, rts: 0.0, cts: 0.0 }\n",
    )
    .tap(|c| {
        c.frame_bits = Distribution::Constant { value: 10_000.0 };
        c.first_arrival = Some(Distribution::Constant { value: 1.0 });
    });

    // Foreign frames: one hiding the arrival, one after a second of
    // countdown past DIFS, one inside the following DIFS gap.
    let busy = [(500, 2_000), (4_000, 4_500), (5_000, 5_250)];

    for seed in 0..64 {
        let (mut rt, recorder) = build(config.clone(), seed);
        for (start, end) in busy {
            let from = StationId(1);
            rt.add_event(
                MacEvent::Station(StationId(0), StationEvent::FrameStart { from }),
                ms(start),
            )
            .unwrap();
            rt.add_event(
                MacEvent::Station(StationId(0), StationEvent::FrameEnd { from }),
                ms(end),
            )
            .unwrap();
        }

        rt.start().unwrap();
        rt.dispatch_events_until(SimTime::from(1.0)).unwrap();
        let drawn = recorder
            .borrow()
            .filter(|n| matches!(n, Notification::BackoffScheduled { .. }))
            .find_map(|(_, n)| match n {
                Notification::BackoffScheduled { delay, .. } => Some(*delay),
                _ => None,
            })
            .unwrap();
        if drawn < Duration::from_secs(2) {
            continue;
        }

        // Counting down from 3 s, frozen at 4 s with one slot consumed.
        rt.dispatch_events_until(ms(4_250)).unwrap();
        assert_eq!(rt.app.stations()[0].state(), MacState::Backoff);
        assert!(!rt.app.stations()[0].is_timer_armed(TimerKind::Access));

        rt.dispatch_events_until(ms(4_750)).unwrap();
        assert!(rt.app.stations()[0].is_timer_armed(TimerKind::Access));

        // The freeze at 5 s falls inside DIFS and consumes nothing, so
        // the countdown restarts at 5.25 s with drawn - 1 s left after
        // another second of DIFS.
        rt.dispatch_events_until(SimTime::from(30.0)).unwrap();
        let request = ms(5_250) + drawn;
        let recorder = recorder.borrow();
        assert_eq!(times_of(&recorder, "reservation-requested"), vec![request]);
        assert_eq!(
            times_of(&recorder, "frame-sent"),
            vec![request + Duration::from_millis(200)]
        );
        drop(recorder);
        rt.finish().unwrap();
        return;
    }
    panic!("no seed drew a backoff of two slots or more");
}

#[test]
#[serial]
fn contention_settles_every_frame() {
    let config = SimConfig::from_yaml(
        r"
policy: reservation
bit_rate: 1000000
slot_time: 0.00002
backoff_unit: 0.00002
max_backoffs: 6
inter_arrival: { kind: exponential, mean: 0.01 }
frame_bits: { kind: uniform, min: 800, max: 12000 }
station_count: 4
stations: [{ x: 0.0, y: 0.0 }, { x: 100.0, y: 0.0 }, { x: 0.0, y: 100.0 }, { x: 100.0, y: 100.0 }]
arbiter: { x: 50.0, y: 50.0 }
reservation: { difs: 0.00005, sifs: 0.00001, rts: 0.00016, cts: 0.00011, conflict: first-wins }
limit: { time: 2.0 }
",
    )
    .unwrap();

    let (rt, recorder) = build(config, 21);
    let (sim, end, _) = rt.run().unwrap();
    let summary = sim.summary(end);

    assert!(summary.receptions > 0);
    assert!(summary.reservations.granted > 0);
    assert!(summary.reservations.granted <= summary.reservations.requested);
    assert_eq!(
        times_of(&recorder.borrow(), "frame-sent").len(),
        summary.stations.iter().map(|s| s.sent).sum::<usize>()
    );
}
