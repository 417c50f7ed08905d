// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! End-to-end fusion scenarios driven through the engine with a manual clock

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::thread;

use condowatch::{
    AlertState, Config, Domain, Engine, EventKind, FusionOutcome, ManualClock, NodeId, SensorEvent,
};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
}

fn setup(tune: impl FnOnce(&mut Config)) -> (Engine, Arc<ManualClock>) {
    let mut config = Config::default();
    tune(&mut config);
    let clock = Arc::new(ManualClock::new(t(0)));
    (Engine::new(config, clock.clone()).unwrap(), clock)
}

fn submit(engine: &Engine, clock: &ManualClock, at: i64, event: SensorEvent) -> FusionOutcome {
    clock.set(t(at));
    engine.submit(event).unwrap().outcome
}

fn flame(at: i64) -> SensorEvent {
    SensorEvent::new(NodeId::CamIndoor, EventKind::FlameDetected, t(at))
}

fn smoke(at: i64) -> SensorEvent {
    SensorEvent::new(NodeId::SmokeLiving, EventKind::SmokeHigh, t(at)).with_value(640.0)
}

fn outdoor_unknown(at: i64) -> SensorEvent {
    SensorEvent::new(NodeId::CamOutdoor, EventKind::FaceUnknown, t(at))
}

fn door(at: i64, g: f64) -> SensorEvent {
    SensorEvent::new(NodeId::DoorForce, EventKind::DoorForce, t(at))
        .with_value(g)
        .with_unit("g")
}

#[test]
fn flame_streak_then_smoke_raises_one_fire_alert() {
    let (engine, clock) = setup(|c| {
        c.fusion.flame_streak = 3;
        c.fusion.fire_window_secs = 10;
    });

    for s in 0..3 {
        assert!(submit(&engine, &clock, s, flame(s)).alert().is_none());
    }
    let outcome = submit(&engine, &clock, 3, smoke(3));
    let alert = outcome.alert().expect("fire alert at t=3");
    assert_eq!(alert.domain, Domain::Fire);
    assert_eq!(alert.created_at, t(3));
    assert_eq!(engine.list_alerts(Some(Domain::Fire), None).len(), 1);
}

#[test]
fn flame_burst_alone_raises_nothing() {
    let (engine, clock) = setup(|c| {
        c.fusion.flame_streak = 3;
        c.fusion.fire_window_secs = 10;
    });
    for s in 0..3 {
        submit(&engine, &clock, s, flame(s));
    }
    clock.advance_secs(30);
    assert!(engine.list_alerts(None, None).is_empty());
}

#[test]
fn smoke_after_flame_marker_expired_raises_nothing() {
    let (engine, clock) = setup(|c| {
        c.fusion.flame_streak = 3;
        c.fusion.fire_window_secs = 10;
    });
    for s in 0..3 {
        submit(&engine, &clock, s, flame(s));
    }
    assert!(submit(&engine, &clock, 13, smoke(13)).alert().is_none());
}

#[test]
fn outdoor_face_plus_door_force_raises_intruder_alert() {
    let (engine, clock) = setup(|c| {
        c.fusion.unknown_streak = 3;
        c.fusion.intruder_window_secs = 30;
        c.fusion.door_force_threshold = 0.5;
    });

    // streak completes at t=0
    for s in -2..=0 {
        submit(&engine, &clock, s, outdoor_unknown(s));
    }
    let outcome = submit(&engine, &clock, 5, door(5, 0.74));
    let alert = outcome.alert().expect("intruder alert at t=5");
    assert_eq!(alert.domain, Domain::Intruder);
    assert_eq!(alert.created_at, t(5));
    assert_eq!(alert.room, "Door Entrance Area");
    assert_eq!(alert.details(), "Evidence: outdoor unknown, door-force");
}

#[test]
fn door_force_alone_raises_nothing() {
    let (engine, clock) = setup(|c| c.fusion.intruder_window_secs = 30);
    for s in 0..5 {
        submit(&engine, &clock, s * 3, door(s * 3, 0.9));
    }
    assert!(engine.list_alerts(Some(Domain::Intruder), None).is_empty());
}

#[test]
fn both_face_channels_meet_quorum_without_door() {
    let (engine, clock) = setup(|c| c.fusion.unknown_streak = 2);
    submit(&engine, &clock, 0, outdoor_unknown(0));
    submit(&engine, &clock, 1, outdoor_unknown(1));
    submit(
        &engine,
        &clock,
        2,
        SensorEvent::new(NodeId::CamIndoor, EventKind::FaceUnknown, t(2)),
    );
    let outcome = submit(
        &engine,
        &clock,
        3,
        SensorEvent::new(NodeId::CamIndoor, EventKind::FaceUnknown, t(3)),
    );
    assert_eq!(outcome.alert().map(|a| a.domain), Some(Domain::Intruder));
}

#[test]
fn cooldown_blocks_retrigger_until_elapsed() {
    let (engine, clock) = setup(|c| {
        c.fusion.flame_streak = 1;
        c.fusion.fire_window_secs = 120;
        c.fusion.fire_cooldown_secs = 75;
    });

    submit(&engine, &clock, 0, flame(0));
    let first = submit(&engine, &clock, 1, smoke(1)).alert().cloned().unwrap();
    clock.set(t(10));
    engine.resolve(first.id).unwrap();

    // stale markers are still inside the window
    let outcome = submit(&engine, &clock, 40, smoke(40));
    assert!(matches!(outcome, FusionOutcome::Suppressed { .. }));
    assert_eq!(engine.list_alerts(Some(Domain::Fire), None).len(), 1);

    // smoke from t=40 is still windowed, so the flame alone completes the rule
    let second = match submit(&engine, &clock, 86, flame(86)) {
        FusionOutcome::Created(alert) => alert,
        other => panic!("expected a fresh alert, got {:?}", other),
    };
    assert_ne!(second.id, first.id);
    assert!(matches!(submit(&engine, &clock, 87, smoke(87)), FusionOutcome::Merged(_)));
    assert_eq!(engine.list_alerts(Some(Domain::Fire), Some(AlertState::Active)).len(), 1);
}

#[test]
fn lone_smoke_reading_outlasts_a_flame_flood() {
    let (engine, clock) = setup(|c| {
        c.fusion.flame_streak = 1;
        c.fusion.fire_window_secs = 120;
        c.fusion.fire_cooldown_secs = 75;
    });

    submit(&engine, &clock, 0, flame(0));
    let first = submit(&engine, &clock, 1, smoke(1)).alert().cloned().unwrap();
    clock.set(t(10));
    engine.resolve(first.id).unwrap();

    submit(&engine, &clock, 40, smoke(40));

    // indoor camera at 10 fps from t=41 until the cooldown ends at t=85
    let mut raised = None;
    for tenth in 410..=900 {
        let at = t(0) + chrono::Duration::milliseconds(tenth * 100);
        clock.set(at);
        let event = SensorEvent::new(NodeId::CamIndoor, EventKind::FlameDetected, at);
        if let FusionOutcome::Created(alert) = engine.submit(event).unwrap().outcome {
            raised = Some(alert);
            break;
        }
    }

    let alert = raised.expect("smoke at t=40 still pairs with flame once the cooldown ends");
    assert_eq!(alert.created_at, t(85));
    assert_ne!(alert.id, first.id);
}

#[test]
fn outdoor_camera_flame_never_feeds_fire() {
    let (engine, clock) = setup(|c| c.fusion.flame_streak = 1);
    let outcome = submit(
        &engine,
        &clock,
        0,
        SensorEvent::new(NodeId::CamOutdoor, EventKind::FlameDetected, t(0)),
    );
    assert_eq!(outcome, FusionOutcome::Ignored);

    let outcome = submit(
        &engine,
        &clock,
        1,
        SensorEvent::new(NodeId::SmokeDoor, EventKind::SmokeHigh, t(1)),
    );
    assert!(outcome.alert().is_none());
    assert!(engine.list_alerts(Some(Domain::Fire), None).is_empty());
}

#[test]
fn acknowledged_alert_absorbs_fresh_evidence() {
    let (engine, clock) = setup(|c| c.fusion.flame_streak = 1);
    submit(&engine, &clock, 0, flame(0));
    let alert = submit(&engine, &clock, 1, smoke(1)).alert().cloned().unwrap();
    engine.acknowledge(alert.id).unwrap();

    match submit(&engine, &clock, 20, smoke(20)) {
        FusionOutcome::Merged(merged) => {
            assert_eq!(merged.id, alert.id);
            assert_eq!(merged.state, AlertState::Acknowledged);
            assert_eq!(merged.last_evidence_at, t(20));
        }
        other => panic!("expected merge, got {:?}", other),
    }
    assert_eq!(engine.list_alerts(None, None).len(), 1);
}

#[test]
fn concurrent_producers_never_duplicate_an_alert() {
    let (engine, _clock) = setup(|c| {
        c.fusion.flame_streak = 1;
        c.fusion.unknown_streak = 1;
    });
    let engine = Arc::new(engine);

    let producers: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..50 {
                    let event = match i % 4 {
                        0 => SensorEvent::new(NodeId::CamIndoor, EventKind::FlameDetected, t(0)),
                        1 => SensorEvent::new(NodeId::SmokeDoor, EventKind::SmokeHigh, t(0)),
                        2 => SensorEvent::new(NodeId::CamOutdoor, EventKind::FaceUnknown, t(0)),
                        _ => SensorEvent::new(NodeId::DoorForce, EventKind::DoorForce, t(0)).with_value(0.9),
                    };
                    engine.submit(event).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    for domain in Domain::ALL {
        let open = engine
            .list_alerts(Some(domain), None)
            .into_iter()
            .filter(|a| a.state.is_open())
            .count();
        assert_eq!(open, 1, "{} should have exactly one open alert", domain);
    }
    assert_eq!(engine.stats().alerts_created, 2);
}
