// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Fusion engine - per-domain correlation of streak-confirmed evidence
//!
//! Fire needs flame AND smoke inside the fire window. Intrusion needs a
//! quorum of distinct channels (outdoor unknown face, indoor unknown face,
//! door force) inside the intrusion window.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Channel, Domain, EvidenceMarker, EvidenceWindow, StreakTable};
use crate::alerts::{Alert, AlertDraft, AlertStore, EvidenceItem, Severity};
use crate::config::FusionConfig;
use crate::ingress::{EventKind, SensorEvent};
use crate::nodes::{NodeId, ROOM_ENTRANCE, ROOM_LIVING};

/// Why a satisfied rule did not raise or extend an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The domain resolved an alert less than its cooldown ago
    Cooldown { remaining_secs: i64 },
    /// Guest mode silences the intrusion domain
    GuestMode,
}

/// Result of evaluating one event
#[derive(Debug, Clone, PartialEq)]
pub enum FusionOutcome {
    /// The event feeds no channel, or fell below its magnitude threshold
    Ignored,
    /// Evidence was recorded but the domain rule is not satisfied
    Pending { domain: Domain, channels: BTreeSet<Channel> },
    Created(Alert),
    Merged(Alert),
    Suppressed { domain: Domain, reason: SuppressReason },
}

impl FusionOutcome {
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            FusionOutcome::Created(alert) | FusionOutcome::Merged(alert) => Some(alert),
            _ => None,
        }
    }
}

/// Mutable state owned by one domain and guarded by its critical section
struct DomainState {
    window: EvidenceWindow,
    streaks: StreakTable,
}

pub struct FusionEngine {
    config: FusionConfig,
    fire: Mutex<DomainState>,
    intruder: Mutex<DomainState>,
    store: Arc<AlertStore>,
    guest_mode: AtomicBool,
}

impl FusionEngine {
    pub fn new(config: FusionConfig, store: Arc<AlertStore>) -> Self {
        let state = |domain: Domain| {
            Mutex::new(DomainState {
                window: EvidenceWindow::new(config.window(domain)),
                streaks: StreakTable::new(),
            })
        };

        Self {
            fire: state(Domain::Fire),
            intruder: state(Domain::Intruder),
            config,
            store,
            guest_mode: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn set_guest_mode(&self, enabled: bool) {
        self.guest_mode.store(enabled, Ordering::Release);
    }

    pub fn guest_mode(&self) -> bool {
        self.guest_mode.load(Ordering::Acquire)
    }

    fn state(&self, domain: Domain) -> &Mutex<DomainState> {
        match domain {
            Domain::Fire => &self.fire,
            Domain::Intruder => &self.intruder,
        }
    }

    /// Channels currently present in a domain's window
    pub fn present_channels(&self, domain: Domain, now: DateTime<Utc>) -> BTreeSet<Channel> {
        let mut state = self.state(domain).lock();
        state.window.purge(now);
        state.window.channels()
    }

    /// Current streak length for a node and kind
    pub fn streak(&self, node: NodeId, kind: EventKind) -> u32 {
        let domain = match Channel::for_event(node, kind) {
            Some(channel) => channel.domain(),
            None => Domain::Intruder,
        };
        self.state(domain).lock().streaks.get(node, kind)
    }

    /// Run one accepted event through its domain.
    ///
    /// Purge, streak update, marker insertion, rule evaluation and alert
    /// creation all happen under the domain lock, so two concurrent events
    /// can never both observe "no open alert" and both create one.
    pub fn evaluate(&self, event: &SensorEvent, now: DateTime<Utc>) -> FusionOutcome {
        if event.kind == EventKind::FaceKnown {
            let mut state = self.intruder.lock();
            state.streaks.reset(event.node, EventKind::FaceUnknown);
            debug!("Known face on {}, unknown streak cleared", event.node);
            return FusionOutcome::Ignored;
        }

        let channel = match Channel::for_event(event.node, event.kind) {
            Some(channel) => channel,
            None => return FusionOutcome::Ignored,
        };

        if channel == Channel::DoorForce {
            let magnitude = event.value.unwrap_or(0.0);
            if magnitude <= self.config.door_force_threshold {
                debug!(
                    "Door force {:.2} at or below threshold {:.2}",
                    magnitude, self.config.door_force_threshold
                );
                return FusionOutcome::Ignored;
            }
        }

        let domain = channel.domain();
        let mut state = self.state(domain).lock();
        state.window.purge(now);

        let count = state
            .streaks
            .record(event.node, event.kind, event.timestamp, self.config.streak_reset());
        let threshold = self.config.streak_threshold(event.kind);
        if count < threshold {
            debug!("{} streak on {} at {}/{}", event.kind, event.node, count, threshold);
            return FusionOutcome::Pending {
                domain,
                channels: state.window.channels(),
            };
        }

        let marker = EvidenceMarker {
            channel,
            node: event.node,
            at: event.timestamp,
            value: event.value,
            snapshot_ref: event.snapshot_ref.clone(),
        };
        if !state.window.insert(marker.clone(), now) {
            debug!("Stale {} marker from {} dropped", channel, event.node);
            return FusionOutcome::Pending {
                domain,
                channels: state.window.channels(),
            };
        }

        let channels = state.window.channels();
        if !self.rule_satisfied(domain, &channels) {
            return FusionOutcome::Pending { domain, channels };
        }

        if domain == Domain::Intruder && self.guest_mode() {
            debug!("Intrusion rule met while guest mode is on");
            return FusionOutcome::Suppressed {
                domain,
                reason: SuppressReason::GuestMode,
            };
        }

        if let Some(open) = self.store.open_alert(domain) {
            let draft = AlertDraft {
                room: open.room.clone(),
                severity: None,
                evidence: vec![EvidenceItem::from(&marker)],
                snapshot_ref: marker.snapshot_ref.clone(),
            };
            match self.store.merge(open.id, draft, now) {
                Ok(alert) => {
                    debug!("{} evidence merged into alert #{}", channel, alert.id);
                    return FusionOutcome::Merged(alert);
                }
                // resolved between lookup and merge; fall through to the cooldown gate
                Err(e) => debug!("Merge into alert #{} skipped: {}", open.id, e),
            }
        }

        if let Some(resolved_at) = self.store.last_resolved_at(domain) {
            let cooldown = self.config.cooldown(domain);
            let elapsed = now - resolved_at;
            if elapsed < cooldown {
                let remaining_secs = (cooldown - elapsed).num_seconds();
                info!("{} rule met but cooling down ({}s left)", domain, remaining_secs);
                return FusionOutcome::Suppressed {
                    domain,
                    reason: SuppressReason::Cooldown { remaining_secs },
                };
            }
        }

        let draft = self.draft(domain, &state.window);
        match self.store.create(domain, draft, now) {
            Ok(alert) => {
                state.streaks.reset_all();
                FusionOutcome::Created(alert)
            }
            Err(e) => {
                warn!("{} alert creation refused: {}", domain, e);
                FusionOutcome::Pending { domain, channels }
            }
        }
    }

    fn rule_satisfied(&self, domain: Domain, channels: &BTreeSet<Channel>) -> bool {
        match domain {
            Domain::Fire => channels.contains(&Channel::Flame) && channels.contains(&Channel::Smoke),
            Domain::Intruder => {
                let present = Domain::Intruder
                    .channels()
                    .iter()
                    .filter(|c| channels.contains(c))
                    .count();
                present >= self.config.intruder_quorum
            }
        }
    }

    /// Build a new alert from the latest marker of every present channel
    fn draft(&self, domain: Domain, window: &EvidenceWindow) -> AlertDraft {
        let latest: Vec<&EvidenceMarker> = domain
            .channels()
            .iter()
            .filter_map(|&c| window.latest(c))
            .collect();

        let room = match domain {
            Domain::Fire => window
                .latest(Channel::Flame)
                .or_else(|| window.latest(Channel::Smoke))
                .map_or(ROOM_LIVING, |m| m.node.room()),
            Domain::Intruder => {
                if window.contains(Channel::OutdoorUnknown) || window.contains(Channel::DoorForce) {
                    ROOM_ENTRANCE
                } else {
                    ROOM_LIVING
                }
            }
        };

        let snapshot_ref = latest
            .iter()
            .filter(|m| m.snapshot_ref.is_some())
            .max_by_key(|m| m.at)
            .and_then(|m| m.snapshot_ref.clone());

        let mut evidence: Vec<EvidenceItem> = latest.iter().map(|m| EvidenceItem::from(*m)).collect();
        evidence.sort_by_key(|item| item.at);

        AlertDraft {
            room: room.to_string(),
            severity: Some(Severity::High),
            evidence,
            snapshot_ref,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn engine(config: FusionConfig) -> (FusionEngine, Arc<AlertStore>) {
        let store = Arc::new(AlertStore::new());
        (FusionEngine::new(config, store.clone()), store)
    }

    fn config() -> FusionConfig {
        FusionConfig {
            fire_window_secs: 10,
            intruder_window_secs: 30,
            flame_streak: 3,
            unknown_streak: 2,
            ..FusionConfig::default()
        }
    }

    fn ev(node: NodeId, kind: EventKind, at: i64) -> SensorEvent {
        SensorEvent::new(node, kind, t(at))
    }

    #[test]
    fn test_fire_needs_flame_and_smoke() {
        let (fusion, store) = engine(config());
        for s in 0..3 {
            let out = fusion.evaluate(&ev(NodeId::CamIndoor, EventKind::FlameDetected, s), t(s));
            assert!(matches!(out, FusionOutcome::Pending { .. }));
        }
        let out = fusion.evaluate(&ev(NodeId::SmokeLiving, EventKind::SmokeHigh, 3), t(3));
        let alert = out.alert().expect("fire alert");
        assert_eq!(alert.domain, Domain::Fire);
        assert_eq!(alert.room, ROOM_LIVING);
        assert_eq!(alert.created_at, t(3));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_flame_alone_never_fires() {
        let (fusion, store) = engine(config());
        for s in 0..10 {
            fusion.evaluate(&ev(NodeId::CamIndoor, EventKind::FlameDetected, s), t(s));
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_smoke_outside_window_does_not_fire() {
        let (fusion, store) = engine(config());
        for s in 0..3 {
            fusion.evaluate(&ev(NodeId::CamIndoor, EventKind::FlameDetected, s), t(s));
        }
        fusion.evaluate(&ev(NodeId::SmokeDoor, EventKind::SmokeHigh, 20), t(20));
        assert!(store.is_empty());
    }

    #[test]
    fn test_intruder_quorum() {
        let (fusion, store) = engine(config());
        fusion.evaluate(&ev(NodeId::CamOutdoor, EventKind::FaceUnknown, 0), t(0));
        fusion.evaluate(&ev(NodeId::CamOutdoor, EventKind::FaceUnknown, 1), t(1));
        assert!(store.is_empty());

        let door = ev(NodeId::DoorForce, EventKind::DoorForce, 5).with_value(0.74);
        let alert = fusion.evaluate(&door, t(5)).alert().cloned().expect("intruder alert");
        assert_eq!(alert.domain, Domain::Intruder);
        assert_eq!(alert.room, ROOM_ENTRANCE);
        assert_eq!(alert.details(), "Evidence: outdoor unknown, door-force");
    }

    #[test]
    fn test_single_intruder_channel_never_fires() {
        let (fusion, store) = engine(config());
        for s in 0..5 {
            let door = ev(NodeId::DoorForce, EventKind::DoorForce, s).with_value(0.9);
            fusion.evaluate(&door, t(s));
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_weak_door_force_is_ignored() {
        let (fusion, _) = engine(config());
        let door = ev(NodeId::DoorForce, EventKind::DoorForce, 0).with_value(0.5);
        assert_eq!(fusion.evaluate(&door, t(0)), FusionOutcome::Ignored);
        assert!(fusion.present_channels(Domain::Intruder, t(0)).is_empty());
    }

    #[test]
    fn test_known_face_resets_unknown_streak() {
        let (fusion, store) = engine(config());
        fusion.evaluate(&ev(NodeId::CamIndoor, EventKind::FaceUnknown, 0), t(0));
        assert_eq!(fusion.streak(NodeId::CamIndoor, EventKind::FaceUnknown), 1);
        fusion.evaluate(&ev(NodeId::CamIndoor, EventKind::FaceKnown, 1), t(1));
        assert_eq!(fusion.streak(NodeId::CamIndoor, EventKind::FaceUnknown), 0);

        fusion.evaluate(&ev(NodeId::CamIndoor, EventKind::FaceUnknown, 2), t(2));
        let door = ev(NodeId::DoorForce, EventKind::DoorForce, 3).with_value(0.8);
        fusion.evaluate(&door, t(3));
        assert!(store.is_empty());
    }

    #[test]
    fn test_open_alert_absorbs_new_evidence() {
        let (fusion, store) = engine(config());
        fusion.evaluate(&ev(NodeId::CamOutdoor, EventKind::FaceUnknown, 0), t(0));
        fusion.evaluate(&ev(NodeId::CamOutdoor, EventKind::FaceUnknown, 1), t(1));
        let door = ev(NodeId::DoorForce, EventKind::DoorForce, 2).with_value(0.8);
        let created = fusion.evaluate(&door, t(2)).alert().cloned().unwrap();

        let again = ev(NodeId::DoorForce, EventKind::DoorForce, 8).with_value(0.9);
        match fusion.evaluate(&again, t(8)) {
            FusionOutcome::Merged(alert) => {
                assert_eq!(alert.id, created.id);
                assert_eq!(alert.last_evidence_at, t(8));
            }
            other => panic!("expected merge, got {:?}", other),
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cooldown_after_resolution() {
        let (fusion, store) = engine(FusionConfig {
            intruder_cooldown_secs: 45,
            ..config()
        });
        fusion.evaluate(&ev(NodeId::CamOutdoor, EventKind::FaceUnknown, 0), t(0));
        fusion.evaluate(&ev(NodeId::CamOutdoor, EventKind::FaceUnknown, 1), t(1));
        let door = ev(NodeId::DoorForce, EventKind::DoorForce, 2).with_value(0.8);
        let alert = fusion.evaluate(&door, t(2)).alert().cloned().unwrap();
        store.resolve(alert.id, t(3)).unwrap();

        // outdoor marker still inside the window, door force re-arrives
        let door = ev(NodeId::DoorForce, EventKind::DoorForce, 10).with_value(0.8);
        assert!(matches!(
            fusion.evaluate(&door, t(10)),
            FusionOutcome::Suppressed {
                reason: SuppressReason::Cooldown { .. },
                ..
            }
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_guest_mode_silences_intrusion_only() {
        let (fusion, store) = engine(config());
        fusion.set_guest_mode(true);
        fusion.evaluate(&ev(NodeId::CamOutdoor, EventKind::FaceUnknown, 0), t(0));
        fusion.evaluate(&ev(NodeId::CamOutdoor, EventKind::FaceUnknown, 1), t(1));
        let door = ev(NodeId::DoorForce, EventKind::DoorForce, 2).with_value(0.8);
        assert_eq!(
            fusion.evaluate(&door, t(2)),
            FusionOutcome::Suppressed {
                domain: Domain::Intruder,
                reason: SuppressReason::GuestMode,
            }
        );

        for s in 3..6 {
            fusion.evaluate(&ev(NodeId::CamIndoor, EventKind::FlameDetected, s), t(s));
        }
        let out = fusion.evaluate(&ev(NodeId::SmokeDoor, EventKind::SmokeHigh, 6), t(6));
        // room follows the flame camera, not the smoke sensor
        assert_eq!(out.alert().map(|a| a.room.as_str()), Some(ROOM_LIVING));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_outdoor_flame_is_ignored() {
        let (fusion, store) = engine(FusionConfig {
            flame_streak: 1,
            ..config()
        });
        let out = fusion.evaluate(&ev(NodeId::CamOutdoor, EventKind::FlameDetected, 0), t(0));
        assert_eq!(out, FusionOutcome::Ignored);
        fusion.evaluate(&ev(NodeId::SmokeDoor, EventKind::SmokeHigh, 1), t(1));
        assert!(fusion.present_channels(Domain::Fire, t(1)).contains(&Channel::Smoke));
        assert!(!fusion.present_channels(Domain::Fire, t(1)).contains(&Channel::Flame));
        assert!(store.is_empty());
    }

    #[test]
    fn test_streaks_reset_after_alert() {
        let (fusion, _) = engine(config());
        for s in 0..3 {
            fusion.evaluate(&ev(NodeId::CamIndoor, EventKind::FlameDetected, s), t(s));
        }
        fusion.evaluate(&ev(NodeId::SmokeLiving, EventKind::SmokeHigh, 3), t(3));
        assert_eq!(fusion.streak(NodeId::CamIndoor, EventKind::FlameDetected), 0);
    }

    #[test]
    fn test_snapshot_follows_latest_evidence() {
        let (fusion, _) = engine(config());
        for s in 0..3 {
            let e = ev(NodeId::CamIndoor, EventKind::FlameDetected, s).with_snapshot(format!("snap-{}.jpg", s));
            fusion.evaluate(&e, t(s));
        }
        let out = fusion.evaluate(&ev(NodeId::SmokeLiving, EventKind::SmokeHigh, 3), t(3));
        assert_eq!(out.alert().and_then(|a| a.snapshot_ref.as_deref()), Some("snap-2.jpg"));
    }
}
