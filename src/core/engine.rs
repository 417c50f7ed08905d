// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Main engine - wires ingress, liveness, fusion and the alert store

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Clock, EventBus, Scheduler, SystemEventKind};
use crate::alerts::{Alert, AlertId, AlertState, AlertStore};
use crate::config::Config;
use crate::db::{DailySummary, Database};
use crate::detection::{Domain, FusionEngine, FusionOutcome};
use crate::error::{ConfigError, IngressError, LifecycleError};
use crate::ingress::{Ingress, IngressPayload, SensorEvent};
use crate::nodes::{LivenessTracker, NodeId, NodeLiveness, NodeStatus, StatusChange};
use crate::notify::{NotificationChannel, NotifierScheduler};

/// Result of an accepted submission
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub event: SensorEvent,
    pub outcome: FusionOutcome,
    /// Same source sequence as the previous event of this node; liveness
    /// was refreshed but fusion did not see it again
    pub duplicate: bool,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    duplicates: AtomicU64,
    alerts_created: AtomicU64,
    alerts_merged: AtomicU64,
    suppressed: AtomicU64,
}

/// Engine counters since start-up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_seconds: i64,
    pub events_accepted: u64,
    pub events_rejected: u64,
    pub events_duplicate: u64,
    pub alerts_created: u64,
    pub alerts_merged: u64,
    pub alerts_suppressed: u64,
    pub open_alerts: usize,
    pub guest_mode: bool,
}

pub struct Engine {
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    bus: Arc<EventBus>,
    liveness: LivenessTracker,
    ingress: Ingress,
    fusion: FusionEngine,
    alerts: Arc<AlertStore>,
    db: Option<Arc<Database>>,
    counters: Counters,
    started_at: DateTime<Utc>,
}

impl Engine {
    /// Engine with an in-memory alert store
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, clock, Arc::new(AlertStore::new()), None))
    }

    /// Engine backed by the database: alert history is restored and guest
    /// mode picks up its persisted value
    pub fn with_database(config: Config, clock: Arc<dyn Clock>, db: Arc<Database>) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(AlertStore::with_database(db.clone())?);
        let engine = Self::build(config, clock, store, Some(db.clone()));

        let guest = db.guest_mode()?;
        engine.fusion.set_guest_mode(guest);
        if guest {
            info!("Guest mode restored: intrusion alerts are silenced");
        }
        Ok(engine)
    }

    fn build(config: Config, clock: Arc<dyn Clock>, alerts: Arc<AlertStore>, db: Option<Arc<Database>>) -> Self {
        let liveness = LivenessTracker::with_thresholds(
            chrono::Duration::seconds(config.nodes.offline_secs.min(u32::MAX as u64) as i64),
            |node| config.nodes.threshold_for(node),
        );
        let fusion = FusionEngine::new(config.fusion.clone(), alerts.clone());
        let started_at = clock.now();

        Self {
            config: Arc::new(config),
            clock,
            bus: Arc::new(EventBus::default()),
            liveness,
            ingress: Ingress::new(),
            fusion,
            alerts,
            db,
            counters: Counters::default(),
            started_at,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn alerts(&self) -> Arc<AlertStore> {
        self.alerts.clone()
    }

    pub fn database(&self) -> Option<Arc<Database>> {
        self.db.clone()
    }

    /// Validate an event, refresh liveness and run it through fusion.
    ///
    /// Rejections never touch fusion state. A rejection that still names a
    /// valid node refreshes that node's liveness.
    pub fn submit(&self, event: SensorEvent) -> Result<Accepted, IngressError> {
        let now = self.clock.now();

        if let Err(e) = self.ingress.validate(&event) {
            self.reject(&e, now);
            return Err(e);
        }
        self.accept(event, now)
    }

    /// Parse a raw ingress payload stamped with the current time
    pub fn submit_payload(&self, payload: IngressPayload) -> Result<Accepted, IngressError> {
        let now = self.clock.now();
        match self.ingress.parse(payload, now) {
            Ok(event) => self.accept(event, now),
            Err(e) => {
                self.reject(&e, now);
                Err(e)
            }
        }
    }

    fn reject(&self, error: &IngressError, now: DateTime<Utc>) {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        if let Some(node) = error.node() {
            self.liveness.touch(node, now);
        }
        debug!("Event rejected: {}", error);
    }

    fn accept(&self, mut event: SensorEvent, now: DateTime<Utc>) -> Result<Accepted, IngressError> {
        self.liveness.touch(event.node, now);

        // evidence is never stamped after the engine clock
        if event.timestamp > now {
            debug!(
                "{} from {} stamped {}s ahead, clamped",
                event.kind,
                event.node,
                (event.timestamp - now).num_seconds()
            );
            event.timestamp = now;
        }

        if self.ingress.is_resend(&event) {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!("Resend of {} from {} ignored", event.kind, event.node);
            return Ok(Accepted {
                event,
                outcome: FusionOutcome::Ignored,
                duplicate: true,
            });
        }

        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        if let Some(db) = &self.db {
            if let Err(e) = db.append_event(&event) {
                warn!("Failed to log event: {}", e);
            }
        }
        self.bus.publish(now, SystemEventKind::EventAccepted(event.clone()));

        let outcome = self.fusion.evaluate(&event, now);
        match &outcome {
            FusionOutcome::Created(alert) => {
                self.counters.alerts_created.fetch_add(1, Ordering::Relaxed);
                self.bus.publish(now, SystemEventKind::AlertRaised(alert.clone()));
            }
            FusionOutcome::Merged(alert) => {
                self.counters.alerts_merged.fetch_add(1, Ordering::Relaxed);
                self.bus.publish(now, SystemEventKind::AlertUpdated(alert.clone()));
            }
            FusionOutcome::Suppressed { .. } => {
                self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            }
            FusionOutcome::Ignored | FusionOutcome::Pending { .. } => {}
        }

        Ok(Accepted {
            event,
            outcome,
            duplicate: false,
        })
    }

    pub fn acknowledge(&self, id: AlertId) -> Result<Alert, LifecycleError> {
        let now = self.clock.now();
        let alert = self.alerts.acknowledge(id, now)?;
        self.bus.publish(now, SystemEventKind::AlertUpdated(alert.clone()));
        Ok(alert)
    }

    pub fn resolve(&self, id: AlertId) -> Result<Alert, LifecycleError> {
        let now = self.clock.now();
        let alert = self.alerts.resolve(id, now)?;
        self.bus.publish(now, SystemEventKind::AlertUpdated(alert.clone()));
        Ok(alert)
    }

    pub fn list_alerts(&self, domain: Option<Domain>, state: Option<AlertState>) -> Vec<Alert> {
        self.alerts.list(domain, state)
    }

    pub fn alert(&self, id: AlertId) -> Option<Alert> {
        self.alerts.get(id)
    }

    pub fn status_of(&self, node: NodeId) -> NodeStatus {
        self.liveness.status_of(node, self.clock.now())
    }

    pub fn nodes(&self) -> Vec<NodeLiveness> {
        self.liveness.snapshot(self.clock.now())
    }

    pub fn guest_mode(&self) -> bool {
        self.fusion.guest_mode()
    }

    /// Toggle guest mode; persisted when a database is attached
    pub fn set_guest_mode(&self, enabled: bool) -> Result<()> {
        if let Some(db) = &self.db {
            db.set_guest_mode(enabled)?;
        }
        self.fusion.set_guest_mode(enabled);
        info!("Guest mode {}", if enabled { "ON" } else { "OFF" });
        Ok(())
    }

    /// Publish node status flips since the last sweep
    pub fn sweep_liveness(&self) -> Vec<StatusChange> {
        let now = self.clock.now();
        let changes = self.liveness.sweep(now);
        for change in &changes {
            match change.status {
                NodeStatus::Offline => warn!("Node {} went OFFLINE", change.node),
                NodeStatus::Online => info!("Node {} is ONLINE", change.node),
            }
            self.bus.publish(
                now,
                SystemEventKind::NodeStatusChanged {
                    node: change.node,
                    status: change.status,
                },
            );
        }
        changes
    }

    /// Resolve ACTIVE alerts whose evidence stopped recurring
    pub fn auto_resolve(&self) -> Vec<Alert> {
        let idle = match self.config.fusion.auto_resolve() {
            Some(idle) => idle,
            None => return Vec::new(),
        };
        let now = self.clock.now();

        let mut resolved = Vec::new();
        for id in self.alerts.stale_active(now, idle) {
            match self.alerts.resolve(id, now) {
                Ok(alert) => {
                    info!("Alert #{} auto-resolved after {}s without evidence", id, idle.num_seconds());
                    self.bus.publish(now, SystemEventKind::AlertUpdated(alert.clone()));
                    resolved.push(alert);
                }
                Err(e) => debug!("Auto-resolve of alert #{} skipped: {}", id, e),
            }
        }
        resolved
    }

    /// Daily roll-up; `None` without a database
    pub fn summary(&self, date: NaiveDate) -> Result<Option<DailySummary>> {
        match &self.db {
            Some(db) => Ok(Some(db.summary_for_date(date)?)),
            None => Ok(None),
        }
    }

    pub fn stats(&self) -> EngineStats {
        let now = self.clock.now();
        EngineStats {
            started_at: Some(self.started_at),
            uptime_seconds: (now - self.started_at).num_seconds().max(0),
            events_accepted: self.counters.accepted.load(Ordering::Relaxed),
            events_rejected: self.counters.rejected.load(Ordering::Relaxed),
            events_duplicate: self.counters.duplicates.load(Ordering::Relaxed),
            alerts_created: self.counters.alerts_created.load(Ordering::Relaxed),
            alerts_merged: self.counters.alerts_merged.load(Ordering::Relaxed),
            alerts_suppressed: self.counters.suppressed.load(Ordering::Relaxed),
            open_alerts: Domain::ALL
                .iter()
                .filter(|d| self.alerts.open_alert(**d).is_some())
                .count(),
            guest_mode: self.guest_mode(),
        }
    }

    /// Reminder scheduler wired to this engine's store, clock, log and bus
    pub fn notifier(&self, channel: Arc<dyn NotificationChannel>) -> NotifierScheduler {
        let mut scheduler =
            NotifierScheduler::new(&self.config.notifier, self.alerts.clone(), channel, self.clock.clone())
                .with_event_bus(self.bus.clone());
        if let Some(db) = &self.db {
            scheduler = scheduler.with_database(db.clone());
        }
        scheduler
    }

    /// Register the periodic liveness and auto-resolve sweeps
    pub async fn register_housekeeping(self: &Arc<Self>, scheduler: &Scheduler) {
        let period = Duration::from_secs(self.config.nodes.sweep_secs.max(1));

        let engine = Arc::clone(self);
        scheduler
            .add_task("liveness-sweep", period, move || {
                engine.sweep_liveness();
            })
            .await;

        if self.config.fusion.auto_resolve().is_some() {
            let engine = Arc::clone(self);
            scheduler
                .add_task("auto-resolve", period, move || {
                    engine.auto_resolve();
                })
                .await;
        }
    }
}
