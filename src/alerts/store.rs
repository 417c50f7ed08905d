// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Alert store - owns alert records, dedup per domain and state transitions

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use super::{Alert, AlertDraft, AlertId, AlertState, EvidenceSummary, NotificationStatus, Severity};
use crate::db::Database;
use crate::detection::Domain;
use crate::error::LifecycleError;

#[derive(Default)]
struct StoreInner {
    alerts: BTreeMap<AlertId, Alert>,
    next_id: AlertId,
    open: HashMap<Domain, AlertId>,
    last_resolved: HashMap<Domain, DateTime<Utc>>,
}

/// In-memory alert table with optional write-through persistence.
///
/// Every mutation happens under one lock, so `create` is a
/// compare-and-create keyed by domain: at most one open (ACTIVE or
/// ACKNOWLEDGED) alert exists per domain at any instant.
pub struct AlertStore {
    inner: Mutex<StoreInner>,
    db: Option<Arc<Database>>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                next_id: 1,
                ..Default::default()
            }),
            db: None,
        }
    }

    /// Load alert history from the database and write through to it from
    /// now on.
    pub fn with_database(db: Arc<Database>) -> Result<Self> {
        let mut inner = StoreInner {
            next_id: 1,
            ..Default::default()
        };

        for alert in db.load_alerts()? {
            inner.next_id = inner.next_id.max(alert.id + 1);
            if alert.state.is_open() {
                let newer = inner
                    .open
                    .get(&alert.domain)
                    .map_or(true, |&current| current < alert.id);
                if newer {
                    inner.open.insert(alert.domain, alert.id);
                }
            }
            if let Some(resolved_at) = alert.resolved_at {
                let slot = inner.last_resolved.entry(alert.domain).or_insert(resolved_at);
                if resolved_at > *slot {
                    *slot = resolved_at;
                }
            }
            inner.alerts.insert(alert.id, alert);
        }

        info!(
            "Loaded {} alerts ({} open) from database",
            inner.alerts.len(),
            inner.open.len()
        );

        Ok(Self {
            inner: Mutex::new(inner),
            db: Some(db),
        })
    }

    fn persist(&self, alert: &Alert) {
        if let Some(db) = &self.db {
            if let Err(e) = db.upsert_alert(alert) {
                warn!("Failed to persist alert #{}: {}", alert.id, e);
            }
        }
    }

    /// Create a new ACTIVE alert, refusing if the domain already has an
    /// open one.
    pub fn create(&self, domain: Domain, draft: AlertDraft, now: DateTime<Utc>) -> Result<Alert, LifecycleError> {
        let mut inner = self.inner.lock();
        if let Some(&existing) = inner.open.get(&domain) {
            return Err(LifecycleError::AlreadyOpen(existing));
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let mut evidence = EvidenceSummary::default();
        for item in draft.evidence {
            evidence.push(item);
        }
        let last_evidence_at = evidence.items.iter().map(|i| i.at).max().unwrap_or(now);

        let alert = Alert {
            id,
            domain,
            state: AlertState::Active,
            severity: draft.severity.unwrap_or(Severity::High),
            room: draft.room,
            created_at: now,
            last_evidence_at,
            acknowledged_at: None,
            resolved_at: None,
            evidence,
            snapshot_ref: draft.snapshot_ref,
            notification: NotificationStatus::Pending,
        };

        inner.open.insert(domain, id);
        inner.alerts.insert(id, alert.clone());
        self.persist(&alert);

        info!("{} alert #{} created in {} ({})", domain, id, alert.room, alert.details());
        Ok(alert)
    }

    /// Fold new evidence into an open alert
    pub fn merge(&self, id: AlertId, draft: AlertDraft, now: DateTime<Utc>) -> Result<Alert, LifecycleError> {
        let mut inner = self.inner.lock();
        let alert = inner.alerts.get_mut(&id).ok_or(LifecycleError::NotFound(id))?;
        if !alert.state.is_open() {
            return Err(LifecycleError::InvalidTransition {
                id,
                from: alert.state,
                to: alert.state,
            });
        }

        let latest = draft.evidence.iter().map(|i| i.at).max().unwrap_or(now);
        for item in draft.evidence {
            alert.evidence.push(item);
        }
        if latest > alert.last_evidence_at {
            alert.last_evidence_at = latest;
        }
        if draft.snapshot_ref.is_some() {
            alert.snapshot_ref = draft.snapshot_ref;
        }

        let alert = alert.clone();
        self.persist(&alert);
        Ok(alert)
    }

    pub fn acknowledge(&self, id: AlertId, now: DateTime<Utc>) -> Result<Alert, LifecycleError> {
        self.transition(id, AlertState::Acknowledged, now)
    }

    pub fn resolve(&self, id: AlertId, now: DateTime<Utc>) -> Result<Alert, LifecycleError> {
        self.transition(id, AlertState::Resolved, now)
    }

    fn transition(&self, id: AlertId, to: AlertState, now: DateTime<Utc>) -> Result<Alert, LifecycleError> {
        let mut inner = self.inner.lock();
        let alert = inner.alerts.get_mut(&id).ok_or(LifecycleError::NotFound(id))?;
        let from = alert.state;
        if !from.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition { id, from, to });
        }

        alert.state = to;
        match to {
            AlertState::Acknowledged => alert.acknowledged_at = Some(now),
            AlertState::Resolved => alert.resolved_at = Some(now),
            AlertState::Active => {}
        }
        let alert = alert.clone();

        if to == AlertState::Resolved {
            if inner.open.get(&alert.domain) == Some(&id) {
                inner.open.remove(&alert.domain);
            }
            inner.last_resolved.insert(alert.domain, now);
        }
        self.persist(&alert);

        info!("{} alert #{} {} -> {}", alert.domain, id, from, to);
        Ok(alert)
    }

    /// Record the outcome of a notification attempt on the alert
    pub fn record_delivery(&self, id: AlertId, error: Option<String>, now: DateTime<Utc>) -> Option<Alert> {
        let mut inner = self.inner.lock();
        let alert = inner.alerts.get_mut(&id)?;
        let sent = match &alert.notification {
            NotificationStatus::Pending => 0,
            NotificationStatus::Sent { count, .. } => *count,
            NotificationStatus::Failing { sent, .. } => *sent,
        };
        alert.notification = match error {
            None => NotificationStatus::Sent {
                count: sent + 1,
                last_at: now,
            },
            Some(reason) => {
                let since = match &alert.notification {
                    NotificationStatus::Failing { since, .. } => *since,
                    _ => now,
                };
                NotificationStatus::Failing { reason, since, sent }
            }
        };
        let alert = alert.clone();
        self.persist(&alert);
        Some(alert)
    }

    pub fn get(&self, id: AlertId) -> Option<Alert> {
        self.inner.lock().alerts.get(&id).cloned()
    }

    /// The open alert of a domain, if any
    pub fn open_alert(&self, domain: Domain) -> Option<Alert> {
        let inner = self.inner.lock();
        inner
            .open
            .get(&domain)
            .and_then(|id| inner.alerts.get(id))
            .cloned()
    }

    pub fn last_resolved_at(&self, domain: Domain) -> Option<DateTime<Utc>> {
        self.inner.lock().last_resolved.get(&domain).copied()
    }

    /// Alerts filtered by domain and state, newest first
    pub fn list(&self, domain: Option<Domain>, state: Option<AlertState>) -> Vec<Alert> {
        let inner = self.inner.lock();
        inner
            .alerts
            .values()
            .rev()
            .filter(|a| domain.map_or(true, |d| a.domain == d))
            .filter(|a| state.map_or(true, |s| a.state == s))
            .cloned()
            .collect()
    }

    pub fn active(&self) -> Vec<Alert> {
        self.list(None, Some(AlertState::Active))
    }

    /// ACTIVE alerts whose evidence has not recurred for `idle`
    pub fn stale_active(&self, now: DateTime<Utc>, idle: Duration) -> Vec<AlertId> {
        let inner = self.inner.lock();
        inner
            .alerts
            .values()
            .filter(|a| a.state == AlertState::Active && now - a.last_evidence_at > idle)
            .map(|a| a.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}
