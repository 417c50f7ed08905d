// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Reminder scheduler
//!
//! One cooperative loop polls at a fixed interval. Each ACTIVE alert owns a
//! job with a next fire time; due jobs come off a min-heap of
//! `(next_fire_at, alert_id)`. A successful send advances the schedule, a
//! failed one only re-arms the retry timer.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{compose, MessageKind, NotificationChannel};
use crate::alerts::{Alert, AlertId, AlertState, AlertStore, NotificationStatus};
use crate::config::NotifierConfig;
use crate::core::{Clock, EventBus, SystemEventKind};
use crate::db::{Database, NotificationRecord};
use crate::error::DeliveryError;

/// Result of the most recent delivery attempt of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    NotAttempted,
    Sent,
    Failed(String),
}

/// Delivery plan for one ACTIVE alert
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub alert_id: AlertId,
    pub created_at: DateTime<Utc>,
    pub next_fire_at: DateTime<Utc>,
    pub remaining_schedule: VecDeque<u64>,
    pub repeat_interval: Duration,
    pub last_attempt_outcome: AttemptOutcome,
    pub sent_count: u32,
}

impl NotificationJob {
    /// Plan for an alert, skipping offsets already delivered before a restart
    pub fn for_alert(alert: &Alert, schedule: &[u64], repeat_interval: Duration) -> Self {
        let mut remaining: VecDeque<u64> = schedule.iter().copied().collect();
        let (sent_count, last_sent) = match &alert.notification {
            NotificationStatus::Pending => (0, None),
            NotificationStatus::Sent { count, last_at } => (*count, Some(*last_at)),
            NotificationStatus::Failing { sent, .. } => (*sent, None),
        };
        for _ in 0..sent_count {
            remaining.pop_front();
        }

        let next_fire_at = match remaining.pop_front() {
            Some(offset) => alert.created_at + offset_secs(offset),
            None => last_sent.unwrap_or(alert.created_at) + repeat_interval,
        };

        Self {
            alert_id: alert.id,
            created_at: alert.created_at,
            next_fire_at,
            remaining_schedule: remaining,
            repeat_interval,
            last_attempt_outcome: AttemptOutcome::NotAttempted,
            sent_count,
        }
    }

    /// Initial text until one send has succeeded
    pub fn message_kind(&self) -> MessageKind {
        if self.sent_count == 0 {
            MessageKind::Initial
        } else {
            MessageKind::Reminder
        }
    }

    fn on_success(&mut self, now: DateTime<Utc>) {
        self.sent_count += 1;
        self.last_attempt_outcome = AttemptOutcome::Sent;
        self.next_fire_at = match self.remaining_schedule.pop_front() {
            Some(offset) => self.created_at + offset_secs(offset),
            None => now + self.repeat_interval,
        };
    }

    fn on_failure(&mut self, now: DateTime<Utc>, retry: Duration, reason: String) {
        self.last_attempt_outcome = AttemptOutcome::Failed(reason);
        self.next_fire_at = now + retry;
    }
}

fn offset_secs(offset: u64) -> Duration {
    Duration::seconds(offset.min(u32::MAX as u64) as i64)
}

pub struct NotifierScheduler {
    store: Arc<AlertStore>,
    channel: Arc<dyn NotificationChannel>,
    clock: Arc<dyn Clock>,
    target: Option<String>,
    schedule: Vec<u64>,
    repeat_interval: Duration,
    fail_retry: Duration,
    poll_interval: std::time::Duration,
    send_timeout: std::time::Duration,
    public_base_url: Option<String>,
    db: Option<Arc<Database>>,
    bus: Option<Arc<EventBus>>,
    jobs: HashMap<AlertId, NotificationJob>,
    queue: BinaryHeap<Reverse<(DateTime<Utc>, AlertId)>>,
}

impl NotifierScheduler {
    pub fn new(
        config: &NotifierConfig,
        store: Arc<AlertStore>,
        channel: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut schedule = config.reminder_schedule.clone();
        schedule.sort_unstable();
        schedule.dedup();

        Self {
            store,
            channel,
            clock,
            target: config.telegram_chat_id.clone(),
            schedule,
            repeat_interval: offset_secs(config.repeat_interval_secs),
            fail_retry: offset_secs(config.fail_retry_secs),
            poll_interval: std::time::Duration::from_secs(config.poll_interval_secs.max(1)),
            send_timeout: std::time::Duration::from_secs(config.send_timeout_secs.max(1)),
            public_base_url: config.public_base_url.clone(),
            db: None,
            bus: None,
            jobs: HashMap::new(),
            queue: BinaryHeap::new(),
        }
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Channel credentials and a target are both present
    pub fn is_enabled(&self) -> bool {
        self.channel.is_configured() && self.target.as_deref().map_or(false, |t| !t.trim().is_empty())
    }

    pub fn job(&self, alert_id: AlertId) -> Option<&NotificationJob> {
        self.jobs.get(&alert_id)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Create jobs for new ACTIVE alerts and drop jobs whose alert left ACTIVE
    fn sync_jobs(&mut self) {
        let active = self.store.active();
        let ids: HashSet<AlertId> = active.iter().map(|a| a.id).collect();

        self.jobs.retain(|id, job| {
            let keep = ids.contains(id);
            if !keep {
                debug!("Notification job for alert #{} halted after {} sends", id, job.sent_count);
            }
            keep
        });

        for alert in active {
            if self.jobs.contains_key(&alert.id) {
                continue;
            }
            let job = NotificationJob::for_alert(&alert, &self.schedule, self.repeat_interval);
            self.queue.push(Reverse((job.next_fire_at, job.alert_id)));
            self.jobs.insert(alert.id, job);
        }
    }

    /// Pop every job whose fire time has passed; stale heap entries are skipped
    fn take_due(&mut self, now: DateTime<Utc>) -> Vec<AlertId> {
        let mut due = Vec::new();
        while let Some(Reverse((at, id))) = self.queue.peek().copied() {
            if at > now {
                break;
            }
            self.queue.pop();
            if self.jobs.get(&id).map_or(false, |job| job.next_fire_at == at) && !due.contains(&id) {
                due.push(id);
            }
        }
        due
    }

    /// One poll: sync jobs with the alert store, then attempt each due job once
    pub async fn tick(&mut self) {
        if !self.is_enabled() {
            return;
        }

        self.sync_jobs();
        let now = self.clock.now();

        for id in self.take_due(now) {
            // acknowledged or resolved since the sync
            let alert = match self.store.get(id) {
                Some(alert) if alert.state == AlertState::Active => alert,
                _ => {
                    self.jobs.remove(&id);
                    continue;
                }
            };
            self.attempt(&alert).await;
        }
    }

    async fn attempt(&mut self, alert: &Alert) {
        let kind = match self.jobs.get(&alert.id) {
            Some(job) => job.message_kind(),
            None => return,
        };
        let text = compose(alert, kind, self.public_base_url.as_deref());
        let target = self.target.clone().unwrap_or_default();

        let result = match tokio::time::timeout(self.send_timeout, self.channel.send(&target, &text)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.send_timeout.as_secs())),
        };

        let now = self.clock.now();
        let error = result.err().map(|e| e.to_string());

        if let Some(job) = self.jobs.get_mut(&alert.id) {
            match &error {
                None => {
                    job.on_success(now);
                    info!("Notification {} sent for alert #{} ({} total)", kind, alert.id, job.sent_count);
                }
                Some(reason) => {
                    job.on_failure(now, self.fail_retry, reason.clone());
                    warn!("Notification send failed for alert #{}: {}", alert.id, reason);
                }
            }
            self.queue.push(Reverse((job.next_fire_at, job.alert_id)));
        }

        if let Some(db) = &self.db {
            let record = NotificationRecord {
                alert_id: alert.id,
                timestamp: now,
                channel: self.channel.name().to_string(),
                kind,
                ok: error.is_none(),
                error: error.clone(),
            };
            if let Err(e) = db.log_notification(&record) {
                warn!("Failed to log notification for alert #{}: {}", alert.id, e);
            }
        }

        self.store.record_delivery(alert.id, error.clone(), now);

        if let Some(bus) = &self.bus {
            bus.publish(
                now,
                SystemEventKind::NotificationAttempted {
                    alert_id: alert.id,
                    kind,
                    ok: error.is_none(),
                    error,
                },
            );
        }
    }

    /// Poll until shutdown. An in-flight send finishes or times out first.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        if self.is_enabled() {
            info!(
                "Notifier started via {} with schedule={:?} repeat={}s",
                self.channel.name(),
                self.schedule,
                self.repeat_interval.num_seconds()
            );
        } else {
            warn!("Notifier is disabled (missing {} credentials or chat target)", self.channel.name());
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    info!("Notifier shutting down with {} open jobs", self.jobs.len());
                    break;
                }
            }
        }
    }
}
