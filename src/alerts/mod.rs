// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Alert records and their lifecycle state machine

mod store;

pub use store::AlertStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::detection::{Channel, Domain, EvidenceMarker};

pub type AlertId = u64;

/// Evidence items kept per alert; older entries are dropped first
const MAX_EVIDENCE_ITEMS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertState {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertState {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertState::Active => "ACTIVE",
            AlertState::Acknowledged => "ACKNOWLEDGED",
            AlertState::Resolved => "RESOLVED",
        }
    }

    pub fn parse(raw: &str) -> Option<AlertState> {
        match raw.trim().to_uppercase().as_str() {
            "ACTIVE" => Some(AlertState::Active),
            "ACKNOWLEDGED" | "ACK" => Some(AlertState::Acknowledged),
            "RESOLVED" => Some(AlertState::Resolved),
            _ => None,
        }
    }

    /// ACTIVE -> ACKNOWLEDGED, ACTIVE -> RESOLVED, ACKNOWLEDGED -> RESOLVED.
    /// RESOLVED is terminal.
    pub fn can_transition_to(self, next: AlertState) -> bool {
        matches!(
            (self, next),
            (AlertState::Active, AlertState::Acknowledged)
                | (AlertState::Active, AlertState::Resolved)
                | (AlertState::Acknowledged, AlertState::Resolved)
        )
    }

    /// Open alerts absorb new evidence instead of spawning a duplicate
    pub fn is_open(self) -> bool {
        !matches!(self, AlertState::Resolved)
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

/// Outbound notification state, surfaced so a failing channel is visible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent { count: u32, last_at: DateTime<Utc> },
    Failing { reason: String, since: DateTime<Utc>, sent: u32 },
}

impl Default for NotificationStatus {
    fn default() -> Self {
        NotificationStatus::Pending
    }
}

/// One contributing sub-signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub channel: Channel,
    pub node: crate::nodes::NodeId,
    pub at: DateTime<Utc>,
    pub value: Option<f64>,
}

impl From<&EvidenceMarker> for EvidenceItem {
    fn from(marker: &EvidenceMarker) -> Self {
        Self {
            channel: marker.channel,
            node: marker.node,
            at: marker.at,
            value: marker.value,
        }
    }
}

/// Which sub-signals contributed to an alert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub channels: BTreeSet<Channel>,
    pub items: Vec<EvidenceItem>,
}

impl EvidenceSummary {
    pub fn push(&mut self, item: EvidenceItem) {
        self.channels.insert(item.channel);
        self.items.push(item);
        if self.items.len() > MAX_EVIDENCE_ITEMS {
            let excess = self.items.len() - MAX_EVIDENCE_ITEMS;
            self.items.drain(0..excess);
        }
    }

    /// Human-readable summary, e.g. "Evidence: outdoor unknown, door-force"
    pub fn describe(&self) -> String {
        let parts: Vec<&str> = self.channels.iter().map(|c| c.label()).collect();
        format!("Evidence: {}", parts.join(", "))
    }
}

/// What fusion hands the store when it creates or extends an alert
#[derive(Debug, Clone, Default)]
pub struct AlertDraft {
    pub room: String,
    pub severity: Option<Severity>,
    pub evidence: Vec<EvidenceItem>,
    pub snapshot_ref: Option<String>,
}

/// The durable alert record. Never deleted; RESOLVED alerts are history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub domain: Domain,
    pub state: AlertState,
    pub severity: Severity,
    pub room: String,
    pub created_at: DateTime<Utc>,
    pub last_evidence_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub evidence: EvidenceSummary,
    pub snapshot_ref: Option<String>,
    #[serde(default)]
    pub notification: NotificationStatus,
}

impl Alert {
    pub fn details(&self) -> String {
        self.evidence.describe()
    }
}
