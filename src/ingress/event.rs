// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Sensor and vision event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::nodes::{normalize, NodeId};

/// Kind of discrete event a node can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    FaceUnknown,
    FaceKnown,
    SmokeHigh,
    FlameDetected,
    DoorForce,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::FaceUnknown,
        EventKind::FaceKnown,
        EventKind::SmokeHigh,
        EventKind::FlameDetected,
        EventKind::DoorForce,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::FaceUnknown => "FACE_UNKNOWN",
            EventKind::FaceKnown => "FACE_KNOWN",
            EventKind::SmokeHigh => "SMOKE_HIGH",
            EventKind::FlameDetected => "FLAME_DETECTED",
            EventKind::DoorForce => "DOOR_FORCE",
        }
    }

    /// Parse an event name, accepting the legacy producer spellings
    /// (`UNKNOWN`, `AUTHORIZED`, `FLAME_SIGNAL`).
    pub fn parse(raw: &str) -> Option<EventKind> {
        let name = normalize(raw).to_uppercase();
        match name.as_str() {
            "FACE_UNKNOWN" | "UNKNOWN" => Some(EventKind::FaceUnknown),
            "FACE_KNOWN" | "AUTHORIZED" => Some(EventKind::FaceKnown),
            "SMOKE_HIGH" => Some(EventKind::SmokeHigh),
            "FLAME_DETECTED" | "FLAME_SIGNAL" => Some(EventKind::FlameDetected),
            "DOOR_FORCE" => Some(EventKind::DoorForce),
            _ => None,
        }
    }

    /// Whether a numeric magnitude must accompany this kind
    pub fn requires_value(self) -> bool {
        matches!(self, EventKind::DoorForce)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated event, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub node: NodeId,
    pub kind: EventKind,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub source_seq: Option<u64>,
    pub snapshot_ref: Option<String>,
}

impl SensorEvent {
    pub fn new(node: NodeId, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            node,
            kind,
            value: None,
            unit: None,
            timestamp,
            source_seq: None,
            snapshot_ref: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.source_seq = Some(seq);
        self
    }

    pub fn with_snapshot(mut self, snapshot_ref: impl Into<String>) -> Self {
        self.snapshot_ref = Some(snapshot_ref.into());
        self
    }
}

/// JSON body accepted by the HTTP ingress
///
/// ```json
/// { "node": "door_force", "event": "DOOR_FORCE", "value": 0.74, "unit": "g" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngressPayload {
    pub node: String,
    pub event: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub snapshot: Option<String>,
}
