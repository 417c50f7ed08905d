// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Event ingress - normalises and validates incoming events
//!
//! No alert logic lives here. Accepted events are handed back to the
//! engine, which updates liveness and forwards them to fusion.

mod event;

pub use event::{EventKind, IngressPayload, SensorEvent};

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::IngressError;
use crate::nodes::NodeId;

const NO_SEQ: u64 = u64::MAX;

/// Validates events and remembers the last sequence number per node
pub struct Ingress {
    last_seq: [AtomicU64; NodeId::COUNT],
}

impl Ingress {
    pub fn new() -> Self {
        Self {
            last_seq: std::array::from_fn(|_| AtomicU64::new(NO_SEQ)),
        }
    }

    /// Map a raw JSON payload onto a validated event stamped at `now`
    pub fn parse(&self, payload: IngressPayload, now: DateTime<Utc>) -> Result<SensorEvent, IngressError> {
        let node = NodeId::parse(&payload.node)
            .ok_or_else(|| IngressError::InvalidNode(payload.node.clone()))?;
        let kind = EventKind::parse(&payload.event).ok_or_else(|| IngressError::InvalidKind {
            node,
            kind: payload.event.clone(),
        })?;

        let event = SensorEvent {
            node,
            kind,
            value: payload.value,
            unit: payload.unit.filter(|u| !u.trim().is_empty()),
            timestamp: now,
            source_seq: payload.seq,
            snapshot_ref: payload.snapshot.filter(|s| !s.trim().is_empty()),
        };
        self.validate(&event)?;
        Ok(event)
    }

    /// Check an already-typed event against its node class
    pub fn validate(&self, event: &SensorEvent) -> Result<(), IngressError> {
        if !event.node.class().allows(event.kind) {
            return Err(IngressError::InvalidKind {
                node: event.node,
                kind: event.kind.to_string(),
            });
        }

        match event.value {
            Some(v) if !v.is_finite() => Err(IngressError::MalformedValue {
                node: event.node,
                kind: event.kind,
                reason: format!("value {} is not finite", v),
            }),
            None if event.kind.requires_value() => Err(IngressError::MalformedValue {
                node: event.node,
                kind: event.kind,
                reason: "magnitude is required".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// True when this event repeats the previous sequence number of its node.
    ///
    /// Events without a sequence number are never duplicates.
    pub fn is_resend(&self, event: &SensorEvent) -> bool {
        match event.source_seq {
            Some(seq) if seq != NO_SEQ => {
                self.last_seq[event.node.index()].swap(seq, Ordering::AcqRel) == seq
            }
            _ => false,
        }
    }
}

impl Default for Ingress {
    fn default() -> Self {
        Self::new()
    }
}
