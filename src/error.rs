// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Error taxonomy shared by ingress, the alert lifecycle, delivery and config

use thiserror::Error;

use crate::alerts::{AlertId, AlertState};
use crate::ingress::EventKind;
use crate::nodes::NodeId;

/// Reasons an incoming event is rejected at ingress.
///
/// Rejections never touch fusion state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngressError {
    #[error("unknown node '{0}'")]
    InvalidNode(String),

    #[error("event '{kind}' is not legal for node {node}")]
    InvalidKind { node: NodeId, kind: String },

    #[error("event {kind} from {node} carries a malformed value: {reason}")]
    MalformedValue {
        node: NodeId,
        kind: EventKind,
        reason: String,
    },
}

impl IngressError {
    /// The node an event came from, when its identity was valid.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            IngressError::InvalidNode(_) => None,
            IngressError::InvalidKind { node, .. } | IngressError::MalformedValue { node, .. } => {
                Some(*node)
            }
        }
    }
}

/// Alert lifecycle errors; the alert is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("alert #{0} not found")]
    NotFound(AlertId),

    #[error("alert #{id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: AlertId,
        from: AlertState,
        to: AlertState,
    },

    #[error("alert #{0} is already open for this domain")]
    AlreadyOpen(AlertId),
}

/// Failure to hand a message to the notification channel.
///
/// Always recoverable: the scheduler retries on a fixed interval.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("channel not configured")]
    NotConfigured,

    #[error("send timed out after {0}s")]
    Timeout(u64),

    #[error("http status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Startup configuration errors. Fatal before any event is accepted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("{field} must be a finite positive number, got {value}")]
    InvalidThreshold { field: &'static str, value: f64 },

    #[error("intruder quorum must be between 1 and 3, got {0}")]
    InvalidQuorum(usize),

    #[error("reminder schedule must contain at least one offset")]
    EmptySchedule,

    #[error("unknown node '{0}' in offline overrides")]
    UnknownNode(String),
}
