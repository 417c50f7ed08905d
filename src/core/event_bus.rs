// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Event bus for inter-component communication

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::alerts::{Alert, AlertId};
use crate::ingress::SensorEvent;
use crate::nodes::{NodeId, NodeStatus};
use crate::notify::MessageKind;

/// Something observable happened inside the engine
#[derive(Debug, Clone, Serialize)]
pub enum SystemEventKind {
    EventAccepted(SensorEvent),
    AlertRaised(Alert),
    AlertUpdated(Alert),
    NodeStatusChanged { node: NodeId, status: NodeStatus },
    NotificationAttempted {
        alert_id: AlertId,
        kind: MessageKind,
        ok: bool,
        error: Option<String>,
    },
}

/// Envelope published on the bus
#[derive(Debug, Clone, Serialize)]
pub struct SystemEvent {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: SystemEventKind,
}

/// Central pub/sub bus. Publishing never blocks and never fails; events
/// published with no subscribers are dropped.
pub struct EventBus {
    tx: broadcast::Sender<SystemEvent>,
    counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            counter: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, timestamp: DateTime<Utc>, kind: SystemEventKind) {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(SystemEvent { id, timestamp, kind });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.tx.subscribe()
    }

    pub fn published(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::EventKind;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let now = Utc::now();

        bus.publish(
            now,
            SystemEventKind::NodeStatusChanged {
                node: NodeId::DoorForce,
                status: NodeStatus::Offline,
            },
        );
        bus.publish(
            now,
            SystemEventKind::EventAccepted(SensorEvent::new(NodeId::SmokeDoor, EventKind::SmokeHigh, now)),
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.id, 0);
        assert!(matches!(first.kind, SystemEventKind::NodeStatusChanged { node: NodeId::DoorForce, .. }));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.id, 1);
        assert_eq!(bus.published(), 2);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.publish(
            Utc::now(),
            SystemEventKind::NodeStatusChanged {
                node: NodeId::CamIndoor,
                status: NodeStatus::Online,
            },
        );
        assert_eq!(bus.published(), 1);
    }
}
