// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Per-node liveness, derived lazily from the last sighting

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

use super::NodeId;

const NEVER_SEEN: i64 = i64::MIN;

const REPORTED_NONE: u8 = 0;
const REPORTED_ONLINE: u8 = 1;
const REPORTED_OFFLINE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    Online,
    Offline,
}

/// Point-in-time view of one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeLiveness {
    pub node: NodeId,
    pub label: &'static str,
    pub room: &'static str,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub status: NodeStatus,
}

/// A status flip observed by [`LivenessTracker::sweep`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub node: NodeId,
    pub status: NodeStatus,
}

struct NodeSlot {
    last_seen_ms: AtomicI64,
    threshold: Duration,
    reported: AtomicU8,
}

/// Tracks when each node was last heard from.
///
/// Every node owns its own atomic slot, so concurrent producers never
/// contend. Status is a pure function of elapsed time and is recomputed on
/// every read; [`sweep`](Self::sweep) only exists to surface transitions.
pub struct LivenessTracker {
    slots: [NodeSlot; NodeId::COUNT],
}

impl LivenessTracker {
    pub fn new(default_threshold: Duration) -> Self {
        Self::with_thresholds(default_threshold, |_| None)
    }

    /// Build with per-node threshold overrides
    pub fn with_thresholds<F>(default_threshold: Duration, overrides: F) -> Self
    where
        F: Fn(NodeId) -> Option<Duration>,
    {
        let slots = NodeId::ALL.map(|node| NodeSlot {
            last_seen_ms: AtomicI64::new(NEVER_SEEN),
            threshold: overrides(node).unwrap_or(default_threshold),
            reported: AtomicU8::new(REPORTED_NONE),
        });
        Self { slots }
    }

    fn slot(&self, node: NodeId) -> &NodeSlot {
        &self.slots[node.index()]
    }

    /// Record a sighting. Out-of-order sightings never move time backwards.
    pub fn touch(&self, node: NodeId, at: DateTime<Utc>) {
        self.slot(node)
            .last_seen_ms
            .fetch_max(at.timestamp_millis(), Ordering::AcqRel);
    }

    pub fn last_seen(&self, node: NodeId) -> Option<DateTime<Utc>> {
        match self.slot(node).last_seen_ms.load(Ordering::Acquire) {
            NEVER_SEEN => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    pub fn threshold(&self, node: NodeId) -> Duration {
        self.slot(node).threshold
    }

    /// OFFLINE iff the node has been silent for longer than its threshold.
    /// A node that was never seen is OFFLINE.
    pub fn status_of(&self, node: NodeId, now: DateTime<Utc>) -> NodeStatus {
        match self.last_seen(node) {
            Some(seen) if now - seen <= self.threshold(node) => NodeStatus::Online,
            _ => NodeStatus::Offline,
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Vec<NodeLiveness> {
        NodeId::ALL
            .iter()
            .map(|&node| {
                let meta = node.meta();
                NodeLiveness {
                    node,
                    label: meta.label,
                    room: meta.room,
                    last_seen_at: self.last_seen(node),
                    status: self.status_of(node, now),
                }
            })
            .collect()
    }

    /// Report status flips since the previous sweep.
    ///
    /// A node that has never been seen does not produce an OFFLINE change on
    /// its own; it first has to come online.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<StatusChange> {
        let mut changes = Vec::new();
        for node in NodeId::ALL {
            let status = self.status_of(node, now);
            let code = match status {
                NodeStatus::Online => REPORTED_ONLINE,
                NodeStatus::Offline => REPORTED_OFFLINE,
            };
            let previous = self.slot(node).reported.swap(code, Ordering::AcqRel);
            if previous == code || (previous == REPORTED_NONE && code == REPORTED_OFFLINE) {
                continue;
            }
            changes.push(StatusChange { node, status });
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_status_follows_threshold() {
        let tracker = LivenessTracker::new(Duration::seconds(30));
        assert_eq!(tracker.status_of(NodeId::DoorForce, t(0)), NodeStatus::Offline);

        tracker.touch(NodeId::DoorForce, t(0));
        assert_eq!(tracker.status_of(NodeId::DoorForce, t(30)), NodeStatus::Online);
        assert_eq!(tracker.status_of(NodeId::DoorForce, t(31)), NodeStatus::Offline);
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let tracker = LivenessTracker::new(Duration::seconds(30));
        tracker.touch(NodeId::CamOutdoor, t(100));
        tracker.touch(NodeId::CamOutdoor, t(50));
        assert_eq!(tracker.last_seen(NodeId::CamOutdoor), Some(t(100)));
    }

    #[test]
    fn test_per_node_override() {
        let tracker = LivenessTracker::with_thresholds(Duration::seconds(180), |node| {
            (node == NodeId::CamIndoor).then(|| Duration::seconds(10))
        });
        tracker.touch(NodeId::CamIndoor, t(0));
        tracker.touch(NodeId::SmokeDoor, t(0));
        assert_eq!(tracker.status_of(NodeId::CamIndoor, t(11)), NodeStatus::Offline);
        assert_eq!(tracker.status_of(NodeId::SmokeDoor, t(11)), NodeStatus::Online);
    }

    #[test]
    fn test_sweep_reports_transitions_once() {
        let tracker = LivenessTracker::new(Duration::seconds(30));
        assert!(tracker.sweep(t(0)).is_empty());

        tracker.touch(NodeId::SmokeLiving, t(0));
        let changes = tracker.sweep(t(1));
        assert_eq!(
            changes,
            vec![StatusChange { node: NodeId::SmokeLiving, status: NodeStatus::Online }]
        );
        assert!(tracker.sweep(t(2)).is_empty());

        let changes = tracker.sweep(t(45));
        assert_eq!(
            changes,
            vec![StatusChange { node: NodeId::SmokeLiving, status: NodeStatus::Offline }]
        );
        assert!(tracker.sweep(t(46)).is_empty());
    }
}
