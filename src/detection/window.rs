// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Time-bounded evidence buffer for one fusion domain

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Channel;
use crate::nodes::NodeId;

/// A channel was confirmed present at `at`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMarker {
    pub channel: Channel,
    pub node: NodeId,
    pub at: DateTime<Utc>,
    pub value: Option<f64>,
    pub snapshot_ref: Option<String>,
}

/// Time-ordered buffer of presence markers.
///
/// After [`purge`](Self::purge) every marker satisfies
/// `now - marker.at <= window`. Markers leave only by age. Each
/// `(channel, node)` pair keeps just its latest marker, which bounds the
/// buffer by the number of pairs however chatty a node is.
#[derive(Debug, Clone)]
pub struct EvidenceWindow {
    markers: Vec<EvidenceMarker>,
    window: Duration,
}

impl EvidenceWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            markers: Vec::new(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Drop every marker older than the window
    pub fn purge(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        self.markers.retain(|m| now - m.at <= window);
    }

    /// Record a marker, replacing an older one from the same channel and
    /// node. Markers already outside the window relative to `now` are
    /// refused; an out-of-order marker older than the held one is absorbed.
    pub fn insert(&mut self, marker: EvidenceMarker, now: DateTime<Utc>) -> bool {
        if now - marker.at > self.window {
            return false;
        }
        let held = self
            .markers
            .iter()
            .position(|m| m.channel == marker.channel && m.node == marker.node);
        match held {
            Some(i) if self.markers[i].at > marker.at => {}
            Some(i) => self.markers[i] = marker,
            None => self.markers.push(marker),
        }
        true
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.markers.iter().any(|m| m.channel == channel)
    }

    /// Distinct channels currently present
    pub fn channels(&self) -> BTreeSet<Channel> {
        self.markers.iter().map(|m| m.channel).collect()
    }

    /// Most recent marker for a channel
    pub fn latest(&self, channel: Channel) -> Option<&EvidenceMarker> {
        self.markers
            .iter()
            .filter(|m| m.channel == channel)
            .max_by_key(|m| m.at)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }
}
