// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Consecutive-detection counters used to suppress single-sample noise

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::ingress::EventKind;
use crate::nodes::NodeId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streak {
    pub count: u32,
    pub last_at: Option<DateTime<Utc>>,
}

impl Streak {
    /// Count one more qualifying detection. The streak restarts from one
    /// when the gap since the previous detection exceeds `reset_after`.
    pub fn record(&mut self, at: DateTime<Utc>, reset_after: Duration) -> u32 {
        if let Some(last) = self.last_at {
            if at - last > reset_after {
                self.count = 0;
            }
        }
        self.count = self.count.saturating_add(1);
        self.last_at = Some(match self.last_at {
            Some(last) if last > at => last,
            _ => at,
        });
        self.count
    }

    pub fn reset(&mut self) {
        *self = Streak::default();
    }
}

/// Streaks keyed by (node, kind)
#[derive(Debug, Default)]
pub struct StreakTable {
    streaks: HashMap<(NodeId, EventKind), Streak>,
}

impl StreakTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, node: NodeId, kind: EventKind, at: DateTime<Utc>, reset_after: Duration) -> u32 {
        self.streaks
            .entry((node, kind))
            .or_default()
            .record(at, reset_after)
    }

    pub fn get(&self, node: NodeId, kind: EventKind) -> u32 {
        self.streaks.get(&(node, kind)).map_or(0, |s| s.count)
    }

    pub fn reset(&mut self, node: NodeId, kind: EventKind) {
        if let Some(streak) = self.streaks.get_mut(&(node, kind)) {
            streak.reset();
        }
    }

    pub fn reset_all(&mut self) {
        self.streaks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_streak_counts_consecutive() {
        let mut streak = Streak::default();
        let reset = Duration::seconds(5);
        assert_eq!(streak.record(t(0), reset), 1);
        assert_eq!(streak.record(t(1), reset), 2);
        assert_eq!(streak.record(t(6), reset), 3);
    }

    #[test]
    fn test_streak_resets_after_gap() {
        let mut streak = Streak::default();
        let reset = Duration::seconds(5);
        streak.record(t(0), reset);
        streak.record(t(1), reset);
        assert_eq!(streak.record(t(7), reset), 1);
    }

    #[test]
    fn test_table_is_keyed_by_node_and_kind() {
        let mut table = StreakTable::new();
        let reset = Duration::seconds(5);
        table.record(NodeId::CamOutdoor, EventKind::FaceUnknown, t(0), reset);
        table.record(NodeId::CamOutdoor, EventKind::FaceUnknown, t(1), reset);
        table.record(NodeId::CamIndoor, EventKind::FaceUnknown, t(1), reset);

        assert_eq!(table.get(NodeId::CamOutdoor, EventKind::FaceUnknown), 2);
        assert_eq!(table.get(NodeId::CamIndoor, EventKind::FaceUnknown), 1);

        table.reset(NodeId::CamOutdoor, EventKind::FaceUnknown);
        assert_eq!(table.get(NodeId::CamOutdoor, EventKind::FaceUnknown), 0);
    }
}
