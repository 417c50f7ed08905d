//! Detection module - evidence windows, streaks and domain fusion

mod fusion;
mod streak;
mod window;

pub use fusion::{FusionEngine, FusionOutcome, SuppressReason};
pub use streak::{Streak, StreakTable};
pub use window::{EvidenceMarker, EvidenceWindow};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ingress::EventKind;
use crate::nodes::NodeId;

/// Correlation domain; each has its own window, streaks and alert slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Domain {
    Fire,
    Intruder,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Fire, Domain::Intruder];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Fire => "FIRE",
            Domain::Intruder => "INTRUDER",
        }
    }

    pub fn parse(raw: &str) -> Option<Domain> {
        match raw.trim().to_uppercase().as_str() {
            "FIRE" => Some(Domain::Fire),
            "INTRUDER" | "INTRUSION" => Some(Domain::Intruder),
            _ => None,
        }
    }

    /// The channels whose presence the domain rule counts
    pub fn channels(self) -> &'static [Channel] {
        match self {
            Domain::Fire => &[Channel::Flame, Channel::Smoke],
            Domain::Intruder => &[Channel::OutdoorUnknown, Channel::IndoorUnknown, Channel::DoorForce],
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An independent evidence channel feeding one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Flame,
    Smoke,
    OutdoorUnknown,
    IndoorUnknown,
    DoorForce,
}

impl Channel {
    /// Which channel, if any, an event feeds
    pub fn for_event(node: NodeId, kind: EventKind) -> Option<Channel> {
        match (node, kind) {
            (NodeId::CamIndoor, EventKind::FlameDetected) => Some(Channel::Flame),
            (_, EventKind::SmokeHigh) => Some(Channel::Smoke),
            (NodeId::CamOutdoor, EventKind::FaceUnknown) => Some(Channel::OutdoorUnknown),
            (NodeId::CamIndoor, EventKind::FaceUnknown) => Some(Channel::IndoorUnknown),
            (_, EventKind::DoorForce) => Some(Channel::DoorForce),
            _ => None,
        }
    }

    pub fn domain(self) -> Domain {
        match self {
            Channel::Flame | Channel::Smoke => Domain::Fire,
            Channel::OutdoorUnknown | Channel::IndoorUnknown | Channel::DoorForce => Domain::Intruder,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Channel::Flame => "flame",
            Channel::Smoke => "smoke",
            Channel::OutdoorUnknown => "outdoor unknown",
            Channel::IndoorUnknown => "indoor unknown",
            Channel::DoorForce => "door-force",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_mapping() {
        assert_eq!(
            Channel::for_event(NodeId::CamOutdoor, EventKind::FaceUnknown),
            Some(Channel::OutdoorUnknown)
        );
        assert_eq!(
            Channel::for_event(NodeId::CamIndoor, EventKind::FaceUnknown),
            Some(Channel::IndoorUnknown)
        );
        assert_eq!(Channel::for_event(NodeId::CamIndoor, EventKind::FaceKnown), None);
        assert_eq!(
            Channel::for_event(NodeId::CamIndoor, EventKind::FlameDetected),
            Some(Channel::Flame)
        );
        // only the indoor camera watches for flame
        assert_eq!(Channel::for_event(NodeId::CamOutdoor, EventKind::FlameDetected), None);
        assert_eq!(
            Channel::for_event(NodeId::SmokeDoor, EventKind::SmokeHigh),
            Some(Channel::Smoke)
        );
        assert_eq!(Channel::Smoke.domain(), Domain::Fire);
        assert_eq!(Channel::DoorForce.domain(), Domain::Intruder);
    }

    #[test]
    fn test_domain_parse() {
        assert_eq!(Domain::parse("fire"), Some(Domain::Fire));
        assert_eq!(Domain::parse(" Intruder "), Some(Domain::Intruder));
        assert_eq!(Domain::parse("flood"), None);
    }
}
