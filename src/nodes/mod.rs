// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Node catalogue - the physical cameras and sensors in the monitored space

mod liveness;

pub use liveness::{LivenessTracker, NodeLiveness, NodeStatus, StatusChange};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ingress::EventKind;

pub const ROOM_LIVING: &str = "Living Room";
pub const ROOM_ENTRANCE: &str = "Door Entrance Area";

/// Stable identifier of a physical node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeId {
    #[serde(rename = "cam_indoor")]
    CamIndoor,
    #[serde(rename = "cam_outdoor")]
    CamOutdoor,
    #[serde(rename = "mq2_living")]
    SmokeLiving,
    #[serde(rename = "mq2_door")]
    SmokeDoor,
    #[serde(rename = "door_force")]
    DoorForce,
}

/// What kind of hardware a node is; decides which events it may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeClass {
    Camera,
    Smoke,
    DoorForce,
}

/// Static description of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeMeta {
    pub id: NodeId,
    pub label: &'static str,
    pub room: &'static str,
    pub class: NodeClass,
}

const ALIASES: &[(&str, NodeId)] = &[
    ("mq2_living_room", NodeId::SmokeLiving),
    ("mq2_livingroom", NodeId::SmokeLiving),
    ("mq2_kitchen", NodeId::SmokeLiving),
    ("mq2_entrance", NodeId::SmokeDoor),
    ("mq2_door_entrance", NodeId::SmokeDoor),
    ("door_node", NodeId::DoorForce),
    ("doorforce", NodeId::DoorForce),
    ("door_force_sensor", NodeId::DoorForce),
    ("cam_inside", NodeId::CamIndoor),
    ("cam_outside", NodeId::CamOutdoor),
];

impl NodeId {
    pub const ALL: [NodeId; 5] = [
        NodeId::CamIndoor,
        NodeId::CamOutdoor,
        NodeId::SmokeLiving,
        NodeId::SmokeDoor,
        NodeId::DoorForce,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn as_str(self) -> &'static str {
        match self {
            NodeId::CamIndoor => "cam_indoor",
            NodeId::CamOutdoor => "cam_outdoor",
            NodeId::SmokeLiving => "mq2_living",
            NodeId::SmokeDoor => "mq2_door",
            NodeId::DoorForce => "door_force",
        }
    }

    /// Dense index, used for per-node slot arrays
    pub fn index(self) -> usize {
        match self {
            NodeId::CamIndoor => 0,
            NodeId::CamOutdoor => 1,
            NodeId::SmokeLiving => 2,
            NodeId::SmokeDoor => 3,
            NodeId::DoorForce => 4,
        }
    }

    /// Resolve a raw node name as sent by producers.
    ///
    /// The name is trimmed and lowercased, spaces and dashes become
    /// underscores and any other punctuation is dropped before the
    /// canonical names and the alias table are consulted.
    pub fn parse(raw: &str) -> Option<NodeId> {
        let normalized = normalize(raw);
        if let Some(id) = Self::ALL.iter().copied().find(|id| id.as_str() == normalized) {
            return Some(id);
        }
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, id)| *id)
    }

    pub fn meta(self) -> NodeMeta {
        let (label, room, class) = match self {
            NodeId::CamIndoor => ("Indoor Camera", ROOM_LIVING, NodeClass::Camera),
            NodeId::CamOutdoor => ("Outdoor Camera", ROOM_ENTRANCE, NodeClass::Camera),
            NodeId::SmokeLiving => ("MQ-2 Smoke Sensor", ROOM_LIVING, NodeClass::Smoke),
            NodeId::SmokeDoor => ("MQ-2 Smoke Sensor", ROOM_ENTRANCE, NodeClass::Smoke),
            NodeId::DoorForce => ("Door-Force Sensor", ROOM_ENTRANCE, NodeClass::DoorForce),
        };
        NodeMeta { id: self, label, room, class }
    }

    pub fn class(self) -> NodeClass {
        self.meta().class
    }

    pub fn room(self) -> &'static str {
        self.meta().room
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NodeClass {
    /// Event kinds this class of node may legally emit
    pub fn legal_kinds(self) -> &'static [EventKind] {
        match self {
            NodeClass::Camera => &[
                EventKind::FaceUnknown,
                EventKind::FaceKnown,
                EventKind::FlameDetected,
            ],
            NodeClass::Smoke => &[EventKind::SmokeHigh],
            NodeClass::DoorForce => &[EventKind::DoorForce],
        }
    }

    pub fn allows(self, kind: EventKind) -> bool {
        self.legal_kinds().contains(&kind)
    }
}

pub(crate) fn normalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' | '-' => Some('_'),
            c if c.is_alphanumeric() || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}
