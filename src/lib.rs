// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! CondoWatch - event fusion and alert lifecycle engine for fire and
//! intrusion detection
//!
//! Cameras and environmental sensors submit discrete events. The engine
//! correlates them per domain inside sliding windows, raises at most one
//! open alert per domain, and drives a reminder schedule until a human
//! acknowledges or resolves the alert.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      CondoWatch Engine                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐   ┌──────────┐   ┌──────────┐   ┌────────────┐  │
//! │  │ Ingress │ → │  Fusion  │ → │  Alert   │ → │  Notifier  │  │
//! │  │         │   │ (fire /  │   │  Store   │   │  Scheduler │  │
//! │  └─────────┘   │ intruder)│   └──────────┘   └────────────┘  │
//! │       ↓        └──────────┘        ↓               ↓         │
//! │  ┌──────────┐                                                │
//! │  │ Liveness │   ┌─────────────────────────────────────────┐  │
//! │  └──────────┘   │               Event Bus                 │  │
//! │                 └─────────────────────────────────────────┘  │
//! │  ┌──────────┐   ┌──────────┐                                 │
//! │  │ Database │   │ HTTP API │                                 │
//! │  └──────────┘   └──────────┘                                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod alerts;
pub mod config;
pub mod core;
pub mod db;
pub mod detection;
pub mod error;
pub mod ingress;
pub mod nodes;
pub mod notify;

#[cfg(feature = "http")]
pub mod api;

// Re-exports for convenience
pub use alerts::{Alert, AlertId, AlertState, AlertStore};
pub use config::Config;
pub use core::{Clock, Engine, EventBus, ManualClock, SystemClock};
pub use db::Database;
pub use detection::{Domain, FusionOutcome};
pub use error::{ConfigError, DeliveryError, IngressError, LifecycleError};
pub use ingress::{EventKind, IngressPayload, SensorEvent};
pub use nodes::{NodeId, NodeStatus};

/// CondoWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CondoWatch name
pub const NAME: &str = "CondoWatch";
