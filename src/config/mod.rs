// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Configuration module
//!
//! Values come from a TOML file first, then environment overrides using the
//! deployment's variable names, then [`Config::validate`] before any event
//! is accepted.

use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::detection::Domain;
use crate::error::ConfigError;
use crate::ingress::EventKind;
use crate::nodes::NodeId;

pub const DEFAULT_REMINDER_SCHEDULE: [u64; 4] = [0, 60, 180, 300];

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Fusion windows, streaks and cooldowns
    pub fusion: FusionConfig,

    /// Reminder schedule and notification channel
    pub notifier: NotifierConfig,

    /// Node liveness thresholds
    pub nodes: NodeConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// HTTP server configuration
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "CondoWatch".to_string(),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            fusion: FusionConfig::default(),
            notifier: NotifierConfig::default(),
            nodes: NodeConfig::default(),
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("condowatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparsable values keep the
    /// current setting; notifier intervals are clamped to sane ranges.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fusion = &mut self.fusion;
        env_u64(&lookup, "FIRE_FUSION_WINDOW", &mut fusion.fire_window_secs);
        env_u64(&lookup, "INTRUDER_FUSION_WINDOW", &mut fusion.intruder_window_secs);
        env_u32(&lookup, "FLAME_STREAK", &mut fusion.flame_streak);
        env_u32(&lookup, "SMOKE_STREAK", &mut fusion.smoke_streak);
        env_u32(&lookup, "UNKNOWN_STREAK", &mut fusion.unknown_streak);
        env_u64(&lookup, "STREAK_RESET_SECONDS", &mut fusion.streak_reset_secs);
        env_u64(&lookup, "FIRE_COOLDOWN", &mut fusion.fire_cooldown_secs);
        env_u64(&lookup, "ALERT_COOLDOWN", &mut fusion.intruder_cooldown_secs);
        env_u64(&lookup, "ALERT_AUTO_RESOLVE_SECONDS", &mut fusion.auto_resolve_secs);
        if let Some(raw) = lookup("DOOR_FORCE_THRESHOLD") {
            match raw.trim().parse::<f64>() {
                Ok(v) => fusion.door_force_threshold = v,
                Err(_) => warn!("Ignoring DOOR_FORCE_THRESHOLD={:?}", raw),
            }
        }

        env_u64(&lookup, "NODE_OFFLINE_SECONDS", &mut self.nodes.offline_secs);

        let notifier = &mut self.notifier;
        if let Some(raw) = lookup("ALERT_REMINDER_SCHEDULE") {
            notifier.reminder_schedule = parse_schedule(&raw);
        }
        env_clamped(&lookup, "ALERT_REMINDER_REPEAT_SECONDS", 30, 3600, &mut notifier.repeat_interval_secs);
        env_clamped(&lookup, "ALERT_NOTIFIER_POLL_SECONDS", 2, 120, &mut notifier.poll_interval_secs);
        env_clamped(&lookup, "ALERT_NOTIFY_FAIL_RETRY_SECONDS", 10, 600, &mut notifier.fail_retry_secs);
        env_clamped(&lookup, "TELEGRAM_SEND_TIMEOUT", 3, 30, &mut notifier.send_timeout_secs);
        env_string(&lookup, "TELEGRAM_BOT_TOKEN", &mut notifier.telegram_bot_token);
        env_string(&lookup, "TELEGRAM_CHAT_ID", &mut notifier.telegram_chat_id);
        env_string(&lookup, "PUBLIC_BASE_URL", &mut notifier.public_base_url);

        if let Some(bind) = lookup("CONDOWATCH_BIND").filter(|b| !b.trim().is_empty()) {
            self.server.bind = bind.trim().to_string();
        }
    }

    /// Reject values that would make fusion or scheduling meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.fusion;
        let positive: [(&'static str, u64); 6] = [
            ("fusion.fire_window_secs", f.fire_window_secs),
            ("fusion.intruder_window_secs", f.intruder_window_secs),
            ("fusion.flame_streak", f.flame_streak as u64),
            ("fusion.smoke_streak", f.smoke_streak as u64),
            ("fusion.unknown_streak", f.unknown_streak as u64),
            ("fusion.streak_reset_secs", f.streak_reset_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }
        if !f.door_force_threshold.is_finite() || f.door_force_threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold {
                field: "fusion.door_force_threshold",
                value: f.door_force_threshold,
            });
        }
        if !(1..=Domain::Intruder.channels().len()).contains(&f.intruder_quorum) {
            return Err(ConfigError::InvalidQuorum(f.intruder_quorum));
        }

        let n = &self.notifier;
        if n.reminder_schedule.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        let intervals: [(&'static str, u64); 4] = [
            ("notifier.repeat_interval_secs", n.repeat_interval_secs),
            ("notifier.poll_interval_secs", n.poll_interval_secs),
            ("notifier.fail_retry_secs", n.fail_retry_secs),
            ("notifier.send_timeout_secs", n.send_timeout_secs),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }

        if self.nodes.offline_secs == 0 {
            return Err(ConfigError::NonPositive { field: "nodes.offline_secs" });
        }
        if self.nodes.sweep_secs == 0 {
            return Err(ConfigError::NonPositive { field: "nodes.sweep_secs" });
        }
        for (raw, secs) in &self.nodes.overrides {
            if NodeId::parse(raw).is_none() {
                return Err(ConfigError::UnknownNode(raw.clone()));
            }
            if *secs == 0 {
                return Err(ConfigError::NonPositive { field: "nodes.overrides" });
            }
        }
        Ok(())
    }
}

fn env_u64<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, slot: &mut u64) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<u64>() {
            Ok(v) => *slot = v,
            Err(_) => warn!("Ignoring {}={:?}", key, raw),
        }
    }
}

fn env_u32<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, slot: &mut u32) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<u32>() {
            Ok(v) => *slot = v,
            Err(_) => warn!("Ignoring {}={:?}", key, raw),
        }
    }
}

fn env_clamped<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, min: u64, max: u64, slot: &mut u64) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<i64>() {
            Ok(v) => *slot = v.clamp(min as i64, max as i64) as u64,
            Err(_) => warn!("Ignoring {}={:?}", key, raw),
        }
    }
}

fn env_string<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, slot: &mut Option<String>) {
    if let Some(raw) = lookup(key) {
        let trimmed = raw.trim();
        *slot = if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
    }
}

/// Parse a comma separated list of second offsets.
///
/// Negative and unparsable entries are skipped; the result is sorted and
/// de-duplicated. An empty result falls back to the default schedule.
pub fn parse_schedule(raw: &str) -> Vec<u64> {
    let mut offsets: Vec<u64> = raw
        .split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .map(|v| v as u64)
        .collect();
    offsets.sort_unstable();
    offsets.dedup();
    if offsets.is_empty() {
        DEFAULT_REMINDER_SCHEDULE.to_vec()
    } else {
        offsets
    }
}

/// Fusion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Fire fusion window in seconds
    pub fire_window_secs: u64,

    /// Intrusion fusion window in seconds
    pub intruder_window_secs: u64,

    /// Consecutive flame detections before flame counts as present
    pub flame_streak: u32,

    /// Consecutive smoke readings before smoke counts as present
    pub smoke_streak: u32,

    /// Consecutive unknown-face detections per camera
    pub unknown_streak: u32,

    /// A gap longer than this restarts a streak
    pub streak_reset_secs: u64,

    /// Door-force magnitude (g) that must be exceeded
    pub door_force_threshold: f64,

    /// Distinct intrusion channels required
    pub intruder_quorum: usize,

    /// Seconds after a fire resolution before fire may re-trigger
    pub fire_cooldown_secs: u64,

    /// Seconds after an intrusion resolution before it may re-trigger
    pub intruder_cooldown_secs: u64,

    /// Resolve ACTIVE alerts idle this long; 0 disables
    pub auto_resolve_secs: u64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            fire_window_secs: 120,
            intruder_window_secs: 120,
            flame_streak: 8,
            smoke_streak: 1,
            unknown_streak: 12,
            streak_reset_secs: 10,
            door_force_threshold: 0.5,
            intruder_quorum: 2,
            fire_cooldown_secs: 75,
            intruder_cooldown_secs: 45,
            auto_resolve_secs: 0,
        }
    }
}

impl FusionConfig {
    pub fn window(&self, domain: Domain) -> Duration {
        match domain {
            Domain::Fire => secs(self.fire_window_secs),
            Domain::Intruder => secs(self.intruder_window_secs),
        }
    }

    pub fn cooldown(&self, domain: Domain) -> Duration {
        match domain {
            Domain::Fire => secs(self.fire_cooldown_secs),
            Domain::Intruder => secs(self.intruder_cooldown_secs),
        }
    }

    pub fn streak_reset(&self) -> Duration {
        secs(self.streak_reset_secs)
    }

    /// Consecutive detections needed before an event kind counts as present
    pub fn streak_threshold(&self, kind: EventKind) -> u32 {
        match kind {
            EventKind::FlameDetected => self.flame_streak,
            EventKind::SmokeHigh => self.smoke_streak,
            EventKind::FaceUnknown => self.unknown_streak,
            EventKind::DoorForce | EventKind::FaceKnown => 1,
        }
    }

    pub fn auto_resolve(&self) -> Option<Duration> {
        (self.auto_resolve_secs > 0).then(|| secs(self.auto_resolve_secs))
    }
}

/// Notifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Offsets in seconds from alert creation
    pub reminder_schedule: Vec<u64>,

    /// Interval once the schedule is exhausted
    pub repeat_interval_secs: u64,

    /// Scheduler poll interval
    pub poll_interval_secs: u64,

    /// Retry interval after a failed send
    pub fail_retry_secs: u64,

    /// Hard timeout for one send
    pub send_timeout_secs: u64,

    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    /// Dashboard base URL used for alert links
    pub public_base_url: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            reminder_schedule: DEFAULT_REMINDER_SCHEDULE.to_vec(),
            repeat_interval_secs: 600,
            poll_interval_secs: 5,
            fail_retry_secs: 60,
            send_timeout_secs: 8,
            telegram_bot_token: None,
            telegram_chat_id: None,
            public_base_url: None,
        }
    }
}

/// Node liveness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Default silence before a node is OFFLINE
    pub offline_secs: u64,

    /// Liveness sweep interval
    pub sweep_secs: u64,

    /// Per-node offline thresholds, keyed by node id
    pub overrides: BTreeMap<String, u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            offline_secs: 180,
            sweep_secs: 15,
            overrides: BTreeMap::new(),
        }
    }
}

impl NodeConfig {
    pub fn threshold_for(&self, node: NodeId) -> Option<Duration> {
        self.overrides
            .iter()
            .find(|(raw, _)| NodeId::parse(raw) == Some(node))
            .map(|(_, s)| secs(*s))
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Enable database storage
    pub enabled: bool,

    /// Database path
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./data/condowatch.db"),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(u32::MAX as u64) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fusion.flame_streak, 8);
        assert_eq!(config.fusion.unknown_streak, 12);
        assert_eq!(config.notifier.reminder_schedule, vec![0, 60, 180, 300]);
        assert_eq!(config.nodes.offline_secs, 180);
    }

    #[test]
    fn test_parse_schedule() {
        assert_eq!(parse_schedule("300, 0,60,60,-5,abc,180"), vec![0, 60, 180, 300]);
        assert_eq!(parse_schedule("15"), vec![15]);
        assert_eq!(parse_schedule(" , "), vec![0, 60, 180, 300]);
    }

    #[test]
    fn test_env_overrides_and_clamps() {
        let mut config = Config::default();
        config.apply_env_from(env(&[
            ("FIRE_FUSION_WINDOW", "30"),
            ("FLAME_STREAK", "3"),
            ("FIRE_COOLDOWN", "bogus"),
            ("ALERT_NOTIFIER_POLL_SECONDS", "1"),
            ("ALERT_NOTIFY_FAIL_RETRY_SECONDS", "9999"),
            ("TELEGRAM_SEND_TIMEOUT", "5"),
            ("TELEGRAM_BOT_TOKEN", "  "),
            ("TELEGRAM_CHAT_ID", " 12345 "),
            ("ALERT_REMINDER_SCHEDULE", "0,30"),
            ("DOOR_FORCE_THRESHOLD", "0.8"),
        ]));

        assert_eq!(config.fusion.fire_window_secs, 30);
        assert_eq!(config.fusion.flame_streak, 3);
        assert_eq!(config.fusion.fire_cooldown_secs, 75);
        assert_eq!(config.notifier.poll_interval_secs, 2);
        assert_eq!(config.notifier.fail_retry_secs, 600);
        assert_eq!(config.notifier.send_timeout_secs, 5);
        assert_eq!(config.notifier.telegram_bot_token, None);
        assert_eq!(config.notifier.telegram_chat_id.as_deref(), Some("12345"));
        assert_eq!(config.notifier.reminder_schedule, vec![0, 30]);
        assert_eq!(config.fusion.door_force_threshold, 0.8);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.fusion.fire_window_secs = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive { field: "fusion.fire_window_secs" })
        );

        let mut config = Config::default();
        config.fusion.door_force_threshold = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold { .. })));

        let mut config = Config::default();
        config.fusion.intruder_quorum = 4;
        assert_eq!(config.validate(), Err(ConfigError::InvalidQuorum(4)));

        let mut config = Config::default();
        config.notifier.reminder_schedule.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptySchedule));

        let mut config = Config::default();
        config.nodes.overrides.insert("cam_garage".into(), 60);
        assert_eq!(config.validate(), Err(ConfigError::UnknownNode("cam_garage".into())));
    }

    #[test]
    fn test_node_overrides_accept_aliases() {
        let mut nodes = NodeConfig::default();
        nodes.overrides.insert("door_node".into(), 30);
        assert_eq!(nodes.threshold_for(NodeId::DoorForce), Some(Duration::seconds(30)));
        assert_eq!(nodes.threshold_for(NodeId::CamIndoor), None);
    }

    #[test]
    fn test_toml_round_trip_keeps_partial_sections() {
        let config: Config = toml::from_str("[fusion]\nflame_streak = 4\n").unwrap();
        assert_eq!(config.fusion.flame_streak, 4);
        assert_eq!(config.fusion.fire_window_secs, 120);
        assert_eq!(config.server.bind, "0.0.0.0:5000");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.fusion, created.fusion);
        assert_eq!(loaded.notifier, created.notifier);
    }
}
