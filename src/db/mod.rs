// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Database module for persistent storage
//!
//! Event log, alert history, notification attempts and settings. Fusion
//! state is never persisted; it is rebuilt from live events.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::alerts::{Alert, AlertId};
use crate::config::DatabaseConfig;
use crate::ingress::SensorEvent;
use crate::notify::MessageKind;

const GUEST_MODE_KEY: &str = "guest_mode";

/// Database manager
pub struct Database {
    conn: Mutex<Connection>,
}

/// Fixed-width UTC timestamp so text comparison orders correctly
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Database {
    /// Open or create database
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let db = Self { conn: Mutex::new(conn) };
        db.create_tables()?;

        info!("Database opened at {:?}", config.path);
        Ok(db)
    }

    /// Throwaway database for tests and diskless runs
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Accepted events, append-only
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                node TEXT NOT NULL,
                kind TEXT NOT NULL,
                value REAL,
                unit TEXT,
                seq INTEGER,
                snapshot TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);

            -- Alert history; data holds the full JSON record
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY,
                domain TEXT NOT NULL,
                state TEXT NOT NULL,
                room TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_alerts_created ON alerts(created_at);

            -- Notification attempts
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                alert_id INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                channel TEXT NOT NULL,
                kind TEXT NOT NULL,
                ok INTEGER NOT NULL,
                error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_alert ON notifications(alert_id);

            -- Settings table
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        )?;

        Ok(())
    }

    /// Append an accepted event to the log
    pub fn append_event(&self, event: &SensorEvent) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO events (timestamp, node, kind, value, unit, seq, snapshot) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                ts(event.timestamp),
                event.node.as_str(),
                event.kind.as_str(),
                event.value,
                event.unit,
                event.source_seq.map(|s| s as i64),
                event.snapshot_ref,
            ],
        )?;
        Ok(())
    }

    /// Insert or update an alert record
    pub fn upsert_alert(&self, alert: &Alert) -> Result<()> {
        let data = serde_json::to_string(alert)?;
        let updated_at = [alert.resolved_at, alert.acknowledged_at, Some(alert.last_evidence_at)]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(alert.created_at);

        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO alerts (id, domain, state, room, created_at, updated_at, data)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               ON CONFLICT(id) DO UPDATE SET
                   state = excluded.state,
                   room = excluded.room,
                   updated_at = excluded.updated_at,
                   data = excluded.data"#,
            params![
                alert.id as i64,
                alert.domain.as_str(),
                alert.state.as_str(),
                alert.room,
                ts(alert.created_at),
                ts(updated_at),
                data,
            ],
        )?;
        Ok(())
    }

    /// Every stored alert, oldest first. Rows that no longer decode are skipped.
    pub fn load_alerts(&self) -> Result<Vec<Alert>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, data FROM alerts ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

        let mut alerts = Vec::new();
        for row in rows {
            let (id, data) = row?;
            match serde_json::from_str::<Alert>(&data) {
                Ok(alert) => alerts.push(alert),
                Err(e) => warn!("Skipping undecodable alert row {}: {}", id, e),
            }
        }
        Ok(alerts)
    }

    /// Record one delivery attempt
    pub fn log_notification(&self, record: &NotificationRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO notifications (alert_id, timestamp, channel, kind, ok, error) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.alert_id as i64,
                ts(record.timestamp),
                record.channel,
                record.kind.as_str(),
                record.ok,
                record.error,
            ],
        )?;
        Ok(())
    }

    /// Delivery attempts for one alert, oldest first
    pub fn notifications_for(&self, alert_id: AlertId) -> Result<Vec<NotificationRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT alert_id, timestamp, channel, kind, ok, error FROM notifications WHERE alert_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![alert_id as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (alert_id, timestamp, channel, kind, ok, error) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)?.with_timezone(&Utc);
            records.push(NotificationRecord {
                alert_id: alert_id as AlertId,
                timestamp,
                channel,
                kind: MessageKind::parse(&kind).unwrap_or(MessageKind::Reminder),
                ok,
                error,
            });
        }
        Ok(records)
    }

    /// Store a setting
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, ts(Utc::now())],
        )?;
        Ok(())
    }

    /// Get a setting
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let result: Result<String, _> =
            conn.query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| row.get(0));

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn guest_mode(&self) -> Result<bool> {
        Ok(matches!(self.get_setting(GUEST_MODE_KEY)?.as_deref(), Some("1")))
    }

    pub fn set_guest_mode(&self, enabled: bool) -> Result<()> {
        self.set_setting(GUEST_MODE_KEY, if enabled { "1" } else { "0" })
    }

    /// Alert, event and notification counts for one UTC day
    pub fn summary_for_date(&self, date: NaiveDate) -> Result<DailySummary> {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = start + chrono::Duration::days(1);
        let (start, end) = (ts(start), ts(end));

        let conn = self.conn.lock();
        let mut summary = DailySummary {
            date,
            ..Default::default()
        };

        let mut stmt = conn.prepare(
            "SELECT domain, state, COUNT(*) FROM alerts WHERE created_at >= ?1 AND created_at < ?2 GROUP BY domain, state",
        )?;
        let mut rows = stmt.query(params![start, end])?;
        while let Some(row) = rows.next()? {
            let domain: String = row.get(0)?;
            let state: String = row.get(1)?;
            let count: i64 = row.get(2)?;
            *summary.alerts_by_domain.entry(domain).or_default() += count as u64;
            *summary.alerts_by_state.entry(state).or_default() += count as u64;
            summary.total_alerts += count as u64;
        }

        let mut stmt = conn.prepare(
            "SELECT kind, COUNT(*) FROM events WHERE timestamp >= ?1 AND timestamp < ?2 GROUP BY kind",
        )?;
        let mut rows = stmt.query(params![start, end])?;
        while let Some(row) = rows.next()? {
            let kind: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            summary.events_by_kind.insert(kind, count as u64);
            summary.total_events += count as u64;
        }

        let (sent, failed): (i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(ok), 0), COALESCE(SUM(1 - ok), 0) FROM notifications WHERE timestamp >= ?1 AND timestamp < ?2",
            params![start, end],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        summary.notifications_sent = sent as u64;
        summary.notifications_failed = failed as u64;

        Ok(summary)
    }

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let conn = self.conn.lock();
        let count = |table: &str| -> Result<usize> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(DatabaseStats {
            event_count: count("events")?,
            alert_count: count("alerts")?,
            notification_count: count("notifications")?,
        })
    }
}

/// One notification attempt as logged
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub alert_id: AlertId,
    pub timestamp: DateTime<Utc>,
    pub channel: String,
    pub kind: MessageKind,
    pub ok: bool,
    pub error: Option<String>,
}

/// Daily roll-up for the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_alerts: u64,
    pub alerts_by_domain: BTreeMap<String, u64>,
    pub alerts_by_state: BTreeMap<String, u64>,
    pub total_events: u64,
    pub events_by_kind: BTreeMap<String, u64>,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub event_count: usize,
    pub alert_count: usize,
    pub notification_count: usize,
}
