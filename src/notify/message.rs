// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

use super::MessageKind;
use crate::alerts::Alert;

const HEADER: &str = "Condo Monitoring System";

fn alert_link(base: Option<&str>, id: u64) -> Option<String> {
    let base = base.map(str::trim).filter(|b| !b.is_empty())?;
    Some(format!("{}/alert/{}", base.trim_end_matches('/'), id))
}

/// Plain-text alert message for the notification channel
pub fn compose(alert: &Alert, kind: MessageKind, public_base_url: Option<&str>) -> String {
    let title = match kind {
        MessageKind::Initial => "New Alert",
        MessageKind::Reminder => "Reminder: Alert Still Active",
    };
    let room = if alert.room.trim().is_empty() { "-" } else { alert.room.as_str() };

    let mut lines = vec![
        HEADER.to_string(),
        title.to_string(),
        format!("Alert ID: #{}", alert.id),
        format!("Type: {}", alert.domain),
        format!("Area: {}", room),
        format!("Level: {}", alert.severity.label()),
        format!("Status: {}", alert.state),
        format!("Time (UTC): {}", alert.created_at.format("%Y-%m-%d %H:%M:%S")),
    ];
    if !alert.evidence.channels.is_empty() {
        lines.push(format!("Notes: {}", alert.details()));
    }
    if let Some(link) = alert_link(public_base_url, alert.id) {
        lines.push(format!("Open Alert: {}", link));
    }
    lines.join("\n")
}

/// Connectivity check message
pub fn test_message(public_base_url: Option<&str>) -> String {
    let mut text = format!("{}\nTelegram connection test is successful.", HEADER);
    if let Some(base) = public_base_url.map(str::trim).filter(|b| !b.is_empty()) {
        text.push_str(&format!("\nDashboard: {}/dashboard", base.trim_end_matches('/')));
    }
    text
}
