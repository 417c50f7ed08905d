// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Notification module - outbound channel, message text and reminder scheduling

mod message;
mod scheduler;
mod telegram;

pub use message::{compose, test_message};
pub use scheduler::{AttemptOutcome, NotificationJob, NotifierScheduler};
pub use telegram::TelegramChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DeliveryError;

/// First notification for an alert versus a follow-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Initial,
    Reminder,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Initial => "INITIAL",
            MessageKind::Reminder => "REMINDER",
        }
    }

    pub fn parse(raw: &str) -> Option<MessageKind> {
        match raw.trim().to_uppercase().as_str() {
            "INITIAL" => Some(MessageKind::Initial),
            "REMINDER" => Some(MessageKind::Reminder),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External delivery channel
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel name, used in logs and the notification log
    fn name(&self) -> &str;

    /// Whether credentials are present
    fn is_configured(&self) -> bool;

    /// Hand one message to `target`. Implementations should bound their own
    /// IO; the scheduler also wraps every call in a hard timeout.
    async fn send(&self, target: &str, text: &str) -> Result<(), DeliveryError>;
}
