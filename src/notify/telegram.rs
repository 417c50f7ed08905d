// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Telegram Bot API channel

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::NotificationChannel;
use crate::config::NotifierConfig;
use crate::error::DeliveryError;

const API_BASE: &str = "https://api.telegram.org";

pub struct TelegramChannel {
    client: reqwest::Client,
    token: Option<String>,
    api_base: String,
    timeout: Duration,
}

impl TelegramChannel {
    pub fn new(token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            token: token.filter(|t| !t.trim().is_empty()),
            api_base: API_BASE.to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &NotifierConfig) -> Self {
        Self::new(
            config.telegram_bot_token.clone(),
            Duration::from_secs(config.send_timeout_secs),
        )
    }

    /// Point the channel at another Bot API host
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, token: &str) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, token)
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn send(&self, target: &str, text: &str) -> Result<(), DeliveryError> {
        let token = self.token.as_deref().ok_or(DeliveryError::NotConfigured)?;
        if target.trim().is_empty() {
            return Err(DeliveryError::NotConfigured);
        }

        let form = [
            ("chat_id", target.trim()),
            ("text", text),
            ("disable_web_page_preview", "true"),
        ];

        let response = self
            .client
            .post(self.endpoint(token))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout.as_secs())
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }

        debug!("Telegram message delivered to chat {}", target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_is_unconfigured() {
        let channel = TelegramChannel::new(Some("   ".into()), Duration::from_secs(3));
        assert!(!channel.is_configured());

        let channel = TelegramChannel::new(Some("123:abc".into()), Duration::from_secs(3));
        assert!(channel.is_configured());
        assert_eq!(
            channel.endpoint("123:abc"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_send_fails_fast() {
        let channel = TelegramChannel::new(None, Duration::from_secs(3));
        assert_eq!(channel.send("42", "hello").await, Err(DeliveryError::NotConfigured));

        let channel = TelegramChannel::new(Some("123:abc".into()), Duration::from_secs(3));
        assert_eq!(channel.send(" ", "hello").await, Err(DeliveryError::NotConfigured));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let channel = TelegramChannel::new(Some("123:abc".into()), Duration::from_secs(3))
            .with_api_base("http://127.0.0.1:1");
        let err = channel.send("42", "hello").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_) | DeliveryError::Timeout(_)));
    }
}
