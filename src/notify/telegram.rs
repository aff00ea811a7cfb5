// src/notify/telegram.rs
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;

use super::{Notification, Notifier};

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Posts to a channel through the Bot API `sendMessage` method.
pub struct TelegramNotifier {
    bot_token: String,
    channel_id: String,
    api_url: String,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, channel_id: String) -> Self {
        Self {
            bot_token,
            channel_id,
            api_url: TELEGRAM_API_URL.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, n: &Notification) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_url.trim_end_matches('/'),
            self.bot_token
        );
        let payload = serde_json::json!({
            "chat_id": self.channel_id,
            "text": format!("{}\n\n{}", n.title, n.body),
        });

        let rsp = self
            .client
            .post(url)
            .timeout(Duration::from_secs(15))
            .json(&payload)
            .send()
            .await
            .context("error sending telegram notification")?;

        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            bail!("telegram returned {status}: {body}");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
