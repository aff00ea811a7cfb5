// src/notify/pushover.rs
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;

use super::{Notification, Notifier};

pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

pub struct PushoverNotifier {
    token: String,
    user: String,
    api_url: String,
    client: Client,
}

impl PushoverNotifier {
    pub fn new(token: String, user: String) -> Self {
        Self {
            token,
            user,
            api_url: PUSHOVER_API_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Point at a different endpoint (tests, proxies).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, n: &Notification) -> Result<()> {
        let form = [
            ("token", self.token.as_str()),
            ("user", self.user.as_str()),
            ("title", n.title.as_str()),
            ("message", n.body.as_str()),
            ("priority", "1"),
        ];
        let rsp = self
            .client
            .post(&self.api_url)
            .timeout(Duration::from_secs(15))
            .form(&form)
            .send()
            .await
            .context("error sending pushover notification")?;

        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            bail!("pushover returned {status}: {body}");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "pushover"
    }
}
