// src/notify/mod.rs
//! Delivery channels. Every active channel receives every surviving item;
//! delivery is best-effort and failures only reach the logs.

pub mod email;
pub mod pushover;
pub mod telegram;

use anyhow::Result;
use metrics::counter;

use crate::content::Content;
use crate::metrics::{NOTIFICATIONS_TOTAL, NOTIFY_ERRORS_TOTAL};

pub use email::{EmailNotifier, SmtpSettings};
pub use pushover::PushoverNotifier;
pub use telegram::TelegramNotifier;

/// Rendered message shared by all channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn from_content(content: &Content) -> Self {
        Self {
            title: format!("War alert: {}", content.title),
            body: format!("{}\n\n{}", content.description, content.link),
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver once. Non-2xx answers are errors carrying status and body.
    async fn send(&self, n: &Notification) -> Result<()>;
    /// Channel label for logs, e.g. `pushover` or `email:ops@example.com`.
    fn name(&self) -> &str;
}

/// Fans one item out to every configured notifier, in order.
#[derive(Default)]
pub struct NotifierMux {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Returns how many channels accepted the message. Never fails.
    pub async fn notify(&self, content: &Content) -> usize {
        let n = Notification::from_content(content);
        let mut delivered = 0;
        for notifier in &self.notifiers {
            match notifier.send(&n).await {
                Ok(()) => {
                    counter!(NOTIFICATIONS_TOTAL).increment(1);
                    delivered += 1;
                }
                Err(e) => {
                    tracing::error!(
                        notifier = %notifier.name(),
                        title = %n.title,
                        error = %format!("{e:#}"),
                        "notification failed"
                    );
                    counter!(NOTIFY_ERRORS_TOTAL).increment(1);
                }
            }
        }
        delivered
    }
}
