// src/registry.rs
//! Builds the active sources and notifiers for one poll cycle.

use std::time::Duration;

use crate::config::Settings;
use crate::notify::{EmailNotifier, Notifier, NotifierMux, PushoverNotifier, TelegramNotifier};
use crate::sources::{AlertsSource, RssSource, Source};

/// Everything one poll cycle works with.
pub struct Snapshot {
    pub sources: Vec<Box<dyn Source>>,
    pub notifiers: NotifierMux,
    /// Sleep after the cycle.
    pub interval: Duration,
}

impl Snapshot {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            sources: build_sources(settings),
            notifiers: build_notifiers(settings),
            interval: settings.sleep_delay,
        }
    }
}

/// Queried at the start of every cycle, so configuration changes apply
/// without a restart.
pub trait Registry: Send + Sync {
    fn snapshot(&self) -> Snapshot;
}

/// Re-reads the process environment each time it is asked.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvRegistry;

impl Registry for EnvRegistry {
    fn snapshot(&self) -> Snapshot {
        Snapshot::from_settings(&Settings::from_env())
    }
}

pub fn build_sources(settings: &Settings) -> Vec<Box<dyn Source>> {
    let mut out: Vec<Box<dyn Source>> = Vec::new();

    for url in &settings.rss_urls {
        match RssSource::new(url.clone()) {
            Ok(s) => out.push(Box::new(s)),
            Err(e) => tracing::warn!(url = %url, error = ?e, "rss source disabled"),
        }
    }

    if let Some(alerts) = &settings.alerts {
        match AlertsSource::new(alerts.url.clone(), alerts.token.clone(), alerts.filter.clone()) {
            Ok(s) => out.push(Box::new(s)),
            Err(e) => tracing::warn!(error = ?e, "alerts source disabled"),
        }
    }

    out
}

pub fn build_notifiers(settings: &Settings) -> NotifierMux {
    let mut out: Vec<Box<dyn Notifier>> = Vec::new();

    if let Some(p) = &settings.pushover {
        out.push(Box::new(PushoverNotifier::new(p.token.clone(), p.user.clone())));
    }

    if let Some(t) = &settings.telegram {
        out.push(Box::new(TelegramNotifier::new(
            t.bot_token.clone(),
            t.channel_id.clone(),
        )));
    }

    if let Some(email) = &settings.email {
        for recipient in &email.recipients {
            match EmailNotifier::new(&email.smtp, recipient) {
                Ok(n) => out.push(Box::new(n)),
                Err(e) => {
                    tracing::warn!(recipient = %recipient, error = %format!("{e:#}"), "email notifier disabled")
                }
            }
        }
    }

    NotifierMux::new(out)
}
