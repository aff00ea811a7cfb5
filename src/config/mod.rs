// src/config/mod.rs
//! Environment-style settings. Built from a key lookup so the poll loop can
//! rebuild them every cycle and tests can feed a plain map.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::notify::SmtpSettings;
use crate::processors::classify::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use crate::sources::alerts::{AlertFilter, DEFAULT_ALERTS_URL};

pub const DEFAULT_SLEEP_DELAY_SECS: u64 = 600;
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_PROMPT_FILE: &str = "./prompt.txt";
pub const DEFAULT_TMP_DIR: &str = "/tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertsSettings {
    pub url: String,
    pub token: String,
    pub filter: AlertFilter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushoverSettings {
    pub token: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub smtp: SmtpSettings,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

/// A channel or source is `Some` only when its required keys are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub rss_urls: Vec<String>,
    pub alerts: Option<AlertsSettings>,
    pub pushover: Option<PushoverSettings>,
    pub telegram: Option<TelegramSettings>,
    pub email: Option<EmailSettings>,
    pub sleep_delay: Duration,
    pub prompt_file: PathBuf,
    pub openai: OpenAiSettings,
    pub tmp_dir: PathBuf,
    pub log_format: LogFormat,
    pub metrics_listen: Option<SocketAddr>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let rss_urls = get("RSS_URLS")
            .map(|v| split_whitespace(&v))
            .unwrap_or_default();

        let alerts = get("ALERTSUA_TOKEN").map(|token| AlertsSettings {
            url: get("ALERTSUA_URL").unwrap_or_else(|| DEFAULT_ALERTS_URL.to_string()),
            token,
            filter: AlertFilter {
                types: get("ALERTSUA_FILTER_TYPES").map(|v| split_commas(&v)),
                regions: get("ALERTSUA_FILTER_REGIONS").map(|v| split_commas(&v)),
            },
        });

        let pushover = match (get("PUSHOVER_TOKEN"), get("PUSHOVER_USER")) {
            (Some(token), Some(user)) => Some(PushoverSettings { token, user }),
            _ => None,
        };

        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHANNEL_ID")) {
            (Some(bot_token), Some(channel_id)) => Some(TelegramSettings {
                bot_token,
                channel_id,
            }),
            _ => None,
        };

        let recipients = get("EMAIL_TO")
            .map(|v| split_whitespace(&v))
            .unwrap_or_default();
        let email = match (get("SMTP_SERVER"), get("EMAIL_FROM")) {
            (Some(host), Some(from)) if !recipients.is_empty() => Some(EmailSettings {
                smtp: SmtpSettings {
                    host,
                    port: parse_or(get("SMTP_PORT"), DEFAULT_SMTP_PORT),
                    login: get("SMTP_LOGIN"),
                    password: get("SMTP_PASSWORD"),
                    from,
                },
                recipients,
            }),
            _ => None,
        };

        let log_format = match get("LOG_FORMAT").map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("compact") | Some("pretty") | Some("text") => LogFormat::Compact,
            _ => LogFormat::Json,
        };

        Self {
            rss_urls,
            alerts,
            pushover,
            telegram,
            email,
            sleep_delay: Duration::from_secs(parse_or(
                get("SLEEP_DELAY"),
                DEFAULT_SLEEP_DELAY_SECS,
            )),
            prompt_file: PathBuf::from(
                get("PROMPT_FILE").unwrap_or_else(|| DEFAULT_PROMPT_FILE.to_string()),
            ),
            openai: OpenAiSettings {
                api_key: get("OPENAI_API_KEY"),
                model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            },
            tmp_dir: PathBuf::from(get("TMPDIR").unwrap_or_else(|| DEFAULT_TMP_DIR.to_string())),
            log_format,
            metrics_listen: get("METRICS_LISTEN").and_then(|v| v.parse().ok()),
        }
    }
}

fn split_whitespace(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

fn split_commas(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|s| s.parse().ok()).unwrap_or(default)
}
