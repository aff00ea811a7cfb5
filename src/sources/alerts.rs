// src/sources/alerts.rs
//! Active-alerts API source (alerts.in.ua). Alerts are trusted as relevant,
//! so items only pass the dedup stage.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;

use super::Source;
use crate::content::Content;
use crate::metrics::SOURCE_ERRORS_TOTAL;
use crate::processors::ProcessorKind;

pub const DEFAULT_ALERTS_URL: &str = "https://api.alerts.in.ua/v1/alerts/active.json";
pub const ALERTS_LINK: &str = "https://alerts.in.ua";

#[derive(Debug, Clone, Deserialize)]
pub struct RawAlert {
    pub alert_type: String,
    pub location_title: String,
    pub location_oblast: String,
    #[serde(default)]
    pub location_raion: Option<String>,
    pub started_at: String,
}

/// Allow-lists for alert type and oblast. `None` means no filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub types: Option<Vec<String>>,
    pub regions: Option<Vec<String>>,
}

impl AlertFilter {
    pub fn allows(&self, alert: &RawAlert) -> bool {
        let type_ok = self
            .types
            .as_ref()
            .map_or(true, |t| t.iter().any(|x| x == &alert.alert_type));
        let region_ok = self
            .regions
            .as_ref()
            .map_or(true, |r| r.iter().any(|x| x == &alert.location_oblast));
        type_ok && region_ok
    }
}

/// `air_raid` -> `Air raid`.
pub fn humanize_alert_type(t: &str) -> String {
    let spaced = t.replace('_', " ").to_lowercase();
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn alert_to_content(alert: &RawAlert) -> Content {
    let kind = humanize_alert_type(&alert.alert_type);
    let title = format!("{kind} alert in {}", alert.location_title);
    let description = match alert.location_raion.as_deref().filter(|r| !r.is_empty()) {
        Some(raion) => format!("{kind} alert in {raion} ({})", alert.location_oblast),
        None => format!("{kind} alert in {}", alert.location_oblast),
    };
    Content::alert(title, description, alert.started_at.clone(), ALERTS_LINK)
}

/// Parse an `{"alerts": [...]}` body, apply `filter`, and render survivors.
/// A body without `alerts` is an empty batch; malformed alerts are skipped.
pub fn parse_alerts(body: &str, filter: &AlertFilter) -> Result<Vec<Content>> {
    #[derive(Deserialize)]
    struct Envelope {
        #[serde(default)]
        alerts: Option<Vec<serde_json::Value>>,
    }

    let env: Envelope = serde_json::from_str(body).context("parsing alerts json")?;
    let mut out = Vec::new();
    for (idx, value) in env.alerts.unwrap_or_default().into_iter().enumerate() {
        let alert: RawAlert = match serde_json::from_value(value) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(alert = idx, error = %e, "skipping malformed alert");
                continue;
            }
        };
        if filter.allows(&alert) {
            out.push(alert_to_content(&alert));
        }
    }
    Ok(out)
}

pub struct AlertsSource {
    url: String,
    token: String,
    filter: AlertFilter,
    client: reqwest::Client,
}

impl AlertsSource {
    pub fn new(url: impl Into<String>, token: impl Into<String>, filter: AlertFilter) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("war-alert/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building alerts http client")?;
        Ok(Self {
            url: url.into(),
            token: token.into(),
            filter,
            client,
        })
    }

    async fn fetch_body(&self) -> Result<String> {
        let resp = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("error fetching alerts")?;
        let status = resp.status();
        let body = resp.text().await.context("reading alerts body")?;
        if !status.is_success() {
            bail!("alerts endpoint returned {status}: {body}");
        }
        Ok(body)
    }
}

#[async_trait]
impl Source for AlertsSource {
    async fn fetch(&self) -> Vec<Content> {
        tracing::info!(source = "alerts", url = %self.url, "fetching");

        let result = match self.fetch_body().await {
            Ok(body) => parse_alerts(&body, &self.filter),
            Err(e) => Err(e),
        };
        match result {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(url = %self.url, error = %format!("{e:#}"), "alerts fetch failed");
                counter!(SOURCE_ERRORS_TOTAL, "source" => "alerts").increment(1);
                Vec::new()
            }
        }
    }

    fn processors(&self) -> Vec<ProcessorKind> {
        vec![ProcessorKind::Unique]
    }

    fn name(&self) -> &str {
        "alerts"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"alerts":[
        {"alert_type":"air_raid","location_title":"Kyiv","location_oblast":"Kyiv","started_at":"2024-01-01T10:00:00Z"},
        {"alert_type":"artillery_shelling","location_title":"Nikopol","location_oblast":"Dnipropetrovsk","location_raion":"Nikopol raion","started_at":"2024-01-01T11:00:00Z"},
        {"alert_type":"air_raid","location_title":"Lviv","location_oblast":"Lviv","location_raion":"Lviv raion","started_at":"2024-01-01T12:00:00Z"},
        {"location_title":"broken"}
    ]}"#;

    #[test]
    fn humanizes_alert_types() {
        assert_eq!(humanize_alert_type("air_raid"), "Air raid");
        assert_eq!(humanize_alert_type("ARTILLERY_SHELLING"), "Artillery shelling");
        assert_eq!(humanize_alert_type(""), "");
    }

    #[test]
    fn no_filter_keeps_every_well_formed_alert() {
        let items = parse_alerts(BODY, &AlertFilter::default()).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Air raid alert in Kyiv");
        assert_eq!(items[0].description, "Air raid alert in Kyiv");
        assert_eq!(items[1].description, "Artillery shelling alert in Nikopol raion (Dnipropetrovsk)");
        assert_eq!(items[1].published_at, "2024-01-01T11:00:00Z");
        assert_eq!(items[1].link, ALERTS_LINK);
    }

    #[test]
    fn type_filter_keeps_only_allowed_types() {
        let filter = AlertFilter {
            types: Some(vec!["air_raid".into()]),
            regions: None,
        };
        let items = parse_alerts(BODY, &filter).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|c| c.title.starts_with("Air raid")));
    }

    #[test]
    fn region_and_type_filters_combine() {
        let filter = AlertFilter {
            types: Some(vec!["air_raid".into()]),
            regions: Some(vec!["Lviv".into(), "Dnipropetrovsk".into()]),
        };
        let items = parse_alerts(BODY, &filter).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Air raid alert in Lviv");
    }

    #[test]
    fn missing_alerts_key_is_empty_batch() {
        assert!(parse_alerts(r#"{"meta":{}}"#, &AlertFilter::default())
            .unwrap()
            .is_empty());
        assert!(parse_alerts("nope", &AlertFilter::default()).is_err());
    }
}
