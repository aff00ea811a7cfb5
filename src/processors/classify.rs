// src/processors/classify.rs
//! Language-model gate: asks the model whether an item is worth an alert.
//! Anything other than a well-formed "yes" drops the item.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};

use super::Processor;
use crate::content::Content;
use crate::metrics::{CLASSIFIER_REJECTED_TOTAL, PIPELINE_ERRORS_TOTAL};

/// Placeholder replaced by the item's canonical string.
pub const PROMPT_PLACEHOLDER: &str = "<content>";

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Free-text prompt in, free-text reply out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// Chat Completions client in JSON response mode. Requires an API key.
pub struct OpenAiModel {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiModel {
    pub fn new(api_key: Option<String>, model: &str, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("war-alert/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()
            .context("building OpenAI http client")?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("OPENAI_API_KEY not configured");
        };

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat<'a> {
            #[serde(rename = "type")]
            kind: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            response_format: ResponseFormat<'a>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&req)
            .send()
            .await
            .context("sending OpenAI request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("OpenAI returned {status}: {body}");
        }

        let body: Resp = resp.json().await.context("parsing OpenAI response")?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("OpenAI response has no message content"))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Prompt with a `<content>` placeholder. The file variant is re-read on every
/// render so edits apply without a restart.
#[derive(Debug, Clone)]
pub enum PromptTemplate {
    File(PathBuf),
    Inline(String),
}

impl PromptTemplate {
    pub async fn render(&self, content: &str) -> Result<String> {
        let template = match self {
            PromptTemplate::File(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading prompt file {}", path.display()))?,
            PromptTemplate::Inline(s) => s.clone(),
        };
        Ok(template.replace(PROMPT_PLACEHOLDER, content))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictResult {
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub result: VerdictResult,
    pub justification: String,
}

/// Parse `{"result": "yes"|"no", "justification": "..."}`.
pub fn parse_verdict(reply: &str) -> Result<Verdict> {
    #[derive(Deserialize)]
    struct Raw {
        result: Option<String>,
        justification: Option<String>,
    }

    let raw: Raw = serde_json::from_str(reply.trim()).context("reply is not a JSON object")?;
    let (Some(result), Some(justification)) = (raw.result, raw.justification) else {
        bail!("result or justification not found");
    };
    let result = match result.trim().to_ascii_lowercase().as_str() {
        "yes" => VerdictResult::Yes,
        "no" => VerdictResult::No,
        other => bail!("unexpected result value {other:?}"),
    };
    Ok(Verdict {
        result,
        justification,
    })
}

pub struct ClassifierGate {
    model: Arc<dyn LanguageModel>,
    prompt: PromptTemplate,
}

impl ClassifierGate {
    pub fn new(model: Arc<dyn LanguageModel>, prompt: PromptTemplate) -> Self {
        Self { model, prompt }
    }

    async fn classify(&self, content: &Content) -> Result<Verdict> {
        let prompt = self.prompt.render(&content.canonical()).await?;
        let reply = self.model.complete(&prompt).await?;
        parse_verdict(&reply)
    }
}

#[async_trait]
impl Processor for ClassifierGate {
    async fn process(&self, mut content: Content) -> Option<Content> {
        let verdict = match self.classify(&content).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(
                    error = %format!("{e:#}"),
                    model = self.model.name(),
                    title = %content.title,
                    description = %content.description,
                    published_at = %content.published_at,
                    link = %content.link,
                    "classification failed, dropping item"
                );
                counter!(PIPELINE_ERRORS_TOTAL, "stage" => "classify").increment(1);
                return None;
            }
        };

        match verdict.result {
            VerdictResult::No => {
                tracing::info!(
                    result = "no",
                    justification = %verdict.justification,
                    title = %content.title,
                    description = %content.description,
                    published_at = %content.published_at,
                    link = %content.link,
                    "not noteworthy"
                );
                counter!(CLASSIFIER_REJECTED_TOTAL).increment(1);
                None
            }
            VerdictResult::Yes => {
                tracing::warn!(
                    result = "yes",
                    justification = %verdict.justification,
                    title = %content.title,
                    description = %content.description,
                    published_at = %content.published_at,
                    link = %content.link,
                    "noteworthy"
                );
                content.description = verdict.justification;
                Some(content)
            }
        }
    }

    fn name(&self) -> &'static str {
        "classify"
    }
}
