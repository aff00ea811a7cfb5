// tests/common/mod.rs
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use war_alert::processors::{ClassifierGate, DedupStore, LanguageModel, PromptTemplate, UniqueProcessor};
use war_alert::{
    Content, Notification, Notifier, NotifierMux, Pipeline, ProcessorKind, Registry, Snapshot,
    Source,
};

/// Source returning a fixed batch with a fixed chain.
pub struct StaticSource {
    pub items: Vec<Content>,
    pub chain: Vec<ProcessorKind>,
    pub panic: bool,
}

impl StaticSource {
    pub fn feed(items: Vec<Content>) -> Box<dyn Source> {
        Box::new(Self {
            items,
            chain: vec![ProcessorKind::Unique, ProcessorKind::Classify],
            panic: false,
        })
    }

    pub fn alerts(items: Vec<Content>) -> Box<dyn Source> {
        Box::new(Self {
            items,
            chain: vec![ProcessorKind::Unique],
            panic: false,
        })
    }

    pub fn panicking() -> Box<dyn Source> {
        Box::new(Self {
            items: Vec::new(),
            chain: Vec::new(),
            panic: true,
        })
    }
}

#[async_trait]
impl Source for StaticSource {
    async fn fetch(&self) -> Vec<Content> {
        if self.panic {
            panic!("source blew up");
        }
        self.items.clone()
    }
    fn processors(&self) -> Vec<ProcessorKind> {
        self.chain.clone()
    }
    fn name(&self) -> &str {
        "static"
    }
}

/// Language model with a canned reply and a call counter.
pub struct CountingModel {
    pub reply: Option<String>,
    pub calls: AtomicUsize,
}

impl CountingModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn yes() -> Arc<Self> {
        Self::replying(r#"{"result":"yes","justification":"Escalation confirmed"}"#)
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for CountingModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or_else(|| anyhow!("connection refused"))
    }
    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Language model that takes far longer than any test is willing to wait.
pub struct SlowModel;

#[async_trait]
impl LanguageModel for SlowModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(r#"{"result":"yes","justification":"late"}"#.to_string())
    }
    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Language model that panics on every call.
pub struct PanickingModel;

#[async_trait]
impl LanguageModel for PanickingModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        panic!("model blew up");
    }
    fn name(&self) -> &'static str {
        "panicking"
    }
}

/// Notifier that records every message it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, n: &Notification) -> Result<()> {
        self.sent.lock().unwrap().push(n.clone());
        Ok(())
    }
    fn name(&self) -> &str {
        "recording"
    }
}

pub fn pipeline(dir: &Path, model: Arc<CountingModel>) -> Pipeline {
    pipeline_with(dir, model)
}

pub fn pipeline_with(dir: &Path, model: Arc<dyn LanguageModel>) -> Pipeline {
    Pipeline::new(
        Arc::new(UniqueProcessor::new(Arc::new(DedupStore::in_dir(dir)))),
        Arc::new(ClassifierGate::new(
            model,
            PromptTemplate::Inline("Classify: <content>".into()),
        )),
    )
}

pub fn mux(notifiers: &[RecordingNotifier]) -> NotifierMux {
    NotifierMux::new(
        notifiers
            .iter()
            .cloned()
            .map(|n| Box::new(n) as Box<dyn Notifier>)
            .collect(),
    )
}

type SourceFactory = Box<dyn Fn() -> Vec<Box<dyn Source>> + Send + Sync>;

/// Registry with fixed sources, recording notifiers and interval.
pub struct TestRegistry {
    pub sources: SourceFactory,
    pub notifiers: Vec<RecordingNotifier>,
    pub interval: Duration,
    pub snapshots: AtomicUsize,
}

impl TestRegistry {
    pub fn new(
        sources: impl Fn() -> Vec<Box<dyn Source>> + Send + Sync + 'static,
        notifiers: Vec<RecordingNotifier>,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            sources: Box::new(sources),
            notifiers,
            interval,
            snapshots: AtomicUsize::new(0),
        })
    }
}

impl Registry for TestRegistry {
    fn snapshot(&self) -> Snapshot {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Snapshot {
            sources: (self.sources)(),
            notifiers: mux(&self.notifiers),
            interval: self.interval,
        }
    }
}

pub fn article(n: usize) -> Content {
    Content::article(
        format!("Headline {n}"),
        format!("Body {n}"),
        "Mon, 01 Jan 2024 10:00:00 GMT",
        format!("https://news.example/{n}"),
    )
}
