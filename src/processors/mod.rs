// src/processors/mod.rs
//! Per-item pipeline stages. A stage either forwards (possibly rewritten)
//! content or drops it, which ends the chain for that item.

pub mod classify;
pub mod unique;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Settings;
use crate::content::Content;

pub use classify::{ClassifierGate, LanguageModel, OpenAiModel, PromptTemplate};
pub use unique::{DedupStore, UniqueProcessor};

#[async_trait]
pub trait Processor: Send + Sync {
    /// `None` drops the item; later stages are not invoked.
    async fn process(&self, content: Content) -> Option<Content>;
    fn name(&self) -> &'static str;
}

/// Stages a source can ask for. Resolved to instances by [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    Unique,
    Classify,
}

/// Holds one instance per stage kind and runs an ordered chain of them.
#[derive(Clone)]
pub struct Pipeline {
    unique: Arc<dyn Processor>,
    classify: Arc<dyn Processor>,
}

impl Pipeline {
    pub fn new(unique: Arc<dyn Processor>, classify: Arc<dyn Processor>) -> Self {
        Self { unique, classify }
    }

    /// Production wiring: file-backed dedup store under `TMPDIR` and the
    /// OpenAI classifier with the prompt file.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = Arc::new(DedupStore::in_dir(&settings.tmp_dir));
        let model = OpenAiModel::new(
            settings.openai.api_key.clone(),
            &settings.openai.model,
            &settings.openai.base_url,
        )?;
        Ok(Self::new(
            Arc::new(UniqueProcessor::new(store)),
            Arc::new(ClassifierGate::new(
                Arc::new(model),
                PromptTemplate::File(settings.prompt_file.clone()),
            )),
        ))
    }

    fn stage(&self, kind: ProcessorKind) -> &dyn Processor {
        match kind {
            ProcessorKind::Unique => self.unique.as_ref(),
            ProcessorKind::Classify => self.classify.as_ref(),
        }
    }

    /// Run `content` through `chain` in order, stopping at the first drop.
    pub async fn run(&self, chain: &[ProcessorKind], content: Content) -> Option<Content> {
        let mut current = content;
        for kind in chain {
            let stage = self.stage(*kind);
            match stage.process(current).await {
                Some(next) => current = next,
                None => {
                    tracing::debug!(stage = stage.name(), "item dropped");
                    return None;
                }
            }
        }
        Some(current)
    }
}
