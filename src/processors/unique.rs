// src/processors/unique.rs
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::Processor;
use crate::content::{Content, Fingerprint};
use crate::metrics::{DEDUP_DROPPED_TOTAL, PIPELINE_ERRORS_TOTAL};

pub const STORE_FILE_NAME: &str = "war-alert.txt";

/// Append-only set of seen fingerprints, one `{hex}\n` line each.
///
/// The file is read once on first use into memory; afterwards lookups hit
/// the in-memory set and inserts append to the file. The mutex is held
/// across check and append, so two callers with the same fingerprint cannot
/// both see it as new.
pub struct DedupStore {
    path: PathBuf,
    seen: Mutex<Option<HashSet<Fingerprint>>>,
}

impl DedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: Mutex::new(None),
        }
    }

    /// Store file inside `dir` (the `TMPDIR` setting).
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STORE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn hydrate(path: &Path) -> Result<HashSet<Fingerprint>> {
        if fs::metadata(path).await.is_err() {
            fs::write(path, b"")
                .await
                .with_context(|| format!("creating dedup store {}", path.display()))?;
            return Ok(HashSet::new());
        }
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading dedup store {}", path.display()))?;
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(Fingerprint::from_hex)
            .collect())
    }

    /// Returns `true` when `fp` was not seen before and is now recorded.
    pub async fn insert_if_new(&self, fp: &Fingerprint) -> Result<bool> {
        let mut guard = self.seen.lock().await;
        if guard.is_none() {
            *guard = Some(Self::hydrate(&self.path).await?);
        }
        let Some(seen) = guard.as_mut() else {
            return Ok(false);
        };
        if seen.contains(fp) {
            return Ok(false);
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening dedup store {}", self.path.display()))?;
        file.write_all(format!("{fp}\n").as_bytes())
            .await
            .context("appending fingerprint")?;
        file.flush().await.context("flushing dedup store")?;

        seen.insert(fp.clone());
        Ok(true)
    }

    pub async fn contains(&self, fp: &Fingerprint) -> Result<bool> {
        let mut guard = self.seen.lock().await;
        if guard.is_none() {
            *guard = Some(Self::hydrate(&self.path).await?);
        }
        Ok(guard.as_ref().is_some_and(|s| s.contains(fp)))
    }
}

/// Drops content whose fingerprint is already in the store.
pub struct UniqueProcessor {
    store: std::sync::Arc<DedupStore>,
}

impl UniqueProcessor {
    pub fn new(store: std::sync::Arc<DedupStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Processor for UniqueProcessor {
    async fn process(&self, content: Content) -> Option<Content> {
        let fp = content.fingerprint();
        match self.store.insert_if_new(&fp).await {
            Ok(true) => Some(content),
            Ok(false) => {
                tracing::debug!(fingerprint = %fp, title = %content.title, "already seen");
                counter!(DEDUP_DROPPED_TOTAL).increment(1);
                None
            }
            Err(e) => {
                // Without a recorded fingerprint the item would repeat every cycle.
                tracing::error!(
                    error = ?e,
                    path = %self.store.path().display(),
                    title = %content.title,
                    "dedup store unavailable, dropping item"
                );
                counter!(PIPELINE_ERRORS_TOTAL, "stage" => "unique").increment(1);
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "unique"
    }
}
