// src/orchestrator.rs
//! Poll loop: fetch every source, run items through their processor chain,
//! fan survivors out to every notifier, sleep, repeat. Control events
//! (shutdown, self-test) are served while a cycle runs and while sleeping.

use std::sync::Arc;

use anyhow::Result;
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::content::Content;
use crate::metrics::{CYCLES_TOTAL, ITEMS_TOTAL};
use crate::processors::{Pipeline, ProcessorKind};
use crate::registry::{Registry, Snapshot};

/// Out-of-band events delivered to the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Shutdown,
    SelfTest,
}

/// Chain used for the synthetic self-test item.
pub const SELF_TEST_CHAIN: [ProcessorKind; 2] = [ProcessorKind::Unique, ProcessorKind::Classify];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub sources: usize,
    pub fetched: usize,
    pub notified: usize,
}

/// What the loop should do after handling a control event.
enum Flow {
    Continue,
    Stop,
}

#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<dyn Registry>,
    pipeline: Pipeline,
}

impl Orchestrator {
    pub fn new(registry: Arc<dyn Registry>, pipeline: Pipeline) -> Self {
        Self { registry, pipeline }
    }

    /// Run until [`Control::Shutdown`] arrives or the control channel closes.
    /// A failing or panicking cycle or self-test is logged and the loop
    /// carries on; shutdown aborts whatever is still in flight.
    pub async fn run(self, mut control: mpsc::Receiver<Control>) -> Result<()> {
        let mut self_test: Option<JoinHandle<usize>> = None;
        loop {
            counter!(CYCLES_TOTAL).increment(1);
            let snapshot = self.registry.snapshot();
            let interval = snapshot.interval;

            let this = self.clone();
            let mut cycle: JoinHandle<CycleStats> =
                tokio::spawn(async move { this.run_cycle(&snapshot).await });

            loop {
                tokio::select! {
                    res = &mut cycle => {
                        match res {
                            Ok(stats) => tracing::info!(
                                sources = stats.sources,
                                fetched = stats.fetched,
                                notified = stats.notified,
                                "cycle finished"
                            ),
                            Err(e) if e.is_panic() => {
                                tracing::error!(error = %e, "cycle panicked, continuing")
                            }
                            Err(e) => tracing::error!(error = %e, "cycle aborted, continuing"),
                        }
                        break;
                    }
                    res = join_self_test(&mut self_test) => {
                        self_test = None;
                        log_self_test(res);
                    }
                    ev = control.recv() => {
                        if let Flow::Stop = self.handle(ev, &mut self_test) {
                            cycle.abort();
                            return Ok(());
                        }
                    }
                }
            }

            tracing::debug!(secs = interval.as_secs(), "sleeping");
            let sleep = tokio::time::sleep(interval);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    res = join_self_test(&mut self_test) => {
                        self_test = None;
                        log_self_test(res);
                    }
                    ev = control.recv() => {
                        if let Flow::Stop = self.handle(ev, &mut self_test) {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn handle(&self, ev: Option<Control>, self_test: &mut Option<JoinHandle<usize>>) -> Flow {
        match ev {
            Some(Control::SelfTest) => {
                if self_test.is_some() {
                    tracing::warn!("self-test already running, ignoring request");
                } else {
                    let this = self.clone();
                    *self_test = Some(tokio::spawn(async move { this.self_test().await }));
                }
                Flow::Continue
            }
            Some(Control::Shutdown) => {
                tracing::warn!("shutdown requested");
                abort_self_test(self_test);
                Flow::Stop
            }
            None => {
                tracing::warn!("control channel closed, stopping");
                abort_self_test(self_test);
                Flow::Stop
            }
        }
    }

    /// One pass over every source in `snapshot`.
    pub async fn run_cycle(&self, snapshot: &Snapshot) -> CycleStats {
        let mut stats = CycleStats {
            sources: snapshot.sources.len(),
            ..CycleStats::default()
        };
        if snapshot.notifiers.is_empty() {
            tracing::warn!("no notifiers configured");
        }

        for source in &snapshot.sources {
            let items = source.fetch().await;
            let chain = source.processors();
            counter!(ITEMS_TOTAL, "source" => source.name().to_string())
                .increment(items.len() as u64);
            stats.fetched += items.len();

            for item in items {
                if let Some(content) = self.pipeline.run(&chain, item).await {
                    tracing::info!(
                        source = source.name(),
                        kind = content.kind.as_str(),
                        title = %content.title,
                        link = %content.link,
                        "notifying"
                    );
                    snapshot.notifiers.notify(&content).await;
                    stats.notified += 1;
                }
            }
        }
        stats
    }

    /// Push a synthetic item through dedup + classify and every active
    /// notifier. Returns how many notifiers accepted it.
    pub async fn self_test(&self) -> usize {
        let snapshot = self.registry.snapshot();
        let content = self_test_content(&chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string());
        tracing::warn!(title = %content.title, notifiers = snapshot.notifiers.len(), "running self-test");

        match self.pipeline.run(&SELF_TEST_CHAIN, content).await {
            Some(content) => snapshot.notifiers.notify(&content).await,
            None => {
                tracing::warn!("self-test item dropped by pipeline");
                0
            }
        }
    }
}

// Pending forever when no self-test is running, so the select branch idles.
async fn join_self_test(task: &mut Option<JoinHandle<usize>>) -> Result<usize, JoinError> {
    match task.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn log_self_test(res: Result<usize, JoinError>) {
    match res {
        Ok(delivered) => tracing::warn!(delivered, "self-test finished"),
        Err(e) if e.is_panic() => tracing::error!(error = %e, "self-test panicked, continuing"),
        Err(e) => tracing::error!(error = %e, "self-test aborted"),
    }
}

fn abort_self_test(task: &mut Option<JoinHandle<usize>>) {
    if let Some(handle) = task.take() {
        tracing::warn!("aborting running self-test");
        handle.abort();
    }
}

pub fn self_test_content(now: &str) -> Content {
    Content::article(
        "Everything is fine, it's just a test.",
        format!("We are testing the system. Please do not panic. Test time: {now}"),
        now,
        "System test",
    )
}
