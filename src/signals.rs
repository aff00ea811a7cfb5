// src/signals.rs
//! Turns process signals into [`Control`] events:
//! SIGTERM / SIGINT -> shutdown, SIGUSR1 -> self-test.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::orchestrator::Control;

/// Install the handlers and forward events until the receiver is dropped.
#[cfg(unix)]
pub fn spawn_listener(tx: mpsc::Sender<Control>) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut int = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
    let mut usr1 = signal(SignalKind::user_defined1()).context("installing SIGUSR1 handler")?;

    Ok(tokio::spawn(async move {
        loop {
            let (name, ev) = tokio::select! {
                _ = term.recv() => ("SIGTERM", Control::Shutdown),
                _ = int.recv() => ("SIGINT", Control::Shutdown),
                _ = usr1.recv() => ("SIGUSR1", Control::SelfTest),
            };
            tracing::warn!(signal = name, "signal received");
            if tx.send(ev).await.is_err() {
                return;
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_listener(tx: mpsc::Sender<Control>) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "ctrl-c handler failed");
                return;
            }
            tracing::warn!(signal = "ctrl-c", "signal received");
            if tx.send(Control::Shutdown).await.is_err() {
                return;
            }
        }
    }))
}
