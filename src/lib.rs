// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod content;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod processors;
pub mod registry;
pub mod signals;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::config::Settings;
pub use crate::content::{Content, ContentKind, Fingerprint};
pub use crate::notify::{Notification, Notifier, NotifierMux};
pub use crate::orchestrator::{Control, Orchestrator};
pub use crate::processors::{Pipeline, Processor, ProcessorKind};
pub use crate::registry::{EnvRegistry, Registry, Snapshot};
pub use crate::sources::Source;
