//! `cockpit-client`: live-sync client for the cockpit command runner.
//!
//! A cockpit backend runs shell commands and exposes their history as
//! cursor-paginated JSON plus server-sent mutation events. This crate keeps
//! an in-memory collection (commands, or one command's log lines) consistent
//! with both.
//!
//! # Architecture
//!
//! ```text
//! HttpBackend          ← Backend impl: JSON pages + text/event-stream
//!     │
//!     ├── fetch_page ─────────────┐
//!     ▼                           │
//! EventStream          ← push-to-pull bridge: background reader task,
//!     │                  unbounded FIFO, close handle
//!     ▼                           ▼
//! Reconciler::activate ← open stream → await seed page → drain events
//!     │
//!     ▼
//! Activation           ← owns the Collection; load_more / deactivate;
//!                        publishes Snapshot after every change
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cockpit_client::{ClientConfig, HttpBackend, Reconciler};
//!
//! let config = ClientConfig::new("http://127.0.0.1:8080");
//! let reconciler = Reconciler::from_config(Arc::new(HttpBackend::new(&config)?), &config);
//!
//! let commands = reconciler.commands().await?;
//! for cmd in commands.snapshot().iter() {
//!     println!("{} {} {}", cmd.id, cmd.status, cmd.command);
//! }
//! commands.deactivate();
//! ```

pub mod backend;
pub mod collection;
pub mod config;
pub mod error;
pub mod http;
pub mod reconciler;
pub mod sse;
pub mod stream;
pub mod types;

#[cfg(test)]
mod tests;

pub use backend::{Backend, Scope};
pub use collection::Collection;
pub use config::ClientConfig;
pub use error::CockpitError;
pub use http::HttpBackend;
pub use reconciler::{Activation, Reconciler, Snapshot};
pub use stream::{EventSink, EventStream, StreamCloser};
pub use types::{
    Command, CommandEvent, CommandStatus, Entity, EventKind, LogLine, LogStream, MutationEvent,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, CockpitError>;
