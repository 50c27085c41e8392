//! Application layer: port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain`, never on `crate::infra`,
//! `crate::commands`, or `crate::output`.

pub mod ports;
pub mod services;

pub use ports::{
    AgentEventSink, BackendFactory, CloudBackend, CloudProvisioner, CommandRunner, ConfigStore,
    ExecMode, FetchResponse, HistoryStore, HttpFetcher, ManifestSource, NoEvents,
    ProgressReporter, RemoteRunner, ScriptJob, SessionHandoff, TerminalUi,
};
