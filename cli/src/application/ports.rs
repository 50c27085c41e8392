//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `spawn_common`, never
//! from `crate::infra`, `crate::commands`, or `crate::output`.

use std::process::ExitStatus;

use anyhow::Result;
use indexmap::IndexMap;
use spawn_common::{CloudDef, Connection, Manifest, SpawnRecord};

use crate::domain::{AgentEvent, DuplicateChoice, SpawnConfig};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Result of one HTTP GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    /// HTTP 200 with the body.
    Ok(String),
    /// Any other HTTP status.
    Status(u16),
    /// No HTTP response at all (DNS, TLS, timeout, refused).
    Transport(String),
}

/// How the provisioning script should be run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Inherit the terminal.
    Interactive,
    /// Stdin closed, stdout parsed as an event stream.
    Headless,
}

/// Everything a backend needs to execute the provisioning script.
pub struct ScriptJob<'a> {
    /// Validated script body.
    pub script: &'a str,
    /// Process environment for the script (never spliced into its text).
    pub env: &'a IndexMap<String, String>,
    pub mode: ExecMode,
}

// ── Persistence Ports ─────────────────────────────────────────────────────────

/// Append-only run history.
#[allow(async_fn_in_trait)]
pub trait HistoryStore {
    /// All records, oldest first. A corrupt store reads as empty.
    async fn load(&self) -> Result<Vec<SpawnRecord>>;
    /// Append one record.
    async fn append(&self, record: &SpawnRecord) -> Result<()>;
    /// Active records matching `(agent, cloud, name)` exactly.
    async fn filter_active(
        &self,
        agent: &str,
        cloud: &str,
        name: &str,
    ) -> Result<Vec<SpawnRecord>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|r| r.is_active() && r.matches(agent, cloud, name))
            .collect())
    }
}

/// Abstracts user configuration persistence.
pub trait ConfigStore {
    /// Load the configuration; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<SpawnConfig>;
    /// Location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<std::path::PathBuf>;
}

/// Supplies the agent/cloud catalog.
#[allow(async_fn_in_trait)]
pub trait ManifestSource {
    /// Load the manifest, bypassing any cache when `force_refresh`.
    async fn load_manifest(&self, force_refresh: bool) -> Result<Manifest>;
}

// ── Network Port ──────────────────────────────────────────────────────────────

/// Plain HTTP GET with a bounded timeout.
#[allow(async_fn_in_trait)]
pub trait HttpFetcher {
    async fn get(&self, url: &str) -> FetchResponse;
}

// ── Cloud Backend Capability Ports ────────────────────────────────────────────

/// Provisioning primitives, one implementation per backend family.
#[allow(async_fn_in_trait)]
pub trait CloudProvisioner {
    /// Hard precondition: fails fast, never retried.
    async fn authenticate(&self) -> Result<()>;
    /// Pick a server size; a no-op for fixed-size providers.
    async fn prompt_size(&self, custom: bool) -> Result<()>;
    async fn create_server(&self, name: &str) -> Result<()>;
    /// Block until the server accepts work or fail.
    async fn wait_for_ready(&self) -> Result<()>;
    async fn configure_shell(&self) -> Result<()>;
    /// Name of the server created by this run, once known.
    fn server_name(&self) -> Option<String>;
    /// Connection tuple for the history record, once known.
    fn connection(&self) -> Option<Connection>;
}

/// Runs work on the provisioned server.
#[allow(async_fn_in_trait)]
pub trait RemoteRunner {
    /// Run the provisioning script and return its exit status.
    ///
    /// In headless mode each stdout line that parses as an [`AgentEvent`]
    /// is delivered to `events`; other lines go to `passthrough`.
    async fn run_server(&self, job: &ScriptJob<'_>, events: &dyn AgentEventSink)
    -> Result<ExitStatus>;
    /// Write `contents` to `remote_path` on the server.
    async fn upload_file(&self, remote_path: &str, contents: &str) -> Result<()>;
}

/// Hands the terminal to the agent.
#[allow(async_fn_in_trait)]
pub trait SessionHandoff {
    /// Start the agent interactively after a fresh run.
    async fn interactive_session(
        &self,
        launch_cmd: &str,
        env: &IndexMap<String, String>,
    ) -> Result<ExitStatus>;
    /// Reconnect to a server recorded by an earlier run.
    async fn attach(&self, connection: &Connection) -> Result<ExitStatus>;
}

/// Composite trait: any type implementing all three capability traits is a
/// `CloudBackend`.
pub trait CloudBackend: CloudProvisioner + RemoteRunner + SessionHandoff {}

/// Blanket implementation: any type implementing all three sub-traits is a `CloudBackend`.
impl<T> CloudBackend for T where T: CloudProvisioner + RemoteRunner + SessionHandoff {}

/// Builds the backend for a resolved cloud.
pub trait BackendFactory {
    type Backend: CloudBackend;

    /// # Errors
    ///
    /// Returns an error if the backend cannot be constructed.
    fn backend_for(&self, cloud_key: &str, cloud: &CloudDef) -> Result<Self::Backend>;
}

// ── Terminal Ports ────────────────────────────────────────────────────────────

/// Interactive prompts plus the terminal reset that must precede any handoff.
pub trait TerminalUi {
    /// Ask what to do about an active run with the same name.
    ///
    /// `can_reuse` is `false` when the record has no connection to attach to.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be shown.
    fn choose_duplicate(&self, record: &SpawnRecord, can_reuse: bool) -> Result<DuplicateChoice>;

    /// Restore cooked mode, echo and the cursor. Idempotent.
    fn reset(&self);
}

/// Receives parsed headless output.
pub trait AgentEventSink {
    fn event(&self, event: &AgentEvent);
    /// A stdout line that is not an event.
    fn passthrough(&self, line: &str);
    /// Called once after the child exits.
    fn finish(&self);
}

/// Sink that drops everything; used for interactive runs.
pub struct NoEvents;

impl AgentEventSink for NoEvents {
    fn event(&self, _: &AgentEvent) {}
    fn passthrough(&self, _: &str) {}
    fn finish(&self) {}
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program with inherited stdio and extra environment.
    async fn run_status(
        &self,
        program: &str,
        args: &[&str],
        env: &IndexMap<String, String>,
    ) -> Result<ExitStatus>;

    /// Spawn a program with stdin closed and stdout piped.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn spawn_piped(
        &self,
        program: &str,
        args: &[&str],
        env: &IndexMap<String, String>,
    ) -> Result<tokio::process::Child>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Emit a neutral note.
    fn info(&self, message: &str);
}
