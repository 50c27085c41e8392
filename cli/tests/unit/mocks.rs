//! Shared mock infrastructure for unit tests.
//!
//! In-memory implementations of every port the run pipeline drives, each
//! recording how it was called so tests can assert on ordering.

#![allow(clippy::expect_used, dead_code)]

use std::collections::HashMap;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use indexmap::IndexMap;
use spawn_cli::application::ports::{
    AgentEventSink, BackendFactory, CloudProvisioner, ExecMode, FetchResponse, HistoryStore,
    HttpFetcher, ManifestSource, ProgressReporter, RemoteRunner, ScriptJob, SessionHandoff,
    TerminalUi,
};
use spawn_cli::domain::{AgentEvent, DuplicateChoice};
use spawn_common::{CloudDef, Connection, Manifest, SpawnRecord};
use tokio_util::sync::CancellationToken;

use crate::helpers::exit_status;

fn unexpected<T>() -> Result<T> {
    anyhow::bail!("not expected in this test")
}

// ── History ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<SpawnRecord>>,
}

impl MemoryHistory {
    pub fn with(records: Vec<SpawnRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn records(&self) -> Vec<SpawnRecord> {
        self.records.lock().expect("history lock").clone()
    }
}

impl HistoryStore for MemoryHistory {
    async fn load(&self) -> Result<Vec<SpawnRecord>> {
        Ok(self.records())
    }

    async fn append(&self, record: &SpawnRecord) -> Result<()> {
        self.records
            .lock()
            .expect("history lock")
            .push(record.clone());
        Ok(())
    }
}

// ── Manifest ──────────────────────────────────────────────────────────────────

pub struct StaticManifest(pub Manifest);

impl ManifestSource for StaticManifest {
    async fn load_manifest(&self, _force_refresh: bool) -> Result<Manifest> {
        Ok(self.0.clone())
    }
}

// ── HTTP ──────────────────────────────────────────────────────────────────────

/// Answers from a URL table; anything else is a 404.
#[derive(Default)]
pub struct CannedFetcher {
    responses: HashMap<String, FetchResponse>,
    calls: Mutex<Vec<String>>,
}

impl CannedFetcher {
    pub fn with(mut self, url: &str, response: FetchResponse) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("fetch log lock").clone()
    }
}

impl HttpFetcher for CannedFetcher {
    async fn get(&self, url: &str) -> FetchResponse {
        self.calls
            .lock()
            .expect("fetch log lock")
            .push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .unwrap_or(FetchResponse::Status(404))
    }
}

// ── Backend ───────────────────────────────────────────────────────────────────

/// Backend that records each call by name. Clones share the call log.
#[derive(Clone)]
pub struct MockBackend {
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
    pub(crate) script_env: Arc<Mutex<Option<IndexMap<String, String>>>>,
    pub connection: Option<Connection>,
    pub script_exit: i32,
    pub session_exit: i32,
    /// Step name that returns an error.
    pub fail_at: Option<&'static str>,
    /// Step name that fires the token and then never completes.
    pub cancel_at: Option<(&'static str, CancellationToken)>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
            script_env: Arc::default(),
            connection: Some(crate::helpers::connection("10.0.0.7")),
            script_exit: 0,
            session_exit: 0,
            fail_at: None,
            cancel_at: None,
        }
    }
}

impl MockBackend {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log lock").clone()
    }

    pub fn script_env(&self) -> Option<IndexMap<String, String>> {
        self.script_env.lock().expect("env lock").clone()
    }

    async fn step(&self, name: &str) -> Result<()> {
        self.calls
            .lock()
            .expect("call log lock")
            .push(name.to_string());
        if self.fail_at == Some(name) {
            anyhow::bail!("{name} failed");
        }
        match &self.cancel_at {
            Some((at, token)) if *at == name => {
                token.cancel();
                std::future::pending::<Result<()>>().await
            }
            _ => Ok(()),
        }
    }
}

impl CloudProvisioner for MockBackend {
    async fn authenticate(&self) -> Result<()> {
        self.step("authenticate").await
    }
    async fn prompt_size(&self, _custom: bool) -> Result<()> {
        self.step("prompt_size").await
    }
    async fn create_server(&self, _name: &str) -> Result<()> {
        self.step("create_server").await
    }
    async fn wait_for_ready(&self) -> Result<()> {
        self.step("wait_for_ready").await
    }
    async fn configure_shell(&self) -> Result<()> {
        self.step("configure_shell").await
    }
    fn server_name(&self) -> Option<String> {
        None
    }
    fn connection(&self) -> Option<Connection> {
        self.connection.clone()
    }
}

impl RemoteRunner for MockBackend {
    async fn run_server(
        &self,
        job: &ScriptJob<'_>,
        events: &dyn AgentEventSink,
    ) -> Result<ExitStatus> {
        self.step("run_server").await?;
        *self.script_env.lock().expect("env lock") = Some(job.env.clone());
        if job.mode == ExecMode::Headless {
            events.event(&AgentEvent {
                kind: "status".to_string(),
                message: Some("working".to_string()),
                tool: None,
            });
            events.passthrough("plain output");
            events.finish();
        }
        Ok(exit_status(self.script_exit))
    }

    async fn upload_file(&self, remote_path: &str, _contents: &str) -> Result<()> {
        self.step(&format!("upload {remote_path}")).await
    }
}

impl SessionHandoff for MockBackend {
    async fn interactive_session(
        &self,
        _launch_cmd: &str,
        _env: &IndexMap<String, String>,
    ) -> Result<ExitStatus> {
        self.step("interactive_session").await?;
        Ok(exit_status(self.session_exit))
    }

    async fn attach(&self, connection: &Connection) -> Result<ExitStatus> {
        self.step(&format!("attach {}", connection.ip)).await?;
        Ok(exit_status(self.session_exit))
    }
}

/// Hands out clones of one [`MockBackend`].
pub struct MockFactory {
    pub backend: MockBackend,
    pub fail: bool,
}

impl MockFactory {
    pub fn new(backend: MockBackend) -> Self {
        Self {
            backend,
            fail: false,
        }
    }
}

impl BackendFactory for MockFactory {
    type Backend = MockBackend;

    fn backend_for(&self, _cloud_key: &str, _cloud: &CloudDef) -> Result<MockBackend> {
        if self.fail {
            return unexpected();
        }
        Ok(self.backend.clone())
    }
}

// ── Terminal ──────────────────────────────────────────────────────────────────

/// Answers every duplicate prompt with `choice`.
pub struct ScriptedUi {
    pub choice: DuplicateChoice,
    prompts: AtomicUsize,
    resets: AtomicUsize,
    last_can_reuse: Mutex<Option<bool>>,
}

impl ScriptedUi {
    pub fn answering(choice: DuplicateChoice) -> Self {
        Self {
            choice,
            prompts: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            last_can_reuse: Mutex::new(None),
        }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn last_can_reuse(&self) -> Option<bool> {
        *self.last_can_reuse.lock().expect("ui lock")
    }
}

impl Default for ScriptedUi {
    fn default() -> Self {
        Self::answering(DuplicateChoice::SpawnNew)
    }
}

impl TerminalUi for ScriptedUi {
    fn choose_duplicate(&self, _record: &SpawnRecord, can_reuse: bool) -> Result<DuplicateChoice> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.last_can_reuse.lock().expect("ui lock") = Some(can_reuse);
        Ok(self.choice)
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Collects reporter and event output as `"<kind>: <message>"` lines.
#[derive(Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("reporter lock").clone()
    }

    fn push(&self, kind: &str, message: &str) {
        self.lines
            .lock()
            .expect("reporter lock")
            .push(format!("{kind}: {message}"));
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.push("step", message);
    }
    fn success(&self, message: &str) {
        self.push("success", message);
    }
    fn warn(&self, message: &str) {
        self.push("warn", message);
    }
    fn info(&self, message: &str) {
        self.push("info", message);
    }
}

impl AgentEventSink for RecordingReporter {
    fn event(&self, event: &AgentEvent) {
        self.push("event", &event.summary());
    }
    fn passthrough(&self, line: &str) {
        self.push("line", line);
    }
    fn finish(&self) {
        self.push("finish", "");
    }
}
