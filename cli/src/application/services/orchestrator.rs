//! Application service: the provisioning state machine.
//!
//! Drives any [`CloudBackend`] through one lifecycle. Every backend call up
//! to and including script execution is raced against the run's
//! cancellation token; dropping the losing future drops (and kills) any
//! child it owns. The interactive session owns the terminal, so its
//! signals belong to the child and it is not raced.

use std::future::Future;
use std::process::ExitStatus;

use anyhow::{Result, bail};
use chrono::Utc;
use indexmap::IndexMap;
use spawn_common::{Connection, SpawnRecord};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    AgentEventSink, CloudBackend, ExecMode, HistoryStore, ProgressReporter, ScriptJob, TerminalUi,
};
use crate::domain::error::{RunError, ScriptExecutionError};
use crate::domain::{DuplicateChoice, OrchestrationState};

/// Identity of one run, as it will appear in history.
#[derive(Debug, Clone, Copy)]
pub struct RunIdentity<'a> {
    pub agent: &'a str,
    pub cloud: &'a str,
    pub name: &'a str,
    pub prompt: Option<&'a str>,
}

/// What to execute once the server is up.
pub struct ExecutionPlan<'a> {
    pub script: &'a str,
    pub launch_cmd: &'a str,
    pub env: &'a IndexMap<String, String>,
    /// Remote path → body.
    pub config_files: &'a IndexMap<String, String>,
    pub custom: bool,
    pub mode: ExecMode,
}

/// Result of the duplicate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateOutcome {
    Proceed,
    Reuse(Connection),
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Fresh run. `session_exit` is `None` for headless runs.
    Completed { session_exit: Option<i32> },
    /// Attached to an existing server.
    Reused { session_exit: i32 },
}

/// Collaborators the orchestrator drives.
pub struct OrchestratorPorts<'a, B, H, U, P> {
    pub backend: &'a B,
    pub history: &'a H,
    pub ui: &'a U,
    pub reporter: &'a P,
    pub cancel: &'a CancellationToken,
}

/// One run's state machine.
pub struct Orchestrator<'a, B, H, U, P> {
    ports: OrchestratorPorts<'a, B, H, U, P>,
    run: RunIdentity<'a>,
    state: OrchestrationState,
    recorded: bool,
    terminal_released: bool,
}

impl<'a, B, H, U, P> Orchestrator<'a, B, H, U, P>
where
    B: CloudBackend,
    H: HistoryStore,
    U: TerminalUi,
    P: ProgressReporter,
{
    #[must_use]
    pub fn new(ports: OrchestratorPorts<'a, B, H, U, P>, run: RunIdentity<'a>) -> Self {
        Self {
            ports,
            run,
            state: OrchestrationState::Idle,
            recorded: false,
            terminal_released: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> OrchestrationState {
        self.state
    }

    /// Look for an active run with the same `(agent, cloud, name)`.
    ///
    /// With `enabled == false` (generated names) the lookup is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::DuplicateDeclined`] when the user cancels, or the
    /// history/prompt error.
    pub async fn check_duplicate(&mut self, enabled: bool) -> Result<DuplicateOutcome> {
        self.transition(OrchestrationState::CheckingDuplicate)?;
        let result = self.find_duplicate(enabled).await;
        match result {
            Ok(DuplicateOutcome::Proceed) => {
                self.transition(OrchestrationState::Idle)?;
                Ok(DuplicateOutcome::Proceed)
            }
            Ok(reuse) => Ok(reuse),
            Err(err) => {
                self.transition(OrchestrationState::Failed)?;
                Err(err)
            }
        }
    }

    async fn find_duplicate(&self, enabled: bool) -> Result<DuplicateOutcome> {
        if !enabled {
            return Ok(DuplicateOutcome::Proceed);
        }
        let RunIdentity {
            agent, cloud, name, ..
        } = self.run;
        let matches = guarded(
            self.ports.cancel,
            self.ports.history.filter_active(agent, cloud, name),
        )
        .await?;
        let Some(existing) = matches.last() else {
            return Ok(DuplicateOutcome::Proceed);
        };
        tracing::debug!(agent, cloud, name, "active run with the same name found");

        let can_reuse = existing.connection.is_some();
        match self.ports.ui.choose_duplicate(existing, can_reuse)? {
            DuplicateChoice::Reuse => match &existing.connection {
                Some(conn) => Ok(DuplicateOutcome::Reuse(conn.clone())),
                None => Ok(DuplicateOutcome::Proceed),
            },
            DuplicateChoice::SpawnNew => Ok(DuplicateOutcome::Proceed),
            DuplicateChoice::Cancel => Err(RunError::DuplicateDeclined {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Hand the terminal to a server recorded by an earlier run.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be started.
    pub async fn reuse(&mut self, connection: &Connection) -> Result<RunOutcome> {
        self.transition(OrchestrationState::InteractiveHandoff)?;
        self.release_terminal();
        let backend = self.ports.backend;
        match backend.attach(connection).await {
            Ok(status) => {
                self.transition(OrchestrationState::Done)?;
                Ok(RunOutcome::Reused {
                    session_exit: exit_code(status),
                })
            }
            Err(err) => {
                self.transition(OrchestrationState::Failed)?;
                Err(err)
            }
        }
    }

    /// Provision, record, upload, execute and hand off.
    ///
    /// On any failure the run moves to `Failed` and, if no record was
    /// written yet, one is appended before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the failing step's error, [`ScriptExecutionError`] for a
    /// non-zero script exit, or [`RunError::Cancelled`].
    pub async fn execute(
        &mut self,
        plan: &ExecutionPlan<'_>,
        events: &dyn AgentEventSink,
    ) -> Result<RunOutcome> {
        match self.steps(plan, events).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.fail().await;
                Err(err)
            }
        }
    }

    async fn steps(
        &mut self,
        plan: &ExecutionPlan<'_>,
        events: &dyn AgentEventSink,
    ) -> Result<RunOutcome> {
        let backend = self.ports.backend;
        let cancel = self.ports.cancel;
        let reporter = self.ports.reporter;

        self.transition(OrchestrationState::Authenticating)?;
        reporter.step(&format!("authenticating with {}...", self.run.cloud));
        guarded(cancel, backend.authenticate()).await?;

        self.transition(OrchestrationState::SizingPrompted)?;
        guarded(cancel, backend.prompt_size(plan.custom)).await?;

        self.transition(OrchestrationState::Provisioning)?;
        reporter.step(&format!("creating server '{}'...", self.run.name));
        guarded(cancel, backend.create_server(self.run.name)).await?;

        self.transition(OrchestrationState::AwaitingReady)?;
        reporter.step("waiting for server to become ready...");
        guarded(cancel, backend.wait_for_ready()).await?;

        self.transition(OrchestrationState::ConfiguringShell)?;
        guarded(cancel, backend.configure_shell()).await?;

        self.transition(OrchestrationState::RecordingConnection)?;
        let record = self.record(backend.connection());
        self.ports.history.append(&record).await?;
        self.recorded = true;
        reporter.success(&format!(
            "server '{}' ready",
            backend.server_name().as_deref().unwrap_or(self.run.name)
        ));

        if !plan.config_files.is_empty() {
            self.transition(OrchestrationState::Uploading)?;
            for (path, contents) in plan.config_files {
                reporter.step(&format!("uploading {path}..."));
                guarded(cancel, backend.upload_file(path, contents)).await?;
            }
        }

        self.transition(OrchestrationState::Executing)?;
        if plan.mode == ExecMode::Interactive {
            self.release_terminal();
        }
        let job = ScriptJob {
            script: plan.script,
            env: plan.env,
            mode: plan.mode,
        };
        let status = guarded(cancel, backend.run_server(&job, events)).await?;
        if !status.success() {
            return Err(ScriptExecutionError {
                agent: self.run.agent.to_string(),
                cloud: self.run.cloud.to_string(),
                code: exit_code(status),
            }
            .into());
        }

        if plan.mode == ExecMode::Headless {
            self.transition(OrchestrationState::Done)?;
            return Ok(RunOutcome::Completed { session_exit: None });
        }

        self.transition(OrchestrationState::InteractiveHandoff)?;
        self.release_terminal();
        let status = backend
            .interactive_session(plan.launch_cmd, plan.env)
            .await?;
        self.transition(OrchestrationState::Done)?;
        Ok(RunOutcome::Completed {
            session_exit: Some(exit_code(status)),
        })
    }

    /// Enter `Failed` and flush the pending record.
    async fn fail(&mut self) {
        if self.state.can_transition(OrchestrationState::Failed) {
            self.state = OrchestrationState::Failed;
            self.log_state();
        }
        if self.recorded {
            return;
        }
        let record = self.record(self.ports.backend.connection());
        match self.ports.history.append(&record).await {
            Ok(()) => self.recorded = true,
            Err(err) => tracing::warn!(error = %err, "failed to record the failed run"),
        }
    }

    fn record(&self, connection: Option<Connection>) -> SpawnRecord {
        SpawnRecord {
            agent: self.run.agent.to_string(),
            cloud: self.run.cloud.to_string(),
            name: Some(self.run.name.to_string()),
            timestamp: Utc::now(),
            prompt: self.run.prompt.map(str::to_string),
            connection,
        }
    }

    /// Reset the terminal once, right before the first child inherits it.
    fn release_terminal(&mut self) {
        if !self.terminal_released {
            self.ports.ui.reset();
            self.terminal_released = true;
        }
    }

    fn transition(&mut self, next: OrchestrationState) -> Result<()> {
        if !self.state.can_transition(next) {
            bail!("illegal orchestration transition {} -> {next}", self.state);
        }
        self.state = next;
        self.log_state();
        Ok(())
    }

    fn log_state(&self) {
        tracing::debug!(
            state = %self.state,
            agent = self.run.agent,
            cloud = self.run.cloud,
            "orchestration state"
        );
    }
}

/// Race `fut` against cancellation.
///
/// # Errors
///
/// Returns [`RunError::Cancelled`] if the token fires first, otherwise the
/// future's own result.
pub async fn guarded<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RunError::Cancelled.into()),
        result = fut => result,
    }
}

/// Exit code, or `128 + signal` for a signalled child.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
