//! Application service: `spawn run <agent> <cloud>`.
//!
//! Resolve and validate the inputs, explain the credential situation,
//! check for a duplicate, download the script and hand the rest to the
//! [`Orchestrator`]. Imports only from `crate::domain` and
//! `crate::application`.

use std::collections::HashMap;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use spawn_common::{AgentDef, CloudDef, Manifest};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    AgentEventSink, BackendFactory, ExecMode, HistoryStore, HttpFetcher, ManifestSource,
    ProgressReporter, TerminalUi,
};
use crate::application::services::orchestrator::{
    DuplicateOutcome, ExecutionPlan, Orchestrator, OrchestratorPorts, RunIdentity, RunOutcome,
    guarded,
};
use crate::application::services::script_acquire::{ScriptSource, acquire_script};
use crate::domain::config::SourcesConfig;
use crate::domain::credentials::{has_credentials, missing_env_vars, parse_auth_env_vars};
use crate::domain::env::interpolate;
use crate::domain::error::{ProvisioningError, ResolutionError};
use crate::domain::orchestration::default_server_name;
use crate::domain::resolve::{EntityKind, display_name, resolve_key};
use crate::domain::validate::{
    validate_identifier, validate_launch_cmd, validate_prompt, validate_server_identifier,
};

/// Raw user input for one run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub agent: String,
    pub cloud: String,
    pub prompt: Option<String>,
    /// User-chosen server name; enables the duplicate check.
    pub name: Option<String>,
    pub dry_run: bool,
    /// Ask for a server size instead of the provider default.
    pub custom: bool,
    pub headless: bool,
}

/// Ports the pipeline drives.
pub struct RunPorts<'a, M, H, F, B, U, P> {
    pub manifest: &'a M,
    pub history: &'a H,
    pub fetcher: &'a F,
    pub backends: &'a B,
    pub ui: &'a U,
    pub reporter: &'a P,
    pub events: &'a dyn AgentEventSink,
}

/// Per-invocation inputs that are not user flags.
pub struct RunEnvironment<'a> {
    pub sources: &'a SourcesConfig,
    /// Snapshot of the process environment.
    pub env: &'a HashMap<String, String>,
    pub cancel: &'a CancellationToken,
    /// Randomness for the generated server name.
    pub name_entropy: u32,
}

/// Whether the chosen cloud's credentials are in the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStatus {
    Detected,
    Missing(Vec<String>),
    /// The cloud authenticates without env vars (CLI login, local).
    NotRequired,
}

/// What `--dry-run` would have done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunPreview {
    pub agent: String,
    pub agent_name: String,
    pub cloud: String,
    pub cloud_name: String,
    pub server_name: String,
    pub credentials: CredentialStatus,
    pub launch_cmd: String,
    /// Names only; values are never shown.
    pub env_names: Vec<String>,
    pub has_prompt: bool,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSummary {
    Preview(DryRunPreview),
    Completed {
        agent: String,
        cloud: String,
        server_name: String,
        source: ScriptSource,
        session_exit: Option<i32>,
    },
    Reused {
        server_name: String,
        session_exit: i32,
    },
}

/// Everything derived from the request before any side effect.
struct PreparedRun<'m> {
    agent_key: String,
    cloud_key: String,
    agent: &'m AgentDef,
    cloud: &'m CloudDef,
    server_name: String,
    launch_cmd: String,
    script_env: IndexMap<String, String>,
    missing_refs: Vec<String>,
    credentials: CredentialStatus,
}

/// Run the pipeline.
///
/// # Errors
///
/// Returns the first validation, resolution, download, provisioning,
/// script or cancellation error; see `domain::error`.
pub async fn run_pipeline<M, H, F, B, U, P>(
    ports: &RunPorts<'_, M, H, F, B, U, P>,
    env: &RunEnvironment<'_>,
    request: &RunRequest,
) -> Result<RunSummary>
where
    M: ManifestSource,
    H: HistoryStore,
    F: HttpFetcher,
    B: BackendFactory,
    U: TerminalUi,
    P: ProgressReporter,
{
    let manifest = guarded(env.cancel, ports.manifest.load_manifest(false))
        .await
        .context("loading manifest")?;
    let prepared = prepare(&manifest, env, request)?;

    match &prepared.credentials {
        CredentialStatus::Detected => ports.reporter.info(&format!(
            "{}: credentials detected -- {}",
            prepared.cloud_key,
            if prepared.cloud.description.is_empty() {
                &prepared.cloud.name
            } else {
                &prepared.cloud.description
            }
        )),
        CredentialStatus::Missing(vars) => ports.reporter.warn(&format!(
            "{} expects {} in the environment",
            prepared.cloud_key,
            vars.join(", ")
        )),
        CredentialStatus::NotRequired => {}
    }

    if request.dry_run {
        return Ok(RunSummary::Preview(preview(&prepared, request)));
    }

    if !prepared.missing_refs.is_empty() {
        return Err(ProvisioningError::MissingEnv {
            agent: prepared.agent.name.clone(),
            vars: prepared.missing_refs.clone(),
        }
        .into());
    }

    let backend = ports
        .backends
        .backend_for(&prepared.cloud_key, prepared.cloud)?;
    let mut orchestrator = Orchestrator::new(
        OrchestratorPorts {
            backend: &backend,
            history: ports.history,
            ui: ports.ui,
            reporter: ports.reporter,
            cancel: env.cancel,
        },
        RunIdentity {
            agent: &prepared.agent_key,
            cloud: &prepared.cloud_key,
            name: &prepared.server_name,
            prompt: request.prompt.as_deref(),
        },
    );

    if let DuplicateOutcome::Reuse(connection) =
        orchestrator.check_duplicate(request.name.is_some()).await?
    {
        ports.reporter.step(&format!(
            "reconnecting to '{}' at {}...",
            prepared.server_name, connection.ip
        ));
        let RunOutcome::Reused { session_exit } = orchestrator.reuse(&connection).await? else {
            anyhow::bail!("reuse finished without a session");
        };
        return Ok(RunSummary::Reused {
            server_name: prepared.server_name,
            session_exit,
        });
    }

    ports.reporter.step(&format!(
        "downloading {}/{}.sh...",
        prepared.cloud_key, prepared.agent_key
    ));
    let script = guarded(
        env.cancel,
        acquire_script(
            ports.fetcher,
            env.sources,
            &prepared.agent_key,
            &prepared.cloud_key,
        ),
    )
    .await?;
    if script.source == ScriptSource::Fallback {
        ports.reporter.warn(&format!(
            "primary script source unavailable; used fallback {}",
            script.url
        ));
    }

    let plan = ExecutionPlan {
        script: &script.text,
        launch_cmd: &prepared.launch_cmd,
        env: &prepared.script_env,
        config_files: &prepared.agent.config_files,
        custom: request.custom,
        mode: if request.headless {
            ExecMode::Headless
        } else {
            ExecMode::Interactive
        },
    };
    let outcome = orchestrator.execute(&plan, ports.events).await?;
    let session_exit = match outcome {
        RunOutcome::Completed { session_exit } => session_exit,
        RunOutcome::Reused { session_exit } => Some(session_exit),
    };

    Ok(RunSummary::Completed {
        agent: prepared.agent_key,
        cloud: prepared.cloud_key,
        server_name: prepared.server_name,
        source: script.source,
        session_exit,
    })
}

/// Resolve, validate and derive everything the run needs. No I/O.
fn prepare<'m>(
    manifest: &'m Manifest,
    env: &RunEnvironment<'_>,
    request: &RunRequest,
) -> Result<PreparedRun<'m>> {
    let agent_key = resolve_key(EntityKind::Agent, &request.agent, manifest)?;
    let cloud_key = resolve_key(EntityKind::Cloud, &request.cloud, manifest)?;
    validate_identifier(&agent_key, "agent").into_result()?;
    validate_identifier(&cloud_key, "cloud").into_result()?;
    if let Some(name) = &request.name {
        validate_server_identifier(name).into_result()?;
    }
    if let Some(prompt) = &request.prompt {
        validate_prompt(prompt).into_result()?;
    }

    if !manifest.is_implemented(&cloud_key, &agent_key) {
        return Err(ResolutionError::NotImplemented {
            agent_name: display_name(EntityKind::Agent, &agent_key, manifest),
            cloud_name: display_name(EntityKind::Cloud, &cloud_key, manifest),
            agent: agent_key,
            cloud: cloud_key,
        }
        .into());
    }

    let agent = manifest
        .agent(&agent_key)
        .with_context(|| format!("agent '{agent_key}' missing from manifest"))?;
    let cloud = manifest
        .cloud(&cloud_key)
        .with_context(|| format!("cloud '{cloud_key}' missing from manifest"))?;

    validate_launch_cmd(&agent.launch).into_result()?;
    let launch_cmd = match agent.launch.trim() {
        "" => agent_key.clone(),
        cmd => cmd.to_string(),
    };

    let server_name = request
        .name
        .clone()
        .unwrap_or_else(|| default_server_name(&agent_key, env.name_entropy));

    let resolved = interpolate(&agent.env, env.env)?;
    let mut script_env = resolved.vars;
    script_env.insert("SPAWN_AGENT".to_string(), agent_key.clone());
    script_env.insert("SPAWN_CLOUD".to_string(), cloud_key.clone());
    script_env.insert("SPAWN_NAME".to_string(), server_name.clone());
    script_env.insert("SPAWN_LAUNCH_CMD".to_string(), launch_cmd.clone());
    if let Some(prompt) = &request.prompt {
        script_env.insert("SPAWN_PROMPT".to_string(), prompt.clone());
    }

    let credentials = if parse_auth_env_vars(&cloud.auth).is_empty() {
        CredentialStatus::NotRequired
    } else if has_credentials(&cloud.auth, env.env) {
        CredentialStatus::Detected
    } else {
        CredentialStatus::Missing(missing_env_vars(&cloud.auth, env.env))
    };

    Ok(PreparedRun {
        agent_key,
        cloud_key,
        agent,
        cloud,
        server_name,
        launch_cmd,
        script_env,
        missing_refs: resolved.missing,
        credentials,
    })
}

fn preview(prepared: &PreparedRun<'_>, request: &RunRequest) -> DryRunPreview {
    DryRunPreview {
        agent: prepared.agent_key.clone(),
        agent_name: prepared.agent.name.clone(),
        cloud: prepared.cloud_key.clone(),
        cloud_name: prepared.cloud.name.clone(),
        server_name: prepared.server_name.clone(),
        credentials: prepared.credentials.clone(),
        launch_cmd: prepared.launch_cmd.clone(),
        env_names: prepared.script_env.keys().cloned().collect(),
        has_prompt: request.prompt.is_some(),
    }
}
