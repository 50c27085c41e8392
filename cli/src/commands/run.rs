//! Run command: wires the production adapters into the run pipeline.

use std::io::Read as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use owo_colors::OwoColorize as _;
use uuid::Uuid;

use crate::app::AppContext;
use crate::application::ports::{AgentEventSink, NoEvents, TerminalUi};
use crate::application::services::run_pipeline::{
    CredentialStatus, DryRunPreview, RunEnvironment, RunPorts, RunRequest, RunSummary,
    run_pipeline,
};
use crate::domain::error::ValidationError;
use crate::domain::validate::{MAX_PROMPT_LEN, Violation};
use crate::infra::backend::DefaultBackendFactory;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::signal::cancel_on_signal;
use crate::infra::terminal::DialoguerUi;
use crate::output::OutputContext;
use crate::output::events::EventSpinner;
use crate::output::reporter::TerminalReporter;

/// Arguments for the run command.
#[derive(Args)]
#[command(group(ArgGroup::new("prompt_input").args(["prompt", "prompt_file"])))]
pub struct RunArgs {
    /// Agent key (e.g. claude, codex)
    pub agent: String,

    /// Cloud key (e.g. hetzner, local)
    pub cloud: String,

    /// Task for the agent
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Read the task from a file
    #[arg(long, value_name = "PATH")]
    pub prompt_file: Option<PathBuf>,

    /// Server name; reusing a name offers to reconnect
    #[arg(short, long)]
    pub name: Option<String>,

    /// Show what would happen without downloading or creating anything
    #[arg(long)]
    pub dry_run: bool,

    /// Choose the server size instead of the provider default
    #[arg(long)]
    pub custom: bool,

    /// Run without a terminal session, streaming agent events
    #[arg(long, requires = "prompt_input")]
    pub headless: bool,
}

/// Entry point for `spawn run`.
///
/// # Errors
///
/// Returns any pipeline error; `main` turns it into guidance and exit 1.
pub async fn run(app: &AppContext, args: RunArgs) -> Result<()> {
    let prompt = match (&args.prompt, &args.prompt_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(read_prompt_file(path)?),
        (None, None) => None,
    };
    let request = RunRequest {
        agent: args.agent,
        cloud: args.cloud,
        prompt,
        name: args.name,
        dry_run: args.dry_run,
        custom: args.custom,
        headless: args.headless,
    };

    cancel_on_signal(&app.cancel)?;

    let env = app.env_snapshot();
    let manifest = app.manifest_loader();
    let fetcher = app.fetcher();
    let backends = DefaultBackendFactory::new(TokioCommandRunner, env.clone(), app.home_dir());
    let ui = DialoguerUi::new(app.non_interactive);
    let reporter = TerminalReporter::new(&app.output);
    let spinner;
    let events: &dyn AgentEventSink = if request.headless {
        spinner = EventSpinner::new(&app.output, "waiting for agent events...");
        &spinner
    } else {
        &NoEvents
    };

    let ports = RunPorts {
        manifest: &manifest,
        history: &app.history,
        fetcher: &fetcher,
        backends: &backends,
        ui: &ui,
        reporter: &reporter,
        events,
    };
    let run_env = RunEnvironment {
        sources: &app.config.sources,
        env: &env,
        cancel: &app.cancel,
        name_entropy: name_entropy(),
    };

    let summary = run_pipeline(&ports, &run_env, &request).await;
    ui.reset();
    app.cancel.cancel();

    match summary? {
        RunSummary::Preview(preview) => print_preview(&app.output, &preview),
        RunSummary::Completed {
            agent,
            cloud,
            server_name,
            session_exit,
            ..
        } => {
            app.output
                .success(&format!("{agent} on {cloud} finished (server '{server_name}')"));
            report_session_exit(&app.output, session_exit);
        }
        RunSummary::Reused {
            server_name,
            session_exit,
        } => {
            app.output
                .success(&format!("session on '{server_name}' ended"));
            report_session_exit(&app.output, Some(session_exit));
        }
    }
    Ok(())
}

/// Read at most one byte past the prompt limit so oversized files are
/// rejected as too long without loading them whole.
fn read_prompt_file(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open prompt file {}", path.display()))?;
    let mut bytes = Vec::with_capacity(MAX_PROMPT_LEN + 1);
    file.take(MAX_PROMPT_LEN as u64 + 1)
        .read_to_end(&mut bytes)
        .with_context(|| format!("cannot read prompt file {}", path.display()))?;
    if bytes.len() > MAX_PROMPT_LEN {
        return Err(ValidationError {
            field_name: "prompt".to_string(),
            reason: Violation::TooLong { max: MAX_PROMPT_LEN },
        }
        .into());
    }
    String::from_utf8(bytes)
        .with_context(|| format!("prompt file {} is not valid UTF-8", path.display()))
}

fn report_session_exit(output: &OutputContext, code: Option<i32>) {
    if let Some(code) = code.filter(|c| *c != 0) {
        output.info(&format!("agent session exited with code {code}"));
    }
}

/// Print the dry-run preview. Environment values are never shown.
pub fn print_preview(output: &OutputContext, preview: &DryRunPreview) {
    output.header("Dry run: nothing will be downloaded or created");
    output.kv(
        "agent  ",
        &format!(
            "{} ({})",
            preview.agent.style(output.styles.key),
            preview.agent_name
        ),
    );
    output.kv(
        "cloud  ",
        &format!(
            "{} ({})",
            preview.cloud.style(output.styles.key),
            preview.cloud_name
        ),
    );
    output.kv("server ", &preview.server_name);
    output.kv("creds  ", &credential_line(&preview.credentials));
    output.kv("launch ", &preview.launch_cmd);
    output.kv("env    ", &preview.env_names.join(", "));
    output.kv("prompt ", if preview.has_prompt { "provided" } else { "none" });
}

/// One-line credential summary for the preview.
#[must_use]
pub fn credential_line(status: &CredentialStatus) -> String {
    match status {
        CredentialStatus::Detected => "detected".to_string(),
        CredentialStatus::Missing(vars) => format!("missing {}", vars.join(", ")),
        CredentialStatus::NotRequired => "not required".to_string(),
    }
}

/// Entropy for the generated server name.
fn name_entropy() -> u32 {
    Uuid::new_v4().as_fields().0
}
