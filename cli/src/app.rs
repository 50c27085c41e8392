//! Application context: unified state passed to every command handler.
//!
//! `AppContext` is created once in `Cli::run()` and owns the per-invocation
//! concerns: output, configuration, the state directory, run history and the
//! cancellation token that signals feed. Nothing here is process-global.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::application::ports::ConfigStore;
use crate::domain::SpawnConfig;
use crate::infra::config::{YamlConfigStore, default_state_dir};
use crate::infra::history::JsonHistoryStore;
use crate::infra::http::UreqFetcher;
use crate::infra::manifest::ManifestLoader;
use crate::output::OutputContext;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `SPAWN_YES` env vars).
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub output: OutputFlags,
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    pub mode: OutputMode,
    pub config: SpawnConfig,
    /// `~/.spawn`: history and the manifest cache.
    pub state_dir: PathBuf,
    pub history: JsonHistoryStore,
    /// When `true`, prompts take their default without asking.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `SPAWN_YES`
    /// environment variables are present.
    pub non_interactive: bool,
    /// Cancelled by SIGINT / SIGTERM once signal handling is installed.
    pub cancel: CancellationToken,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be found or the config
    /// file is malformed.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("SPAWN_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        let config = YamlConfigStore::default()
            .load()
            .context("loading configuration")?;
        let state_dir = default_state_dir()?;

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet || flags.output.json),
            mode,
            config,
            history: JsonHistoryStore::in_dir(&state_dir),
            state_dir,
            non_interactive,
            cancel: CancellationToken::new(),
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// HTTP client with the configured timeout.
    #[must_use]
    pub fn fetcher(&self) -> UreqFetcher {
        UreqFetcher::new(self.config.network.timeout())
    }

    /// Manifest loader honouring `SPAWN_MANIFEST` and the cache settings.
    #[must_use]
    pub fn manifest_loader(&self) -> ManifestLoader<UreqFetcher> {
        ManifestLoader::new(
            self.fetcher(),
            &self.config.sources.manifest_url,
            &self.state_dir,
            Duration::from_secs(self.config.manifest.max_age_secs),
        )
        .with_local_override(std::env::var_os("SPAWN_MANIFEST").map(PathBuf::from))
    }

    /// Snapshot of the process environment.
    #[must_use]
    pub fn env_snapshot(&self) -> HashMap<String, String> {
        std::env::vars().collect()
    }

    /// Home directory for local runs (the state directory's parent).
    #[must_use]
    pub fn home_dir(&self) -> PathBuf {
        self.state_dir
            .parent()
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
    }
}
