//! Infrastructure implementations of the cloud backend capability traits.
//!
//! `LocalBackend<R>` runs everything on this machine. `ScriptBackend<R>`
//! leaves provisioning to the downloaded script and only checks credentials,
//! stages config files and hands off. Both route every process through a
//! `CommandRunner` so tests can inject a recording runner.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use spawn_common::{CloudDef, Connection};

use crate::application::ports::{
    AgentEventSink, BackendFactory, CloudProvisioner, CommandRunner, ExecMode, RemoteRunner,
    ScriptJob, SessionHandoff,
};
use crate::domain::credentials::missing_env_vars;
use crate::domain::error::ProvisioningError;
use crate::infra::event_stream::{self, MIN_UPDATE_INTERVAL};

/// Config paths from the manifest must stay inside the home or staging dir.
fn reject_parent_components(remote_path: &str) -> Result<()> {
    if Path::new(remote_path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ProvisioningError::Upload {
            path: remote_path.to_string(),
            message: "'..' is not allowed in config paths".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Cloud `type` handled by [`LocalBackend`].
pub const LOCAL_KIND: &str = "local";

/// Mutable per-run facts shared by both backends.
#[derive(Debug, Default)]
struct RunState {
    server_name: Option<String>,
    custom_size: bool,
    script_status: Option<ExitStatus>,
}

/// What both backends need to start the script.
struct ScriptHost<R> {
    runner: R,
    cloud_key: String,
    auth: String,
    env: HashMap<String, String>,
    state: Mutex<RunState>,
}

impl<R: CommandRunner> ScriptHost<R> {
    fn new(runner: R, cloud_key: &str, cloud: &CloudDef, env: HashMap<String, String>) -> Self {
        Self {
            runner,
            cloud_key: cloud_key.to_string(),
            auth: cloud.auth.clone(),
            env,
            state: Mutex::new(RunState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn authenticate(&self) -> Result<()> {
        let missing = missing_env_vars(&self.auth, &self.env);
        if missing.is_empty() {
            tracing::debug!(cloud = %self.cloud_key, "credentials present");
            return Ok(());
        }
        Err(ProvisioningError::MissingCredentials {
            cloud: self.cloud_key.clone(),
            vars: missing,
        }
        .into())
    }

    /// Write the script to a private temp file and run it with `bash`.
    async fn run_script(
        &self,
        job: &ScriptJob<'_>,
        extra: &[(&str, String)],
        events: &dyn AgentEventSink,
    ) -> Result<ExitStatus> {
        let file = tempfile::Builder::new()
            .prefix("spawn-")
            .suffix(".sh")
            .tempfile()
            .context("creating script file")?;
        std::fs::write(file.path(), job.script).context("writing script file")?;
        let path = file.path().to_string_lossy().into_owned();

        let mut env = job.env.clone();
        {
            let state = self.state();
            if let Some(name) = &state.server_name {
                env.insert("SPAWN_SERVER_NAME".to_string(), name.clone());
            }
            if state.custom_size {
                env.insert("SPAWN_CUSTOM".to_string(), "1".to_string());
            }
        }
        for (key, value) in extra {
            env.insert((*key).to_string(), value.clone());
        }

        let status = match job.mode {
            ExecMode::Interactive => self.runner.run_status("bash", &[&path], &env).await?,
            ExecMode::Headless => {
                env.insert("SPAWN_HEADLESS".to_string(), "1".to_string());
                let mut child = self.runner.spawn_piped("bash", &[&path], &env)?;
                if let Some(stdout) = child.stdout.take() {
                    event_stream::pump(stdout, events, MIN_UPDATE_INTERVAL).await;
                } else {
                    events.finish();
                }
                child.wait().await.context("waiting for script")?
            }
        };
        tracing::debug!(cloud = %self.cloud_key, code = ?status.code(), "script finished");
        self.state().script_status = Some(status);
        Ok(status)
    }
}

// ── Local ─────────────────────────────────────────────────────────────────────

/// Runs the agent on this machine.
pub struct LocalBackend<R> {
    host: ScriptHost<R>,
    home: PathBuf,
    user: String,
}

impl<R: CommandRunner> LocalBackend<R> {
    #[must_use]
    pub fn new(
        runner: R,
        cloud_key: &str,
        cloud: &CloudDef,
        env: HashMap<String, String>,
        home: PathBuf,
    ) -> Self {
        let user = env
            .get("USER")
            .or_else(|| env.get("USERNAME"))
            .cloned()
            .unwrap_or_else(|| "user".to_string());
        Self {
            host: ScriptHost::new(runner, cloud_key, cloud, env),
            home,
            user,
        }
    }

    /// `~/x` and relative paths land under the home directory.
    fn local_path(&self, remote_path: &str) -> PathBuf {
        let trimmed = remote_path.strip_prefix("~/").unwrap_or(remote_path);
        let path = Path::new(trimmed);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.home.join(path)
        }
    }
}

impl<R: CommandRunner> CloudProvisioner for LocalBackend<R> {
    async fn authenticate(&self) -> Result<()> {
        self.host.authenticate()
    }

    async fn prompt_size(&self, _custom: bool) -> Result<()> {
        Ok(())
    }

    async fn create_server(&self, name: &str) -> Result<()> {
        self.host.state().server_name = Some(name.to_string());
        Ok(())
    }

    async fn wait_for_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn configure_shell(&self) -> Result<()> {
        Ok(())
    }

    fn server_name(&self) -> Option<String> {
        self.host.state().server_name.clone()
    }

    fn connection(&self) -> Option<Connection> {
        let name = self.server_name()?;
        Some(Connection {
            ip: "localhost".to_string(),
            user: self.user.clone(),
            server_id: None,
            server_name: Some(name),
            cloud: Some(self.host.cloud_key.clone()),
            deleted: None,
            deleted_at: None,
        })
    }
}

impl<R: CommandRunner> RemoteRunner for LocalBackend<R> {
    async fn run_server(
        &self,
        job: &ScriptJob<'_>,
        events: &dyn AgentEventSink,
    ) -> Result<ExitStatus> {
        self.host.run_script(job, &[], events).await
    }

    async fn upload_file(&self, remote_path: &str, contents: &str) -> Result<()> {
        reject_parent_components(remote_path)?;
        let path = self.local_path(remote_path);
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, contents)
        };
        write().map_err(|err| {
            ProvisioningError::Upload {
                path: remote_path.to_string(),
                message: err.to_string(),
            }
            .into()
        })
    }
}

impl<R: CommandRunner> SessionHandoff for LocalBackend<R> {
    async fn interactive_session(
        &self,
        launch_cmd: &str,
        env: &IndexMap<String, String>,
    ) -> Result<ExitStatus> {
        self.host
            .runner
            .run_status("bash", &["-lc", launch_cmd], env)
            .await
    }

    async fn attach(&self, _connection: &Connection) -> Result<ExitStatus> {
        self.host
            .runner
            .run_status("bash", &["-l"], &IndexMap::new())
            .await
    }
}

// ── Script-driven remote ──────────────────────────────────────────────────────

/// Delegates provisioning to the downloaded script.
///
/// Config files are staged in a private directory exported to the script as
/// `SPAWN_CONFIG_DIR`. The script holds the agent session itself, so the
/// handoff returns the script's own status.
pub struct ScriptBackend<R> {
    host: ScriptHost<R>,
    staging: Mutex<Option<tempfile::TempDir>>,
}

impl<R: CommandRunner> ScriptBackend<R> {
    #[must_use]
    pub fn new(runner: R, cloud_key: &str, cloud: &CloudDef, env: HashMap<String, String>) -> Self {
        Self {
            host: ScriptHost::new(runner, cloud_key, cloud, env),
            staging: Mutex::new(None),
        }
    }

    fn staging_dir(&self) -> Option<PathBuf> {
        self.staging
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
    }

    fn stage(&self, remote_path: &str, contents: &str) -> std::io::Result<()> {
        let mut staging = self.staging.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = if let Some(dir) = staging.as_ref() {
            dir
        } else {
            staging.insert(tempfile::Builder::new().prefix("spawn-config-").tempdir()?)
        };
        let relative = remote_path.trim_start_matches("~/").trim_start_matches('/');
        let path = dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }
}

impl<R: CommandRunner> CloudProvisioner for ScriptBackend<R> {
    async fn authenticate(&self) -> Result<()> {
        self.host.authenticate()
    }

    async fn prompt_size(&self, custom: bool) -> Result<()> {
        self.host.state().custom_size = custom;
        Ok(())
    }

    async fn create_server(&self, name: &str) -> Result<()> {
        self.host.state().server_name = Some(name.to_string());
        Ok(())
    }

    async fn wait_for_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn configure_shell(&self) -> Result<()> {
        Ok(())
    }

    fn server_name(&self) -> Option<String> {
        self.host.state().server_name.clone()
    }

    fn connection(&self) -> Option<Connection> {
        None
    }
}

impl<R: CommandRunner> RemoteRunner for ScriptBackend<R> {
    async fn run_server(
        &self,
        job: &ScriptJob<'_>,
        events: &dyn AgentEventSink,
    ) -> Result<ExitStatus> {
        let extra: Vec<(&str, String)> = self
            .staging_dir()
            .map(|dir| ("SPAWN_CONFIG_DIR", dir.to_string_lossy().into_owned()))
            .into_iter()
            .collect();
        self.host.run_script(job, &extra, events).await
    }

    async fn upload_file(&self, remote_path: &str, contents: &str) -> Result<()> {
        reject_parent_components(remote_path)?;
        self.stage(remote_path, contents).map_err(|err| {
            ProvisioningError::Upload {
                path: remote_path.to_string(),
                message: err.to_string(),
            }
            .into()
        })
    }
}

impl<R: CommandRunner> SessionHandoff for ScriptBackend<R> {
    async fn interactive_session(
        &self,
        _launch_cmd: &str,
        _env: &IndexMap<String, String>,
    ) -> Result<ExitStatus> {
        let status = self.host.state().script_status;
        status.context("interactive session requested before the script ran")
    }

    async fn attach(&self, connection: &Connection) -> Result<ExitStatus> {
        let target = format!("{}@{}", connection.user, connection.ip);
        self.host
            .runner
            .run_status(
                "ssh",
                &["-t", "-o", "StrictHostKeyChecking=accept-new", &target],
                &IndexMap::new(),
            )
            .await
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// The backend chosen for one cloud.
pub enum AnyBackend<R> {
    Local(LocalBackend<R>),
    Script(ScriptBackend<R>),
}

macro_rules! dispatch {
    ($self:ident, $b:ident => $call:expr) => {
        match $self {
            AnyBackend::Local($b) => $call,
            AnyBackend::Script($b) => $call,
        }
    };
}

impl<R: CommandRunner> CloudProvisioner for AnyBackend<R> {
    async fn authenticate(&self) -> Result<()> {
        dispatch!(self, b => b.authenticate().await)
    }
    async fn prompt_size(&self, custom: bool) -> Result<()> {
        dispatch!(self, b => b.prompt_size(custom).await)
    }
    async fn create_server(&self, name: &str) -> Result<()> {
        dispatch!(self, b => b.create_server(name).await)
    }
    async fn wait_for_ready(&self) -> Result<()> {
        dispatch!(self, b => b.wait_for_ready().await)
    }
    async fn configure_shell(&self) -> Result<()> {
        dispatch!(self, b => b.configure_shell().await)
    }
    fn server_name(&self) -> Option<String> {
        dispatch!(self, b => b.server_name())
    }
    fn connection(&self) -> Option<Connection> {
        dispatch!(self, b => b.connection())
    }
}

impl<R: CommandRunner> RemoteRunner for AnyBackend<R> {
    async fn run_server(
        &self,
        job: &ScriptJob<'_>,
        events: &dyn AgentEventSink,
    ) -> Result<ExitStatus> {
        dispatch!(self, b => b.run_server(job, events).await)
    }
    async fn upload_file(&self, remote_path: &str, contents: &str) -> Result<()> {
        dispatch!(self, b => b.upload_file(remote_path, contents).await)
    }
}

impl<R: CommandRunner> SessionHandoff for AnyBackend<R> {
    async fn interactive_session(
        &self,
        launch_cmd: &str,
        env: &IndexMap<String, String>,
    ) -> Result<ExitStatus> {
        dispatch!(self, b => b.interactive_session(launch_cmd, env).await)
    }
    async fn attach(&self, connection: &Connection) -> Result<ExitStatus> {
        dispatch!(self, b => b.attach(connection).await)
    }
}

/// Picks `LocalBackend` for `type: local` clouds and `ScriptBackend` otherwise.
pub struct DefaultBackendFactory<R> {
    runner: R,
    env: HashMap<String, String>,
    home: PathBuf,
}

impl<R: CommandRunner + Clone> DefaultBackendFactory<R> {
    #[must_use]
    pub fn new(runner: R, env: HashMap<String, String>, home: PathBuf) -> Self {
        Self { runner, env, home }
    }
}

impl<R: CommandRunner + Clone> BackendFactory for DefaultBackendFactory<R> {
    type Backend = AnyBackend<R>;

    fn backend_for(&self, cloud_key: &str, cloud: &CloudDef) -> Result<Self::Backend> {
        tracing::debug!(cloud = cloud_key, kind = %cloud.kind, "selecting backend");
        let runner = self.runner.clone();
        let env = self.env.clone();
        Ok(if cloud.kind == LOCAL_KIND {
            AnyBackend::Local(LocalBackend::new(
                runner,
                cloud_key,
                cloud,
                env,
                self.home.clone(),
            ))
        } else {
            AnyBackend::Script(ScriptBackend::new(runner, cloud_key, cloud, env))
        })
    }
}
