//! Infrastructure implementation of the `CommandRunner` port.
//!
//! Every child is spawned with `kill_on_drop(true)`: when a caller's future
//! is dropped (cancellation), the process goes with it.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use indexmap::IndexMap;

use crate::application::ports::CommandRunner;

/// Production `CommandRunner` backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl CommandRunner for TokioCommandRunner {
    async fn run_status(
        &self,
        program: &str,
        args: &[&str],
        env: &IndexMap<String, String>,
    ) -> Result<ExitStatus> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .envs(env)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        child
            .wait()
            .await
            .with_context(|| format!("waiting for {program}"))
    }

    fn spawn_piped(
        &self,
        program: &str,
        args: &[&str],
        env: &IndexMap<String, String>,
    ) -> Result<tokio::process::Child> {
        tokio::process::Command::new(program)
            .args(args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))
    }
}
