//! Orchestration states, the legal transitions between them, and the small
//! value types the run lifecycle passes around.

use std::fmt;

use serde::Deserialize;

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationState {
    Idle,
    CheckingDuplicate,
    Authenticating,
    SizingPrompted,
    Provisioning,
    AwaitingReady,
    ConfiguringShell,
    RecordingConnection,
    Uploading,
    Executing,
    InteractiveHandoff,
    Done,
    Failed,
}

impl OrchestrationState {
    /// `true` for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self → next` is a legal move.
    ///
    /// The path is linear, except that the duplicate check may fall back
    /// to `Idle` (spawn new), jump to `InteractiveHandoff` (reuse), or
    /// fail (cancel); uploading is optional; headless runs finish straight
    /// from `Executing`. Any non-terminal state may fail.
    #[must_use]
    pub fn can_transition(self, next: Self) -> bool {
        use OrchestrationState::{
            AwaitingReady, Authenticating, CheckingDuplicate, ConfiguringShell, Done, Executing,
            Failed, Idle, InteractiveHandoff, Provisioning, RecordingConnection, SizingPrompted,
            Uploading,
        };
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, CheckingDuplicate | Authenticating)
                | (CheckingDuplicate, Idle | InteractiveHandoff)
                | (Authenticating, SizingPrompted)
                | (SizingPrompted, Provisioning)
                | (Provisioning, AwaitingReady)
                | (AwaitingReady, ConfiguringShell)
                | (ConfiguringShell, RecordingConnection)
                | (RecordingConnection, Uploading | Executing)
                | (Uploading, Executing)
                | (Executing, InteractiveHandoff | Done)
                | (InteractiveHandoff, Done)
        )
    }
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::CheckingDuplicate => "checking-duplicate",
            Self::Authenticating => "authenticating",
            Self::SizingPrompted => "sizing",
            Self::Provisioning => "provisioning",
            Self::AwaitingReady => "awaiting-ready",
            Self::ConfiguringShell => "configuring-shell",
            Self::RecordingConnection => "recording-connection",
            Self::Uploading => "uploading",
            Self::Executing => "executing",
            Self::InteractiveHandoff => "interactive-handoff",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// User's answer when an active run with the same name exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateChoice {
    Reuse,
    SpawnNew,
    Cancel,
}

/// Server name used when `--name` is absent: `spawn-<agent>-<8 hex>`.
#[must_use]
pub fn default_server_name(agent: &str, entropy: u32) -> String {
    format!("spawn-{agent}-{entropy:08x}")
}

/// One structured line from a headless agent's stdout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
}

impl AgentEvent {
    /// Parse a stdout line; `None` for anything that is not a JSON object
    /// with a string `type`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            return None;
        }
        serde_json::from_str(trimmed).ok()
    }

    /// Short status text for a spinner.
    #[must_use]
    pub fn summary(&self) -> String {
        match (&self.tool, &self.message) {
            (Some(tool), _) => format!("{}: {tool}", self.kind),
            (None, Some(msg)) => {
                let first = msg.lines().next().unwrap_or_default();
                format!("{}: {first}", self.kind)
            }
            (None, None) => self.kind.clone(),
        }
    }
}
