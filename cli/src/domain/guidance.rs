//! User-facing "what to do next" text for every fatal error class.
//!
//! Pure functions only. Every fatal path prints what failed (the error's
//! `Display`), and the text produced here as the concrete next action.

use crate::domain::error::{DownloadError, ProvisioningError, ResolutionError, RunError};
use crate::domain::validate::Violation;

/// Command that lists every implemented agent/cloud combination.
pub const MATRIX_COMMAND: &str = "spawn matrix";

/// Where users report missing combinations.
pub const ISSUES_URL: &str = "https://github.com/OpenRouterTeam/spawn/issues";

/// Interpretation of a script exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitAdvice {
    /// One-line explanation of what the code usually means.
    pub summary: &'static str,
    /// Concrete next action.
    pub next_step: &'static str,
    /// Whether re-running the same command is likely to help.
    pub retryable: bool,
}

/// Map a script exit code to advice.
#[must_use]
pub fn exit_code_advice(code: i32) -> ExitAdvice {
    match code {
        1 | 127 => ExitAdvice {
            summary: "command not found or script bug",
            next_step: "This is not retryable as-is. Check the output above and report the failure if the script is at fault.",
            retryable: false,
        },
        126 => ExitAdvice {
            summary: "permission denied",
            next_step: "A command in the script is not executable. Check file permissions on the server, then re-run.",
            retryable: false,
        },
        130 => ExitAdvice {
            summary: "interrupted by user",
            next_step: "Not an error. Re-run the same command when you are ready.",
            retryable: true,
        },
        137 => ExitAdvice {
            summary: "killed, likely out-of-memory",
            next_step: "Choose a larger server size (re-run with --custom) and try again.",
            retryable: true,
        },
        255 => ExitAdvice {
            summary: "connection-layer failure",
            next_step: "The SSH/CLI connection dropped. This is retryable: re-run the same command.",
            retryable: true,
        },
        _ => ExitAdvice {
            summary: "the script reported an error",
            next_step: "Check the output above for the failing step, then re-run the same command.",
            retryable: false,
        },
    }
}

/// Summary text for an exit code (used by error `Display`).
#[must_use]
pub fn exit_summary(code: &i32) -> &'static str {
    exit_code_advice(*code).summary
}

/// Next action for a validation failure.
#[must_use]
pub fn validation(field_name: &str, reason: &Violation) -> String {
    match reason {
        Violation::Empty => format!("Provide a value for {field_name}."),
        Violation::TooLong { max } => {
            format!("Shorten {field_name} to at most {max} characters.")
        }
        Violation::InvalidCharacters { expected } => {
            format!("Use only {expected} in {field_name}.")
        }
        Violation::PathTraversal | Violation::ShellMetacharacters => format!(
            "Remove path separators and shell characters from {field_name}; they are never passed to a shell."
        ),
        Violation::DisallowedSyntax(_) => format!(
            "Simplify {field_name} to a single command with plain arguments (optionally preceded by 'source ... 2>/dev/null;' or 'export PATH=...;')."
        ),
        Violation::MissingShebang | Violation::DestructiveOperation(_) => format!(
            "The downloaded {field_name} was refused and not executed. Report it at {ISSUES_URL}."
        ),
        Violation::InjectionAttempt(_) => format!(
            "Rephrase the {field_name} without $(...), backticks or pipes into a shell."
        ),
    }
}

/// Next action for an unknown entity.
#[must_use]
pub fn resolution(err: &ResolutionError) -> String {
    match err {
        ResolutionError::Unknown {
            kind, suggestion, ..
        } => match suggestion {
            Some(s) if s.cross_kind => format!(
                "'{}' ({}) is a {}, not {}. Did you swap the arguments? Usage: spawn run <agent> <cloud>",
                s.key,
                s.display_name,
                kind.opposite(),
                kind.with_article()
            ),
            Some(s) => format!(
                "Did you mean '{}' ({})? Run '{}' to see all {}s.",
                s.key,
                s.display_name,
                kind.list_command(),
                kind
            ),
            None => format!("Run '{}' to see all {}s.", kind.list_command(), kind),
        },
        ResolutionError::NotImplemented { agent, cloud, .. } => format!(
            "Run '{MATRIX_COMMAND}' to see which clouds support {agent}, or request {cloud}/{agent} at {ISSUES_URL}."
        ),
    }
}

/// Next action for a failed script download.
#[must_use]
pub fn download(err: &DownloadError) -> String {
    match err {
        DownloadError::NotFound { .. } => format!(
            "This combination is not implemented. Verify with '{MATRIX_COMMAND}' and consider reporting it at {ISSUES_URL}."
        ),
        DownloadError::ServerError { .. } => {
            "The server is temporarily unavailable; try again shortly.".to_string()
        }
        DownloadError::Network { fallback_url, .. } => format!(
            "Connectivity issue: check your firewall or proxy settings. The script is also available at {fallback_url} for manual access."
        ),
        DownloadError::UnexpectedStatus { .. } => {
            "Try again shortly; if it persists, check your network proxy.".to_string()
        }
    }
}

/// Next action for a backend failure.
#[must_use]
pub fn provisioning(err: &ProvisioningError) -> String {
    match err {
        ProvisioningError::MissingCredentials { vars, .. } => format!(
            "Export {} and re-run. 'spawn clouds' shows which clouds have credentials.",
            vars.join(" and ")
        ),
        ProvisioningError::MissingEnv { vars, .. } => format!(
            "Export {} (your OpenRouter key is usually all that is needed) and re-run.",
            vars.join(" and ")
        ),
        ProvisioningError::Authentication { .. } => {
            "Check that your credentials are valid and not expired, then re-run.".to_string()
        }
        ProvisioningError::Creation { .. } | ProvisioningError::Readiness { .. } => {
            "Check the provider console for quota or capacity problems, then re-run. 'spawn list' shows the recorded attempt.".to_string()
        }
        ProvisioningError::ShellSetup { .. } | ProvisioningError::Upload { .. } => {
            "The server was created; 'spawn list' shows its connection. Re-run to retry the setup.".to_string()
        }
    }
}

/// Next action for run-control outcomes.
#[must_use]
pub fn run(err: &RunError) -> String {
    match err {
        RunError::Cancelled => {
            "Nothing further was started. 'spawn list' shows anything already created.".to_string()
        }
        RunError::DuplicateDeclined { .. } => {
            "Pass a different --name to start a new server alongside it.".to_string()
        }
    }
}
