//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator. Each carries the concrete next action in
//! [`guidance_for`].

use thiserror::Error;

use crate::domain::guidance;
use crate::domain::resolve::EntityKind;
use crate::domain::validate::Violation;

// ── Validation ────────────────────────────────────────────────────────────────

/// A value failed one of the validators in `domain::validate`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {field_name}: {reason}")]
pub struct ValidationError {
    pub field_name: String,
    pub reason: Violation,
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// A "did you mean" candidate, always shown with its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub key: String,
    pub display_name: String,
    /// `true` when the candidate belongs to the other entity kind.
    pub cross_kind: bool,
}

/// Unknown agent or cloud, or a pair the matrix marks missing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Unknown {kind}: '{input}'")]
    Unknown {
        kind: EntityKind,
        input: String,
        suggestion: Option<Suggestion>,
    },

    #[error("{agent_name} on {cloud_name} is not implemented yet")]
    NotImplemented {
        agent: String,
        agent_name: String,
        cloud: String,
        cloud_name: String,
    },
}

// ── Download ──────────────────────────────────────────────────────────────────

/// Both script sources failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownloadError {
    #[error("The script for {agent} on {cloud} doesn't exist (HTTP 404 from both sources)")]
    NotFound { agent: String, cloud: String },

    #[error("The script server is temporarily unavailable (HTTP {status})")]
    ServerError { status: u16 },

    #[error("Could not reach the script server: {message}")]
    Network { message: String, fallback_url: String },

    #[error("Script download failed (HTTP {status})")]
    UnexpectedStatus { status: u16 },
}

// ── Provisioning ──────────────────────────────────────────────────────────────

/// A backend step before the script ran failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("Missing credentials for {cloud}: {}", .vars.join(", "))]
    MissingCredentials { cloud: String, vars: Vec<String> },

    #[error("Missing environment for {agent}: {}", .vars.join(", "))]
    MissingEnv { agent: String, vars: Vec<String> },

    #[error("Authentication with {cloud} failed: {message}")]
    Authentication { cloud: String, message: String },

    #[error("Server creation on {cloud} failed: {message}")]
    Creation { cloud: String, message: String },

    #[error("Server on {cloud} did not become ready: {message}")]
    Readiness { cloud: String, message: String },

    #[error("Shell setup on {cloud} failed: {message}")]
    ShellSetup { cloud: String, message: String },

    #[error("Uploading {path} failed: {message}")]
    Upload { path: String, message: String },
}

// ── Script execution ──────────────────────────────────────────────────────────

/// The provisioning script exited non-zero.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("The {agent} script on {cloud} exited with code {code}: {}", guidance::exit_summary(.code))]
pub struct ScriptExecutionError {
    pub agent: String,
    pub cloud: String,
    pub code: i32,
}

// ── Run control ───────────────────────────────────────────────────────────────

/// Run-level outcomes that are neither input nor backend failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("Interrupted: the run was cancelled by a signal")]
    Cancelled,

    #[error("Cancelled: an active '{name}' already exists and was kept")]
    DuplicateDeclined { name: String },
}

/// Concrete next action for any typed error in the chain of `err`.
///
/// Returns `None` for errors that carry no guidance (I/O, parse failures
/// already wrapped with context).
#[must_use]
pub fn guidance_for(err: &anyhow::Error) -> Option<String> {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ValidationError>() {
            return Some(guidance::validation(&e.field_name, &e.reason));
        }
        if let Some(e) = cause.downcast_ref::<ResolutionError>() {
            return Some(guidance::resolution(e));
        }
        if let Some(e) = cause.downcast_ref::<DownloadError>() {
            return Some(guidance::download(e));
        }
        if let Some(e) = cause.downcast_ref::<ProvisioningError>() {
            return Some(guidance::provisioning(e));
        }
        if let Some(e) = cause.downcast_ref::<ScriptExecutionError>() {
            return Some(guidance::exit_code_advice(e.code).next_step.to_string());
        }
        if let Some(e) = cause.downcast_ref::<RunError>() {
            return Some(guidance::run(e));
        }
    }
    None
}
