//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::process`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod credentials;
pub mod env;
pub mod error;
pub mod guidance;
pub mod orchestration;
pub mod resolve;
pub mod validate;

pub use config::SpawnConfig;
pub use credentials::{CredentialPlan, parse_auth_env_vars, prioritize};
pub use error::{
    DownloadError, ProvisioningError, ResolutionError, RunError, ScriptExecutionError,
    ValidationError,
};
pub use orchestration::{AgentEvent, DuplicateChoice, OrchestrationState};
pub use resolve::{EntityKind, Resolution, SuggestionKind, resolve};
pub use validate::{ValidationOutcome, Violation};
