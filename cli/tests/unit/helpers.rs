//! Shared test helpers: exit statuses and manifest fixtures.

#![allow(dead_code)]

use std::process::ExitStatus;

use spawn_common::{AgentDef, CloudDef, Connection, Manifest, MatrixStatus, SpawnRecord};

// ── Cross-platform ExitStatus construction ───────────────────────────────────

/// Build an `ExitStatus` from a logical exit code (0 = success, non-zero = failure).
///
/// On Unix the raw wait-status encodes the exit code in bits 8–15, so we shift.
/// On Windows `ExitStatusExt::from_raw` takes the exit code directly.
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// Two agents, two clouds; `hetzner/codex` is missing from the matrix.
pub fn manifest() -> Manifest {
    let mut m = Manifest::default();
    m.agents.insert(
        "claude".to_string(),
        AgentDef {
            name: "Claude Code".to_string(),
            launch: "claude".to_string(),
            env: [(
                "ANTHROPIC_API_KEY".to_string(),
                "${OPENROUTER_API_KEY}".to_string(),
            )]
            .into_iter()
            .collect(),
            ..AgentDef::default()
        },
    );
    m.agents.insert(
        "codex".to_string(),
        AgentDef {
            name: "Codex".to_string(),
            launch: "codex".to_string(),
            ..AgentDef::default()
        },
    );
    m.clouds.insert(
        "hetzner".to_string(),
        CloudDef {
            name: "Hetzner Cloud".to_string(),
            kind: "api".to_string(),
            auth: "HCLOUD_TOKEN".to_string(),
            ..CloudDef::default()
        },
    );
    m.clouds.insert(
        "local".to_string(),
        CloudDef {
            name: "Local Machine".to_string(),
            kind: "local".to_string(),
            auth: "none".to_string(),
            ..CloudDef::default()
        },
    );
    for (pair, status) in [
        ("hetzner/claude", MatrixStatus::Implemented),
        ("local/claude", MatrixStatus::Implemented),
        ("local/codex", MatrixStatus::Implemented),
        ("hetzner/codex", MatrixStatus::Missing),
    ] {
        m.matrix.insert(pair.to_string(), status);
    }
    m
}

pub fn connection(ip: &str) -> Connection {
    Connection {
        ip: ip.to_string(),
        user: "root".to_string(),
        server_id: None,
        server_name: None,
        cloud: None,
        deleted: None,
        deleted_at: None,
    }
}

pub fn record(agent: &str, cloud: &str, name: &str, connection: Option<Connection>) -> SpawnRecord {
    SpawnRecord {
        agent: agent.to_string(),
        cloud: cloud.to_string(),
        name: Some(name.to_string()),
        timestamp: chrono::Utc::now(),
        prompt: None,
        connection,
    }
}

pub const SCRIPT: &str = "#!/bin/bash\nset -eo pipefail\necho provisioning\n";
