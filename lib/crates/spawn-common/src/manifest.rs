// lib/crates/spawn-common/src/manifest.rs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of an agent or cloud key.
pub const MAX_KEY_LEN: usize = 64;

/// Catalog of agents, clouds and the implementation matrix (`manifest.json`).
///
/// Maps are insertion-ordered: ordering is significant for suggestion
/// tie-breaks and for listing output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub agents: IndexMap<String, AgentDef>,
    #[serde(default)]
    pub clouds: IndexMap<String, CloudDef>,
    /// `"cloud/agent"` → status.
    #[serde(default)]
    pub matrix: IndexMap<String, MatrixStatus>,
}

/// One agent definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDef {
    /// Display name, e.g. `"Claude Code"`.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub install: String,
    #[serde(default)]
    pub launch: String,
    /// Env var template. Values may reference `${VAR}` from the caller's env.
    #[serde(default)]
    pub env: IndexMap<String, String>,
    /// Remote path → file body, pushed before the script runs.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub config_files: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One cloud (provider) definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudDef {
    /// Display name, e.g. `"Hetzner Cloud"`.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    /// Provider type tag: `vm`, `cloud`, `cli`, `local`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Credential spec: env var names joined by `+`, or a sentinel such as `"none"`.
    #[serde(default)]
    pub auth: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Implementation status of a cloud/agent pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatrixStatus {
    Implemented,
    Missing,
}

/// Structural problems in a manifest that passed JSON parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("invalid {kind} key '{key}': must match ^[a-z0-9_-]+$ (max 64 chars)")]
    InvalidKey { kind: &'static str, key: String },

    #[error("malformed matrix key '{0}': expected 'cloud/agent'")]
    MalformedMatrixKey(String),

    #[error("matrix entry '{entry}' references unknown {kind} '{key}'")]
    DanglingReference {
        entry: String,
        kind: &'static str,
        key: String,
    },
}

/// Returns `true` if `key` is a well-formed manifest key.
#[must_use]
pub fn is_manifest_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

impl Manifest {
    /// Matrix key for a pair.
    #[must_use]
    pub fn matrix_key(cloud: &str, agent: &str) -> String {
        format!("{cloud}/{agent}")
    }

    #[must_use]
    pub fn agent(&self, key: &str) -> Option<&AgentDef> {
        self.agents.get(key)
    }

    #[must_use]
    pub fn cloud(&self, key: &str) -> Option<&CloudDef> {
        self.clouds.get(key)
    }

    /// Returns `true` only when the matrix marks the pair `implemented`.
    #[must_use]
    pub fn is_implemented(&self, cloud: &str, agent: &str) -> bool {
        self.matrix.get(&Self::matrix_key(cloud, agent)) == Some(&MatrixStatus::Implemented)
    }

    /// Cloud keys with an implemented script for `agent`, in manifest order.
    #[must_use]
    pub fn clouds_for(&self, agent: &str) -> Vec<&str> {
        self.clouds
            .keys()
            .filter(|cloud| self.is_implemented(cloud, agent))
            .map(String::as_str)
            .collect()
    }

    /// Check key shapes and matrix references.
    ///
    /// # Errors
    ///
    /// Returns the first structural violation found.
    pub fn validate(&self) -> Result<(), ManifestError> {
        for key in self.agents.keys() {
            if !is_manifest_key(key) {
                return Err(ManifestError::InvalidKey {
                    kind: "agent",
                    key: key.clone(),
                });
            }
        }
        for key in self.clouds.keys() {
            if !is_manifest_key(key) {
                return Err(ManifestError::InvalidKey {
                    kind: "cloud",
                    key: key.clone(),
                });
            }
        }
        for entry in self.matrix.keys() {
            let Some((cloud, agent)) = entry.split_once('/') else {
                return Err(ManifestError::MalformedMatrixKey(entry.clone()));
            };
            if !self.clouds.contains_key(cloud) {
                return Err(ManifestError::DanglingReference {
                    entry: entry.clone(),
                    kind: "cloud",
                    key: cloud.to_string(),
                });
            }
            if !self.agents.contains_key(agent) {
                return Err(ManifestError::DanglingReference {
                    entry: entry.clone(),
                    kind: "agent",
                    key: agent.to_string(),
                });
            }
        }
        Ok(())
    }
}
