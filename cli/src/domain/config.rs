//! Domain types for spawn configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_MANIFEST_URL: &str = "https://openrouter.ai/labs/spawn/manifest.json";
pub const DEFAULT_CDN_BASE: &str = "https://openrouter.ai/labs/spawn";
pub const DEFAULT_FALLBACK_BASE: &str = "https://raw.githubusercontent.com/OpenRouterTeam/spawn/main";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MANIFEST_MAX_AGE_SECS: u64 = 3600;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.spawn/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SpawnConfig {
    pub sources: SourcesConfig,
    pub network: NetworkConfig,
    pub manifest: ManifestConfig,
}

/// Where the manifest and provisioning scripts come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourcesConfig {
    pub manifest_url: String,
    /// Primary script location.
    pub cdn_base: String,
    /// Used only when the primary does not answer HTTP 200.
    pub fallback_base: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            cdn_base: DEFAULT_CDN_BASE.to_string(),
            fallback_base: DEFAULT_FALLBACK_BASE.to_string(),
        }
    }
}

impl SourcesConfig {
    /// `(primary, fallback)` script URLs for a pair.
    #[must_use]
    pub fn script_urls(&self, cloud: &str, agent: &str) -> (String, String) {
        let path = format!("{cloud}/{agent}.sh");
        (
            format!("{}/{path}", self.cdn_base.trim_end_matches('/')),
            format!("{}/{path}", self.fallback_base.trim_end_matches('/')),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl NetworkConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ManifestConfig {
    /// Cached manifest older than this is refetched.
    pub max_age_secs: u64,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            max_age_secs: DEFAULT_MANIFEST_MAX_AGE_SECS,
        }
    }
}
