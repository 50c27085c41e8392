//! Credential-aware cloud ordering.
//!
//! Pure functions; the caller snapshots the process environment.

use std::collections::HashMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use spawn_common::Manifest;

#[allow(clippy::expect_used)]
static ENV_VAR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]{3,}$").expect("valid regex"));

/// Clouds ordered credentialed-first, with a hint per credentialed cloud.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPlan {
    pub sorted_clouds: Vec<String>,
    pub credentialed_count: usize,
    pub hints: IndexMap<String, String>,
}

/// Env var names required by an `auth` spec such as
/// `"UPCLOUD_USERNAME + UPCLOUD_PASSWORD"`.
///
/// Prose tokens (`"OAuth"`, `"none"`, CLI login phrases) are dropped.
#[must_use]
pub fn parse_auth_env_vars(auth: &str) -> Vec<String> {
    auth.split('+')
        .map(str::trim)
        .filter(|token| ENV_VAR_NAME.is_match(token))
        .map(str::to_string)
        .collect()
}

/// `true` when every required var is present and non-empty.
///
/// A cloud with no env-var credential is never "credentialed".
#[must_use]
pub fn has_credentials(auth: &str, env: &HashMap<String, String>) -> bool {
    let vars = parse_auth_env_vars(auth);
    !vars.is_empty()
        && vars
            .iter()
            .all(|var| env.get(var).is_some_and(|v| !v.is_empty()))
}

/// Required vars that are missing or empty in `env`.
#[must_use]
pub fn missing_env_vars(auth: &str, env: &HashMap<String, String>) -> Vec<String> {
    parse_auth_env_vars(auth)
        .into_iter()
        .filter(|var| env.get(var).is_none_or(String::is_empty))
        .collect()
}

/// Stable-partition `cloud_keys` into credentialed then uncredentialed.
///
/// Keys missing from the manifest are treated as uncredentialed.
#[must_use]
pub fn prioritize(
    cloud_keys: &[String],
    manifest: &Manifest,
    env: &HashMap<String, String>,
) -> CredentialPlan {
    let (credentialed, rest): (Vec<&String>, Vec<&String>) = cloud_keys.iter().partition(|key| {
        manifest
            .cloud(key)
            .is_some_and(|cloud| has_credentials(&cloud.auth, env))
    });

    let hints = credentialed
        .iter()
        .filter_map(|key| {
            let cloud = manifest.cloud(key)?;
            let about = if cloud.description.is_empty() {
                &cloud.name
            } else {
                &cloud.description
            };
            Some(((*key).clone(), format!("credentials detected -- {about}")))
        })
        .collect();

    CredentialPlan {
        credentialed_count: credentialed.len(),
        sorted_clouds: credentialed.into_iter().chain(rest).cloned().collect(),
        hints,
    }
}
