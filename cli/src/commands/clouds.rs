//! Clouds command: clouds with credentials in the environment first.

use std::collections::HashMap;

use anyhow::Result;
use owo_colors::OwoColorize as _;
use serde::Serialize;
use spawn_common::Manifest;

use crate::app::AppContext;
use crate::commands::{load_manifest, print_json};
use crate::domain::credentials::parse_auth_env_vars;
use crate::domain::prioritize;

/// One row of `spawn clouds`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CloudRow {
    pub key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub credentialed: bool,
    /// Env vars the cloud authenticates with; empty for CLI/OAuth logins.
    pub auth_vars: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Listing order and summary for `spawn clouds`.
#[derive(Debug, Serialize)]
pub struct CloudListing {
    pub clouds: Vec<CloudRow>,
    pub credentialed: usize,
    pub total: usize,
}

/// Build the listing from the manifest and an environment snapshot.
#[must_use]
pub fn cloud_listing(manifest: &Manifest, env: &HashMap<String, String>) -> CloudListing {
    let keys: Vec<String> = manifest.clouds.keys().cloned().collect();
    let plan = prioritize(&keys, manifest, env);
    let clouds = plan
        .sorted_clouds
        .iter()
        .filter_map(|key| {
            let cloud = manifest.cloud(key)?;
            let hint = plan.hints.get(key).cloned();
            Some(CloudRow {
                key: key.clone(),
                name: cloud.name.clone(),
                kind: cloud.kind.clone(),
                credentialed: hint.is_some(),
                auth_vars: parse_auth_env_vars(&cloud.auth),
                hint,
            })
        })
        .collect();
    CloudListing {
        clouds,
        credentialed: plan.credentialed_count,
        total: keys.len(),
    }
}

/// `"N of M clouds have credentials"`.
#[must_use]
pub fn summary_line(credentialed: usize, total: usize) -> String {
    let verb = if credentialed == 1 { "has" } else { "have" };
    format!("{credentialed} of {total} clouds {verb} credentials")
}

/// Entry point for `spawn clouds`.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded.
pub async fn run(app: &AppContext) -> Result<()> {
    let manifest = load_manifest(app).await?;
    let listing = cloud_listing(&manifest, &app.env_snapshot());
    if app.is_json() {
        return print_json(&listing);
    }

    let out = &app.output;
    out.header(&format!("Clouds ({})", listing.total));
    let width = listing.clouds.iter().map(|c| c.key.len()).max().unwrap_or(0);
    for row in &listing.clouds {
        let detail = match (&row.hint, row.auth_vars.is_empty()) {
            (Some(hint), _) => hint.style(out.styles.success).to_string(),
            (None, true) => row.name.clone(),
            (None, false) => format!(
                "{} {}",
                row.name,
                format!("(needs {})", row.auth_vars.join(", ")).style(out.styles.dim)
            ),
        };
        out.kv(&format!("{:<width$}", row.key), &detail);
    }
    out.info(&summary_line(listing.credentialed, listing.total));
    Ok(())
}
