//! Agents command

use anyhow::Result;
use owo_colors::OwoColorize as _;
use serde::Serialize;
use spawn_common::Manifest;

use crate::app::AppContext;
use crate::commands::{load_manifest, print_json};

/// One row of `spawn agents`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AgentRow {
    pub key: String,
    pub name: String,
    pub description: String,
    /// Clouds with an implemented script.
    pub clouds: usize,
}

/// Rows in manifest order.
#[must_use]
pub fn agent_rows(manifest: &Manifest) -> Vec<AgentRow> {
    manifest
        .agents
        .iter()
        .map(|(key, agent)| AgentRow {
            key: key.clone(),
            name: agent.name.clone(),
            description: agent.description.clone(),
            clouds: manifest.clouds_for(key).len(),
        })
        .collect()
}

/// Entry point for `spawn agents`.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded.
pub async fn run(app: &AppContext) -> Result<()> {
    let manifest = load_manifest(app).await?;
    let rows = agent_rows(&manifest);
    if app.is_json() {
        return print_json(&rows);
    }

    let out = &app.output;
    out.header(&format!("Agents ({})", rows.len()));
    let width = rows.iter().map(|r| r.key.len()).max().unwrap_or(0);
    for row in &rows {
        let about = if row.description.is_empty() {
            &row.name
        } else {
            &row.description
        };
        let noun = if row.clouds == 1 { "cloud" } else { "clouds" };
        out.kv(
            &format!("{:<width$}", row.key),
            &format!(
                "{about} {}",
                format!("({} {noun})", row.clouds).style(out.styles.dim)
            ),
        );
    }
    out.info("run: spawn run <agent> <cloud>");
    Ok(())
}
