//! Matrix command: which agents run on which clouds.

use anyhow::Result;
use owo_colors::OwoColorize as _;
use serde::Serialize;
use spawn_common::Manifest;

use crate::app::AppContext;
use crate::commands::{load_manifest, print_json};

/// Implemented/total pairs.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MatrixSummary {
    pub implemented: usize,
    pub total: usize,
}

/// Count implemented pairs over the full agent × cloud grid.
#[must_use]
pub fn summarize(manifest: &Manifest) -> MatrixSummary {
    let implemented = manifest
        .agents
        .keys()
        .map(|agent| manifest.clouds_for(agent).len())
        .sum();
    MatrixSummary {
        implemented,
        total: manifest.agents.len() * manifest.clouds.len(),
    }
}

/// One text row per agent: `+` implemented, `-` missing, one column per cloud.
#[must_use]
pub fn grid_rows(manifest: &Manifest) -> Vec<(String, String)> {
    manifest
        .agents
        .keys()
        .map(|agent| {
            let cells: Vec<&str> = manifest
                .clouds
                .keys()
                .map(|cloud| {
                    if manifest.is_implemented(cloud, agent) {
                        "+"
                    } else {
                        "-"
                    }
                })
                .collect();
            (agent.clone(), cells.join(" "))
        })
        .collect()
}

/// Entry point for `spawn matrix`.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded.
pub async fn run(app: &AppContext) -> Result<()> {
    let manifest = load_manifest(app).await?;
    if app.is_json() {
        return print_json(&manifest.matrix);
    }

    let out = &app.output;
    let summary = summarize(&manifest);
    out.header(&format!(
        "Matrix ({} of {} combinations implemented)",
        summary.implemented, summary.total
    ));
    for (i, cloud) in manifest.clouds.keys().enumerate() {
        out.kv(&format!("{:>2}", i + 1), &cloud.style(out.styles.key).to_string());
    }
    println!();
    let width = manifest.agents.keys().map(String::len).max().unwrap_or(0);
    let header: Vec<String> = (1..=manifest.clouds.len())
        .map(|i| (i % 10).to_string())
        .collect();
    out.kv(&" ".repeat(width), &header.join(" "));
    for (agent, cells) in grid_rows(&manifest) {
        out.kv(&format!("{agent:<width$}"), &cells);
    }
    out.info("+ implemented, - missing");
    Ok(())
}
