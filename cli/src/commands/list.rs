//! List command: previous runs, newest first.

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize as _;
use spawn_common::SpawnRecord;

use crate::app::AppContext;
use crate::application::ports::HistoryStore;
use crate::commands::print_json;

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Only runs of this agent
    #[arg(short, long)]
    pub agent: Option<String>,

    /// Only runs on this cloud
    #[arg(short, long)]
    pub cloud: Option<String>,
}

/// Filter by agent/cloud and order newest first.
#[must_use]
pub fn select(
    mut records: Vec<SpawnRecord>,
    agent: Option<&str>,
    cloud: Option<&str>,
) -> Vec<SpawnRecord> {
    records.retain(|r| {
        agent.is_none_or(|a| r.agent == a) && cloud.is_none_or(|c| r.cloud == c)
    });
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records
}

/// `"active"` or `"deleted"`.
#[must_use]
pub fn status_label(record: &SpawnRecord) -> &'static str {
    if record.is_active() { "active" } else { "deleted" }
}

/// Entry point for `spawn list`.
///
/// # Errors
///
/// Returns an error if the history file cannot be read.
pub async fn run(app: &AppContext, args: &ListArgs) -> Result<()> {
    let records = select(
        app.history.load().await?,
        args.agent.as_deref(),
        args.cloud.as_deref(),
    );
    if app.is_json() {
        return print_json(&records);
    }

    let out = &app.output;
    if records.is_empty() {
        out.info("no runs yet; start one with: spawn run <agent> <cloud>");
        return Ok(());
    }
    out.header(&format!("Runs ({})", records.len()));
    for record in &records {
        let when = record.timestamp.format("%Y-%m-%d %H:%M");
        let status = status_label(record);
        let status = if record.is_active() {
            status.style(out.styles.success).to_string()
        } else {
            status.style(out.styles.dim).to_string()
        };
        let target = record
            .connection
            .as_ref()
            .map(|c| format!(" {}@{}", c.user, c.ip))
            .unwrap_or_default();
        out.kv(
            &when.to_string(),
            &format!(
                "{} on {} {} {status}{target}",
                record.agent.style(out.styles.key),
                record.cloud,
                record.name.as_deref().unwrap_or("-"),
            ),
        );
    }
    Ok(())
}
