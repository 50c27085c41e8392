//! Command implementations

pub mod agents;
pub mod clouds;
pub mod list;
pub mod matrix;
pub mod run;
pub mod version;

use anyhow::Result;
use serde::Serialize;
use spawn_common::Manifest;

use crate::app::AppContext;
use crate::application::ports::ManifestSource;
use crate::output::progress;

/// Load the manifest behind a spinner.
///
/// # Errors
///
/// Returns an error if neither the network nor the cache yields a manifest.
pub async fn load_manifest(app: &AppContext) -> Result<Manifest> {
    let pb = app
        .output
        .show_progress()
        .then(|| progress::spinner("loading manifest..."));
    let result = app.manifest_loader().load_manifest(false).await;
    if let Some(pb) = pb {
        match &result {
            Ok(_) => pb.finish_and_clear(),
            Err(_) => progress::finish_error(&pb, "manifest unavailable"),
        }
    }
    result
}

/// Print `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
