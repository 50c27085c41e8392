//! Infrastructure implementation of the `ManifestSource` port.
//!
//! Lookup order: an explicit local file (`SPAWN_MANIFEST`), a fresh disk
//! cache, the network, and finally a stale cache when the network fails.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use spawn_common::Manifest;

use crate::application::ports::{FetchResponse, HttpFetcher, ManifestSource};

/// Parse and structurally validate manifest JSON.
///
/// # Errors
///
/// Returns an error if the text is not a valid manifest.
pub fn parse_manifest(text: &str) -> Result<Manifest> {
    let manifest: Manifest = serde_json::from_str(text).context("parsing manifest JSON")?;
    manifest.validate().context("manifest failed validation")?;
    Ok(manifest)
}

/// Cache-backed manifest loader.
pub struct ManifestLoader<F> {
    fetcher: F,
    url: String,
    cache_path: PathBuf,
    max_age: Duration,
    local_override: Option<PathBuf>,
}

impl<F: HttpFetcher> ManifestLoader<F> {
    #[must_use]
    pub fn new(fetcher: F, url: &str, state_dir: &Path, max_age: Duration) -> Self {
        Self {
            fetcher,
            url: url.to_string(),
            cache_path: state_dir.join("manifest.json"),
            max_age,
            local_override: None,
        }
    }

    /// Always read this file instead of the cache or network.
    #[must_use]
    pub fn with_local_override(mut self, path: Option<PathBuf>) -> Self {
        self.local_override = path;
        self
    }

    fn read_cache(&self) -> Option<(Manifest, bool)> {
        let meta = std::fs::metadata(&self.cache_path).ok()?;
        let fresh = meta
            .modified()
            .ok()
            .and_then(|m| m.elapsed().ok())
            .is_some_and(|age| age <= self.max_age);
        let text = std::fs::read_to_string(&self.cache_path).ok()?;
        match parse_manifest(&text) {
            Ok(manifest) => Some((manifest, fresh)),
            Err(err) => {
                tracing::warn!(path = %self.cache_path.display(), error = %err, "ignoring bad manifest cache");
                None
            }
        }
    }

    fn write_cache(&self, text: &str) {
        let result = self
            .cache_path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&self.cache_path, text));
        if let Err(err) = result {
            tracing::warn!(path = %self.cache_path.display(), error = %err, "could not cache manifest");
        }
    }
}

impl<F: HttpFetcher> ManifestSource for ManifestLoader<F> {
    async fn load_manifest(&self, force_refresh: bool) -> Result<Manifest> {
        if let Some(path) = &self.local_override {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading manifest {}", path.display()))?;
            return parse_manifest(&text).with_context(|| format!("in {}", path.display()));
        }

        let cached = match (!force_refresh).then(|| self.read_cache()).flatten() {
            Some((manifest, true)) => {
                tracing::debug!(path = %self.cache_path.display(), "using cached manifest");
                return Ok(manifest);
            }
            stale => stale,
        };

        let response = self.fetcher.get(&self.url).await;
        tracing::debug!(url = %self.url, ok = matches!(response, FetchResponse::Ok(_)), "manifest fetch");
        let failure = match response {
            FetchResponse::Ok(text) => match parse_manifest(&text) {
                Ok(manifest) => {
                    self.write_cache(&text);
                    return Ok(manifest);
                }
                Err(err) => format!("{err:#}"),
            },
            FetchResponse::Status(code) => format!("HTTP {code}"),
            FetchResponse::Transport(msg) => msg,
        };

        let stale = if force_refresh { self.read_cache() } else { cached };
        if let Some((manifest, _)) = stale {
            tracing::warn!(url = %self.url, reason = %failure, "manifest fetch failed; using cached copy");
            return Ok(manifest);
        }
        anyhow::bail!("cannot load the manifest from {}: {failure}", self.url)
    }
}
