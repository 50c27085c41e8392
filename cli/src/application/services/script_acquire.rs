//! Application service: provisioning script download.
//!
//! Primary source first, fallback only when the primary does not answer
//! HTTP 200. A fetched body is validated before it is handed back.

use anyhow::Result;

use crate::application::ports::{FetchResponse, HttpFetcher};
use crate::domain::config::SourcesConfig;
use crate::domain::error::DownloadError;
use crate::domain::validate::validate_script_content;

/// Which source produced the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSource {
    Primary,
    Fallback,
}

/// A downloaded script that passed content validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredScript {
    pub text: String,
    pub source: ScriptSource,
    pub url: String,
}

/// Download and validate the script for `agent` on `cloud`.
///
/// # Errors
///
/// Returns a [`DownloadError`] when neither source yields HTTP 200, or a
/// `ValidationError` when the body fails content validation. A script that
/// fails validation is never retried from the other source.
pub async fn acquire_script(
    fetcher: &impl HttpFetcher,
    sources: &SourcesConfig,
    agent: &str,
    cloud: &str,
) -> Result<AcquiredScript> {
    let (primary_url, fallback_url) = sources.script_urls(cloud, agent);

    let primary = fetcher.get(&primary_url).await;
    tracing::debug!(url = %primary_url, response = ?summarize(&primary), "primary script fetch");
    if let FetchResponse::Ok(text) = primary {
        validate_script_content(&text).into_result()?;
        return Ok(AcquiredScript {
            text,
            source: ScriptSource::Primary,
            url: primary_url,
        });
    }

    let fallback = fetcher.get(&fallback_url).await;
    tracing::debug!(url = %fallback_url, response = ?summarize(&fallback), "fallback script fetch");
    if let FetchResponse::Ok(text) = fallback {
        validate_script_content(&text).into_result()?;
        return Ok(AcquiredScript {
            text,
            source: ScriptSource::Fallback,
            url: fallback_url,
        });
    }

    Err(classify_failure(agent, cloud, &primary, &fallback, fallback_url).into())
}

/// Map two failed responses onto one [`DownloadError`].
///
/// Precedence: any 5xx, then 404 from both, then any transport error,
/// then whatever status was seen.
#[must_use]
pub fn classify_failure(
    agent: &str,
    cloud: &str,
    primary: &FetchResponse,
    fallback: &FetchResponse,
    fallback_url: String,
) -> DownloadError {
    let responses = [primary, fallback];

    if let Some(status) = responses.iter().find_map(|r| match r {
        FetchResponse::Status(code) if *code >= 500 => Some(*code),
        _ => None,
    }) {
        return DownloadError::ServerError { status };
    }

    if responses
        .iter()
        .all(|r| matches!(r, FetchResponse::Status(404)))
    {
        return DownloadError::NotFound {
            agent: agent.to_string(),
            cloud: cloud.to_string(),
        };
    }

    if let Some(message) = responses.iter().find_map(|r| match r {
        FetchResponse::Transport(msg) => Some(msg.clone()),
        _ => None,
    }) {
        return DownloadError::Network {
            message,
            fallback_url,
        };
    }

    let status = responses
        .iter()
        .find_map(|r| match r {
            FetchResponse::Status(code) if *code != 404 => Some(*code),
            _ => None,
        })
        .unwrap_or(404);
    DownloadError::UnexpectedStatus { status }
}

/// Log-friendly form without the body.
fn summarize(response: &FetchResponse) -> String {
    match response {
        FetchResponse::Ok(body) => format!("200 ({} bytes)", body.len()),
        FetchResponse::Status(code) => code.to_string(),
        FetchResponse::Transport(msg) => format!("transport error: {msg}"),
    }
}
