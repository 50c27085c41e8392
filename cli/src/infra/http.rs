//! Infrastructure implementation of the `HttpFetcher` port using `ureq`.
//!
//! `ureq` is blocking, so each request runs on the blocking pool. The agent
//! carries the overall timeout; callers race the returned future against
//! cancellation.

use std::io::Read as _;
use std::time::Duration;

use crate::application::ports::{FetchResponse, HttpFetcher};

/// Upper bound on a script or manifest body.
const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

/// Blocking `ureq` agent behind an async facade.
#[derive(Clone)]
pub struct UreqFetcher {
    agent: ureq::Agent,
}

impl UreqFetcher {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("spawn-cli/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }

    /// Synchronous GET.
    #[must_use]
    pub fn get_sync(&self, url: &str) -> FetchResponse {
        match self.agent.get(url).call() {
            Ok(resp) if resp.status() == 200 => {
                let mut body = String::new();
                match resp
                    .into_reader()
                    .take(MAX_BODY_BYTES)
                    .read_to_string(&mut body)
                {
                    Ok(_) => FetchResponse::Ok(body),
                    Err(err) => FetchResponse::Transport(format!("reading response: {err}")),
                }
            }
            Ok(resp) => FetchResponse::Status(resp.status()),
            Err(ureq::Error::Status(code, _)) => FetchResponse::Status(code),
            Err(ureq::Error::Transport(transport)) => FetchResponse::Transport(transport.to_string()),
        }
    }
}

impl HttpFetcher for UreqFetcher {
    async fn get(&self, url: &str) -> FetchResponse {
        let fetcher = self.clone();
        let url = url.to_string();
        match tokio::task::spawn_blocking(move || fetcher.get_sync(&url)).await {
            Ok(response) => response,
            Err(err) => FetchResponse::Transport(format!("request task failed: {err}")),
        }
    }
}
