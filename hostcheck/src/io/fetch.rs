//! Synchronous HTTP GET used by the fetch helpers.
//!
//! The [`Fetcher`] trait decouples test units from the transport. Tests use
//! scripted fetchers that return predetermined results without touching the
//! network.

use std::time::Duration;

use tracing::{debug, instrument};

/// Result of one GET request. Never an error: callers decide what counts as
/// a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// 2xx response with its body.
    Body(String),
    /// Non-2xx response.
    Status(u16),
    /// The request never produced a response.
    Transport(String),
}

impl FetchResult {
    pub fn body(&self) -> Option<&str> {
        match self {
            FetchResult::Body(body) => Some(body),
            FetchResult::Status(_) | FetchResult::Transport(_) => None,
        }
    }
}

/// Abstraction over HTTP backends.
pub trait Fetcher {
    /// GET `url` with `params` appended as query parameters. Blocks until the
    /// response arrives or the transport gives up.
    fn get(&self, url: &str, params: &[(&str, &str)]) -> FetchResult;
}

/// Fetcher backed by a blocking `ureq` agent.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(skip(self, params), fields(params = params.len()))]
    fn get(&self, url: &str, params: &[(&str, &str)]) -> FetchResult {
        let request = self.agent.get(url).query_pairs(params.iter().copied());
        let result = match request.call() {
            Ok(mut response) => {
                let status = response.status();
                if !status.is_success() {
                    FetchResult::Status(status.as_u16())
                } else {
                    match response.body_mut().read_to_string() {
                        Ok(body) => FetchResult::Body(body),
                        Err(err) => FetchResult::Transport(err.to_string()),
                    }
                }
            }
            Err(ureq::Error::StatusCode(code)) => FetchResult::Status(code),
            Err(err) => FetchResult::Transport(err.to_string()),
        };
        debug!(ok = result.body().is_some(), "fetch finished");
        result
    }
}
