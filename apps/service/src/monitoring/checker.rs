use std::time::{Duration, Instant};

use reqwest::redirect::Policy;
use tokio::time::timeout;
use tracing::debug;

use super::types::ProbeOutcome;
use crate::models::{Check, Method};

/// Issues the outbound request for a check
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Probe the check once and reduce the result to a [`ProbeOutcome`]
    async fn probe(&self, check: &Check) -> ProbeOutcome;
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// HTTP/HTTPS prober
///
/// Redirects are not followed so that 3xx codes can be listed as success codes.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .user_agent(concat!("uptime-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, check: &Check) -> ProbeOutcome {
        let url = match check.url() {
            Ok(url) => url,
            Err(e) => return ProbeOutcome::Transport(format!("invalid URL: {e}")),
        };

        let budget = Duration::from_secs(check.timeout_seconds);
        let start = Instant::now();

        // Whichever of the response and the deadline comes first wins; the
        // other future is dropped.
        let request = self.client.request(check.method.into(), url).send();
        let outcome = match timeout(budget, request).await {
            Err(_) => ProbeOutcome::Timeout,
            Ok(Err(e)) if e.is_timeout() => ProbeOutcome::Timeout,
            Ok(Err(e)) => ProbeOutcome::Transport(e.to_string()),
            Ok(Ok(response)) => ProbeOutcome::Response(response.status().as_u16()),
        };

        debug!(
            check_id = %check.id,
            latency_ms = start.elapsed().as_millis() as u64,
            %outcome,
            "Probe finished"
        );

        outcome
    }
}
