// SPDX-License-Identifier: MIT
//! Reachability probing: the [`Prober`] trait and its HTTP implementation.
//!
//! A probe answers one question: did a round trip to the target complete?
//! Any completed HTTP response counts as reachable, including error statuses;
//! a 503 still proves the network path works. Only transport-level failures
//! (DNS, connect, TLS, reset) report unreachable.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header;
use std::time::Duration;
use url::Url;

/// Hard ceiling on a single probe attempt. The monitor owns the countdown so
/// a wedged [`Prober`] implementation cannot stall the schedule.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Marker header attached to every probe request, so operators can filter
/// probe traffic out of access logs.
pub const PROBE_HEADER: &str = "x-netwatch-probe";

/// Query parameter appended to defeat caches between us and the target.
pub const CACHE_BUST_PARAM: &str = "nocache";

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Other(String),
}

/// A single reachability attempt against a target URL.
///
/// Implementations must be cancel-safe: the monitor drops the future on
/// timeout or shutdown, so no cleanup may depend on running to completion.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Url) -> Result<(), ProbeError>;
}

/// Default [`Prober`]: a HEAD request with cache-defeating headers and a
/// unique query string per attempt.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("netwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Uses a caller-provided client, e.g. to share a connection pool or
    /// configure a proxy.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn bust_cache(target: &Url) -> Url {
        let mut url = target.clone();
        url.query_pairs_mut()
            .append_pair(CACHE_BUST_PARAM, &Utc::now().timestamp_millis().to_string());
        url
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &Url) -> Result<(), ProbeError> {
        let url = Self::bust_cache(target);
        self.client
            .head(url)
            .header(header::CACHE_CONTROL, "no-cache, no-store")
            .header(header::PRAGMA, "no-cache")
            .header(PROBE_HEADER, "1")
            .send()
            .await?;
        // Status is irrelevant; the response arriving is the signal.
        Ok(())
    }
}
