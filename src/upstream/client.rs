//! HTTP client for the national cadastral WMS endpoint.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, REFERER, USER_AGENT};

use crate::config::UpstreamConfig;

/// Inbound headers forwarded to the upstream; everything else is dropped.
const FORWARDED_HEADERS: [reqwest::header::HeaderName; 4] =
    [REFERER, USER_AGENT, ACCEPT, AUTHORIZATION];

/// Final outcome of an upstream call (after the retry, if any).
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Upstream HTTP status.
    pub status: u16,
    /// Upstream Content-Type, when present.
    pub content_type: Option<String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    /// Whether this outcome is in the transient-failure band.
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Client for the fixed upstream map service.
#[derive(Debug)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    referer: HeaderValue,
    user_agent_fallback: HeaderValue,
    grace_period: Duration,
}

impl UpstreamClient {
    /// Build a client from validated configuration.
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            referer: HeaderValue::from_str(&config.referer)
                .expect("upstream referer validated at config load"),
            user_agent_fallback: HeaderValue::from_str(&config.user_agent_fallback)
                .expect("upstream user agent validated at config load"),
            grace_period: Duration::from_millis(config.grace_period_ms),
        }
    }

    /// Full upstream URL for a canonical query string.
    pub fn target_url(&self, query: &str) -> String {
        format!("{}?{}", self.base_url, query)
    }

    /// Perform the upstream call, retrying once after the grace period when
    /// the first attempt lands in the 5xx band.
    ///
    /// Transport errors are surfaced immediately; the retry applies only to
    /// server-side HTTP failures.
    pub async fn fetch(
        &self,
        query: &str,
        inbound: &HeaderMap,
    ) -> Result<UpstreamResponse, reqwest::Error> {
        let url = self.target_url(query);
        let headers = self.outbound_headers(inbound);

        let first = self
            .http
            .get(&url)
            .headers(headers.clone())
            .send()
            .await?;

        if first.status().is_server_error() {
            tracing::warn!(
                status = first.status().as_u16(),
                grace_ms = self.grace_period.as_millis() as u64,
                "Upstream returned 5xx, retrying once after grace period"
            );
            tokio::time::sleep(self.grace_period).await;

            let second = self.http.get(&url).headers(headers).send().await?;
            return Self::read_response(second).await;
        }

        Self::read_response(first).await
    }

    /// Reduce inbound headers to the forwarded subset, then apply the fixed
    /// Referer and the User-Agent fallback.
    fn outbound_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for name in FORWARDED_HEADERS {
            if let Some(value) = inbound.get(&name) {
                headers.insert(name, value.clone());
            }
        }

        // Upstream access control keys on this exact value.
        headers.insert(REFERER, self.referer.clone());

        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, self.user_agent_fallback.clone());
        }

        headers
    }

    async fn read_response(response: reqwest::Response) -> Result<UpstreamResponse, reqwest::Error> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response.bytes().await?.to_vec();

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}
