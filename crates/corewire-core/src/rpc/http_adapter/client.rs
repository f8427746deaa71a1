use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header;
use tracing::{debug, trace};

use crate::classify::ResponseBody;
use crate::encode::EncodedRequest;
use crate::error::{ConfigError, TransportError, TransportReason};

use super::super::{RawResponse, Transport};
use super::connection::{parse_connection, resolve_auth};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Node base URL, e.g. `http://127.0.0.1:8332`.
    pub url: String,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub cookie_file: Option<PathBuf>,
    /// Outbound request cap; `None` disables rate limiting.
    pub requests_per_second: Option<u32>,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            pass: None,
            cookie_file: None,
            requests_per_second: None,
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }
}

/// JSON-RPC over HTTP(S) with Basic auth.
///
/// Only moves bytes: every status and body is handed back as a
/// [`RawResponse`] for classification. Errors are limited to failures
/// where no response arrived at all.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth: Option<(String, String)>,
    limiter: Option<DirectRateLimiter>,
}

impl HttpTransport {
    pub fn new(config: &HttpTransportConfig) -> Result<Self, ConfigError> {
        let auth = resolve_auth(
            config.user.as_deref(),
            config.pass.as_deref(),
            config.cookie_file.as_deref(),
        )?;
        let base_url = parse_connection(&config.url)?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let limiter = match config.requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or(ConfigError::ZeroRateLimit)?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            client,
            base_url,
            auth,
            limiter,
        })
    }

    /// Full URL for a request path (`/` or `/wallet/<name>`).
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &EncodedRequest) -> Result<RawResponse, TransportError> {
        self.wait_for_rate_limit().await;

        let mut builder = self
            .client
            .post(self.url_for(&request.path))
            .header(header::CONTENT_TYPE, "application/json")
            .json(request);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder.send().await.map_err(no_response)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(no_response)?;
        debug!(
            rpc.id = %request.id,
            rpc.method = request.method,
            status,
            body_len = body.len(),
            "rpc response"
        );
        trace!(rpc.id = %request.id, body = %body, "rpc response body");

        Ok(RawResponse {
            status,
            body: ResponseBody::from_text(body),
        })
    }
}

fn no_response(err: reqwest::Error) -> TransportError {
    let reason = if err.is_timeout() {
        TransportReason::Timeout
    } else {
        TransportReason::ConnectionFailed
    };
    TransportError::connection(reason, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_appends_wallet_paths() {
        let transport = HttpTransport::new(&HttpTransportConfig::new("http://127.0.0.1:18443/"))
            .expect("valid config");
        assert_eq!(transport.url_for("/"), "http://127.0.0.1:18443/");
        assert_eq!(
            transport.url_for("/wallet/cold%20storage"),
            "http://127.0.0.1:18443/wallet/cold%20storage"
        );
        assert_eq!(transport.url_for(""), "http://127.0.0.1:18443/");
        assert_eq!(transport.url_for("wallet/x"), "http://127.0.0.1:18443/wallet/x");
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let mut config = HttpTransportConfig::new("http://127.0.0.1:18443");
        config.requests_per_second = Some(0);
        assert!(matches!(
            HttpTransport::new(&config),
            Err(ConfigError::ZeroRateLimit)
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_a_non_retryable_transport_error() {
        // Port 9 (discard) is closed on test hosts.
        let mut config = HttpTransportConfig::new("http://127.0.0.1:9");
        config.connect_timeout = Duration::from_millis(500);
        config.timeout = Duration::from_secs(1);
        let transport = HttpTransport::new(&config).expect("valid config");

        let request = EncodedRequest {
            jsonrpc: "1.0",
            id: "1".into(),
            method: "getblockcount",
            params: Vec::new(),
            path: "/".into(),
        };
        let err = transport.execute(&request).await.expect_err("nothing listens");
        assert!(matches!(
            err.reason,
            TransportReason::ConnectionFailed | TransportReason::Timeout
        ));
        assert_eq!(err.status, None);
        assert!(!err.is_retryable());
    }
}
