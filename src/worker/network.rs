//! Network abstraction for testability.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};

use super::http::{Request, Response};
use crate::error::{Error, Result};

/// Abstraction over the network leg of a fetch.
///
/// An `Err` means the transport failed. Any HTTP status, including 4xx and
/// 5xx, is a successful fetch.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetches `request` from the origin.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Default network implementation using `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestNetwork {
    client: reqwest::Client,
}

impl ReqwestNetwork {
    /// Builds a client with pooled keep-alive connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Network for ReqwestNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let mut builder = self.client.get(request.url().clone());
        if request.is_reload() {
            builder = builder
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reqwest_network_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReqwestNetwork>();
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_failure() {
        let network = ReqwestNetwork::new().unwrap();
        // Port 9 on localhost (discard) is closed on test machines.
        let request = Request::parse("http://127.0.0.1:9/index.html").unwrap();
        let err = network.fetch(&request).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
