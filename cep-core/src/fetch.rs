//! Single-shot HTTP GET used by every provider task.

use std::{fmt::Debug, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{config::HttpConfig, error::FetchError, model::ProviderRequest};

/// Transport seam between the race and the network.
#[async_trait]
pub trait Fetcher: Send + Sync + Debug {
    /// Issue exactly one request. Returns [`FetchError::Cancelled`] without
    /// touching the network when `cancel` has already fired.
    async fn fetch(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, max_body_bytes: config.max_body_bytes })
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            // The first chunk is enough for the error message.
            let head = res.chunk().await.ok().flatten().unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate_body(&String::from_utf8_lossy(&head)),
            });
        }

        let body = self.read_capped(res).await?;
        trace!(%url, bytes = body.len(), "response body read");
        Ok(body)
    }

    async fn read_capped(&self, mut res: Response) -> Result<Vec<u8>, FetchError> {
        let limit = self.max_body_bytes;
        let too_large = || FetchError::Read(format!("response body exceeds {limit} bytes"));

        if res.content_length().is_some_and(|len| len > limit as u64) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = res.chunk().await.map_err(|e| FetchError::Read(e.to_string()))? {
            if body.len() + chunk.len() > limit {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        debug!(provider = %request.provider(), url = request.url(), "sending request");

        // Dropping the request future aborts the connection and any body read.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            res = self.get(request.url()) => res,
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&HttpConfig::default()).expect("client must build")
    }

    fn request(url: impl Into<String>) -> ProviderRequest {
        ProviderRequest::new(ProviderId::new("test"), url)
    }

    #[tokio::test]
    async fn returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ws/01001000/json/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"cep":"01001-000"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let body = fetcher()
            .fetch(&request(format!("{}/ws/01001000/json/", server.uri())), &CancellationToken::new())
            .await
            .expect("fetch must succeed");

        assert_eq!(body, br#"{"cep":"01001-000"}"#);
    }

    #[tokio::test]
    async fn already_cancelled_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher().fetch(&request(server.uri()), &cancel).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }

    #[tokio::test]
    async fn cancellation_interrupts_slow_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = fetcher().fetch(&request(server.uri()), &cancel).await.unwrap_err();

        assert!(matches!(err, FetchError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string(r#"{"message":"CEP not found"}"#),
            )
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&request(server.uri()), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("CEP not found"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let err = fetcher()
            .fetch(&request(format!("http://{addr}/")), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
            .mount(&server)
            .await;

        let config = HttpConfig { max_body_bytes: 1024, ..HttpConfig::default() };
        let err = HttpFetcher::new(&config)
            .expect("client must build")
            .fetch(&request(server.uri()), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            FetchError::Read(msg) => assert!(msg.contains("1024 bytes")),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn body_at_the_limit_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(1024)))
            .mount(&server)
            .await;

        let config = HttpConfig { max_body_bytes: 1024, ..HttpConfig::default() };
        let body = HttpFetcher::new(&config)
            .expect("client must build")
            .fetch(&request(server.uri()), &CancellationToken::new())
            .await
            .expect("fetch must succeed");

        assert_eq!(body.len(), 1024);
    }

    #[tokio::test]
    async fn large_error_body_is_truncated_in_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("e".repeat(10_000)))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&request(server.uri()), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.starts_with("eee"));
                assert!(body.len() <= 203);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let truncated = truncate_body(&long);

        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
