//! HTTP transport over reqwest.

use crate::{Destination, Payload, Receipt, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    identity: String,
}

#[derive(Debug, Deserialize)]
struct ReceiptResponse {
    receipt: Receipt,
}

/// Collector endpoint reached over HTTP(S).
///
/// - `GET  {base}/v1/identity` → `{"identity": "..."}`
/// - `POST {base}/v1/destinations/{name}/batches` → `{"receipt": "..."}`
#[derive(Clone)]
pub struct HttpTransport {
    http_client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpTransport {
    /// Create a transport for `base_url` with the default timeout.
    pub fn new(base_url: &str, api_key: Option<String>) -> TransportResult<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, api_key: Option<String>, timeout: Duration) -> TransportResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TransportError::Config(format!("invalid endpoint {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::Config(format!(
                "endpoint {} cannot be used as a base URL",
                base_url
            )));
        }

        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }

    fn url(&self, segments: &[&str]) -> TransportResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Config(format!("endpoint {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(header::AUTHORIZATION, format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn check_response(response: Response) -> TransportResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn endpoint(&self) -> String {
        self.base_url.to_string()
    }

    async fn probe(&self) -> TransportResult<String> {
        let url = self.url(&["v1", "identity"])?;
        debug!(url = %url, "Probing endpoint identity");

        let response = self.authorize(self.http_client.get(url)).send().await?;
        let body = Self::check_response(response).await?.bytes().await?;
        let parsed: IdentityResponse = serde_json::from_slice(&body)?;
        Ok(parsed.identity)
    }

    async fn transmit(&self, payload: &Payload, destination: &Destination) -> TransportResult<Receipt> {
        let url = self.url(&["v1", "destinations", destination.name(), "batches"])?;
        debug!(url = %url, bytes = payload.bytes.len(), "Posting batch payload");

        let mut request = self
            .authorize(self.http_client.post(url))
            .header(header::CONTENT_TYPE, payload.content_type)
            .body(payload.bytes.clone());
        if let Some(encoding) = payload.content_encoding {
            request = request.header(header::CONTENT_ENCODING, encoding);
        }

        let response = request.send().await?;
        let body = Self::check_response(response).await?.bytes().await?;
        let parsed: ReceiptResponse = serde_json::from_slice(&body)?;
        Ok(parsed.receipt)
    }

    async fn close(&self) -> TransportResult<()> {
        // reqwest releases pooled connections when the client is dropped.
        debug!(endpoint = %self.base_url, "HTTP transport closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, answer with `status` and `body`, and return
    /// the raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                request.extend_from_slice(&chunk[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            HttpTransport::new("not a url", None),
            Err(TransportError::Config(_))
        ));
        assert!(matches!(
            HttpTransport::new("mailto:ops@example.com", None),
            Err(TransportError::Config(_))
        ));
    }

    #[test]
    fn builds_urls_under_base_path() {
        let transport = HttpTransport::new("https://collector.example.com/ingest/", None).unwrap();
        let url = transport
            .url(&["v1", "destinations", "app events", "batches"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://collector.example.com/ingest/v1/destinations/app%20events/batches"
        );
    }

    #[tokio::test]
    async fn probe_returns_reported_identity() {
        let (base, server) = serve_once("200 OK", r#"{"identity":"collector-1"}"#).await;
        let transport = HttpTransport::new(&base, Some("secret".to_string())).unwrap();

        assert_eq!(transport.probe().await.unwrap(), "collector-1");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /v1/identity"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn transmit_posts_payload_with_headers() {
        let (base, server) = serve_once("202 Accepted", r#"{"receipt":"r-42"}"#).await;
        let transport = HttpTransport::new(&base, None).unwrap();
        let payload = Payload {
            bytes: br#"{"id":"b-1"}"#.to_vec(),
            content_type: "application/json",
            content_encoding: Some("zstd"),
        };

        let receipt = transport
            .transmit(&payload, &Destination::new("events"))
            .await
            .unwrap();
        assert_eq!(receipt, Receipt("r-42".to_string()));

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /v1/destinations/events/batches"));
        assert!(lower.contains("content-type: application/json"));
        assert!(lower.contains("content-encoding: zstd"));
        assert!(!lower.contains("authorization"));
        assert!(request.ends_with(r#"{"id":"b-1"}"#));
    }

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let (base, _server) = serve_once("503 Service Unavailable", r#"{"error":"overloaded"}"#).await;
        let transport = HttpTransport::new(&base, None).unwrap();
        let payload = Payload {
            bytes: b"{}".to_vec(),
            content_type: "application/json",
            content_encoding: None,
        };

        match transport.transmit(&payload, &Destination::default()).await {
            Err(TransportError::Status { status, message }) => {
                assert_eq!(status, 503);
                assert!(message.contains("overloaded"));
            }
            other => panic!("expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_response_is_json_error() {
        let (base, _server) = serve_once("200 OK", r#"{"unexpected":true}"#).await;
        let transport = HttpTransport::new(&base, None).unwrap();
        assert!(matches!(transport.probe().await, Err(TransportError::Json(_))));
    }
}
