//! HTTP transport for database downloads.
//!
//! The refresher only needs "send a request, get status + headers + body",
//! so the transport is a trait. [`HttpTransport`] implements it with
//! reqwest:
//!
//! - Conditional headers (`If-None-Match`, `If-Modified-Since`) when the
//!   request carries validators
//! - `304 Not Modified` is passed through as a response, any other
//!   non-success status is an error
//! - Max body bytes: 256MB (configurable)

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header};
use std::time::{Duration, Instant};

use geofresh_core::{AppConfig, Error};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// User agent string (default: "geofresh/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 256MB)
    pub max_bytes: usize,

    /// Request timeout (default: 60s)
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { user_agent: "geofresh/0.1".to_string(), max_bytes: 256 * 1024 * 1024, timeout: Duration::from_secs(60) }
    }
}

impl From<&AppConfig> for TransportConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), max_bytes: config.max_bytes, timeout: config.timeout() }
    }
}

/// Outbound download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: Url,
    /// Entity tag precondition.
    pub if_none_match: Option<String>,
    /// Last-modified precondition.
    pub if_modified_since: Option<String>,
}

impl DownloadRequest {
    pub fn unconditional(url: Url) -> Self {
        Self { url, if_none_match: None, if_modified_since: None }
    }

    pub fn is_conditional(&self) -> bool {
        self.if_none_match.is_some() || self.if_modified_since.is_some()
    }
}

/// Response to a download request.
#[derive(Debug, Clone)]
pub struct DownloadResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Response body bytes, empty for 304
    pub body: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// Sends download requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &DownloadRequest) -> Result<DownloadResponse, Error>;
}

/// reqwest-backed [`Transport`].
pub struct HttpTransport {
    http: Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: TransportConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

fn network_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::HttpError(format!("network error: {}", err)) }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &DownloadRequest) -> Result<DownloadResponse, Error> {
        let start = Instant::now();

        let mut builder = self.http.get(request.url.clone());
        if let Some(etag) = &request.if_none_match {
            builder = builder.header(header::IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &request.if_modified_since {
            builder = builder.header(header::IF_MODIFIED_SINCE, last_modified);
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();
        let headers = response.headers().clone();

        if status == StatusCode::NOT_MODIFIED {
            let fetch_ms = start.elapsed().as_millis() as u64;
            tracing::debug!(url = %request.url, fetch_ms, "origin reports database not modified");
            return Ok(DownloadResponse { status, headers, body: Bytes::new(), fetch_ms });
        }

        if !status.is_success() {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let body = response.bytes().await.map_err(network_error)?;

        if body.len() > self.config.max_bytes {
            return Err(self.too_large(body.len()));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(url = %request.url, status = status.as_u16(), bytes = body.len(), fetch_ms, "downloaded database");

        Ok(DownloadResponse { status, headers, body, fetch_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves one connection with a canned response and yields the raw request head.
    async fn serve_once(response: &'static str) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&head).to_lowercase()
        });

        (Url::parse(&format!("http://{addr}/GeoLite2-City.mmdb")).unwrap(), task)
    }

    fn transport(max_bytes: usize) -> HttpTransport {
        HttpTransport::new(TransportConfig { max_bytes, timeout: Duration::from_secs(5), ..Default::default() }).unwrap()
    }

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.user_agent, "geofresh/0.1");
        assert_eq!(config.max_bytes, 256 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_transport_config_from_app_config() {
        let app = AppConfig { user_agent: "geofresh-test/2".into(), max_bytes: 1024, timeout_ms: 1500, ..Default::default() };
        let config = TransportConfig::from(&app);
        assert_eq!(config.user_agent, "geofresh-test/2");
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_download_request_conditional() {
        let url = Url::parse("https://example.com/db.mmdb").unwrap();
        let request = DownloadRequest::unconditional(url.clone());
        assert!(!request.is_conditional());

        let request = DownloadRequest { if_none_match: Some("\"abc\"".into()), ..DownloadRequest::unconditional(url) };
        assert!(request.is_conditional());
    }

    #[tokio::test]
    async fn test_http_transport_new() {
        let transport = HttpTransport::new(TransportConfig::default());
        assert!(transport.is_ok());
    }

    #[tokio::test]
    async fn test_http_transport_unreachable_origin() {
        let config = TransportConfig { timeout: Duration::from_secs(2), ..Default::default() };
        let transport = HttpTransport::new(config).unwrap();
        // Port 9 on loopback (discard) is closed in test environments.
        let request = DownloadRequest::unconditional(Url::parse("http://127.0.0.1:9/db.mmdb").unwrap());
        let result = transport.send(&request).await;
        assert!(matches!(result, Err(Error::HttpError(_)) | Err(Error::FetchTimeout(_))));
    }

    #[tokio::test]
    async fn test_send_conditional_not_modified() {
        let (url, server) =
            serve_once("HTTP/1.1 304 Not Modified\r\nETag: \"v1\"\r\nConnection: close\r\n\r\n").await;
        let request = DownloadRequest {
            if_none_match: Some("\"v1\"".into()),
            if_modified_since: Some("Tue, 01 Oct 2024 10:00:00 GMT".into()),
            ..DownloadRequest::unconditional(url)
        };

        let response = transport(1024).send(&request).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_MODIFIED);
        assert!(response.body.is_empty());

        let head = server.await.unwrap();
        assert!(head.starts_with("get /geolite2-city.mmdb http/1.1"));
        assert!(head.contains("if-none-match: \"v1\"\r\n"));
        assert!(head.contains("if-modified-since: tue, 01 oct 2024 10:00:00 gmt\r\n"));
        assert!(head.contains("user-agent: geofresh/0.1\r\n"));
    }

    #[tokio::test]
    async fn test_send_unconditional_ok_with_body() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 9\r\nETag: \"v2\"\r\n\
             Last-Modified: Tue, 05 Nov 2024 10:00:00 GMT\r\nConnection: close\r\n\r\nmmdb-data",
        )
        .await;

        let response = transport(1024).send(&DownloadRequest::unconditional(url)).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"mmdb-data");
        assert_eq!(response.headers.get(header::ETAG).unwrap().to_str().unwrap(), "\"v2\"");
        assert_eq!(response.headers.get(header::LAST_MODIFIED).unwrap().to_str().unwrap(), "Tue, 05 Nov 2024 10:00:00 GMT");

        let head = server.await.unwrap();
        assert!(!head.contains("if-none-match"));
        assert!(!head.contains("if-modified-since"));
    }

    #[tokio::test]
    async fn test_send_server_error_is_http_error() {
        let (url, server) =
            serve_once("HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;

        let result = transport(1024).send(&DownloadRequest::unconditional(url)).await;
        assert!(matches!(result, Err(Error::HttpError(msg)) if msg == "status 500"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_chunked_body_over_limit() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n\
             10\r\n0123456789abcdef\r\n0\r\n\r\n",
        )
        .await;

        let err = transport(8).send(&DownloadRequest::unconditional(url)).await.unwrap_err();
        assert!(matches!(err, Error::FetchTooLarge(_)));
        assert_eq!(err.to_string(), "FETCH_TOO_LARGE: 16 bytes exceeds 8");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_declared_length_over_limit() {
        let (url, server) =
            serve_once("HTTP/1.1 200 OK\r\nContent-Length: 12\r\nConnection: close\r\n\r\n0123456789ab").await;

        let err = transport(8).send(&DownloadRequest::unconditional(url)).await.unwrap_err();
        assert_eq!(err.to_string(), "FETCH_TOO_LARGE: 12 bytes exceeds 8");
        server.await.unwrap();
    }
}
