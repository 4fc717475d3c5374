use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use reqwest::Url;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::AnalysisOutcome;
use crate::utils::{char_len, preview};

use super::response::interpret_response;
use super::{AnalysisError, Corrector};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/grammar/check";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectorConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub timeout: Duration,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            language: None,
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Serialize)]
struct CorrectionRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

/// HTTP client for the remote grammar-check endpoint.
pub struct CorrectorClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
    language: Option<String>,
    timeout: Duration,
}

impl CorrectorClient {
    pub fn new(config: CorrectorConfig) -> Result<Self, AnalysisError> {
        let endpoint = parse_endpoint(&config.endpoint)?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|err| AnalysisError::ClientBuild(err.to_string()))?;

        let api_key = config
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        let language = config
            .language
            .map(|language| language.trim().to_string())
            .filter(|language| !language.is_empty());

        Ok(Self {
            http,
            endpoint,
            api_key,
            language,
            timeout: config.timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    pub async fn check(&self, text: &str) -> Result<AnalysisOutcome, AnalysisError> {
        let started = Instant::now();
        let payload = CorrectionRequest {
            text,
            language: self.language.as_deref(),
        };

        let mut request = self
            .http
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&payload);
        if let Some(api_key) = self.api_key.as_deref() {
            request = request.bearer_auth(api_key);
        }

        debug!(
            chars = char_len(text),
            excerpt = preview(text).as_str(),
            "sending text to correction service"
        );
        let response = request.send().await.map_err(classify_send_error)?;
        let status = response.status();
        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                AnalysisError::Timeout
            } else {
                AnalysisError::Body(err.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let outcome = interpret_response(&body, text);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            AnalysisOutcome::Parsed(result) => {
                info!(
                    elapsed_ms,
                    has_errors = result.has_errors,
                    error_count = result.error_count,
                    "correction service answered"
                );
            }
            AnalysisOutcome::Degraded { raw, .. } => {
                warn!(
                    elapsed_ms,
                    "correction response had no structured payload; treating text as clean"
                );
                debug!(raw = raw.as_str(), "unparsed correction response");
            }
        }

        Ok(outcome)
    }
}

impl Corrector for CorrectorClient {
    fn analyze<'a>(
        &'a self,
        text: &'a str,
    ) -> BoxFuture<'a, Result<AnalysisOutcome, AnalysisError>> {
        Box::pin(self.check(text))
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, AnalysisError> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::MissingEndpoint);
    }

    let url = Url::parse(trimmed).map_err(|err| AnalysisError::InvalidEndpoint {
        endpoint: trimmed.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AnalysisError::InvalidEndpoint {
            endpoint: trimmed.to_string(),
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }

    Ok(url)
}

fn classify_send_error(err: reqwest::Error) -> AnalysisError {
    if err.is_timeout() {
        AnalysisError::Timeout
    } else if err.is_connect() {
        AnalysisError::Connect(err.to_string())
    } else {
        AnalysisError::Request(err.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if char_len(trimmed) <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    async fn serve_once(status_line: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("listener address");

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept connection");
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            let _ = socket.shutdown().await;
            request
        });

        (format!("http://{address}/grammar/check"), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let read = socket.read(&mut chunk).await.expect("read request");
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);

            let Some(header_end) = buffer.windows(4).position(|window| window == b"\r\n\r\n")
            else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
        String::from_utf8_lossy(&buffer).to_string()
    }

    fn client_for(endpoint: String, timeout_ms: u64) -> CorrectorClient {
        CorrectorClient::new(CorrectorConfig {
            endpoint,
            api_key: Some("secret-token".to_string()),
            language: Some("en".to_string()),
            timeout: Duration::from_millis(timeout_ms),
        })
        .expect("client should build")
    }

    #[tokio::test]
    async fn posts_text_and_parses_fenced_payload() {
        let model_text = "Result:\n```json\n{\"hasErrors\":true,\"errorCount\":1,\"corrections\":[{\"type\":\"spelling\",\"original\":\"recieve\",\"correction\":\"receive\"}],\"correctedText\":\"I receive mail.\"}\n```";
        let body = serde_json::json!({ "message": "success", "data": model_text }).to_string();
        let (endpoint, server) = serve_once("200 OK", body).await;

        let outcome = client_for(endpoint, 5_000)
            .check("I recieve mail.")
            .await
            .expect("analysis should succeed");
        let request = server.await.expect("server task");

        assert!(request.starts_with("POST /grammar/check"));
        assert!(
            request
                .to_lowercase()
                .contains("authorization: bearer secret-token")
        );
        assert!(request.contains(r#""text":"I recieve mail.""#));
        assert!(request.contains(r#""language":"en""#));
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.result().corrected_text, "I receive mail.");
    }

    #[tokio::test]
    async fn unparsable_success_body_degrades() {
        let (endpoint, server) = serve_once("200 OK", "\"just some words\"".to_string()).await;

        let outcome = client_for(endpoint, 5_000)
            .check("Original text goes here.")
            .await
            .expect("degraded analysis is still a success");
        server.await.expect("server task");

        assert!(outcome.is_degraded());
        assert_eq!(outcome.result().corrected_text, "Original text goes here.");
    }

    #[tokio::test]
    async fn server_error_is_reported_with_status() {
        let (endpoint, server) =
            serve_once("500 Internal Server Error", r#"{"message":"boom"}"#.to_string()).await;

        let err = client_for(endpoint, 5_000)
            .check("Some text to check here.")
            .await
            .expect_err("500 should fail");
        server.await.expect("server task");

        assert!(matches!(err, AnalysisError::Status { status: 500, ref body } if body.contains("boom")));
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("listener address");
        drop(listener);

        let result = client_for(format!("http://{address}/grammar/check"), 2_000)
            .check("Some text to check here.")
            .await;

        assert!(matches!(
            result,
            Err(AnalysisError::Connect(_) | AnalysisError::Request(_))
        ));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("listener address");
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept connection");
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let result = client_for(format!("http://{address}/grammar/check"), 200)
            .check("Some text to check here.")
            .await;
        server.abort();

        assert!(matches!(result, Err(AnalysisError::Timeout)));
    }

    #[test]
    fn rejects_non_http_endpoints() {
        let result = CorrectorClient::new(CorrectorConfig {
            endpoint: "ftp://example.com/check".to_string(),
            ..CorrectorConfig::default()
        });
        assert!(matches!(result, Err(AnalysisError::InvalidEndpoint { .. })));

        let result = CorrectorClient::new(CorrectorConfig {
            endpoint: "   ".to_string(),
            ..CorrectorConfig::default()
        });
        assert!(matches!(result, Err(AnalysisError::MissingEndpoint)));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let truncated = truncate_body(&"x".repeat(500));
        assert_eq!(char_len(&truncated), MAX_ERROR_BODY_CHARS + 3);
    }
}
