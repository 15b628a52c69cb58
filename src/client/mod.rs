//! Client for the external inference service.
//!
//! A single blocking POST per screening. No retries and no caching; the caller
//! decides what to do with each failure category.

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use crate::codec::WireMessage;
use crate::config::ScreeningConfig;
use crate::error::{Result, ScreeningError};

/// Content type of the wire message.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Transport that delivers a wire message and returns the raw response body.
pub trait WireClient: Send + Sync {
    /// Send the message; `Ok` carries the body of a 2xx response.
    fn send(&self, message: WireMessage) -> Result<String>;
}

/// HTTP implementation backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpWireClient {
    client: Client,
    endpoint: String,
    timeout_ms: u64,
}

impl HttpWireClient {
    /// Build a client for the configured endpoint and timeout.
    pub fn new(config: &ScreeningConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ScreeningError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint_url.clone(),
            timeout_ms: config.timeout_ms,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> ScreeningError {
        if err.is_timeout() {
            ScreeningError::TransportError(format!(
                "request to {} timed out after {} ms",
                self.endpoint, self.timeout_ms
            ))
        } else {
            ScreeningError::TransportError(format!("request to {} failed: {}", self.endpoint, err))
        }
    }
}

impl WireClient for HttpWireClient {
    fn send(&self, message: WireMessage) -> Result<String> {
        let size = message.len();
        log::debug!("POST {} ({} bytes)", self.endpoint, size);

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(message.into_bytes())
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().map_err(|e| self.transport_error(e))?;
            log::debug!("Inference service answered {} with {} bytes", status, body.len());
            return Ok(body);
        }

        let body = response.text().unwrap_or_else(|e| {
            log::warn!("Failed to read {} response body from {}: {}", status, self.endpoint, e);
            String::new()
        });
        log::warn!("Inference service answered {}", status);
        Err(classify_status(status, body))
    }
}

/// Map a non-success status onto the failure taxonomy.
fn classify_status(status: StatusCode, body: String) -> ScreeningError {
    if status.is_client_error() {
        ScreeningError::ClientError {
            status: status.as_u16(),
            body,
        }
    } else {
        // 5xx and anything else unexpected (unfollowed redirects, 1xx) is an upstream fault.
        ScreeningError::ServerError {
            status: status.as_u16(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, WireCodec};
    use crate::RawImage;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    fn read_request(stream: &mut TcpStream) -> Vec<u8> {
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                return request;
            }
            request.extend_from_slice(&buf[..n]);

            if let Some(end) = find(&request, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    return request;
                }
            }
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    /// Serve one canned response; the handle yields the captured request.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<Vec<u8>>) {
        serve_raw(format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ))
    }

    /// Write `response` verbatim and close the connection.
    fn serve_raw(response: String) -> (String, JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/predict", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            stream.write_all(response.as_bytes()).unwrap();
            request
        });

        (url, handle)
    }

    fn message() -> WireMessage {
        let image = RawImage::new(2, 2, 3, 1, vec![7; 12]).unwrap();
        WireCodec::new().encode(&image).unwrap()
    }

    fn client_for(url: &str, timeout: Duration) -> HttpWireClient {
        HttpWireClient::new(&ScreeningConfig::for_endpoint(url).with_timeout(timeout)).unwrap()
    }

    #[test]
    fn test_success_returns_body() {
        let (url, server) = serve_once("200 OK", r#"{"ok":true}"#);
        let client = client_for(&url, Duration::from_secs(5));

        let sent = message();
        let body = client.send(sent.clone()).unwrap();
        assert_eq!(body, r#"{"ok":true}"#);

        let request = server.join().unwrap();
        let head_end = find(&request, b"\r\n\r\n").unwrap();
        let head = String::from_utf8_lossy(&request[..head_end]).to_lowercase();
        assert!(head.starts_with("post /predict"));
        assert!(head.contains("content-type: application/octet-stream"));
        assert_eq!(&request[head_end + 4..], sent.as_bytes());
    }

    #[test]
    fn test_client_error_status() {
        let (url, server) = serve_once("422 Unprocessable Entity", "bad header");
        let client = client_for(&url, Duration::from_secs(5));

        match client.send(message()) {
            Err(ScreeningError::ClientError { status, body }) => {
                assert_eq!(status, 422);
                assert_eq!(body, "bad header");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_server_error_status() {
        let (url, server) = serve_once("503 Service Unavailable", "");
        let client = client_for(&url, Duration::from_secs(5));

        assert!(matches!(
            client.send(message()),
            Err(ScreeningError::ServerError { status: 503, .. })
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_unreadable_error_body_keeps_status() {
        let (url, server) = serve_raw(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 64\r\nConnection: close\r\n\r\npartial"
                .to_string(),
        );
        let client = client_for(&url, Duration::from_secs(5));

        match client.send(message()) {
            Err(ScreeningError::ServerError { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.is_empty());
            }
            other => panic!("unexpected result: {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_connection_refused_is_transport_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = client_for(&format!("http://127.0.0.1:{port}/predict"), Duration::from_secs(2));

        assert!(matches!(
            client.send(message()),
            Err(ScreeningError::TransportError(_))
        ));
    }

    #[test]
    fn test_timeout_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/predict", listener.local_addr().unwrap());
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            thread::sleep(Duration::from_millis(1500));
        });

        let client = client_for(&url, Duration::from_millis(200));
        match client.send(message()) {
            Err(ScreeningError::TransportError(msg)) => assert!(msg.contains("timed out")),
            other => panic!("unexpected result: {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, String::new()),
            ScreeningError::ClientError { status: 400, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, String::new()),
            ScreeningError::ServerError { status: 500, .. }
        ));
    }
}
