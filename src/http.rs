//! HTTP front end
//!
//! Plain tokio server (no framework): reads the request head, routes the two
//! GET query endpoints and writes a JSON or CSV response with CORS headers.

use crate::error::{GlodapError, Result};
use crate::output::Rendered;
use crate::query::{CruiseParams, MeasurementParams};
use crate::service::GlodapService;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const MEASUREMENT_PATH: &str = "/glodap/v2/2023";
pub const CRUISE_PATH: &str = "/glodap/v2/2023/cruise";

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_HEAD_BYTES: usize = 64 * 1024;

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub attachment: Option<String>,
}

impl HttpResponse {
    pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
        let body = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            status,
            content_type: "application/json",
            body,
            attachment: None,
        }
    }

    pub fn error(err: &GlodapError) -> Self {
        Self::json(err.status_code(), &ErrorResponse { detail: err.to_string() })
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: Vec::new(),
            attachment: None,
        }
    }

    fn from_rendered(rendered: Rendered) -> Self {
        Self {
            status: 200,
            content_type: rendered.format.content_type(),
            body: rendered.body,
            attachment: rendered.attachment,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Methods: GET, OPTIONS\r\n\
             Access-Control-Allow-Headers: *\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n",
            self.status,
            status_text(self.status),
            self.content_type,
            self.body.len()
        );
        if let Some(ref filename) = self.attachment {
            head.push_str(&format!(
                "Content-Disposition: attachment; filename={}\r\n",
                filename
            ));
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Accept connections forever, one task per connection.
pub async fn serve(listener: TcpListener, service: Arc<GlodapService>) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, service).await {
                error!("Error handling connection from {}: {}", addr, e);
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, service: Arc<GlodapService>) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    let read_result = timeout(READ_TIMEOUT, async {
        loop {
            let n = stream.read(&mut temp_buf).await?;
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&temp_buf[..n]);
            if head_len(&buffer).is_some() || buffer.len() > MAX_HEAD_BYTES {
                break;
            }
        }
        Ok::<_, std::io::Error>(())
    })
    .await;

    let response = match read_result {
        Ok(Ok(())) if head_too_large(&buffer) => {
            warn!(bytes = buffer.len(), "request head too large");
            HttpResponse::json(
                431,
                &ErrorResponse { detail: "Request header fields too large".to_string() },
            )
        }
        Ok(Ok(())) => {
            let request = String::from_utf8_lossy(&buffer);
            handle_request(&service, &request).await
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => HttpResponse::json(408, &ErrorResponse { detail: "Request timeout".to_string() }),
    };

    stream.write_all(&response.to_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Length of the request head including its blank line, once complete.
fn head_len(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// A head that is unterminated past the cap, or ends beyond it, would be
/// routed truncated.
fn head_too_large(buffer: &[u8]) -> bool {
    match head_len(buffer) {
        Some(len) => len > MAX_HEAD_BYTES,
        None => buffer.len() > MAX_HEAD_BYTES,
    }
}

/// Route one raw HTTP request.
pub async fn handle_request(service: &GlodapService, request: &str) -> HttpResponse {
    let request_line = request.lines().next().unwrap_or_default();
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return HttpResponse::error(&GlodapError::Validation("Invalid request line".to_string()));
    }

    let method = parts[0].to_string();
    let (path, query) = match parts[1].split_once('?') {
        Some((p, q)) => (p, q),
        None => (parts[1], ""),
    };
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
    .to_string();

    let span = info_span!("request", id = %Uuid::new_v4(), method = %method, path = %path);
    async move {
        let response = route(service, &method, &path, query).await;
        match response.status {
            200 => info!(status = response.status, bytes = response.body.len(), "response"),
            500 => error!(status = response.status, "response"),
            _ => warn!(status = response.status, "response"),
        }
        response
    }
    .instrument(span)
    .await
}

async fn route(service: &GlodapService, method: &str, path: &str, query: &str) -> HttpResponse {
    match (method, path) {
        ("OPTIONS", _) => HttpResponse::empty(200),
        ("GET", "/health") => HttpResponse::json(
            200,
            &HealthResponse {
                status: "ok",
                version: env!("CARGO_PKG_VERSION"),
            },
        ),
        ("GET", MEASUREMENT_PATH) => {
            let result = match parse_query::<MeasurementParams>(query) {
                Ok(params) => service.query_measurements(&params).await,
                Err(e) => Err(e),
            };
            respond(result)
        }
        ("GET", CRUISE_PATH) => {
            let result = match parse_query::<CruiseParams>(query) {
                Ok(params) => service.query_cruises(&params).await,
                Err(e) => Err(e),
            };
            respond(result)
        }
        (_, MEASUREMENT_PATH) | (_, CRUISE_PATH) => HttpResponse::json(
            405,
            &ErrorResponse { detail: format!("Method {} not allowed", method) },
        ),
        _ => HttpResponse::error(&GlodapError::NotFound(format!("{} {}", method, path))),
    }
}

fn respond(result: Result<Rendered>) -> HttpResponse {
    match result {
        Ok(rendered) => HttpResponse::from_rendered(rendered),
        Err(e) => HttpResponse::error(&e),
    }
}

/// Decode a URL query string into a typed parameter set.
pub fn parse_query<T: DeserializeOwned>(query: &str) -> Result<T> {
    serde_urlencoded::from_str(query)
        .map_err(|e| GlodapError::Validation(format!("Invalid query parameters: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_decodes_values() {
        let params: MeasurementParams =
            parse_query("lon0=120.5&lat0=-20&cruise=06AQ19950707%2C%2033RR19971020&append=*cfc*").unwrap();
        assert_eq!(params.lon0, Some(120.5));
        assert_eq!(params.lat0, Some(-20.0));
        assert_eq!(params.cruise.as_deref(), Some("06AQ19950707, 33RR19971020"));
        assert_eq!(params.append.as_deref(), Some("*cfc*"));
    }

    #[test]
    fn test_parse_query_rejects_bad_number() {
        let err = parse_query::<MeasurementParams>("lon0=east").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_response_bytes() {
        let response = HttpResponse {
            status: 200,
            content_type: "text/csv",
            body: b"a\n1\n".to_vec(),
            attachment: Some("cruise_metadata.csv".to_string()),
        };
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.contains("Content-Disposition: attachment; filename=cruise_metadata.csv\r\n"));
        assert!(text.ends_with("\r\n\r\na\n1\n"));
    }

    #[test]
    fn test_oversized_head_is_rejected() {
        let small = b"GET /health HTTP/1.1\r\n\r\n";
        assert_eq!(head_len(small), Some(small.len()));
        assert!(!head_too_large(small));

        let mut truncated = format!("GET {}?cruise=", MEASUREMENT_PATH).into_bytes();
        truncated.resize(MAX_HEAD_BYTES + 1, b'a');
        assert_eq!(head_len(&truncated), None);
        assert!(head_too_large(&truncated));

        let mut late_end = truncated.clone();
        late_end.extend_from_slice(b"\r\n\r\n");
        assert!(head_too_large(&late_end));

        let partial = b"GET /health HTTP/1.1\r\nHost: x";
        assert!(!head_too_large(partial));
    }

    #[test]
    fn test_error_body() {
        let response = HttpResponse::error(&GlodapError::Store("timeout".into()));
        assert_eq!(response.status, 500);
        assert_eq!(
            String::from_utf8(response.body).unwrap(),
            r#"{"detail":"Database error: timeout"}"#
        );
    }
}
