//! URL reachability probe
//!
//! A HEAD request, falling back to a 1 KiB partial GET when the HEAD answer is
//! inconclusive. Failures are reported in the outcome and never returned as
//! errors.

use super::extractor::is_valid_link;
use crate::errors::{AppError, Result};
use crate::metrics;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{redirect, Client, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Bytes read by the partial GET
pub const PEEK_BYTES: usize = 1024;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// What the probed URL serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Pdf,
    Html,
    Other,
}

/// Why a probe failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    InvalidUrl,
    Timeout,
    Connect,
    Redirect,
    Request,
    Body,
    Other,
}

impl ProbeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeErrorKind::InvalidUrl => "invalid_url",
            ProbeErrorKind::Timeout => "timeout",
            ProbeErrorKind::Connect => "connect",
            ProbeErrorKind::Redirect => "redirect",
            ProbeErrorKind::Request => "request",
            ProbeErrorKind::Body => "body",
            ProbeErrorKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeMetadata {
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub final_url: Option<String>,
    pub kind: Option<ContentKind>,
    pub error: Option<ProbeErrorKind>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub metadata: ProbeMetadata,
}

impl ProbeOutcome {
    fn failed(kind: ProbeErrorKind, message: impl Into<String>) -> Self {
        Self {
            reachable: false,
            metadata: ProbeMetadata {
                error: Some(kind),
                message: Some(message.into()),
                ..ProbeMetadata::default()
            },
        }
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProbeErrorKind::Timeout
        } else if err.is_connect() {
            ProbeErrorKind::Connect
        } else if err.is_redirect() {
            ProbeErrorKind::Redirect
        } else if err.is_body() || err.is_decode() {
            ProbeErrorKind::Body
        } else if err.is_request() || err.is_builder() {
            ProbeErrorKind::Request
        } else {
            ProbeErrorKind::Other
        };
        Self::failed(kind, err.to_string())
    }
}

/// HTTP reachability checker
#[derive(Clone)]
pub struct UrlProbe {
    client: Client,
}

impl UrlProbe {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(redirect::Policy::limited(10))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to build probe HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    /// Check whether `url` answers with a success status
    pub async fn probe(&self, url: &str, timeout: Duration, want_pdf_check: bool) -> ProbeOutcome {
        let outcome = self.check(url, timeout, want_pdf_check).await;
        debug!(
            url,
            reachable = outcome.reachable,
            status = ?outcome.metadata.status_code,
            error = ?outcome.metadata.error,
            "URL probed"
        );
        metrics::record_probe(outcome.reachable);
        outcome
    }

    async fn check(&self, url: &str, timeout: Duration, want_pdf_check: bool) -> ProbeOutcome {
        if !is_valid_link(url) {
            return ProbeOutcome::failed(ProbeErrorKind::InvalidUrl, "URL must start with http:// or https://");
        }

        let head = match self.client.head(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::from_reqwest(&e),
        };
        let head_ok = head.status().is_success();
        let mut metadata = response_metadata(ResponseHead::from(&head));

        if want_pdf_check && is_pdf_type(metadata.content_type.as_deref()) {
            metadata.kind = Some(ContentKind::Pdf);
            return ProbeOutcome { reachable: true, metadata };
        }

        let ambiguous = metadata
            .content_type
            .as_deref()
            .map_or(true, |ct| ct.contains("text/html"));

        if !head_ok || want_pdf_check || ambiguous {
            let (response, prefix) = match self.peek(url, timeout).await {
                Ok(peeked) => peeked,
                Err(e) => return ProbeOutcome::from_reqwest(&e),
            };
            metadata = response_metadata(response);

            if want_pdf_check && prefix.starts_with(b"%PDF-") {
                metadata.kind = Some(ContentKind::Pdf);
                return ProbeOutcome { reachable: true, metadata };
            }
        }

        let reachable = metadata.status_code.is_some_and(|s| (200..300).contains(&s));
        ProbeOutcome { reachable, metadata }
    }

    /// Partial GET returning the response head and at most `PEEK_BYTES` of body
    async fn peek(&self, url: &str, timeout: Duration) -> reqwest::Result<(ResponseHead, Vec<u8>)> {
        let mut response = self
            .client
            .get(url)
            .header(header::RANGE, format!("bytes=0-{}", PEEK_BYTES - 1))
            .timeout(timeout)
            .send()
            .await?;
        let head = ResponseHead::from(&response);

        let mut prefix = Vec::with_capacity(PEEK_BYTES);
        while prefix.len() < PEEK_BYTES {
            match response.chunk().await? {
                Some(chunk) => {
                    let take = chunk.len().min(PEEK_BYTES - prefix.len());
                    prefix.extend_from_slice(&chunk[..take]);
                }
                None => break,
            }
        }

        Ok((head, prefix))
    }
}

/// Status, content type and final URL of a response
struct ResponseHead {
    status: u16,
    content_type: Option<String>,
    final_url: String,
}

impl From<&Response> for ResponseHead {
    fn from(response: &Response) -> Self {
        Self {
            status: response.status().as_u16(),
            content_type: response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_ascii_lowercase()),
            final_url: response.url().to_string(),
        }
    }
}

fn response_metadata(head: ResponseHead) -> ProbeMetadata {
    let kind = match head.content_type.as_deref() {
        Some(ct) if is_pdf_type(Some(ct)) => ContentKind::Pdf,
        Some(ct) if ct.contains("text/html") => ContentKind::Html,
        _ => ContentKind::Other,
    };

    ProbeMetadata {
        status_code: Some(head.status),
        content_type: head.content_type,
        final_url: Some(head.final_url),
        kind: Some(kind),
        ..ProbeMetadata::default()
    }
}

fn is_pdf_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.contains("application/pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Redirect};
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    async fn spawn_site() -> String {
        let app = Router::new()
            .route(
                "/page",
                get(|| async { ([("content-type", "text/html; charset=utf-8")], "<html></html>") }),
            )
            .route(
                "/paper.pdf",
                get(|| async { ([("content-type", "application/pdf")], "%PDF-1.7 ...") }),
            )
            .route(
                "/blob",
                get(|| async { ([("content-type", "application/octet-stream")], "%PDF-1.4 binary") }),
            )
            .route(
                "/no-head",
                get(|| async { ([("content-type", "text/plain")], "ok") })
                    .head(|| async { StatusCode::METHOD_NOT_ALLOWED }),
            )
            .route("/gone", get(|| async { StatusCode::NOT_FOUND.into_response() }))
            .route("/old", get(|| async { Redirect::permanent("/page") }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "late"
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    const TIMEOUT: Duration = Duration::from_secs(3);

    #[tokio::test]
    async fn test_html_page_is_reachable() {
        let base = spawn_site().await;
        let outcome = UrlProbe::new().unwrap().probe(&format!("{}/page", base), TIMEOUT, false).await;

        assert!(outcome.reachable);
        assert_eq!(outcome.metadata.status_code, Some(200));
        assert_eq!(outcome.metadata.kind, Some(ContentKind::Html));
        assert!(outcome.metadata.error.is_none());
    }

    #[tokio::test]
    async fn test_pdf_detected_from_head() {
        let base = spawn_site().await;
        let outcome = UrlProbe::new()
            .unwrap()
            .probe(&format!("{}/paper.pdf", base), TIMEOUT, true)
            .await;

        assert!(outcome.reachable);
        assert_eq!(outcome.metadata.kind, Some(ContentKind::Pdf));
    }

    #[tokio::test]
    async fn test_pdf_detected_from_prefix() {
        let base = spawn_site().await;
        let probe = UrlProbe::new().unwrap();

        let with_check = probe.probe(&format!("{}/blob", base), TIMEOUT, true).await;
        assert!(with_check.reachable);
        assert_eq!(with_check.metadata.kind, Some(ContentKind::Pdf));

        let without_check = probe.probe(&format!("{}/blob", base), TIMEOUT, false).await;
        assert!(without_check.reachable);
        assert_eq!(without_check.metadata.kind, Some(ContentKind::Other));
    }

    #[tokio::test]
    async fn test_rejected_head_falls_back_to_get() {
        let base = spawn_site().await;
        let outcome = UrlProbe::new()
            .unwrap()
            .probe(&format!("{}/no-head", base), TIMEOUT, false)
            .await;

        assert!(outcome.reachable);
        assert_eq!(outcome.metadata.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_not_found_is_unreachable() {
        let base = spawn_site().await;
        let outcome = UrlProbe::new().unwrap().probe(&format!("{}/gone", base), TIMEOUT, false).await;

        assert!(!outcome.reachable);
        assert_eq!(outcome.metadata.status_code, Some(404));
        assert!(outcome.metadata.error.is_none());
    }

    #[tokio::test]
    async fn test_redirect_is_followed() {
        let base = spawn_site().await;
        let outcome = UrlProbe::new().unwrap().probe(&format!("{}/old", base), TIMEOUT, false).await;

        assert!(outcome.reachable);
        assert!(outcome.metadata.final_url.unwrap().ends_with("/page"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let base = spawn_site().await;
        let outcome = UrlProbe::new()
            .unwrap()
            .probe(&format!("{}/slow", base), Duration::from_millis(200), false)
            .await;

        assert!(!outcome.reachable);
        assert_eq!(outcome.metadata.error, Some(ProbeErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = UrlProbe::new()
            .unwrap()
            .probe(&format!("http://{}/", addr), TIMEOUT, false)
            .await;

        assert!(!outcome.reachable);
        assert_eq!(outcome.metadata.error, Some(ProbeErrorKind::Connect));
    }

    #[tokio::test]
    async fn test_invalid_url_skips_network() {
        let outcome = UrlProbe::new().unwrap().probe("example.org/fake", TIMEOUT, false).await;
        assert!(!outcome.reachable);
        assert_eq!(outcome.metadata.error, Some(ProbeErrorKind::InvalidUrl));
    }
}
