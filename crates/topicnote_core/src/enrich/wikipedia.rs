//! Wikipedia REST summary client.
//!
//! # Responsibility
//! - Fetch `page/summary/{title}` for a topic and extract summary + desktop link.
//!
//! # Invariants
//! - HTTP 404 and payloads missing `extract` or `content_urls.desktop.page`
//!   map to `NotFound`.
//! - Transport errors, timeouts, other non-2xx statuses and undecodable
//!   bodies map to `Failed`.

use super::{EnrichmentClient, EnrichmentInfo, LookupOutcome};
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

pub const DEFAULT_WIKIPEDIA_BASE_URL: &str = "https://en.wikipedia.org";
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("topicnote/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`WikipediaClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikipediaConfig {
    /// Scheme + host, without the REST path. Trailing slashes are ignored.
    pub base_url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WIKIPEDIA_BASE_URL.to_string(),
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

/// HTTP client construction failure.
#[derive(Debug)]
pub struct WikipediaClientError(reqwest::Error);

impl Display for WikipediaClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to build wikipedia http client: {}", self.0)
    }
}

impl Error for WikipediaClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    extract: Option<String>,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrls>,
}

#[derive(Debug, Deserialize)]
struct PageUrls {
    page: Option<String>,
}

/// Blocking Wikipedia summary client.
#[derive(Debug, Clone)]
pub struct WikipediaClient {
    http: Client,
    base_url: String,
}

impl WikipediaClient {
    pub fn new(config: WikipediaConfig) -> Result<Self, WikipediaClientError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(WikipediaClientError)?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn summary_url(&self, topic: &str) -> String {
        format!(
            "{}/api/rest_v1/page/summary/{}",
            self.base_url,
            urlencoding::encode(topic)
        )
    }

    fn fetch(&self, topic: &str) -> LookupOutcome {
        let response = match self.http.get(self.summary_url(topic)).send() {
            Ok(response) => response,
            Err(err) => return LookupOutcome::Failed(format!("request failed: {err}")),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return LookupOutcome::NotFound;
        }
        if !status.is_success() {
            return LookupOutcome::Failed(format!("unexpected status {status}"));
        }

        match response.text() {
            Ok(body) => parse_summary(&body),
            Err(err) => LookupOutcome::Failed(format!("failed to read body: {err}")),
        }
    }
}

impl EnrichmentClient for WikipediaClient {
    fn lookup(&self, topic: &str) -> LookupOutcome {
        let started_at = Instant::now();
        let outcome = self.fetch(topic);
        match &outcome {
            LookupOutcome::Found(_) => debug!(
                "event=enrich_lookup module=enrich status=found duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            LookupOutcome::NotFound => debug!(
                "event=enrich_lookup module=enrich status=not_found duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            LookupOutcome::Failed(reason) => warn!(
                "event=enrich_lookup module=enrich status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                reason
            ),
        }
        outcome
    }
}

/// Extracts the summary/link pair from a REST summary payload.
pub fn parse_summary(body: &str) -> LookupOutcome {
    let payload: SummaryResponse = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(err) => return LookupOutcome::Failed(format!("invalid summary payload: {err}")),
    };

    let summary = payload.extract.filter(|value| !value.trim().is_empty());
    let link = payload
        .content_urls
        .and_then(|urls| urls.desktop)
        .and_then(|desktop| desktop.page)
        .filter(|value| !value.trim().is_empty());

    match (summary, link) {
        (Some(summary), Some(link)) => LookupOutcome::Found(EnrichmentInfo { summary, link }),
        _ => LookupOutcome::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_summary, WikipediaClient, WikipediaConfig};
    use crate::enrich::{EnrichmentClient, EnrichmentInfo, LookupOutcome};
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    /// Serves exactly one canned HTTP response and returns the request line.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("request line");
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).expect("header");
                if header == "\r\n" || header.is_empty() {
                    break;
                }
            }
            let mut stream = stream;
            write!(
                stream,
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .expect("write response");
            request_line
        });
        (base_url, handle)
    }

    fn client(base_url: String) -> WikipediaClient {
        WikipediaClient::new(WikipediaConfig {
            base_url,
            timeout: Duration::from_secs(5),
        })
        .expect("client")
    }

    #[test]
    fn parse_summary_extracts_extract_and_desktop_page() {
        let outcome = parse_summary(
            r#"{"extract":"Cells are units.","content_urls":{"desktop":{"page":"https://en.wikipedia.org/wiki/Cell"}}}"#,
        );
        assert_eq!(
            outcome,
            LookupOutcome::Found(EnrichmentInfo {
                summary: "Cells are units.".to_string(),
                link: "https://en.wikipedia.org/wiki/Cell".to_string(),
            })
        );
    }

    #[test]
    fn parse_summary_missing_fields_is_not_found() {
        assert_eq!(parse_summary(r#"{"extract":"x"}"#), LookupOutcome::NotFound);
        assert_eq!(
            parse_summary(r#"{"extract":"  ","content_urls":{"desktop":{"page":"u"}}}"#),
            LookupOutcome::NotFound
        );
    }

    #[test]
    fn parse_summary_garbage_is_failure() {
        assert!(matches!(parse_summary("<html>"), LookupOutcome::Failed(_)));
    }

    #[test]
    fn lookup_requests_encoded_summary_path() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"extract":"Mitochondria.","content_urls":{"desktop":{"page":"https://example.org/M"}}}"#,
        );
        let outcome = client(base_url).lookup("Cell biology");
        let request_line = server.join().expect("server thread");

        assert!(request_line.starts_with("GET /api/rest_v1/page/summary/Cell%20biology "));
        assert!(matches!(outcome, LookupOutcome::Found(_)));
    }

    #[test]
    fn lookup_maps_404_to_not_found_and_500_to_failure() {
        let (base_url, server) = serve_once("HTTP/1.1 404 Not Found", "{}");
        assert_eq!(client(base_url).lookup("Nope"), LookupOutcome::NotFound);
        server.join().expect("server thread");

        let (base_url, server) = serve_once("HTTP/1.1 500 Internal Server Error", "{}");
        assert!(matches!(
            client(base_url).lookup("Boom"),
            LookupOutcome::Failed(_)
        ));
        server.join().expect("server thread");
    }

    #[test]
    fn lookup_against_closed_port_is_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        drop(listener);

        assert!(matches!(
            client(base_url).lookup("Offline"),
            LookupOutcome::Failed(_)
        ));
    }
}
