//! Topic/hub link discovery.
//!
//! A publisher advertises its hub through `rel="hub"` links and its canonical
//! topic URL through `rel="self"` links. They can appear in HTTP `Link`
//! headers, in `<link>` elements of an HTML `<head>`, or in feed-level links
//! of an Atom or RSS document. [`extract_links`] checks those places in that
//! order and stops at the first one that yields both links.

mod feed;
mod headers;
mod html;

pub use headers::parse_link_header;

use crate::util::{validate_url, NetworkPolicy};
use futures::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_DISCOVERY_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// The (topic, hub) pair advertised by a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPair {
    pub topic: String,
    pub hub: String,
}

/// A fetched (or received) resource to extract links from.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resource<'a> {
    pub headers: Option<&'a HeaderMap>,
    /// Declared `Content-Type`, if any.
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
    /// Relative hrefs are resolved against this URL.
    pub base_url: Option<&'a Url>,
}

/// Errors that can occur during hub discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The topic URL failed validation (bad scheme, private address, etc.)
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Neither headers nor body advertised both a `self` and a `hub` link
    #[error("no topic/hub links found")]
    NoLinks,
    /// The topic resource answered with a non-success status
    #[error("topic responded with HTTP {0}")]
    HttpStatus(StatusCode),
    /// HTTP request failed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("response too large")]
    TooLarge,
}

/// A link with its raw `rel` attribute, before topic/hub selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawLink {
    pub href: String,
    pub rel: String,
}

impl RawLink {
    fn has_rel(&self, wanted: &str) -> bool {
        self.rel
            .split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case(wanted))
    }
}

/// Extracts the advertised topic and hub from a resource.
///
/// Checks, in order: `Link` headers, HTML `<head>` links (only for HTML
/// content, or untyped content that has a `<head>`), Atom feed links, then
/// `<atom:link>` children of an RSS `<channel>`. The first source yielding
/// both a `self` and a `hub` link wins.
///
/// # Errors
///
/// Returns [`DiscoveryError::NoLinks`] when no source yields both links.
pub fn extract_links(resource: &Resource<'_>) -> Result<LinkPair, DiscoveryError> {
    let base = resource.base_url;

    if let Some(headers) = resource.headers {
        if let Some(pair) = select_pair(headers::links_from_headers(headers), base) {
            tracing::debug!(topic = %pair.topic, hub = %pair.hub, "Links found in HTTP headers");
            return Ok(pair);
        }
    }

    if resource.body.is_empty() {
        return Err(DiscoveryError::NoLinks);
    }

    let text = String::from_utf8_lossy(resource.body);

    if html::should_scan(resource.content_type, &text) {
        if let Some(pair) = select_pair(html::head_links(&text), base) {
            tracing::debug!(topic = %pair.topic, hub = %pair.hub, "Links found in HTML head");
            return Ok(pair);
        }
    }

    if let Some(pair) = select_pair(feed::atom_links(resource.body), base) {
        tracing::debug!(topic = %pair.topic, hub = %pair.hub, "Links found in Atom feed");
        return Ok(pair);
    }

    if let Some(pair) = select_pair(feed::rss_channel_links(&text), base) {
        tracing::debug!(topic = %pair.topic, hub = %pair.hub, "Links found in RSS channel");
        return Ok(pair);
    }

    Err(DiscoveryError::NoLinks)
}

/// Picks the first `self` link as topic and the first `hub` link as hub.
fn select_pair(
    links: impl IntoIterator<Item = RawLink>,
    base: Option<&Url>,
) -> Option<LinkPair> {
    let mut topic = None;
    let mut hub = None;

    for link in links {
        if link.href.trim().is_empty() {
            continue;
        }
        if topic.is_none() && link.has_rel("self") {
            topic = Some(resolve_href(&link.href, base));
        }
        if hub.is_none() && link.has_rel("hub") {
            hub = Some(resolve_href(&link.href, base));
        }
        if topic.is_some() && hub.is_some() {
            break;
        }
    }

    Some(LinkPair {
        topic: topic?,
        hub: hub?,
    })
}

/// Resolves an href against the base URL. Absolute hrefs are kept verbatim.
fn resolve_href(href: &str, base: Option<&Url>) -> String {
    let href = href.trim();

    if Url::parse(href).is_ok() {
        return href.to_owned();
    }

    match base.map(|b| b.join(href)) {
        Some(Ok(resolved)) => resolved.to_string(),
        _ => href.to_owned(),
    }
}

// ============================================================================
// Fetching
// ============================================================================

/// Fetches topic resources and extracts their advertised links.
#[derive(Debug, Clone)]
pub struct Discoverer {
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
    policy: NetworkPolicy,
}

impl Discoverer {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_DISCOVERY_SIZE,
            policy: NetworkPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_network_policy(mut self, policy: NetworkPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn network_policy(&self) -> NetworkPolicy {
        self.policy
    }

    /// Fetches `topic` and extracts its advertised topic/hub links.
    ///
    /// The response's final URL (after redirects) is the base for relative
    /// hrefs. No retries are attempted.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] on validation failure, network error,
    /// non-success status, timeout, oversized response, or when the resource
    /// advertises no topic/hub pair.
    pub async fn discover(&self, topic: &str) -> Result<LinkPair, DiscoveryError> {
        let validated = validate_url(topic, self.policy)
            .map_err(|e| DiscoveryError::InvalidUrl(e.to_string()))?;

        tracing::debug!(topic = %validated, "Discovering hub");
        self.fetch_and_discover(validated).await
    }

    async fn fetch_and_discover(&self, url: Url) -> Result<LinkPair, DiscoveryError> {
        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| DiscoveryError::Timeout)?
            .map_err(DiscoveryError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::HttpStatus(status));
        }

        let headers = response.headers().clone();
        let base_url = response.url().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = tokio::time::timeout(
            self.timeout,
            read_discovery_bytes(response, self.max_body_bytes),
        )
        .await
        .map_err(|_| DiscoveryError::Timeout)??;

        extract_links(&Resource {
            headers: Some(&headers),
            content_type: content_type.as_deref(),
            body: &body,
            base_url: Some(&base_url),
        })
    }
}

/// Reads response body with a size limit using stream-based reading.
async fn read_discovery_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, DiscoveryError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(DiscoveryError::TooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(DiscoveryError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(DiscoveryError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
