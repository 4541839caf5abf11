//! Message envelopes exchanged through the coordinator.
//!
//! The coordinator never touches a concrete HTTP library. The relay converts
//! incoming requests into a [`ScrapeRequest`], the agent receives it
//! serialized as an HTTP/1.1 request, and the pushed HTTP/1.1 response is
//! parsed back into a [`ScrapeResponse`].

use crate::domain::correlation::{CorrelationId, ID_HEADER};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// Ordered header multimap with case-insensitive names.
///
/// Insertion order is preserved so a response is copied back to the scraper
/// exactly as the target produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Add a value, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Replace every value for `name` with a single one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.0.push((name, value.into()));
    }

    /// Remove every value for `name`, returning the first one removed.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let mut first = None;
        self.0.retain(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                if first.is_none() {
                    first = Some(v.clone());
                }
                false
            } else {
                true
            }
        });
        first
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Mailbox key for a target: trimmed, lowercase, without IPv6 brackets.
///
/// Host names compare case-insensitively and `url` lowercases http(s) hosts,
/// so the scrape side and the poll side both key mailboxes by this form.
pub fn normalize_target(raw: &str) -> String {
    let target = raw.trim();
    target
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(target)
        .to_ascii_lowercase()
}

/// Outbound scrape instruction: what the agent must execute against its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub method: String,
    /// Absolute URL of the scrape target as seen by the scraping system.
    pub url: Url,
    pub headers: Headers,
    pub body: Bytes,
}

impl ScrapeRequest {
    /// A body-less `GET` for `url`.
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Target the ticket is routed by: the URL host without port or brackets.
    pub fn target(&self) -> Option<String> {
        self.url
            .host_str()
            .map(normalize_target)
            .filter(|h| !h.is_empty())
    }

    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.headers
            .get(ID_HEADER)
            .and_then(|v| CorrelationId::parse(v).ok())
    }

    /// Stamp `id` into the envelope, replacing any ID the caller supplied.
    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.headers.insert(ID_HEADER, id.to_string());
        self
    }
}

/// Result pushed back by an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResponse {
    pub status: u16,
    /// Reason phrase from the status line, if the agent sent one.
    pub reason: Option<String>,
    pub headers: Headers,
    pub body: Bytes,
}

impl ScrapeResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            reason: None,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Raw `Id` header value, if any.
    pub fn raw_correlation_id(&self) -> Option<&str> {
        self.headers.get(ID_HEADER)
    }

    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.raw_correlation_id()
            .and_then(|v| CorrelationId::parse(v).ok())
    }

    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.headers.insert(ID_HEADER, id.to_string());
        self
    }

    /// Strip the `Id` header so the scraper only sees the target's headers.
    pub fn take_correlation_id(&mut self) -> Option<String> {
        self.headers.remove(ID_HEADER)
    }
}
