//! Request and response values passed between the network and cache storage.

use bytes::Bytes;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An intercepted GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: Url,
    reload: bool,
}

impl Request {
    /// Creates a request for `url`.
    #[must_use]
    pub const fn new(url: Url) -> Self {
        Self { url, reload: false }
    }

    /// Parses `url` and creates a request for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` is not an absolute URL.
    pub fn parse(url: &str) -> Result<Self> {
        Url::parse(url)
            .map(Self::new)
            .map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))
    }

    /// Marks the request as bypassing any HTTP cache on the way to the network.
    #[must_use]
    pub fn reload(mut self) -> Self {
        self.reload = true;
        self
    }

    /// Whether intermediate HTTP caches must be bypassed.
    #[must_use]
    pub const fn is_reload(&self) -> bool {
        self.reload
    }

    /// The full request URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// The URL path component.
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Key under which the response is stored: the URL without its fragment.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.into()
    }

    /// A request for another path on the same origin, without query or fragment.
    #[must_use]
    pub fn with_path(&self, path: &str) -> Self {
        let mut url = self.url.clone();
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        Self::new(url)
    }
}

/// A response body with its status and headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Header name/value pairs in arrival order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    #[serde(skip)]
    pub body: Bytes,
}

impl Response {
    /// Creates a response with no headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of header `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Only a plain 200 is stored; error statuses pass through uncached.
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        self.status == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_drops_fragment_keeps_query() {
        let req = Request::parse("https://trip.example/index.html?v=2#day-3").unwrap();
        assert_eq!(req.cache_key(), "https://trip.example/index.html?v=2");
    }

    #[test]
    fn with_path_replaces_path_and_query() {
        let req = Request::parse("https://trip.example/day/2.html?x=1").unwrap();
        let root = req.with_path("/index.html");
        assert_eq!(root.url().as_str(), "https://trip.example/index.html");
        assert!(!root.is_reload());
    }

    #[test]
    fn reload_flag() {
        let req = Request::parse("https://trip.example/icon.png").unwrap().reload();
        assert!(req.is_reload());
        assert_eq!(req.path(), "/icon.png");
    }

    #[test]
    fn relative_url_is_rejected() {
        assert!(matches!(Request::parse("/index.html"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn only_200_is_cacheable() {
        assert!(Response::new(200, "ok").is_cacheable());
        assert!(!Response::new(204, "").is_cacheable());
        assert!(!Response::new(404, "missing").is_cacheable());
        assert!(!Response::new(500, "boom").is_cacheable());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let resp = Response::new(200, "x").with_header("Content-Type", "text/html");
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.header("etag"), None);
    }
}
