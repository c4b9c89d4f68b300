//! Destination extraction from map links.
//!
//! Two link shapes carry a destination:
//! - search links, whose `query` parameter is the free-text place name;
//! - place links, whose `/place/<name>` path segment names the place and which
//!   may embed an authoritative `@<lat>,<lon>` pair.
//!
//! Anything else is ignored.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

use crate::geo::Coordinate;

static PLACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/place/([^/]+)").expect("valid regex"));

static COORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").expect("valid regex"));

/// Marker every supported map link contains.
const MAPS_HOST_MARKER: &str = "google.com/maps";

/// A destination reference pulled out of a map link.
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationRef {
    /// A search link; the place is only known by name.
    Search {
        /// Decoded query text.
        query: String,
    },
    /// A place link, optionally with an embedded coordinate.
    Place {
        /// Decoded place name from the path segment.
        name: String,
        /// Coordinate embedded as `@lat,lon`, if present.
        coordinate: Option<Coordinate>,
    },
}

impl DestinationRef {
    /// Parses a map link, returning `None` for links that name no destination.
    #[must_use]
    pub fn parse(href: &str) -> Option<Self> {
        if !href.contains(MAPS_HOST_MARKER) {
            return None;
        }

        if let Some(query) = search_query(href) {
            return Some(Self::Search { query });
        }

        if href.contains("/place/") {
            let name = PLACE_RE
                .captures(href)
                .and_then(|c| c.get(1))
                .map(|m| decode_place_segment(m.as_str()))
                .filter(|name| !name.is_empty())?;
            return Some(Self::Place {
                name,
                coordinate: embedded_coordinate(href),
            });
        }

        None
    }

    /// The place name, normalised for table lookup.
    #[must_use]
    pub fn place_name(&self) -> String {
        match self {
            Self::Search { query } => normalize_place_name(query),
            Self::Place { name, .. } => normalize_place_name(name),
        }
    }

    /// The embedded coordinate, if the link carried one.
    #[must_use]
    pub const fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::Search { .. } => None,
            Self::Place { coordinate, .. } => *coordinate,
        }
    }
}

/// Returns the non-empty, form-decoded `query` parameter of `href`.
fn search_query(href: &str) -> Option<String> {
    let query_string = href.split_once('?')?.1;
    // Parse against a dummy base so relative or odd links still yield their query.
    let parsed = Url::parse(&format!("http://query.invalid/?{query_string}")).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "query")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Turns `+` into spaces, then percent-decodes. Falls back to the raw text
/// when the segment does not decode to UTF-8.
fn decode_place_segment(segment: &str) -> String {
    let spaced = segment.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            log::warn!("Could not decode place segment {segment:?}: {e}");
            spaced
        }
    }
}

/// Extracts the first `@lat,lon` pair from `href`.
#[must_use]
pub fn embedded_coordinate(href: &str) -> Option<Coordinate> {
    let caps = COORD_RE.captures(href)?;
    let lat = caps.get(1)?.as_str().parse().ok()?;
    let lon = caps.get(2)?.as_str().parse().ok()?;
    Some(Coordinate::new(lat, lon))
}

/// Normalises a place name before lookup: `+` becomes a space, `%26` becomes `&`.
#[must_use]
pub fn normalize_place_name(name: &str) -> String {
    name.replace('+', " ").replace("%26", "&")
}
