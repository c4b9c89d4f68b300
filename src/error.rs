//! Error types for the wayfarer library.

use thiserror::Error;

/// Errors that can occur while highlighting itineraries or serving cached assets.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A TOML document could not be parsed.
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// A value could not be written as TOML.
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The network leg of a fetch did not complete.
    #[error("Network failure: {0}")]
    Network(String),

    /// The network answered, but not with a response that may be cached.
    #[error("Unexpected status {status} for {url}")]
    BadStatus {
        /// URL of the request.
        url: String,
        /// HTTP status received.
        status: u16,
    },

    /// A cache storage operation was rejected.
    #[error("Cache storage error: {0}")]
    Storage(String),

    /// The network failed and no cached response could stand in for it.
    #[error("No cached response available for {url}")]
    NoCachedResponse {
        /// URL of the request that could not be served.
        url: String,
    },

    /// A worker lifecycle event arrived in the wrong state.
    #[error("Lifecycle error: expected {expected}, found {found}")]
    Lifecycle {
        /// State the event requires.
        expected: &'static str,
        /// State the worker was actually in.
        found: &'static str,
    },

    /// A coordinate string could not be parsed.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// A URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// A specialized `Result` type for wayfarer operations.
pub type Result<T> = std::result::Result<T, Error>;
