//! One-shot position lookup feeding the highlighter.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::Coordinate;
use crate::highlight::{HighlightReport, Highlighter};
use crate::itinerary::Itinerary;

/// Options for a position request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionOptions {
    /// Prefer a high-accuracy reading.
    pub high_accuracy: bool,
    /// Give up after this many milliseconds.
    pub timeout_ms: u64,
    /// Accept a cached fix no older than this many milliseconds.
    pub maximum_age_ms: u64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 10_000,
            maximum_age_ms: 0,
        }
    }
}

impl PositionOptions {
    /// Timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Why no position could be obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    /// The user refused the request.
    #[error("User denied the request for geolocation")]
    PermissionDenied,
    /// No fix could be determined.
    #[error("Location information is unavailable")]
    PositionUnavailable,
    /// The request did not complete within the configured timeout.
    #[error("The request to get user location timed out")]
    Timeout,
    /// Anything else.
    #[error("An unknown error occurred: {0}")]
    Unknown(String),
}

/// Source of the user's current position.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Returns the current position.
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> std::result::Result<Coordinate, GeolocationError>;
}

/// A provider that always reports the same position.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinate);

#[async_trait]
impl GeolocationProvider for FixedPosition {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> std::result::Result<Coordinate, GeolocationError> {
        Ok(self.0)
    }
}

/// Requests the position once, honouring `options.timeout_ms`.
///
/// # Errors
///
/// Returns the provider's error, or [`GeolocationError::Timeout`] if it does
/// not answer in time.
pub async fn request_position<P: GeolocationProvider + ?Sized>(
    provider: &P,
    options: &PositionOptions,
) -> std::result::Result<Coordinate, GeolocationError> {
    tokio::time::timeout(options.timeout(), provider.current_position(options))
        .await
        .unwrap_or(Err(GeolocationError::Timeout))
}

/// Looks up the user's position and highlights nearby stops for `today`.
///
/// Returns `None` when geolocation is unsupported (`provider` is `None`) or
/// fails; every failure is logged and the itinerary is left untouched.
pub async fn locate_and_highlight<P: GeolocationProvider + ?Sized>(
    provider: Option<&P>,
    options: &PositionOptions,
    highlighter: &Highlighter,
    itinerary: &mut Itinerary,
    today: NaiveDate,
) -> Option<HighlightReport> {
    let Some(provider) = provider else {
        log::info!("Geolocation is not supported; skipping highlighting");
        return None;
    };

    match request_position(provider, options).await {
        Ok(user) => {
            log::info!("User location: {user}");
            Some(highlighter.compute_and_mark(itinerary, user, today))
        }
        Err(e) => {
            log::warn!("Error getting location: {e}");
            None
        }
    }
}
