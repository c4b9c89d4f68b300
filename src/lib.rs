//! wayfarer - the core of an installable trip-itinerary page.
//!
//! Two independent pieces live here: a proximity highlighter that marks the
//! itinerary stops close to the traveller today, and an offline cache manager
//! that keeps the page usable without a network.
//!
//! # Example
//!
//! ```no_run
//! use wayfarer::{Coordinate, Highlighter, Itinerary};
//!
//! # fn example() -> wayfarer::Result<()> {
//! let mut itinerary = Itinerary::load("trip.toml".as_ref())?;
//! let highlighter = Highlighter::new(itinerary.landmark_table());
//!
//! let here = Coordinate::new(25.1972, 55.2744);
//! let today = chrono::Local::now().date_naive();
//! let report = highlighter.compute_and_mark(&mut itinerary, here, today);
//! println!("Nearby: {:?}", report.marked);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod geolocation;
pub mod highlight;
pub mod install;
pub mod itinerary;
pub mod landmarks;
pub mod maplink;
pub mod prefs;
#[cfg(feature = "server")]
pub mod proxy;
pub mod worker;

// Re-export main types for convenience
pub use config::{AppConfig, PathConfig, ProximityConfig, ServerConfig, WorkerConfig};
pub use error::{Error, Result};
pub use geo::{Coordinate, distance_km, format_distance};
pub use geolocation::{
    FixedPosition, GeolocationError, GeolocationProvider, PositionOptions, locate_and_highlight,
};
pub use highlight::{CheckOutcome, CoordinateSource, HighlightReport, Highlighter, ProximityCheck};
pub use install::{BannerMode, Capabilities, InstallPrompt, UserAgentCapabilities};
pub use itinerary::{DayCard, Itinerary, Stop};
pub use landmarks::{Landmark, LandmarkTable};
pub use maplink::DestinationRef;
pub use prefs::{CollapseState, JsonFileStore, KeyValueStore, MemoryStore};
pub use worker::{
    CacheStorage, DiskCacheStorage, MemoryCacheStorage, Network, Registration, ReqwestNetwork,
    Request, Response, ServiceWorker,
};
