//! Command implementations for the `wayfarer` binary.

mod output;

use std::path::PathBuf;

use chrono::{Local, NaiveDate};

use crate::config::AppConfig;
use crate::error::Result;
use crate::geo::Coordinate;
use crate::geolocation::{FixedPosition, locate_and_highlight};
use crate::highlight::{HighlightReport, Highlighter};
use crate::itinerary::Itinerary;
use crate::prefs::{CollapseState, JsonFileStore};

pub use output::{print_agenda, print_highlight_report, print_worker_summary};

/// Arguments of `wayfarer nearby`.
#[derive(Debug, Clone)]
pub struct NearbyArgs {
    pub itinerary: PathBuf,
    pub at: Coordinate,
    pub date: Option<NaiveDate>,
    pub threshold_km: Option<f64>,
    /// Print the report as JSON instead of text.
    pub json: bool,
}

/// Arguments of `wayfarer agenda`.
#[derive(Debug, Clone)]
pub struct AgendaArgs {
    pub itinerary: PathBuf,
    pub date: Option<NaiveDate>,
    /// Day whose collapsed state is flipped and saved.
    pub toggle: Option<NaiveDate>,
}

/// Arguments of `wayfarer serve`.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    pub origin: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// One row of the agenda.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaLine {
    pub date: NaiveDate,
    pub title: Option<String>,
    pub stops: usize,
    pub collapsed: bool,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Highlights stops near a fixed position.
///
/// # Errors
///
/// Returns an error if the itinerary cannot be loaded.
pub async fn run_nearby(config: &AppConfig, args: &NearbyArgs) -> Result<HighlightReport> {
    let mut itinerary = Itinerary::load(&args.itinerary)?;
    let highlighter = Highlighter::new(itinerary.landmark_table())
        .with_threshold_km(args.threshold_km.unwrap_or(config.proximity.threshold_km));
    let date = args.date.unwrap_or_else(today);

    let provider = FixedPosition(args.at);
    let report = locate_and_highlight(
        Some(&provider),
        &config.geolocation,
        &highlighter,
        &mut itinerary,
        date,
    )
    .await
    .unwrap_or_else(|| HighlightReport::empty(date));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_highlight_report(&report);
    }
    Ok(report)
}

/// Lists days with their collapse state, optionally toggling one first.
#[must_use]
pub fn agenda(itinerary: &Itinerary, state: &CollapseState) -> Vec<AgendaLine> {
    itinerary
        .days
        .iter()
        .map(|day| AgendaLine {
            date: day.date,
            title: day.title.clone(),
            stops: day.stops.len(),
            collapsed: state.is_collapsed(day.date),
        })
        .collect()
}

/// Prints the agenda using preferences stored under the state directory.
///
/// # Errors
///
/// Returns an error if the itinerary cannot be loaded.
pub fn run_agenda(config: &AppConfig, args: &AgendaArgs) -> Result<Vec<AgendaLine>> {
    let itinerary = Itinerary::load(&args.itinerary)?;
    let mut store = JsonFileStore::open(config.paths.prefs_file());
    let mut state = CollapseState::load(&store, args.date.unwrap_or_else(today));

    if let Some(date) = args.toggle {
        let collapsed = state.toggle(&mut store, date);
        log::info!(
            "{date} is now {}",
            if collapsed { "collapsed" } else { "expanded" }
        );
    }

    let lines = agenda(&itinerary, &state);
    print_agenda(&lines);
    Ok(lines)
}

/// Installs the worker against the origin and serves it locally until Ctrl+C.
///
/// # Errors
///
/// Returns an error if no origin is configured, the worker cannot be
/// registered, or the address cannot be bound.
#[cfg(feature = "server")]
pub async fn run_serve(config: &AppConfig, args: &ServeArgs) -> Result<()> {
    use std::sync::Arc;

    use reqwest::Url;

    use crate::error::Error;
    use crate::worker::{DiskCacheStorage, Registration, ReqwestNetwork, ServiceWorker};

    let origin = args
        .origin
        .as_deref()
        .or(config.server.origin.as_deref())
        .ok_or_else(|| Error::InvalidUrl("no origin configured".to_string()))?;
    let origin = Url::parse(origin).map_err(|e| Error::InvalidUrl(format!("{origin}: {e}")))?;
    let host = args.host.as_deref().unwrap_or(&config.server.host);
    let port = args.port.unwrap_or(config.server.port);

    log::info!("Cache directory: {}", config.paths.cache_dir.display());
    let storage = Arc::new(DiskCacheStorage::new(&config.paths.cache_dir));
    let network = Arc::new(ReqwestNetwork::new()?);
    let registration = Arc::new(Registration::new(Arc::clone(&network)));

    let worker = ServiceWorker::new(origin.clone(), storage, network, config.worker.clone());
    let registered = registration.register(worker).await?;
    print_worker_summary(&registered.install, &registered.activation);

    let addr = crate::proxy::run_server(host, port, Arc::clone(&registration), origin).await?;
    println!("Serving {} on http://{addr}", registered.worker.origin());

    tokio::signal::ctrl_c().await?;
    log::info!("Received SIGINT");
    registered.worker.settle().await;
    log::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryStore;
    use tempfile::TempDir;

    const TRIP: &str = r#"
[[day]]
date = "2025-11-19"
title = "Abu Dhabi"

[[day.stop]]
name = "Grand Mosque"
links = ["https://www.google.com/maps/search/?api=1&query=Sheikh+Zayed+Grand+Mosque"]

[[day]]
date = "2025-11-20"
title = "Downtown"

[[day.stop]]
name = "Burj Khalifa"
links = ["https://www.google.com/maps/place/Burj+Khalifa/@25.1972,55.2744,17z"]

[[day.stop]]
name = "Dubai Frame"
links = ["https://www.google.com/maps/search/?api=1&query=Dubai+Frame"]
"#;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn write_trip(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("trip.toml");
        std::fs::write(&path, TRIP).unwrap();
        path
    }

    fn config_in(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.paths.state_dir = dir.path().join("state");
        config.paths.cache_dir = dir.path().join("cache");
        config
    }

    #[test]
    fn agenda_lines_follow_collapse_state() {
        let itinerary: Itinerary = TRIP.parse().unwrap();
        let state = CollapseState::load(&MemoryStore::new(), date("2025-11-20"));
        let lines = agenda(&itinerary, &state);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].collapsed);
        assert_eq!(lines[0].stops, 1);
        assert!(!lines[1].collapsed);
        assert_eq!(lines[1].title.as_deref(), Some("Downtown"));
    }

    #[test]
    fn agenda_toggle_is_remembered() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let args = AgendaArgs {
            itinerary: write_trip(&dir),
            date: Some(date("2025-11-20")),
            toggle: Some(date("2025-11-20")),
        };

        let lines = run_agenda(&config, &args).unwrap();
        assert!(lines[1].collapsed);

        let lines = run_agenda(
            &config,
            &AgendaArgs {
                toggle: None,
                ..args
            },
        )
        .unwrap();
        assert!(lines[1].collapsed);
        assert!(config.paths.prefs_file().exists());
    }

    #[tokio::test]
    async fn nearby_marks_stops_around_position() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let args = NearbyArgs {
            itinerary: write_trip(&dir),
            at: Coordinate::new(25.1972, 55.2744),
            date: Some(date("2025-11-20")),
            threshold_km: None,
            json: true,
        };

        let report = run_nearby(&config, &args).await.unwrap();
        assert_eq!(report.cards, 1);
        assert_eq!(report.marked, vec!["Burj Khalifa"]);

        let wide = run_nearby(
            &config,
            &NearbyArgs {
                threshold_km: Some(6.0),
                ..args
            },
        )
        .await
        .unwrap();
        assert_eq!(wide.marked, vec!["Burj Khalifa", "Dubai Frame"]);
    }

    #[tokio::test]
    async fn nearby_without_schedule_is_empty() {
        let dir = TempDir::new().unwrap();
        let args = NearbyArgs {
            itinerary: write_trip(&dir),
            at: Coordinate::new(25.1972, 55.2744),
            date: Some(date("2026-01-01")),
            threshold_km: None,
            json: false,
        };

        let report = run_nearby(&config_in(&dir), &args).await.unwrap();
        assert!(!report.has_schedule());
        assert!(report.marked.is_empty());
    }

    #[tokio::test]
    async fn missing_itinerary_is_an_error() {
        let dir = TempDir::new().unwrap();
        let args = NearbyArgs {
            itinerary: dir.path().join("absent.toml"),
            at: Coordinate::new(0.0, 0.0),
            date: None,
            threshold_km: None,
            json: false,
        };
        assert!(run_nearby(&config_in(&dir), &args).await.is_err());
    }
}
