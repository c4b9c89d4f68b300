//! Proximity highlighting of today's itinerary stops.

use chrono::NaiveDate;
use serde::Serialize;

use crate::geo::{Coordinate, format_distance};
use crate::itinerary::{Itinerary, NEARBY_CLASS};
use crate::landmarks::LandmarkTable;
use crate::maplink::DestinationRef;

/// Default proximity threshold in kilometres.
pub const DEFAULT_THRESHOLD_KM: f64 = 1.0;

/// Where a destination's coordinate came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordinateSource {
    /// Embedded `@lat,lon` in the map link.
    Link,
    /// Landmark table entry with this name.
    Landmark {
        /// Matched landmark name.
        name: String,
    },
}

/// Result of checking one destination of one stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Within the threshold; the stop was marked.
    Nearby {
        /// Distance from the user in kilometres.
        distance_km: f64,
        /// Coordinate provenance.
        source: CoordinateSource,
    },
    /// Resolved but beyond the threshold.
    TooFar {
        /// Distance from the user in kilometres.
        distance_km: f64,
        /// Coordinate provenance.
        source: CoordinateSource,
    },
    /// No coordinate could be found for the place.
    Unresolved,
}

/// One destination check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityCheck {
    /// Name of the stop the destination belongs to.
    pub stop: String,
    /// Normalised place name looked up.
    pub place: String,
    /// What happened.
    #[serde(flatten)]
    pub outcome: CheckOutcome,
}

/// Summary of a highlighting pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightReport {
    /// Day that was looked for.
    pub date: NaiveDate,
    /// Number of day cards found for that date.
    pub cards: usize,
    /// Every destination check, in document order.
    pub checks: Vec<ProximityCheck>,
    /// Names of stops that ended up marked.
    pub marked: Vec<String>,
}

impl HighlightReport {
    /// A report for `date` with nothing checked.
    #[must_use]
    pub const fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            cards: 0,
            checks: Vec::new(),
            marked: Vec::new(),
        }
    }

    /// Whether any card was scheduled for the date.
    #[must_use]
    pub const fn has_schedule(&self) -> bool {
        self.cards > 0
    }
}

/// Marks itinerary stops that lie within a threshold of the user.
#[derive(Debug, Clone)]
pub struct Highlighter {
    landmarks: LandmarkTable,
    threshold_km: f64,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(LandmarkTable::builtin())
    }
}

impl Highlighter {
    /// Creates a highlighter over `landmarks` with the default 1 km threshold.
    #[must_use]
    pub const fn new(landmarks: LandmarkTable) -> Self {
        Self {
            landmarks,
            threshold_km: DEFAULT_THRESHOLD_KM,
        }
    }

    /// Sets the proximity threshold in kilometres.
    #[must_use]
    pub fn with_threshold_km(mut self, threshold_km: f64) -> Self {
        self.threshold_km = threshold_km;
        self
    }

    /// The proximity threshold in kilometres.
    #[must_use]
    pub const fn threshold_km(&self) -> f64 {
        self.threshold_km
    }

    /// Resolves a destination to a coordinate. An embedded coordinate is
    /// authoritative; otherwise the landmark table is consulted.
    #[must_use]
    pub fn resolve(&self, dest: &DestinationRef) -> Option<(Coordinate, CoordinateSource)> {
        if let Some(coord) = dest.coordinate() {
            return Some((coord, CoordinateSource::Link));
        }
        let place = dest.place_name();
        self.landmarks.resolve(&place).map(|l| {
            (
                l.coordinate(),
                CoordinateSource::Landmark {
                    name: l.name.to_string(),
                },
            )
        })
    }

    /// Checks every destination of every stop scheduled for `today` and marks
    /// the stops that have at least one destination within the threshold.
    ///
    /// Days without a card, unresolvable places and distant places are not
    /// errors; they are logged and reported.
    pub fn compute_and_mark(
        &self,
        itinerary: &mut Itinerary,
        user: Coordinate,
        today: NaiveDate,
    ) -> HighlightReport {
        log::info!("Looking for activities on {today}");

        let mut report = HighlightReport::empty(today);

        let available = itinerary.dates();
        for card in itinerary.days_on_mut(today) {
            report.cards += 1;
            log::debug!("Found {} stops for {today}", card.stops.len());

            for stop in &mut card.stops {
                log::debug!("Checking stop: {}", stop.name);
                let mut nearby = false;

                for dest in stop.destinations() {
                    let check = self.check(&stop.name, user, &dest);
                    nearby |= matches!(check.outcome, CheckOutcome::Nearby { .. });
                    report.checks.push(check);
                }

                if nearby {
                    stop.add_marker(NEARBY_CLASS);
                    report.marked.push(stop.name.clone());
                }
            }
        }

        if report.cards == 0 {
            log::info!("No activities scheduled for {today}; available dates: {available:?}");
        }

        report
    }

    fn check(&self, stop: &str, user: Coordinate, dest: &DestinationRef) -> ProximityCheck {
        let place = dest.place_name();
        log::debug!("  Searching for {place:?}");

        let outcome = match self.resolve(dest) {
            Some((coord, source)) => {
                match &source {
                    CoordinateSource::Link => log::debug!("  Using coordinates from link: {coord}"),
                    CoordinateSource::Landmark { name } => {
                        log::debug!("  Matched landmark {name:?} at {coord}");
                    }
                }
                let distance_km = user.distance_km(&coord);
                log::debug!("  Distance to {place}: {}", format_distance(distance_km));

                if is_within(distance_km, self.threshold_km) {
                    log::info!("  Nearby: {place} ({})", format_distance(distance_km));
                    CheckOutcome::Nearby {
                        distance_km,
                        source,
                    }
                } else {
                    log::debug!(
                        "  Too far ({} > {})",
                        format_distance(distance_km),
                        format_distance(self.threshold_km)
                    );
                    CheckOutcome::TooFar {
                        distance_km,
                        source,
                    }
                }
            }
            None => {
                log::debug!("  No coordinates found for {place:?}");
                CheckOutcome::Unresolved
            }
        };

        ProximityCheck {
            stop: stop.to_string(),
            place,
            outcome,
        }
    }
}

/// Inclusive threshold test.
#[must_use]
pub fn is_within(distance_km: f64, threshold_km: f64) -> bool {
    distance_km <= threshold_km
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::distance_km;
    use crate::itinerary::{DayCard, Stop};

    const BURJ: Coordinate = Coordinate::new(25.1972, 55.2744);

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn itinerary(day: &str, stops: Vec<Stop>) -> Itinerary {
        Itinerary {
            days: vec![DayCard {
                date: date(day),
                title: None,
                stops,
            }],
            landmarks: Vec::new(),
        }
    }

    fn search(query: &str) -> String {
        format!("https://www.google.com/maps/search/?api=1&query={}", query.replace(' ', "+"))
    }

    #[test]
    fn marks_stop_resolved_by_substring() {
        let mut it = itinerary(
            "2025-11-02",
            vec![Stop::new("Tower", vec![search("Visit Burj Khalifa Today")])],
        );
        let report = Highlighter::default().compute_and_mark(&mut it, BURJ, date("2025-11-02"));

        assert_eq!(report.cards, 1);
        assert_eq!(report.marked, vec!["Tower"]);
        assert!(it.days[0].stops[0].is_nearby());
        assert_eq!(
            report.checks[0].outcome,
            CheckOutcome::Nearby {
                distance_km: 0.0,
                source: CoordinateSource::Landmark {
                    name: "Burj Khalifa".to_string()
                }
            }
        );
    }

    #[test]
    fn embedded_coordinate_beats_table() {
        let link = "https://www.google.com/maps/place/Burj+Khalifa/@25.0,55.0,17z".to_string();
        let mut it = itinerary("2025-11-02", vec![Stop::new("Tower", vec![link])]);
        let report = Highlighter::default().compute_and_mark(&mut it, BURJ, date("2025-11-02"));

        assert!(report.marked.is_empty());
        match &report.checks[0].outcome {
            CheckOutcome::TooFar {
                distance_km,
                source,
            } => {
                assert_eq!(source, &CoordinateSource::Link);
                assert!(*distance_km > 10.0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let user = Coordinate::new(25.0, 55.0);
        let report = Highlighter::default().compute_and_mark(&mut it, user, date("2025-11-02"));
        assert_eq!(report.marked, vec!["Tower"]);
    }

    #[test]
    fn no_card_for_today_is_a_no_op() {
        let mut it = itinerary("2025-11-02", vec![Stop::new("Tower", vec![search("Burj Khalifa")])]);
        let report = Highlighter::default().compute_and_mark(&mut it, BURJ, date("2025-11-03"));

        assert!(!report.has_schedule());
        assert!(report.checks.is_empty());
        assert_eq!(it.nearby_stops().count(), 0);
    }

    #[test]
    fn threshold_is_inclusive() {
        let frame = Coordinate::new(25.2356, 55.3002);
        let exact = distance_km(BURJ.lat, BURJ.lon, frame.lat, frame.lon);

        let mut it = itinerary("2025-11-02", vec![Stop::new("Frame", vec![search("Dubai Frame")])]);
        let at_limit = Highlighter::default().with_threshold_km(exact);
        assert_eq!(
            at_limit.compute_and_mark(&mut it, BURJ, date("2025-11-02")).marked,
            vec!["Frame"]
        );

        let mut it = itinerary("2025-11-02", vec![Stop::new("Frame", vec![search("Dubai Frame")])]);
        let below = Highlighter::default().with_threshold_km(exact - 1e-4);
        assert!(below.compute_and_mark(&mut it, BURJ, date("2025-11-02")).marked.is_empty());
    }

    #[test]
    fn is_within_boundary() {
        assert!(is_within(1.0, 1.0));
        assert!(!is_within(1.0001, 1.0));
    }

    #[test]
    fn any_destination_in_range_marks_the_stop() {
        let stop = Stop::new(
            "Mall trip",
            vec![search("Eiffel Tower"), search("Dubai Frame"), search("The Dubai Mall")],
        );
        let mut it = itinerary("2025-11-02", vec![stop]);
        let report = Highlighter::default().compute_and_mark(&mut it, BURJ, date("2025-11-02"));

        assert_eq!(report.checks.len(), 3);
        assert_eq!(report.checks[0].outcome, CheckOutcome::Unresolved);
        assert!(matches!(report.checks[1].outcome, CheckOutcome::TooFar { .. }));
        assert!(matches!(report.checks[2].outcome, CheckOutcome::Nearby { .. }));
        assert_eq!(report.marked, vec!["Mall trip"]);
    }

    #[test]
    fn marking_twice_leaves_one_marker() {
        let mut it = itinerary("2025-11-02", vec![Stop::new("Tower", vec![search("Burj Khalifa")])]);
        let hl = Highlighter::default();
        hl.compute_and_mark(&mut it, BURJ, date("2025-11-02"));
        hl.compute_and_mark(&mut it, BURJ, date("2025-11-02"));

        let markers: Vec<_> = it.days[0].stops[0].markers().collect();
        assert_eq!(markers, vec![NEARBY_CLASS]);
    }

    #[test]
    fn other_days_are_untouched() {
        let mut it = itinerary("2025-11-02", vec![Stop::new("Tower", vec![search("Burj Khalifa")])]);
        it.days.push(DayCard {
            date: date("2025-11-03"),
            title: None,
            stops: vec![Stop::new("Tower again", vec![search("Burj Khalifa")])],
        });
        let report = Highlighter::default().compute_and_mark(&mut it, BURJ, date("2025-11-03"));

        assert_eq!(report.marked, vec!["Tower again"]);
        assert!(!it.days[0].stops[0].is_nearby());
    }

    #[test]
    fn report_serializes_outcomes() {
        let mut it = itinerary("2025-11-02", vec![Stop::new("Tower", vec![search("Burj Khalifa")])]);
        let report = Highlighter::default().compute_and_mark(&mut it, BURJ, date("2025-11-02"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["checks"][0]["outcome"], "nearby");
        assert_eq!(json["checks"][0]["source"]["kind"], "landmark");
        assert_eq!(json["date"], "2025-11-02");
    }
}
