//! Itinerary model: day cards, their stops and the stops' map links.
//!
//! Itineraries are read from TOML:
//!
//! ```toml
//! [[day]]
//! date = "2025-11-02"
//! title = "Downtown"
//!
//! [[day.stop]]
//! name = "Burj Khalifa"
//! links = ["https://www.google.com/maps/search/?api=1&query=Burj+Khalifa"]
//! ```
//!
//! An optional ordered `[[landmark]]` list replaces the builtin landmark table.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::landmarks::{Landmark, LandmarkTable};
use crate::maplink::DestinationRef;

/// Marker class applied to a stop's content region when it is close by.
pub const NEARBY_CLASS: &str = "nearby";

/// A single stop on a day card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    /// Display name of the stop.
    pub name: String,
    /// Map links attached to the stop.
    #[serde(default)]
    pub links: Vec<String>,
    /// Marker classes currently applied to the stop's content region.
    #[serde(skip)]
    markers: BTreeSet<String>,
}

impl Stop {
    /// Creates a stop with the given name and links and no markers.
    #[must_use]
    pub fn new(name: impl Into<String>, links: Vec<String>) -> Self {
        Self {
            name: name.into(),
            links,
            markers: BTreeSet::new(),
        }
    }

    /// Destinations parsed from this stop's links, skipping links that carry none.
    #[must_use]
    pub fn destinations(&self) -> Vec<DestinationRef> {
        self.links
            .iter()
            .filter_map(|href| DestinationRef::parse(href))
            .collect()
    }

    /// Adds a marker class. Returns false if it was already present.
    pub fn add_marker(&mut self, class: &str) -> bool {
        self.markers.insert(class.to_string())
    }

    /// Removes a marker class. Returns false if it was not present.
    pub fn remove_marker(&mut self, class: &str) -> bool {
        self.markers.remove(class)
    }

    /// Whether the marker class is applied.
    #[must_use]
    pub fn has_marker(&self, class: &str) -> bool {
        self.markers.contains(class)
    }

    /// Applied marker classes in sorted order.
    pub fn markers(&self) -> impl Iterator<Item = &str> {
        self.markers.iter().map(String::as_str)
    }

    /// Whether this stop is marked nearby.
    #[must_use]
    pub fn is_nearby(&self) -> bool {
        self.has_marker(NEARBY_CLASS)
    }
}

/// One day of the itinerary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCard {
    /// Calendar day this card covers.
    pub date: NaiveDate,
    /// Optional heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Stops in visiting order.
    #[serde(default, rename = "stop")]
    pub stops: Vec<Stop>,
}

/// A whole itinerary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Itinerary {
    /// Day cards in document order.
    #[serde(default, rename = "day")]
    pub days: Vec<DayCard>,
    /// Optional landmark list replacing the builtin table.
    #[serde(default, rename = "landmark", skip_serializing_if = "Vec::is_empty")]
    pub landmarks: Vec<Landmark>,
}

impl FromStr for Itinerary {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl Itinerary {
    /// Loads an itinerary from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid itinerary.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        contents.parse()
    }

    /// The landmark table for this itinerary: its own list if present, else the builtin one.
    #[must_use]
    pub fn landmark_table(&self) -> LandmarkTable {
        if self.landmarks.is_empty() {
            LandmarkTable::builtin()
        } else {
            LandmarkTable::new(self.landmarks.clone())
        }
    }

    /// All dates that have a card, in document order.
    #[must_use]
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.days.iter().map(|d| d.date).collect()
    }

    /// Cards scheduled for `date`.
    pub fn days_on(&self, date: NaiveDate) -> impl Iterator<Item = &DayCard> {
        self.days.iter().filter(move |d| d.date == date)
    }

    /// Mutable cards scheduled for `date`.
    pub fn days_on_mut(&mut self, date: NaiveDate) -> impl Iterator<Item = &mut DayCard> {
        self.days.iter_mut().filter(move |d| d.date == date)
    }

    /// Every stop currently marked nearby.
    pub fn nearby_stops(&self) -> impl Iterator<Item = &Stop> {
        self.days
            .iter()
            .flat_map(|d| d.stops.iter())
            .filter(|s| s.is_nearby())
    }

    /// Removes every marker of `class` from all stops.
    pub fn clear_markers(&mut self, class: &str) {
        for stop in self.days.iter_mut().flat_map(|d| d.stops.iter_mut()) {
            stop.remove_marker(class);
        }
    }
}
