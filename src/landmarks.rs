//! Static landmark lookup used when a map link carries no coordinate.
//!
//! Lookup is a case-sensitive substring match in definition order: the first
//! landmark whose name is contained in the place name, or which contains the
//! place name, wins. There is no ranking by match quality, so a short name such
//! as "Ain Dubai" can match an unrelated longer place that happens to contain it.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// A named place with a known position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Canonical place name.
    pub name: Cow<'static, str>,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

impl Landmark {
    const fn builtin(name: &'static str, lat: f64, lon: f64) -> Self {
        Self {
            name: Cow::Borrowed(name),
            lat,
            lon,
        }
    }

    /// Position of this landmark.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

// Sheer Apartments keeps its recorded pair even though it reads as lon/lat.
static BUILTIN: [Landmark; 20] = [
    Landmark::builtin("Home", 21.7637, 72.1315),
    Landmark::builtin("Sheer Apartments", 54.363_482, 24.455_676),
    Landmark::builtin("Louvre Abu Dhabi", 24.5338, 54.3984),
    Landmark::builtin("Sheikh Zayed Grand Mosque", 24.4128, 54.4747),
    Landmark::builtin("Heritage Village Abu Dhabi", 24.4833, 54.3553),
    Landmark::builtin("Burj Khalifa", 25.1972, 55.2744),
    Landmark::builtin("Dubai Frame", 25.2356, 55.3002),
    Landmark::builtin("The Dubai Mall", 25.1972, 55.2796),
    Landmark::builtin("Dubai Mall", 25.1972, 55.2796),
    Landmark::builtin("Marina Beach Dubai", 25.0804, 55.1394),
    Landmark::builtin("The Green Planet Dubai", 25.2176, 55.2601),
    Landmark::builtin("Mall of the Emirates", 25.1182, 55.2005),
    Landmark::builtin("Bluewaters Island", 25.0803, 55.1219),
    Landmark::builtin("Ain Dubai", 25.0803, 55.1219),
    Landmark::builtin("Palm Jumeirah Monorail", 25.1124, 55.139),
    Landmark::builtin("Aya Universe", 25.2171, 55.2828),
    Landmark::builtin("Museum of the Future", 25.2195, 55.2804),
    Landmark::builtin("Ibn Battuta Mall", 25.0443, 55.1173),
    Landmark::builtin("Madame Tussauds Dubai", 25.0803, 55.1219),
    Landmark::builtin("Dubai International Airport", 25.2532, 55.3657),
];

/// An immutable, ordered name → coordinate list.
#[derive(Debug, Clone)]
pub struct LandmarkTable {
    entries: Cow<'static, [Landmark]>,
}

impl Default for LandmarkTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LandmarkTable {
    /// The builtin Dubai / Abu Dhabi table.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            entries: Cow::Borrowed(&BUILTIN),
        }
    }

    /// Builds a table from entries in the order given.
    #[must_use]
    pub fn new(entries: Vec<Landmark>) -> Self {
        Self {
            entries: Cow::Owned(entries),
        }
    }

    /// Entries in definition order.
    #[must_use]
    pub fn entries(&self) -> &[Landmark] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First landmark whose name is a substring of `place`, or contains `place`.
    ///
    /// Entries with a blank name never match.
    #[must_use]
    pub fn resolve(&self, place: &str) -> Option<&Landmark> {
        self.entries
            .iter()
            .filter(|l| !l.name.trim().is_empty())
            .find(|l| place.contains(&*l.name) || l.name.contains(place))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_has_twenty_entries_in_order() {
        let table = LandmarkTable::builtin();
        assert_eq!(table.len(), 20);
        assert_eq!(table.entries()[0].name, "Home");
        assert_eq!(table.entries()[19].name, "Dubai International Airport");
    }

    #[test]
    fn resolves_key_contained_in_place_name() {
        let table = LandmarkTable::builtin();
        let hit = table.resolve("Visit Burj Khalifa Today").unwrap();
        assert_eq!(hit.name, "Burj Khalifa");
        assert_eq!(hit.coordinate(), Coordinate::new(25.1972, 55.2744));
    }

    #[test]
    fn resolves_place_name_contained_in_key() {
        let table = LandmarkTable::builtin();
        let hit = table.resolve("Grand Mosque").unwrap();
        assert_eq!(hit.name, "Sheikh Zayed Grand Mosque");
    }

    #[test]
    fn first_defined_match_wins() {
        // "The Dubai Mall" is defined before "Dubai Mall" and contains it.
        let table = LandmarkTable::builtin();
        assert_eq!(table.resolve("The Dubai Mall").unwrap().name, "The Dubai Mall");
        assert_eq!(table.resolve("Dubai Mall").unwrap().name, "The Dubai Mall");
    }

    #[test]
    fn short_key_false_positive_is_preserved() {
        let table = LandmarkTable::builtin();
        let hit = table.resolve("Cafe near Ain Dubai Wheel").unwrap();
        assert_eq!(hit.name, "Ain Dubai");
    }

    #[test]
    fn match_is_case_sensitive() {
        let table = LandmarkTable::builtin();
        assert!(table.resolve("burj khalifa").is_none());
    }

    #[test]
    fn no_match_returns_none() {
        let table = LandmarkTable::builtin();
        assert!(table.resolve("Eiffel Tower").is_none());
    }

    #[test]
    fn custom_table_keeps_order() {
        let table = LandmarkTable::new(vec![
            Landmark {
                name: "Tower".into(),
                lat: 1.0,
                lon: 1.0,
            },
            Landmark {
                name: "Big Tower".into(),
                lat: 2.0,
                lon: 2.0,
            },
        ]);
        assert_eq!(table.resolve("Big Tower").unwrap().name, "Tower");
    }

    #[test]
    fn blank_names_never_match() {
        let table = LandmarkTable::new(vec![
            Landmark {
                name: "".into(),
                lat: 0.0,
                lon: 0.0,
            },
            Landmark {
                name: "  ".into(),
                lat: 0.0,
                lon: 0.0,
            },
            Landmark {
                name: "Office".into(),
                lat: 1.5,
                lon: 2.5,
            },
        ]);
        assert!(table.resolve("Dubai Frame").is_none());
        assert_eq!(table.resolve("Office Tower").unwrap().name, "Office");
    }
}
