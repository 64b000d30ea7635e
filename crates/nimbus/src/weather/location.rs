//! Resolution of free-form place names and coordinates to known places.
//!
//! Resolution never fails: anything that matches no known place resolves to the
//! resolver's default place.

use super::types::{Units, WeatherError, WeatherSnapshot};

/// The default place when none is configured. It is also the first known place.
pub const DEFAULT_PLACE: &str = "Montreal";

/// Conditions bundled for a known place, used whenever live data is unavailable
#[derive(Debug)]
struct Bundled {
    temperature: i32,
    description: &'static str,
    humidity: i32,
    wind_speed: i32,
    feels_like: i32,
}

#[derive(Debug)]
pub struct KnownPlace {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    bundled: Bundled,
}

/// Known places in their stable enumeration order. Values are in each place's own units.
static KNOWN_PLACES: [KnownPlace; 4] = [
    KnownPlace {
        name: "Montreal",
        latitude: 45.5017,
        longitude: -73.5673,
        bundled: Bundled {
            temperature: 22,
            description: "clear sky",
            humidity: 60,
            wind_speed: 13,
            feels_like: 22,
        },
    },
    KnownPlace {
        name: "New York",
        latitude: 40.7128,
        longitude: -74.006,
        bundled: Bundled {
            temperature: 70,
            description: "few clouds",
            humidity: 55,
            wind_speed: 8,
            feels_like: 72,
        },
    },
    KnownPlace {
        name: "Paris",
        latitude: 48.8566,
        longitude: 2.3522,
        bundled: Bundled {
            temperature: 18,
            description: "light rain",
            humidity: 78,
            wind_speed: 15,
            feels_like: 17,
        },
    },
    KnownPlace {
        name: "Tokyo",
        latitude: 35.6762,
        longitude: 139.6503,
        bundled: Bundled {
            temperature: 26,
            description: "scattered clouds",
            humidity: 70,
            wind_speed: 11,
            feels_like: 28,
        },
    },
];

/// Maximum per-axis distance, in degrees, for coordinates to match a known place
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    /// Round-off tolerant comparison of coordinates shown to a user
    Display,
    /// Lossy matching used when falling back after a failed live lookup
    Fallback,
}

impl Tolerance {
    pub fn degrees(&self) -> f64 {
        match self {
            Tolerance::Display => 0.01,
            Tolerance::Fallback => 0.1,
        }
    }
}

/// A known place chosen by the resolver
#[derive(Debug, Clone, Copy)]
pub struct ResolvedPlace {
    place: &'static KnownPlace,
}

impl ResolvedPlace {
    pub fn name(&self) -> &'static str {
        self.place.name
    }

    pub fn latitude(&self) -> f64 {
        self.place.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.place.longitude
    }

    pub fn units(&self) -> Units {
        Units::for_place(self.place.name)
    }

    /// The bundled conditions for this place
    pub fn bundled_snapshot(&self) -> WeatherSnapshot {
        let bundled = &self.place.bundled;
        WeatherSnapshot {
            place: self.place.name.to_string(),
            temperature: bundled.temperature,
            description: bundled.description.to_string(),
            humidity: bundled.humidity,
            wind_speed: bundled.wind_speed,
            feels_like: bundled.feels_like,
            units: self.units(),
        }
    }
}

impl PartialEq for ResolvedPlace {
    fn eq(&self, other: &Self) -> bool {
        self.place.name == other.place.name
    }
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    default: &'static KnownPlace,
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self {
            default: &KNOWN_PLACES[0],
        }
    }
}

impl LocationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different known place as the default. The name must match a known place exactly,
    /// ignoring case.
    pub fn with_default_place(name: &str) -> Result<Self, WeatherError> {
        let default = KNOWN_PLACES
            .iter()
            .find(|place| place.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| WeatherError::UnknownPlace(name.to_string()))?;
        Ok(Self { default })
    }

    /// All known places in enumeration order
    pub fn known_places(&self) -> impl Iterator<Item = ResolvedPlace> {
        KNOWN_PLACES.iter().map(|place| ResolvedPlace { place })
    }

    pub fn default_place(&self) -> ResolvedPlace {
        ResolvedPlace {
            place: self.default,
        }
    }

    /// Match a free-form name against the known places.
    ///
    /// Case and whitespace are ignored. A place matches when the input contains its name
    /// or its name contains the input; the first match in enumeration order wins.
    pub fn resolve_by_name(&self, text: &str) -> ResolvedPlace {
        let normalized = normalize(text);
        let found = self.known_places().find(|place| {
            let key = normalize(place.name());
            normalized.contains(&key) || key.contains(&normalized)
        });

        match found {
            Some(place) => {
                tracing::debug!("Resolved {:?} to {}", text, place.name());
                place
            }
            None => {
                tracing::debug!(
                    "No known place matches {:?}, using {}",
                    text,
                    self.default.name
                );
                self.default_place()
            }
        }
    }

    /// Find the known place whose coordinates lie within the tolerance on both axes
    pub fn resolve_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        tolerance: Tolerance,
    ) -> ResolvedPlace {
        let degrees = tolerance.degrees();
        self.known_places()
            .find(|place| {
                (latitude - place.latitude()).abs() < degrees
                    && (longitude - place.longitude()).abs() < degrees
            })
            .unwrap_or_else(|| self.default_place())
    }

    /// Exact, case-insensitive lookup of a known place by name
    pub fn coordinates_of(&self, name: &str) -> Option<ResolvedPlace> {
        self.known_places()
            .find(|place| place.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Render a known place as `"Paris: 48.8566, 2.3522"`
    pub fn format_coordinates(&self, name: &str) -> Option<String> {
        self.coordinates_of(name).map(|place| {
            format!(
                "{}: {}, {}",
                place.name(),
                place.latitude(),
                place.longitude()
            )
        })
    }
}
