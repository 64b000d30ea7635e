use serde::{Deserialize, Serialize};

/// Places reported in imperial units. Every other place is metric.
const IMPERIAL_PLACES: &[&str] = &["New York"];

/// Unit system used to report a place's conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Metric,
    Imperial,
}

impl Units {
    /// Fixed unit policy for a place name
    pub fn for_place(name: &str) -> Self {
        let name = name.trim();
        if IMPERIAL_PLACES
            .iter()
            .any(|place| place.eq_ignore_ascii_case(name))
        {
            Units::Imperial
        } else {
            Units::Metric
        }
    }

    pub fn temperature_label(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn wind_label(&self) -> &'static str {
        match self {
            Units::Metric => "km/h",
            Units::Imperial => "mph",
        }
    }

    /// Value of the `units` query parameter understood by OpenWeatherMap
    pub fn api_name(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

/// Current conditions for a place, with every numeric field rounded to an integer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub place: String,
    pub temperature: i32,
    pub description: String,
    pub humidity: i32,
    pub wind_speed: i32,
    pub feels_like: i32,
    pub units: Units,
}

/// Weather provider errors. None of these escape `WeatherProvider`; they select the fallback.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Weather API returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unknown place: {0}")]
    UnknownPlace(String),
}
