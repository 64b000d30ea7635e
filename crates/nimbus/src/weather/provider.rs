use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::location::{LocationResolver, ResolvedPlace, Tolerance};
use super::types::{Units, WeatherError, WeatherSnapshot};
use crate::providers::configs::get_env;

pub const OPENWEATHER_HOST: &str = "https://api.openweathermap.org";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const METERS_PER_SECOND_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// Live lookups are skipped entirely when no key is configured
    pub api_key: Option<String>,
    pub host: String,
    pub default_place: Option<String>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            host: OPENWEATHER_HOST.to_string(),
            default_place: None,
        }
    }
}

impl WeatherConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: get_env("OPENWEATHER_API_KEY"),
            host: get_env("OPENWEATHER_HOST").unwrap_or_else(|| OPENWEATHER_HOST.to_string()),
            default_place: get_env("NIMBUS_DEFAULT_PLACE"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenWeatherResponse {
    #[serde(default)]
    name: String,
    main: OpenWeatherMain,
    weather: Vec<OpenWeatherCondition>,
    wind: OpenWeatherWind,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherWind {
    speed: f64,
}

impl OpenWeatherResponse {
    fn into_snapshot(self, fallback_name: &str, units: Units) -> Result<WeatherSnapshot, WeatherError> {
        let description = self
            .weather
            .into_iter()
            .next()
            .map(|condition| condition.description)
            .ok_or_else(|| WeatherError::Parse("response has no weather conditions".to_string()))?;

        // The API reports metric wind in m/s; the metric label is km/h
        let wind_speed = match units {
            Units::Metric => self.wind.speed * METERS_PER_SECOND_TO_KMH,
            Units::Imperial => self.wind.speed,
        };

        let place = if self.name.trim().is_empty() {
            fallback_name.to_string()
        } else {
            self.name
        };

        Ok(WeatherSnapshot {
            place,
            temperature: self.main.temp.round() as i32,
            description,
            humidity: self.main.humidity.round() as i32,
            wind_speed: wind_speed.round() as i32,
            feels_like: self.main.feels_like.round() as i32,
            units,
        })
    }
}

/// Parse `"lat, lon"` into finite, in-range coordinates
fn parse_coordinates(text: &str) -> Option<(f64, f64)> {
    let (lat, lon) = text.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;

    if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
        return None;
    }
    Some((lat, lon))
}

/// Current conditions lookup with a single bundled-data fallback tier
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Client,
    config: WeatherConfig,
    resolver: LocationResolver,
}

impl WeatherProvider {
    pub fn new(config: WeatherConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let resolver = match &config.default_place {
            Some(name) => LocationResolver::with_default_place(name)?,
            None => LocationResolver::new(),
        };

        Ok(Self {
            client,
            config,
            resolver,
        })
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    /// Conditions for a place name, or for a `"lat, lon"` string
    pub async fn fetch_by_name(&self, name: &str) -> WeatherSnapshot {
        if name.contains(',') {
            if let Some((latitude, longitude)) = parse_coordinates(name) {
                return self.fetch_by_coordinates(latitude, longitude).await;
            }
        }

        let place = self.resolver.resolve_by_name(name);
        self.fetch_place(place, place.latitude(), place.longitude())
            .await
    }

    /// Conditions at the given coordinates
    pub async fn fetch_by_coordinates(&self, latitude: f64, longitude: f64) -> WeatherSnapshot {
        let place = self
            .resolver
            .resolve_by_coordinates(latitude, longitude, Tolerance::Fallback);
        self.fetch_place(place, latitude, longitude).await
    }

    async fn fetch_place(&self, place: ResolvedPlace, latitude: f64, longitude: f64) -> WeatherSnapshot {
        let Some(api_key) = &self.config.api_key else {
            return place.bundled_snapshot();
        };

        match self
            .fetch_remote(api_key, latitude, longitude, place)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    "Weather API failed, using bundled data for {}: {}",
                    place.name(),
                    e
                );
                place.bundled_snapshot()
            }
        }
    }

    async fn fetch_remote(
        &self,
        api_key: &str,
        latitude: f64,
        longitude: f64,
        place: ResolvedPlace,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let units = place.units();
        let url = format!(
            "{}/data/2.5/weather",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("units", units.api_name().to_string()),
                ("appid", api_key.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeatherError::Status(response.status()));
        }

        let body: OpenWeatherResponse = response.json().await?;
        body.into_snapshot(place.name(), units)
    }
}
