use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::provider::WeatherProvider;
use super::types::WeatherSnapshot;
use crate::models::tool::Tool;

pub const WEATHER_TOOL_NAME: &str = "getWeather";
pub const WEATHER_TOOL_DESCRIPTION: &str = "Get weather by city name. Always returns response with actual city name, never the term 'current location'.";

/// Sentinel city name the model uses when the user asks about "here"
pub const CURRENT_LOCATION: &str = "current location";

pub fn is_current_location(city_name: &str) -> bool {
    city_name.trim().eq_ignore_ascii_case(CURRENT_LOCATION)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherArgs {
    pub city_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherFields {
    pub location: String,
    pub temperature: i32,
    pub description: String,
    pub humidity: i32,
    pub wind_speed: i32,
    pub feels_like: i32,
    pub temp_unit: String,
    pub wind_unit: String,
}

impl From<WeatherSnapshot> for WeatherFields {
    fn from(snapshot: WeatherSnapshot) -> Self {
        Self {
            temp_unit: snapshot.units.temperature_label().to_string(),
            wind_unit: snapshot.units.wind_label().to_string(),
            location: snapshot.place,
            temperature: snapshot.temperature,
            description: snapshot.description,
            humidity: snapshot.humidity,
            wind_speed: snapshot.wind_speed,
            feels_like: snapshot.feels_like,
        }
    }
}

/// Result of a `getWeather` call, serialized without a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeatherReport {
    Success(WeatherFields),
    Failure { error: String },
}

impl WeatherReport {
    fn failure(cause: impl std::fmt::Display) -> Self {
        WeatherReport::Failure {
            error: format!("Sorry, I couldn't get the weather: {}", cause),
        }
    }

    /// The resolved place name, when the call succeeded
    pub fn location(&self) -> Option<&str> {
        match self {
            WeatherReport::Success(fields) => Some(&fields.location),
            WeatherReport::Failure { .. } => None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            json!({ "error": format!("Sorry, I couldn't get the weather: {}", e) }).to_string()
        })
    }
}

/// The built-in weather tool offered to the model
#[derive(Debug, Clone)]
pub struct WeatherTool {
    provider: Arc<WeatherProvider>,
}

impl WeatherTool {
    pub fn new(provider: Arc<WeatherProvider>) -> Self {
        Self { provider }
    }

    pub fn tool(&self) -> Tool {
        Tool::new(
            WEATHER_TOOL_NAME,
            WEATHER_TOOL_DESCRIPTION,
            json!({
                "type": "object",
                "required": ["cityName"],
                "properties": {
                    "cityName": {
                        "type": "string",
                        "description": "The city to get the weather for, or 'current location'"
                    }
                }
            }),
        )
    }

    /// Run the tool against raw model arguments. Never fails; bad input yields `Failure`.
    pub async fn run(&self, arguments: &Value) -> WeatherReport {
        let args: WeatherArgs = match serde_json::from_value(arguments.clone()) {
            Ok(args) => args,
            Err(e) => {
                tracing::debug!("Rejected getWeather arguments {}: {}", arguments, e);
                return WeatherReport::failure(e);
            }
        };

        let snapshot = self.provider.fetch_by_name(&args.city_name).await;
        WeatherReport::Success(snapshot.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::provider::WeatherConfig;

    fn weather_tool() -> WeatherTool {
        WeatherTool::new(Arc::new(
            WeatherProvider::new(WeatherConfig::default()).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_new_york_is_reported_in_imperial_units() {
        let report = weather_tool()
            .run(&json!({"cityName": "New York"}))
            .await;

        let payload: Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(
            payload,
            json!({
                "location": "New York",
                "temperature": 70,
                "description": "few clouds",
                "humidity": 55,
                "windSpeed": 8,
                "feelsLike": 72,
                "tempUnit": "°F",
                "windUnit": "mph"
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_city_reports_default_place() {
        let report = weather_tool()
            .run(&json!({"cityName": "UnknownVille"}))
            .await;
        assert_eq!(report.location(), Some("Montreal"));

        let WeatherReport::Success(fields) = report else {
            panic!("expected a successful report");
        };
        assert_eq!(fields.temp_unit, "°C");
        assert_eq!(fields.wind_unit, "km/h");
    }

    #[tokio::test]
    async fn test_current_location_without_context_is_default_place() {
        let report = weather_tool()
            .run(&json!({"cityName": CURRENT_LOCATION}))
            .await;
        assert_eq!(report.location(), Some("Montreal"));
        assert!(!report.to_json().contains(CURRENT_LOCATION));
    }

    #[tokio::test]
    async fn test_invalid_arguments_yield_error_payload() {
        let tool = weather_tool();
        for arguments in [json!({}), json!({"cityName": 42}), json!("Paris")] {
            let report = tool.run(&arguments).await;
            assert_eq!(report.location(), None);

            let payload: Value = serde_json::from_str(&report.to_json()).unwrap();
            let error = payload["error"].as_str().unwrap();
            assert!(error.starts_with("Sorry, I couldn't get the weather"));
        }
    }

    #[test]
    fn test_tool_descriptor() {
        let tool = weather_tool().tool();
        assert_eq!(tool.name, WEATHER_TOOL_NAME);
        assert!(tool.description.contains("never the term 'current location'"));
        assert_eq!(tool.input_schema["required"], json!(["cityName"]));
    }

    #[test]
    fn test_is_current_location() {
        assert!(is_current_location("current location"));
        assert!(is_current_location(" Current Location "));
        assert!(!is_current_location("Paris"));
    }
}
