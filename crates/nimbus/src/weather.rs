//! Weather lookups for the agent
//!
//! Resolves free-form place names or coordinates to one of a fixed set of known
//! places, fetches live conditions from OpenWeatherMap when an API key is configured,
//! and falls back to bundled snapshots whenever the live lookup is unavailable.

pub mod location;
pub mod provider;
pub mod tool;
pub mod types;

pub use location::{LocationResolver, ResolvedPlace, Tolerance};
pub use provider::{WeatherConfig, WeatherProvider};
pub use tool::{WeatherReport, WeatherTool};
pub use types::{Units, WeatherError, WeatherSnapshot};
