use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::FetchError,
    model::{Coordinates, UnitSystem, WeatherResponse},
};

pub mod openweather;

pub use openweather::{DEFAULT_BASE_URL, OpenWeatherProvider};

/// Source of current weather for a coordinate pair.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Issue one request; no retries are attempted on failure.
    async fn fetch_weather(
        &self,
        coords: Coordinates,
        units: UnitSystem,
        api_key: &str,
    ) -> Result<WeatherResponse, FetchError>;
}
