use serde::{Deserialize, Serialize};
use std::fmt;

/// Regions whose users read temperatures in Fahrenheit.
pub(crate) const FAHRENHEIT_REGIONS: [&str; 3] = ["US", "LR", "MM"];

/// A single device fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Measurement system requested from the weather API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }

    pub const fn all() -> &'static [UnitSystem] {
        &[UnitSystem::Metric, UnitSystem::Imperial]
    }

    /// The unit system matching the temperature label shown for `region`.
    pub fn for_region(region: &str) -> Self {
        if is_fahrenheit_region(region) {
            UnitSystem::Imperial
        } else {
            UnitSystem::Metric
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for UnitSystem {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown unit system '{value}'. Supported: metric, imperial."
            )),
        }
    }
}

pub(crate) fn is_fahrenheit_region(region: &str) -> bool {
    FAHRENHEIT_REGIONS.contains(&region.trim())
}

/// Current conditions as returned by the OpenWeather `/weather` endpoint.
///
/// Only the fields the display uses are kept; anything else in the payload is
/// ignored on decode. The serde JSON form of this struct is what gets cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub weather: Vec<Condition>,
    pub main: MainReadings,
    pub wind: Wind,
    pub sys: Sys,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sys {
    /// Unix seconds.
    pub sunrise: i64,
    /// Unix seconds.
    pub sunset: i64,
    #[serde(default)]
    pub country: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_system_as_str_roundtrip() {
        for units in UnitSystem::all() {
            let parsed = UnitSystem::try_from(units.as_str()).expect("roundtrip should succeed");
            assert_eq!(*units, parsed);
        }
    }

    #[test]
    fn unknown_unit_system_error() {
        let err = UnitSystem::try_from("kelvin").unwrap_err();
        assert!(err.to_string().contains("Unknown unit system"));
    }

    #[test]
    fn unit_system_follows_fahrenheit_regions() {
        assert_eq!(UnitSystem::for_region("US"), UnitSystem::Imperial);
        assert_eq!(UnitSystem::for_region("LR"), UnitSystem::Imperial);
        assert_eq!(UnitSystem::for_region("MM"), UnitSystem::Imperial);
        assert_eq!(UnitSystem::for_region("GB"), UnitSystem::Metric);
        assert_eq!(UnitSystem::for_region(""), UnitSystem::Metric);
    }

    #[test]
    fn decodes_openweather_payload_and_ignores_extra_fields() {
        let body = r#"{
            "coord": {"lon": 10.99, "lat": 44.34},
            "weather": [{"id": 501, "main": "Rain", "description": "moderate rain", "icon": "10d"}],
            "base": "stations",
            "main": {"temp": 298.48, "feels_like": 298.74, "temp_min": 297.56,
                     "temp_max": 300.05, "pressure": 1015, "humidity": 64},
            "wind": {"speed": 0.62, "deg": 349},
            "dt": 1661870592,
            "sys": {"type": 2, "id": 2075663, "country": "IT",
                    "sunrise": 1661834187, "sunset": 1661882248},
            "timezone": 7200,
            "name": "Zocca",
            "cod": 200
        }"#;

        let parsed: WeatherResponse = serde_json::from_str(body).expect("payload should decode");

        assert_eq!(parsed.name, "Zocca");
        assert_eq!(parsed.weather.len(), 1);
        assert_eq!(parsed.weather[0].icon, "10d");
        assert_eq!(parsed.main.humidity, 64.0);
        assert_eq!(parsed.sys.country, "IT");
        assert_eq!(parsed.sys.sunrise, 1661834187);
    }
}
