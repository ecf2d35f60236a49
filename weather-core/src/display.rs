//! Mapping a weather payload onto the fields a screen shows.
//!
//! Everything here is pure except [`format_time`] and [`system_region`], which
//! read the process time zone and locale.

use chrono::{DateTime, Local, TimeZone};
use std::fmt;

use crate::model::{WeatherResponse, is_fahrenheit_region};

/// Temperature label chosen by region. This is a label only; no conversion
/// is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn for_region(region: &str) -> Self {
        if is_fahrenheit_region(region) {
            TemperatureUnit::Fahrenheit
        } else {
            TemperatureUnit::Celsius
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Picture shown next to the conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconCategory {
    Clear,
    Cloud,
    Rain,
    Storm,
    Snow,
}

impl IconCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IconCategory::Clear => "clear",
            IconCategory::Cloud => "cloud",
            IconCategory::Rain => "rain",
            IconCategory::Storm => "storm",
            IconCategory::Snow => "snow",
        }
    }
}

impl fmt::Display for IconCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sky group of an OpenWeather icon code (the two digits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sky {
    ClearSky,
    FewClouds,
    ScatteredClouds,
    BrokenClouds,
    ShowerRain,
    Rain,
    Thunderstorm,
    Snow,
    Mist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPart {
    Day,
    Night,
}

/// Parsed OpenWeather icon code such as `"01d"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconCode {
    pub sky: Sky,
    pub part: DayPart,
}

impl IconCode {
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.len() != 3 || !code.is_ascii() {
            return None;
        }
        let (digits, suffix) = code.split_at(2);

        let sky = match digits {
            "01" => Sky::ClearSky,
            "02" => Sky::FewClouds,
            "03" => Sky::ScatteredClouds,
            "04" => Sky::BrokenClouds,
            "09" => Sky::ShowerRain,
            "10" => Sky::Rain,
            "11" => Sky::Thunderstorm,
            // "12" is accepted as an older spelling of snow.
            "12" | "13" => Sky::Snow,
            "50" => Sky::Mist,
            _ => return None,
        };
        let part = match suffix {
            "d" => DayPart::Day,
            "n" => DayPart::Night,
            _ => return None,
        };

        Some(Self { sky, part })
    }

    /// Night variants without their own artwork fall back to a neighbouring
    /// picture; showers and mist have none.
    pub fn category(&self) -> Option<IconCategory> {
        use DayPart::*;
        use Sky::*;

        match (self.sky, self.part) {
            (ClearSky, Day) => Some(IconCategory::Clear),
            (ClearSky, Night) => Some(IconCategory::Cloud),
            (FewClouds | ScatteredClouds | BrokenClouds, _) => Some(IconCategory::Cloud),
            (Rain, Day) => Some(IconCategory::Rain),
            (Rain, Night) => Some(IconCategory::Cloud),
            (Thunderstorm, Day) => Some(IconCategory::Storm),
            (Thunderstorm, Night) => Some(IconCategory::Rain),
            (Snow, _) => Some(IconCategory::Snow),
            (ShowerRain | Mist, _) => None,
        }
    }
}

pub fn icon_category(code: &str) -> Option<IconCategory> {
    IconCode::parse(code).and_then(|c| c.category())
}

/// Everything the weather screen shows, already formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayModel {
    pub main: Option<String>,
    pub description: Option<String>,
    pub icon: Option<IconCategory>,
    pub unit: TemperatureUnit,
    pub temperature: String,
    pub temp_min: String,
    pub temp_max: String,
    pub humidity: String,
    pub wind_speed: String,
    pub sunrise: String,
    pub sunset: String,
    pub name: String,
    pub country: String,
}

/// Map a response for display in the local time zone.
pub fn map_to_display(resp: &WeatherResponse, region: &str) -> DisplayModel {
    map_to_display_in(resp, region, &Local)
}

/// Map a response for display, formatting times in `tz`.
///
/// Only the first weather condition is shown.
pub fn map_to_display_in<Tz: TimeZone>(resp: &WeatherResponse, region: &str, tz: &Tz) -> DisplayModel
where
    Tz::Offset: fmt::Display,
{
    let unit = TemperatureUnit::for_region(region);
    let condition = resp.weather.first();

    DisplayModel {
        main: condition.map(|c| c.main.clone()),
        description: condition.map(|c| c.description.clone()),
        icon: condition.and_then(|c| icon_category(&c.icon)),
        unit,
        temperature: format!("{}{}", resp.main.temp, unit.symbol()),
        temp_min: format!("{} min", resp.main.temp_min),
        temp_max: format!("{} max", resp.main.temp_max),
        humidity: format!("{} per cent", resp.main.humidity),
        wind_speed: resp.wind.speed.to_string(),
        sunrise: format_time_in(resp.sys.sunrise, tz),
        sunset: format_time_in(resp.sys.sunset, tz),
        name: resp.name.clone(),
        country: resp.sys.country.clone(),
    }
}

/// `HH:mm` (24-hour) for a unix timestamp in the local time zone.
pub fn format_time(unix_secs: i64) -> String {
    format_time_in(unix_secs, &Local)
}

pub fn format_time_in<Tz: TimeZone>(unix_secs: i64, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    match DateTime::from_timestamp(unix_secs, 0) {
        Some(utc) => utc.with_timezone(tz).format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// Region part of a POSIX or BCP 47 locale: `"en_US.UTF-8"` gives `"US"`.
pub fn region_from_locale(locale: &str) -> Option<String> {
    let base = locale.split(['.', '@']).next()?;
    let region = base.split(['_', '-']).nth(1)?;

    if region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(region.to_ascii_uppercase())
    } else {
        None
    }
}

/// Region from `LC_ALL`, `LC_MESSAGES` or `LANG`, first match wins.
pub fn system_region() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|value| region_from_locale(&value))
}
