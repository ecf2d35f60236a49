use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::{
    display::system_region,
    model::{Coordinates, UnitSystem},
    provider::DEFAULT_BASE_URL,
};

/// Matches the one-minute update cadence of a foreground session.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 60;

/// Fallback when neither the config nor the locale names a region.
pub const DEFAULT_REGION: &str = "GB";

/// Fixed device position used by the static location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// units = "metric"
/// region = "GB"
///
/// [location]
/// latitude = 51.5072
/// longitude = -0.1276
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_key: Option<String>,

    /// Overrides the OpenWeather endpoint, e.g. for a proxy.
    pub base_url: Option<String>,

    /// When absent, follows the region.
    pub units: Option<UnitSystem>,

    /// ISO 3166 region code used for the temperature label.
    pub region: Option<String>,

    pub update_interval_secs: Option<u64>,

    pub location: Option<LocationConfig>,
}

impl Config {
    /// Returns the API key, or an error explaining how to set it.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `weather configure` and enter your OpenWeather API key."
            )
        })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn set_location(&mut self, coords: Coordinates) {
        self.location = Some(LocationConfig {
            latitude: coords.latitude,
            longitude: coords.longitude,
        });
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.location.map(|l| Coordinates::new(l.latitude, l.longitude))
    }

    /// Configured region, else the locale's, else [`DEFAULT_REGION`].
    pub fn effective_region(&self) -> String {
        self.region
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_ascii_uppercase)
            .or_else(system_region)
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    pub fn effective_units(&self) -> UnitSystem {
        self.units
            .unwrap_or_else(|| UnitSystem::for_region(&self.effective_region()))
    }

    pub fn update_interval(&self) -> Duration {
        let secs = self
            .update_interval_secs
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_UPDATE_INTERVAL_SECS);
        Duration::from_secs(secs)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the preference store holding cached weather and permission grants.
    pub fn preferences_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("preferences.json"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-app", "weather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }
}
