//! Terminal prompts: first-run configuration and the location permission dialog.

use async_trait::async_trait;
use inquire::{
    Confirm, CustomType, InquireError, Password, PasswordDisplayMode, Select, Text,
    validator::Validation,
};
use std::time::Duration;
use weather_core::{
    Config, Coordinates, LocationError, LocationProvider, LocationSubscription, PermissionDecision,
    PermissionKind, PermissionNegotiator, Priority, RationaleChoice, StaticLocationProvider,
    StoredPermissions, UnitSystem,
};

const RATIONALE: &str = "It looks like you have turned off permissions required for this feature.";
const GO_TO_SETTINGS: &str = "Go to settings";
const CANCEL: &str = "Cancel";
const AUTO_UNITS: &str = "auto (follow region)";

/// Interactive configuration; fields left blank keep their current value.
pub fn configure(config: &mut Config) -> Result<(), InquireError> {
    let key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !key.trim().is_empty() {
        config.set_api_key(key.trim().to_string());
    }

    let current = config.coordinates();
    let latitude = coordinate_prompt("Latitude:", -90.0, 90.0, current.map(|c| c.latitude))?;
    let longitude = coordinate_prompt("Longitude:", -180.0, 180.0, current.map(|c| c.longitude))?;
    config.set_location(Coordinates::new(latitude, longitude));

    let region = Text::new("Region code (e.g. US, GB):")
        .with_default(&config.effective_region())
        .prompt()?;
    config.region = Some(region.trim().to_ascii_uppercase()).filter(|r| !r.is_empty());

    let mut options = vec![AUTO_UNITS];
    options.extend(UnitSystem::all().iter().map(UnitSystem::as_str));
    let units = Select::new("Units:", options).prompt()?;
    config.units = UnitSystem::try_from(units).ok();

    Ok(())
}

fn coordinate_prompt(
    message: &str,
    min: f64,
    max: f64,
    current: Option<f64>,
) -> Result<f64, InquireError> {
    let mut prompt = CustomType::<f64>::new(message)
        .with_error_message("Please type a decimal number")
        .with_validator(move |value: &f64| {
            if (min..=max).contains(value) {
                Ok(Validation::Valid)
            } else {
                Ok(Validation::Invalid(format!("Must be between {min} and {max}").into()))
            }
        });
    if let Some(current) = current {
        prompt = prompt.with_default(current);
    }
    prompt.prompt()
}

/// Asks on first use, then remembers the answer in the preference store.
pub struct InteractivePermissions {
    stored: StoredPermissions,
}

impl InteractivePermissions {
    pub fn new(stored: StoredPermissions) -> Self {
        Self { stored }
    }
}

async fn ask<T, F>(prompt: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, InquireError> + Send + 'static,
{
    match tokio::task::spawn_blocking(prompt).await {
        Ok(Ok(answer)) => Some(answer),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "prompt not answered");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "prompt task failed");
            None
        }
    }
}

#[async_trait]
impl PermissionNegotiator for InteractivePermissions {
    async fn request_permissions(&self, kinds: &[PermissionKind]) -> PermissionDecision {
        let decision = self.stored.request_permissions(kinds).await;
        if decision != PermissionDecision::SomeDenied {
            return decision;
        }

        let allowed = ask(|| {
            Confirm::new("Allow weather to use your location?")
                .with_default(true)
                .with_help_message("Your coordinates are only sent to the weather service")
                .prompt()
        })
        .await;

        let result = match allowed {
            Some(true) => self.stored.grant_all(kinds).map(|_| PermissionDecision::AllGranted),
            Some(false) => self.stored.revoke_all(kinds).map(|_| PermissionDecision::SomeDenied),
            None => Ok(PermissionDecision::SomeDenied),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not store permission answer");
            PermissionDecision::SomeDenied
        })
    }

    async fn show_rationale(&self) -> RationaleChoice {
        let choice = ask(|| Select::new(RATIONALE, vec![GO_TO_SETTINGS, CANCEL]).prompt()).await;

        match choice {
            Some(GO_TO_SETTINGS) => RationaleChoice::OpenSettings,
            _ => RationaleChoice::Cancel,
        }
    }

    async fn open_settings(&self) {
        eprintln!("Location access is managed with `weather permissions grant` / `weather permissions revoke`.");
        if let Ok(path) = Config::preferences_file_path() {
            eprintln!("Stored in: {}", path.display());
        }
    }
}

/// The configured position; its settings surface is `weather configure`.
pub struct ConfiguredLocation {
    inner: StaticLocationProvider,
}

impl ConfiguredLocation {
    pub fn new(coords: Option<Coordinates>) -> Self {
        Self { inner: StaticLocationProvider::new(coords) }
    }
}

#[async_trait]
impl LocationProvider for ConfiguredLocation {
    async fn is_location_enabled(&self) -> bool {
        self.inner.is_location_enabled().await
    }

    async fn request_location_updates(
        &self,
        granted: &[PermissionKind],
        priority: Priority,
        interval: Duration,
    ) -> Result<LocationSubscription, LocationError> {
        self.inner.request_location_updates(granted, priority, interval).await
    }

    async fn current_location(&self, granted: &[PermissionKind]) -> Result<Coordinates, LocationError> {
        self.inner.current_location(granted).await
    }

    async fn open_location_settings(&self) {
        eprintln!("Hint: run `weather configure` and enter your coordinates.");
        if let Ok(path) = Config::config_file_path() {
            eprintln!("Or set [location] in: {}", path.display());
        }
    }
}
