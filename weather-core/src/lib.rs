//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather client and its typed response
//! - Device services behind traits: location, permissions, connectivity
//! - The preference store holding the last successful response
//! - Pure mapping from a response to display fields
//! - The session that wires all of the above together
//!
//! It is used by `weather-cli`, but can also be reused by other front ends.

pub mod config;
pub mod connectivity;
pub mod display;
pub mod error;
pub mod location;
pub mod model;
pub mod permission;
pub mod provider;
pub mod session;
pub mod store;

pub use config::{Config, LocationConfig};
pub use connectivity::{Connectivity, Offline, Online, TcpConnectivity};
pub use display::{DisplayModel, IconCategory, TemperatureUnit, format_time, map_to_display};
pub use error::{Error, FetchError, LocationError, StoreError};
pub use location::{LocationProvider, LocationSubscription, Priority, StaticLocationProvider};
pub use model::{Coordinates, UnitSystem, WeatherResponse};
pub use permission::{
    PermissionDecision, PermissionKind, PermissionNegotiator, RationaleChoice, StoredPermissions,
};
pub use provider::{OpenWeatherProvider, WeatherProvider};
pub use session::{Refresh, Services, Session, SessionEvent, SessionOutcome, SessionSettings, SessionState};
pub use store::{FileStore, KeyValueStore, MemoryStore, WeatherCache};
