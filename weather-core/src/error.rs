//! Typed errors for the weather pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single weather request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("weather request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("weather request could not be sent")]
    Transport(#[source] reqwest::Error),

    #[error("weather response could not be decoded")]
    Decode(#[source] serde_json::Error),
}

impl FetchError {
    /// HTTP status for non-2xx responses; `None` for transport and decode failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            Self::Decode(_) => None,
        }
    }

    pub fn is_bad_request(&self) -> bool {
        self.status_code() == Some(400)
    }
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location services are disabled")]
    ServicesDisabled,

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read preference file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to write preference file '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("preference file '{0}' is not valid JSON")]
    Corrupt(PathBuf, #[source] serde_json::Error),

    #[error("failed to encode preferences")]
    Encode(#[source] serde_json::Error),
}

/// Top-level error surfaced by a weather session.
#[derive(Debug, Error)]
pub enum Error {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location services are disabled")]
    LocationServicesDisabled,

    #[error("no network connection")]
    NoConnectivity,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cached weather could not be decoded")]
    Deserialization(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Location(LocationError),
}

impl From<LocationError> for Error {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => Error::PermissionDenied,
            LocationError::ServicesDisabled => Error::LocationServicesDisabled,
            other => Error::Location(other),
        }
    }
}

impl Error {
    /// Short text suitable for a transient notice.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => "Location permission is required to show local weather".to_string(),
            Self::LocationServicesDisabled => "Please, turn on location".to_string(),
            Self::NoConnectivity => "No network connection. Showing last known weather.".to_string(),
            Self::Fetch(err) => match err.status_code() {
                Some(status) => format!("Weather service returned status {status}"),
                None => "Could not reach the weather service".to_string(),
            },
            Self::Deserialization(_) => "Cached weather is unreadable".to_string(),
            Self::Store(_) => "Local storage error".to_string(),
            Self::Location(err) => format!("Location error: {err}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
