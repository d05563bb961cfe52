use std::time::Duration;

use thiserror::Error;

use crate::geolocation::PositionErrorCode;

/// Final outcome of a failed position acquisition.
///
/// `PermissionDenied` is terminal until the user changes a platform setting.
/// The other two are only surfaced after every acquisition profile was tried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("location permission denied: {0}")]
    PermissionDenied(String),
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
    #[error("timed out waiting for a position: {0}")]
    Timeout(String),
}

impl AcquireError {
    pub fn from_code(code: PositionErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            PositionErrorCode::PermissionDenied => Self::PermissionDenied(message),
            PositionErrorCode::PositionUnavailable => Self::PositionUnavailable(message),
            PositionErrorCode::Timeout => Self::Timeout(message),
        }
    }

    pub fn code(&self) -> PositionErrorCode {
        match self {
            Self::PermissionDenied(_) => PositionErrorCode::PermissionDenied,
            Self::PositionUnavailable(_) => PositionErrorCode::PositionUnavailable,
            Self::Timeout(_) => PositionErrorCode::Timeout,
        }
    }
}

/// Failure talking to the presence backend.
///
/// These are logged and absorbed by the publisher and poller; the next
/// scheduled tick retries.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("presence request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("presence backend returned HTTP {status}")]
    Status { status: u16 },
    #[error("presence response could not be decoded: {0}")]
    Decode(String),
    #[error("presence request gave no answer within {0:?}")]
    Timeout(Duration),
}

/// Failure reaching the routing service. A reachable service that finds no
/// path is not an error; see [`crate::routing::RouteOutcome::NoRoute`].
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("routing service returned HTTP {status}")]
    Status { status: u16 },
    #[error("routing response could not be decoded: {0}")]
    Decode(String),
    #[error("routing request gave no answer within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("own position is not known yet; start sharing first")]
    NoSelfFix,
    #[error("participant {0} is not on the roster")]
    UnknownTarget(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{key} must not be empty")]
    Missing { key: &'static str },
    #[error("{key} must be an http(s) URL, got {value:?}")]
    InvalidUrl { key: &'static str, value: String },
    #[error("{key} must be greater than zero")]
    ZeroInterval { key: &'static str },
    #[error("acquisition profiles must relax monotonically (profile {index} is stricter than its predecessor)")]
    ProfilesNotRelaxing { index: usize },
    #[error("at least one acquisition profile is required")]
    NoProfiles,
    #[error("http client could not be built: {0}")]
    HttpClient(String),
}
