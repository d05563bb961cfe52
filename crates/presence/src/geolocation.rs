//! Position acquisition with progressive relaxation.
//!
//! The first attempt asks for a precise, fresh fix; each retry accepts a
//! longer wait, lower accuracy, or an older cached fix. Permission denial is
//! reported at once since no profile can change it.

use std::sync::Arc;
use std::time::Duration;

use foundation::{LatLng, Timestamp};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{AcquireError, ConfigError};
use crate::model::MyLocation;
use crate::BoxFuture;

/// Accuracy radius (meters) above which a fix is flagged as low accuracy.
pub const LOW_ACCURACY_THRESHOLD_M: f64 = 500.0;

/// Pause between two acquisition attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Options understood by the platform position API.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the platform may return instead of a fresh one.
    pub maximum_age: Duration,
}

impl PositionOptions {
    pub const fn new(enable_high_accuracy: bool, timeout: Duration, maximum_age: Duration) -> Self {
        Self {
            enable_high_accuracy,
            timeout,
            maximum_age,
        }
    }

    /// High accuracy, 15 s, fresh fixes only.
    pub const fn strict() -> Self {
        Self::new(true, Duration::from_secs(15), Duration::ZERO)
    }

    /// Network-grade accuracy, 30 s, fresh fixes only.
    pub const fn medium() -> Self {
        Self::new(false, Duration::from_secs(30), Duration::ZERO)
    }

    /// 45 s, fixes up to 30 s old.
    pub const fn relaxed() -> Self {
        Self::new(false, Duration::from_secs(45), Duration::from_secs(30))
    }

    /// 60 s, fixes up to 60 s old.
    pub const fn lenient() -> Self {
        Self::new(false, Duration::from_secs(60), Duration::from_secs(60))
    }

    /// True when `self` is at least as permissive as `prev` in one dimension.
    fn relaxes(&self, prev: &PositionOptions) -> bool {
        self.timeout >= prev.timeout || (prev.enable_high_accuracy && !self.enable_high_accuracy)
    }
}

/// Platform failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PositionErrorCode {
    PermissionDenied = 1,
    PositionUnavailable = 2,
    Timeout = 3,
}

impl PositionErrorCode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::PermissionDenied),
            2 => Some(Self::PositionUnavailable),
            3 => Some(Self::Timeout),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionError {
    pub code: PositionErrorCode,
    pub message: String,
}

impl PositionError {
    pub fn new(code: PositionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn permission_denied() -> Self {
        Self::new(PositionErrorCode::PermissionDenied, "user denied geolocation")
    }

    pub fn unavailable() -> Self {
        Self::new(PositionErrorCode::PositionUnavailable, "position unavailable")
    }

    pub fn timeout() -> Self {
        Self::new(PositionErrorCode::Timeout, "position request timed out")
    }
}

/// A single reading from the platform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Position {
    pub coords: LatLng,
    /// Accuracy radius in meters.
    pub accuracy: f64,
    pub timestamp: Timestamp,
}

impl Position {
    pub fn new(lat: f64, lng: f64, accuracy: f64) -> Self {
        Self {
            coords: LatLng::new(lat, lng),
            accuracy,
            timestamp: Timestamp::now(),
        }
    }
}

/// Continuous position subscription. Dropping the receiver ends the watch.
pub type PositionWatch = mpsc::Receiver<Result<Position, PositionError>>;

/// Platform position API.
///
/// Implementations need not enforce `options.timeout`; the acquisition
/// strategy bounds every request itself.
pub trait GeolocationProvider: Send + Sync {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> BoxFuture<'_, Result<Position, PositionError>>;

    fn watch_position(&self, options: PositionOptions) -> PositionWatch;
}

/// Request one position, bounded by `options.timeout`.
pub async fn current_position_within(
    provider: &dyn GeolocationProvider,
    options: PositionOptions,
) -> Result<Position, PositionError> {
    match tokio::time::timeout(options.timeout, provider.current_position(options)).await {
        Ok(result) => result,
        Err(_) => Err(PositionError::timeout()),
    }
}

/// A successful acquisition.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Acquired {
    pub fix: MyLocation,
    /// Set when the reported accuracy exceeds the strategy's threshold. The
    /// fix is still usable.
    pub low_accuracy: bool,
    /// Zero-based index of the profile that produced the fix.
    pub attempt: usize,
}

/// Ordered acquisition profiles, strict first.
#[derive(Debug, Clone)]
pub struct AcquisitionStrategy {
    profiles: Vec<PositionOptions>,
    retry_delay: Duration,
    low_accuracy_threshold_m: f64,
}

impl Default for AcquisitionStrategy {
    fn default() -> Self {
        Self {
            profiles: vec![
                PositionOptions::strict(),
                PositionOptions::medium(),
                PositionOptions::relaxed(),
                PositionOptions::lenient(),
            ],
            retry_delay: RETRY_DELAY,
            low_accuracy_threshold_m: LOW_ACCURACY_THRESHOLD_M,
        }
    }
}

impl AcquisitionStrategy {
    pub fn new(
        profiles: Vec<PositionOptions>,
        retry_delay: Duration,
        low_accuracy_threshold_m: f64,
    ) -> Result<Self, ConfigError> {
        if profiles.is_empty() {
            return Err(ConfigError::NoProfiles);
        }
        if let Some(index) = first_stricter_profile(&profiles) {
            return Err(ConfigError::ProfilesNotRelaxing { index });
        }
        Ok(Self {
            profiles,
            retry_delay,
            low_accuracy_threshold_m,
        })
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_low_accuracy_threshold(mut self, meters: f64) -> Self {
        self.low_accuracy_threshold_m = meters;
        self
    }

    pub fn profiles(&self) -> &[PositionOptions] {
        &self.profiles
    }

    pub fn low_accuracy_threshold_m(&self) -> f64 {
        self.low_accuracy_threshold_m
    }

    pub async fn acquire(&self, provider: &dyn GeolocationProvider) -> Result<Acquired, AcquireError> {
        self.acquire_from(provider, 0).await
    }

    /// Run the profile ladder starting at `attempt`.
    pub async fn acquire_from(
        &self,
        provider: &dyn GeolocationProvider,
        mut attempt: usize,
    ) -> Result<Acquired, AcquireError> {
        loop {
            let Some(options) = self.profiles.get(attempt).copied() else {
                return Err(AcquireError::PositionUnavailable(format!(
                    "no acquisition profile at index {attempt}"
                )));
            };

            debug!(attempt, ?options, "requesting position");
            match current_position_within(provider, options).await {
                Ok(position) => {
                    let fix = MyLocation::from(position);
                    let low_accuracy = fix.accuracy > self.low_accuracy_threshold_m;
                    if low_accuracy {
                        warn!(
                            accuracy_m = fix.accuracy,
                            threshold_m = self.low_accuracy_threshold_m,
                            "position acquired with low accuracy"
                        );
                    } else {
                        info!(attempt, accuracy_m = fix.accuracy, "position acquired");
                    }
                    return Ok(Acquired {
                        fix,
                        low_accuracy,
                        attempt,
                    });
                }
                Err(err) if err.code == PositionErrorCode::PermissionDenied => {
                    warn!(attempt, "geolocation permission denied");
                    return Err(AcquireError::from_code(err.code, err.message));
                }
                Err(err) if attempt + 1 < self.profiles.len() => {
                    warn!(attempt, code = ?err.code, "position attempt failed, relaxing");
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(attempt, code = ?err.code, "all position attempts failed");
                    return Err(AcquireError::from_code(err.code, err.message));
                }
            }
        }
    }

    /// Callback form of [`acquire_from`](Self::acquire_from): exactly one of
    /// the two callbacks runs.
    pub async fn acquire_with<S, F>(
        &self,
        provider: &dyn GeolocationProvider,
        attempt: usize,
        on_success: S,
        on_fail: F,
    ) where
        S: FnOnce(Acquired),
        F: FnOnce(AcquireError),
    {
        match self.acquire_from(provider, attempt).await {
            Ok(acquired) => on_success(acquired),
            Err(err) => on_fail(err),
        }
    }
}

fn first_stricter_profile(profiles: &[PositionOptions]) -> Option<usize> {
    profiles
        .windows(2)
        .position(|w| !w[1].relaxes(&w[0]))
        .map(|i| i + 1)
}

/// Provider reporting a position set by the caller.
///
/// Used for simulated devices and headless runs. Moving the position with
/// [`FixedProvider::set`] notifies every live watch.
#[derive(Clone)]
pub struct FixedProvider {
    current: Arc<watch::Sender<Result<Position, PositionError>>>,
}

impl FixedProvider {
    pub fn new(position: Position) -> Self {
        let (tx, _) = watch::channel(Ok(position));
        Self {
            current: Arc::new(tx),
        }
    }

    /// A provider whose every request fails with `error`.
    pub fn failing(error: PositionError) -> Self {
        let (tx, _) = watch::channel(Err(error));
        Self {
            current: Arc::new(tx),
        }
    }

    pub fn set(&self, position: Position) {
        self.current.send_modify(|current| *current = Ok(position));
    }
}

impl GeolocationProvider for FixedProvider {
    fn current_position(
        &self,
        _options: PositionOptions,
    ) -> BoxFuture<'_, Result<Position, PositionError>> {
        let value = self.current.borrow().clone();
        Box::pin(async move { value })
    }

    fn watch_position(&self, _options: PositionOptions) -> PositionWatch {
        let (tx, rx) = mpsc::channel(8);
        let mut updates = self.current.subscribe();
        tokio::spawn(async move {
            loop {
                let value = updates.borrow_and_update().clone();
                if tx.send(value).await.is_err() {
                    return;
                }
                tokio::select! {
                    _ = tx.closed() => return,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
        });
        rx
    }
}
