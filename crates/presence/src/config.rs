use std::env;
use std::time::Duration;

use foundation::LatLng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geolocation::{AcquisitionStrategy, LOW_ACCURACY_THRESHOLD_M};
use crate::publisher::PublisherOptions;
use crate::view::MapViewState;

pub const DEFAULT_PRESENCE_URL: &str = "http://127.0.0.1:9200/api";
pub const DEFAULT_ROUTING_URL: &str = "https://router.project-osrm.org";

/// Widget settings. Every field has a default so partial JSON and partial
/// environments both work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WidgetConfig {
    /// Base URL of the presence backend; `/location` is appended.
    pub presence_url: String,
    /// OSRM-compatible routing host.
    pub routing_url: String,
    pub routing_profile: String,
    /// Used to filter the caller's own entry out of the roster.
    pub participant_id: String,
    pub token: Option<String>,
    pub poll_interval_ms: u64,
    pub publish_refresh_ms: u64,
    pub route_refresh_ms: u64,
    pub retry_delay_ms: u64,
    /// Per-request limit on the HTTP client shared by presence and routing.
    pub request_timeout_ms: u64,
    pub low_accuracy_threshold_m: f64,
    /// `[lat, lng]`
    pub default_center: [f64; 2],
    pub default_zoom: f64,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            presence_url: DEFAULT_PRESENCE_URL.to_string(),
            routing_url: DEFAULT_ROUTING_URL.to_string(),
            routing_profile: "foot".to_string(),
            participant_id: String::new(),
            token: None,
            poll_interval_ms: 3_000,
            publish_refresh_ms: 15_000,
            route_refresh_ms: 10_000,
            retry_delay_ms: 1_000,
            request_timeout_ms: 2_500,
            low_accuracy_threshold_m: LOW_ACCURACY_THRESHOLD_M,
            default_center: [0.0, 0.0],
            default_zoom: 2.0,
        }
    }
}

impl WidgetConfig {
    /// Read `PRESENCE_URL`, `ROUTING_URL`, `ROUTING_PROFILE`,
    /// `PARTICIPANT_ID`, `PRESENCE_TOKEN` and the `*_MS` interval overrides.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        let number = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let float = |key: &str, default: f64| -> f64 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            presence_url: string("PRESENCE_URL", d.presence_url),
            routing_url: string("ROUTING_URL", d.routing_url),
            routing_profile: string("ROUTING_PROFILE", d.routing_profile),
            participant_id: string("PARTICIPANT_ID", d.participant_id),
            token: lookup("PRESENCE_TOKEN").filter(|t| !t.trim().is_empty()),
            poll_interval_ms: number("POLL_INTERVAL_MS", d.poll_interval_ms),
            publish_refresh_ms: number("PUBLISH_REFRESH_MS", d.publish_refresh_ms),
            route_refresh_ms: number("ROUTE_REFRESH_MS", d.route_refresh_ms),
            retry_delay_ms: number("ACQUIRE_RETRY_DELAY_MS", d.retry_delay_ms),
            request_timeout_ms: number("REQUEST_TIMEOUT_MS", d.request_timeout_ms),
            low_accuracy_threshold_m: float("LOW_ACCURACY_THRESHOLD_M", d.low_accuracy_threshold_m),
            default_center: [
                float("DEFAULT_CENTER_LAT", d.default_center[0]),
                float("DEFAULT_CENTER_LNG", d.default_center[1]),
            ],
            default_zoom: float("DEFAULT_ZOOM", d.default_zoom),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("PRESENCE_URL", &self.presence_url)?;
        check_url("ROUTING_URL", &self.routing_url)?;
        if self.participant_id.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "PARTICIPANT_ID",
            });
        }
        if self.routing_profile.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "ROUTING_PROFILE",
            });
        }
        for (key, value) in [
            ("POLL_INTERVAL_MS", self.poll_interval_ms),
            ("PUBLISH_REFRESH_MS", self.publish_refresh_ms),
            ("ROUTE_REFRESH_MS", self.route_refresh_ms),
            ("REQUEST_TIMEOUT_MS", self.request_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval { key });
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn publish_refresh(&self) -> Duration {
        Duration::from_millis(self.publish_refresh_ms)
    }

    pub fn route_refresh(&self) -> Duration {
        Duration::from_millis(self.route_refresh_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn acquisition(&self) -> AcquisitionStrategy {
        AcquisitionStrategy::default()
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
            .with_low_accuracy_threshold(self.low_accuracy_threshold_m)
    }

    pub fn publisher_options(&self) -> PublisherOptions {
        PublisherOptions {
            refresh_period: self.publish_refresh(),
            ..PublisherOptions::default()
        }
    }

    pub fn initial_view(&self) -> MapViewState {
        MapViewState {
            center: LatLng::new(self.default_center[0], self.default_center[1]),
            zoom: self.default_zoom,
        }
    }
}

fn check_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing { key });
    }
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::InvalidUrl {
            key,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_component_periods() {
        let cfg = WidgetConfig::default();
        assert_eq!(cfg.poll_interval(), Duration::from_secs(3));
        assert_eq!(cfg.publish_refresh(), Duration::from_secs(15));
        assert_eq!(cfg.route_refresh(), Duration::from_secs(10));
        assert!(cfg.request_timeout() < cfg.poll_interval());
        assert_eq!(cfg.acquisition().low_accuracy_threshold_m(), 500.0);
    }

    #[test]
    fn environment_overrides_and_ignores_garbage() {
        let cfg = WidgetConfig::from_lookup(lookup(&[
            ("PRESENCE_URL", "https://presence.example/api"),
            ("PARTICIPANT_ID", "u-42"),
            ("POLL_INTERVAL_MS", "5000"),
            ("ROUTE_REFRESH_MS", "soon"),
            ("PRESENCE_TOKEN", "   "),
        ]));
        assert_eq!(cfg.presence_url, "https://presence.example/api");
        assert_eq!(cfg.participant_id, "u-42");
        assert_eq!(cfg.poll_interval_ms, 5000);
        assert_eq!(cfg.route_refresh_ms, 10_000);
        assert_eq!(cfg.token, None);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cfg = WidgetConfig::default();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Missing {
                key: "PARTICIPANT_ID"
            })
        );

        let cfg = WidgetConfig {
            participant_id: "me".into(),
            routing_url: "router.local".into(),
            ..WidgetConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidUrl { key: "ROUTING_URL", .. })));

        let cfg = WidgetConfig {
            participant_id: "me".into(),
            poll_interval_ms: 0,
            ..WidgetConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ZeroInterval {
                key: "POLL_INTERVAL_MS"
            })
        );
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: WidgetConfig =
            serde_json::from_str(r#"{ "participantId": "me", "pollIntervalMs": 1000 }"#).unwrap();
        assert_eq!(cfg.participant_id, "me");
        assert_eq!(cfg.poll_interval_ms, 1000);
        assert_eq!(cfg.publish_refresh_ms, 15_000);
        assert_eq!(cfg.routing_profile, "foot");
    }
}
