use foundation::LatLng;

use crate::geolocation::Position;

/// The user's own most recent fix. Replaced wholesale on every update.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MyLocation {
    pub lat: f64,
    pub lng: f64,
    /// Reported accuracy radius in meters.
    pub accuracy: f64,
}

impl MyLocation {
    pub fn new(lat: f64, lng: f64, accuracy: f64) -> Self {
        Self { lat, lng, accuracy }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

impl From<Position> for MyLocation {
    fn from(p: Position) -> Self {
        Self {
            lat: p.coords.lat,
            lng: p.coords.lng,
            accuracy: p.accuracy,
        }
    }
}

/// A computed walking route: geometry plus turn-by-turn steps.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteInfo {
    pub coordinates: Vec<LatLng>,
    /// Meters.
    pub distance: f64,
    /// Seconds.
    pub duration: f64,
    pub steps: Vec<RouteStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteStep {
    pub instruction: String,
    pub distance: f64,
    pub duration: f64,
    /// Maneuver type, with the modifier appended as `type-modifier` when present.
    pub maneuver: String,
}

impl RouteInfo {
    /// Short human readable summary, e.g. `"1.2 km · 15 min"`.
    pub fn summary(&self) -> String {
        format!("{} · {}", format_distance(self.distance), format_duration(self.duration))
    }
}

pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", meters.round() as i64)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

pub fn format_duration(seconds: f64) -> String {
    let minutes = (seconds / 60.0).round() as i64;
    if minutes < 1 {
        "< 1 min".to_string()
    } else if minutes < 60 {
        format!("{minutes} min")
    } else {
        format!("{} h {} min", minutes / 60, minutes % 60)
    }
}
