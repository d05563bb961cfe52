//! Wire types for the presence backend and the routing service.
//!
//! Presence backend (JSON, camelCase):
//! - `GET /location` → [`LocationsResponse`]
//! - `POST /location` with [`PublishLocation`]
//! - `DELETE /location`
//!
//! Routing service (OSRM-compatible `route/v1`): [`OsrmResponse`]. The service
//! emits coordinates as `[lng, lat]`; conversion to [`LatLng`] happens in
//! [`crate::routing::decode_route`] and nowhere else.

use foundation::LatLng;
use serde::{Deserialize, Serialize};

/// A participant's last published fix, as owned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLocation {
    pub id: String,
    pub participant_id: String,
    pub participant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub site_name: String,
    pub updated_at: String,
}

impl UserLocation {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationsResponse {
    #[serde(default)]
    pub locations: Vec<UserLocation>,
    #[serde(default)]
    pub user_site: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub can_share: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl PublishLocation {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

impl From<LatLng> for PublishLocation {
    fn from(p: LatLng) -> Self {
        Self {
            latitude: p.lat,
            longitude: p.lng,
        }
    }
}

/// Top-level routing response. `code` is `"Ok"` on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsrmResponse {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<OsrmRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsrmRoute {
    pub geometry: OsrmGeometry,
    pub distance: f64,
    pub duration: f64,
    #[serde(default)]
    pub legs: Vec<OsrmLeg>,
}

/// GeoJSON LineString geometry, `[lng, lat]` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsrmGeometry {
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsrmLeg {
    #[serde(default)]
    pub steps: Vec<OsrmStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsrmStep {
    pub maneuver: OsrmManeuver,
    pub distance: f64,
    pub duration: f64,
    /// Street name, empty when unnamed.
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsrmManeuver {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_locations_payload() {
        let body = r#"{
            "locations": [{
                "id": "loc-1",
                "participantId": "p-7",
                "participantName": "Sam",
                "avatarUrl": null,
                "teamName": "Blue",
                "latitude": 52.52,
                "longitude": 13.405,
                "siteName": "Berlin",
                "updatedAt": "2026-10-18T09:00:00Z"
            }],
            "userSite": "Berlin",
            "isAdmin": false,
            "canShare": true
        }"#;
        let resp: LocationsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.locations.len(), 1);
        let loc = &resp.locations[0];
        assert_eq!(loc.participant_id, "p-7");
        assert_eq!(loc.avatar_url, None);
        assert_eq!(loc.team_name.as_deref(), Some("Blue"));
        assert_eq!(loc.position(), LatLng::new(52.52, 13.405));
        assert!(resp.can_share);
    }

    #[test]
    fn missing_metadata_defaults() {
        let resp: LocationsResponse = serde_json::from_str(r#"{"locations": []}"#).unwrap();
        assert_eq!(resp.user_site, None);
        assert!(!resp.is_admin);
    }

    #[test]
    fn publish_body_uses_full_field_names() {
        let body = serde_json::to_value(PublishLocation::from(LatLng::new(1.5, -2.0))).unwrap();
        assert_eq!(body, serde_json::json!({ "latitude": 1.5, "longitude": -2.0 }));
    }

    #[test]
    fn maneuver_type_field_is_renamed() {
        let m: OsrmManeuver =
            serde_json::from_str(r#"{"type": "turn", "modifier": "left"}"#).unwrap();
        assert_eq!(m.kind, "turn");
        assert_eq!(m.modifier.as_deref(), Some("left"));
        assert_eq!(m.instruction, None);
    }
}
