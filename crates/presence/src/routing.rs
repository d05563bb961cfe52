use foundation::LatLng;
use tracing::debug;

use crate::error::RoutingError;
use crate::model::{RouteInfo, RouteStep};
use crate::protocol::{OsrmManeuver, OsrmResponse, OsrmStep};
use crate::BoxFuture;

/// Result of a route request that reached the service.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Route(RouteInfo),
    /// The service answered but has no path (non-`Ok` code or empty route
    /// list). Rendered as "route unavailable".
    NoRoute { reason: String },
}

impl RouteOutcome {
    pub fn into_route(self) -> Option<RouteInfo> {
        match self {
            Self::Route(route) => Some(route),
            Self::NoRoute { .. } => None,
        }
    }
}

/// Walking route provider.
pub trait RoutingService: Send + Sync {
    fn route(&self, from: LatLng, to: LatLng) -> BoxFuture<'_, Result<RouteOutcome, RoutingError>>;
}

/// Client for an OSRM-compatible `route/v1` endpoint.
#[derive(Clone)]
pub struct OsrmRouter {
    http: reqwest::Client,
    host: String,
    profile: String,
}

impl OsrmRouter {
    pub fn new(http: reqwest::Client, host: impl Into<String>) -> Self {
        Self {
            http,
            host: host.into(),
            profile: "foot".to_string(),
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn url(&self, from: LatLng, to: LatLng) -> String {
        route_url(&self.host, &self.profile, from, to)
    }

    async fn fetch(&self, from: LatLng, to: LatLng) -> Result<RouteOutcome, RoutingError> {
        let url = self.url(from, to);
        debug!(%url, "requesting route");
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        // OSRM reports "no route" and bad input as 4xx with a JSON body carrying
        // the code, so try the body before falling back to the status.
        match serde_json::from_slice::<OsrmResponse>(&bytes) {
            Ok(body) => Ok(decode_route(body)),
            Err(_) if !status.is_success() => Err(RoutingError::Status {
                status: status.as_u16(),
            }),
            Err(err) => Err(RoutingError::Decode(err.to_string())),
        }
    }
}

impl RoutingService for OsrmRouter {
    fn route(&self, from: LatLng, to: LatLng) -> BoxFuture<'_, Result<RouteOutcome, RoutingError>> {
        Box::pin(self.fetch(from, to))
    }
}

/// `{host}/route/v1/{profile}/{lng1},{lat1};{lng2},{lat2}?overview=full&geometries=geojson&steps=true`
pub fn route_url(host: &str, profile: &str, from: LatLng, to: LatLng) -> String {
    format!(
        "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson&steps=true",
        host.trim_end_matches('/'),
        profile,
        from.lng,
        from.lat,
        to.lng,
        to.lat
    )
}

/// Convert a routing response into the internal model.
///
/// Takes the first route. Geometry is swapped from `[lng, lat]` into
/// [`LatLng`]; steps of every leg are flattened in order.
pub fn decode_route(resp: OsrmResponse) -> RouteOutcome {
    if resp.code != "Ok" {
        return RouteOutcome::NoRoute {
            reason: resp.message.unwrap_or(resp.code),
        };
    }
    let Some(route) = resp.routes.into_iter().next() else {
        return RouteOutcome::NoRoute {
            reason: "no routes returned".to_string(),
        };
    };

    let coordinates = route
        .geometry
        .coordinates
        .iter()
        .map(|pair| LatLng::from_lng_lat(*pair))
        .collect();

    let steps = route
        .legs
        .iter()
        .flat_map(|leg| leg.steps.iter())
        .map(decode_step)
        .collect();

    RouteOutcome::Route(RouteInfo {
        coordinates,
        distance: route.distance,
        duration: route.duration,
        steps,
    })
}

fn decode_step(step: &OsrmStep) -> RouteStep {
    let instruction = step
        .maneuver
        .instruction
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| describe_maneuver(&step.maneuver, &step.name));
    RouteStep {
        instruction,
        distance: step.distance,
        duration: step.duration,
        maneuver: maneuver_kind(&step.maneuver),
    }
}

pub fn maneuver_kind(m: &OsrmManeuver) -> String {
    match m.modifier.as_deref() {
        Some(modifier) if !modifier.is_empty() => format!("{}-{}", m.kind, modifier.replace(' ', "-")),
        _ => m.kind.clone(),
    }
}

/// Fallback phrase for services that do not send instructions.
fn describe_maneuver(m: &OsrmManeuver, street: &str) -> String {
    let onto = if street.is_empty() {
        String::new()
    } else {
        format!(" onto {street}")
    };
    let modifier = m.modifier.as_deref().unwrap_or("");
    match m.kind.as_str() {
        "depart" => {
            if street.is_empty() {
                "Head out".to_string()
            } else {
                format!("Head out on {street}")
            }
        }
        "arrive" => "Arrive at destination".to_string(),
        "turn" | "end of road" | "fork" if !modifier.is_empty() => {
            format!("Turn {modifier}{onto}")
        }
        "new name" | "continue" => format!("Continue{onto}"),
        "roundabout" | "rotary" => format!("Enter the roundabout{onto}"),
        other if !modifier.is_empty() => format!("{} {modifier}{onto}", capitalize(other)),
        other => format!("{}{onto}", capitalize(other)),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn response(body: serde_json::Value) -> OsrmResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn builds_service_url_in_lng_lat_order() {
        let url = route_url(
            "https://router.example/",
            "foot",
            LatLng::new(52.5, 13.4),
            LatLng::new(52.6, 13.5),
        );
        assert_eq!(
            url,
            "https://router.example/route/v1/foot/13.4,52.5;13.5,52.6?overview=full&geometries=geojson&steps=true"
        );
    }

    #[test]
    fn decodes_geometry_and_flattens_steps() {
        let resp = response(serde_json::json!({
            "code": "Ok",
            "routes": [{
                "geometry": { "coordinates": [[13.4, 52.5], [13.45, 52.55], [13.5, 52.6]] },
                "distance": 1520.5,
                "duration": 1100.0,
                "legs": [
                    { "steps": [
                        { "maneuver": { "type": "depart", "instruction": "Head north" }, "distance": 100.0, "duration": 80.0, "name": "A" },
                        { "maneuver": { "type": "turn", "modifier": "left" }, "distance": 900.0, "duration": 650.0, "name": "B" }
                    ]},
                    { "steps": [
                        { "maneuver": { "type": "arrive" }, "distance": 0.0, "duration": 0.0 }
                    ]}
                ]
            }]
        }));

        let route = decode_route(resp).into_route().unwrap();
        assert_eq!(
            route.coordinates,
            vec![
                LatLng::new(52.5, 13.4),
                LatLng::new(52.55, 13.45),
                LatLng::new(52.6, 13.5),
            ]
        );
        assert_eq!(route.distance, 1520.5);
        assert_eq!(route.duration, 1100.0);

        let kinds: Vec<_> = route.steps.iter().map(|s| s.maneuver.as_str()).collect();
        assert_eq!(kinds, vec!["depart", "turn-left", "arrive"]);
        assert_eq!(route.steps[0].instruction, "Head north");
        assert_eq!(route.steps[1].instruction, "Turn left onto B");
        assert_eq!(route.steps[1].distance, 900.0);
        assert_eq!(route.steps[2].instruction, "Arrive at destination");
    }

    #[test]
    fn coordinate_count_is_preserved() {
        let coords: Vec<[f64; 2]> = (0..37).map(|i| [i as f64 * 0.01, 45.0 + i as f64 * 0.02]).collect();
        let resp = response(serde_json::json!({
            "code": "Ok",
            "routes": [{ "geometry": { "coordinates": coords }, "distance": 1.0, "duration": 1.0, "legs": [] }]
        }));
        let route = decode_route(resp).into_route().unwrap();
        assert_eq!(route.coordinates.len(), 37);
        for (decoded, raw) in route.coordinates.iter().zip(&coords) {
            assert_eq!([decoded.lat, decoded.lng], [raw[1], raw[0]]);
        }
    }

    #[test]
    fn empty_route_list_is_no_route() {
        let outcome = decode_route(response(serde_json::json!({ "code": "Ok", "routes": [] })));
        assert!(matches!(outcome, RouteOutcome::NoRoute { .. }));
        assert_eq!(outcome.into_route(), None);
    }

    #[test]
    fn non_ok_code_is_no_route() {
        let outcome = decode_route(response(serde_json::json!({
            "code": "NoRoute",
            "message": "Impossible route between points"
        })));
        assert_eq!(
            outcome,
            RouteOutcome::NoRoute {
                reason: "Impossible route between points".to_string()
            }
        );
    }

    #[test]
    fn modifier_with_spaces_is_hyphenated() {
        let m = OsrmManeuver {
            kind: "turn".to_string(),
            modifier: Some("slight right".to_string()),
            instruction: None,
        };
        assert_eq!(maneuver_kind(&m), "turn-slight-right");
    }
}
