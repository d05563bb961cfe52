/// A WGS84 position in degrees, latitude first.
///
/// Services that speak GeoJSON order coordinates `[lng, lat]`; convert at the
/// boundary with [`LatLng::from_lng_lat`] so the rest of the code never sees
/// the swapped order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self {
            lat: pair[1],
            lng: pair[0],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    pub fn is_valid(&self) -> bool {
        self.is_finite() && (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Arithmetic mean of a set of positions.
///
/// Good enough for the small clusters a map view frames; it does not handle
/// sets that straddle the antimeridian.
pub fn centroid(points: &[LatLng]) -> Option<LatLng> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat, lng) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
    Some(LatLng::new(lat / n, lng / n))
}

#[cfg(test)]
mod tests {
    use super::{LatLng, centroid};

    #[test]
    fn swaps_geojson_order() {
        let p = LatLng::from_lng_lat([13.4, 52.5]);
        assert_eq!(p, LatLng::new(52.5, 13.4));
    }

    #[test]
    fn centroid_of_four_points() {
        let pts = [
            LatLng::new(10.0, 10.0),
            LatLng::new(10.0, 12.0),
            LatLng::new(12.0, 10.0),
            LatLng::new(11.0, 11.0),
        ];
        let c = centroid(&pts).unwrap();
        assert!((c.lat - 10.75).abs() < 1e-12);
        assert!((c.lng - 10.75).abs() < 1e-12);
    }

    #[test]
    fn centroid_of_nothing_is_none() {
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn validity_rejects_out_of_range() {
        assert!(LatLng::new(45.0, 7.0).is_valid());
        assert!(!LatLng::new(91.0, 7.0).is_valid());
        assert!(!LatLng::new(0.0, f64::NAN).is_valid());
    }
}
