use crate::geo::LatLng;

/// Axis-aligned lat/lng bounding box in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoBounds {
    pub min: LatLng,
    pub max: LatLng,
}

impl GeoBounds {
    pub fn new(min: LatLng, max: LatLng) -> Self {
        GeoBounds { min, max }
    }

    pub fn from_points(points: &[LatLng]) -> Option<Self> {
        let first = *points.first()?;
        let mut bounds = GeoBounds::new(first, first);
        for p in &points[1..] {
            bounds.extend(*p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, p: LatLng) {
        self.min.lat = self.min.lat.min(p.lat);
        self.min.lng = self.min.lng.min(p.lng);
        self.max.lat = self.max.lat.max(p.lat);
        self.max.lng = self.max.lng.max(p.lng);
    }

    pub fn lat_span(&self) -> f64 {
        self.max.lat - self.min.lat
    }

    pub fn lng_span(&self) -> f64 {
        self.max.lng - self.min.lng
    }

    /// Larger of the two spans, in degrees.
    pub fn max_span(&self) -> f64 {
        self.lat_span().max(self.lng_span())
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.min.lat + self.max.lat) / 2.0,
            (self.min.lng + self.max.lng) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::GeoBounds;
    use crate::geo::LatLng;

    #[test]
    fn spans_cover_all_points() {
        let b = GeoBounds::from_points(&[
            LatLng::new(10.0, 10.0),
            LatLng::new(10.0, 12.0),
            LatLng::new(12.0, 10.0),
            LatLng::new(11.0, 11.0),
        ])
        .unwrap();
        assert_eq!(b.lat_span(), 2.0);
        assert_eq!(b.lng_span(), 2.0);
        assert_eq!(b.max_span(), 2.0);
        assert_eq!(b.center(), LatLng::new(11.0, 11.0));
    }

    #[test]
    fn single_point_has_zero_span() {
        let b = GeoBounds::from_points(&[LatLng::new(1.0, 2.0)]).unwrap();
        assert_eq!(b.max_span(), 0.0);
    }
}
