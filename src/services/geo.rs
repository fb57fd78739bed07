/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CoordinateError {
    #[error("Latitude must be between -90 and 90 (got {0})")]
    Latitude(f64),

    #[error("Longitude must be between -180 and 180 (got {0})")]
    Longitude(f64),
}

/// A latitude/longitude pair in degrees, always within geographic bounds
/// when built through [`Coordinates::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::Longitude(longitude));
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// For values read back from storage, where bounds were enforced on write
    pub(crate) fn new_unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance between two coordinates in kilometers
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);

    // Rounding can push h a hair past 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Axis-aligned box in lat/lng space. Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Builds the box spanned by two corners, in either order
    pub fn spanning(start: Coordinates, end: Coordinates) -> Self {
        Self {
            min_lat: start.latitude.min(end.latitude),
            max_lat: start.latitude.max(end.latitude),
            min_lng: start.longitude.min(end.longitude),
            max_lng: start.longitude.max(end.longitude),
        }
    }

    pub fn contains(&self, point: Coordinates) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude)
            && (self.min_lng..=self.max_lng).contains(&point.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn at(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        for (lat, lng) in [(0.0, 0.0), (48.8566, 2.3522), (-33.9, 151.2), (90.0, 180.0)] {
            assert_eq!(haversine_km(at(lat, lng), at(lat, lng)), 0.0);
        }
    }

    #[test]
    fn test_distance_is_symmetric() {
        let paris = at(48.8566, 2.3522);
        let sydney = at(-33.8688, 151.2093);

        let there = haversine_km(paris, sydney);
        let back = haversine_km(sydney, paris);

        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn test_antipodal_equator_points() {
        let distance = haversine_km(at(0.0, 0.0), at(0.0, 180.0));
        assert!((distance - PI * EARTH_RADIUS_KM).abs() < 1e-6);

        let poles = haversine_km(at(90.0, 0.0), at(-90.0, 0.0));
        assert!(poles.is_finite());
        assert!(poles <= PI * EARTH_RADIUS_KM + 1e-6);
    }

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let distance = haversine_km(at(0.0, 0.0), at(0.0, 1.0));
        assert!((distance - 111.19).abs() < 0.05, "got {}", distance);
    }

    #[test]
    fn test_coordinate_bounds() {
        assert!(Coordinates::new(90.0, -180.0).is_ok());
        assert_eq!(
            Coordinates::new(90.5, 0.0),
            Err(CoordinateError::Latitude(90.5))
        );
        assert_eq!(
            Coordinates::new(0.0, 181.0),
            Err(CoordinateError::Longitude(181.0))
        );
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_bounding_box_is_order_independent() {
        let a = at(10.0, 20.0);
        let b = at(-5.0, 30.0);

        assert_eq!(BoundingBox::spanning(a, b), BoundingBox::spanning(b, a));
    }

    #[test]
    fn test_bounding_box_edges_are_inclusive() {
        let bbox = BoundingBox::spanning(at(0.0, 0.0), at(1.0, 1.0));

        assert!(bbox.contains(at(0.0, 0.0)));
        assert!(bbox.contains(at(1.0, 1.0)));
        assert!(bbox.contains(at(0.5, 1.0)));
        assert!(!bbox.contains(at(1.0001, 0.5)));
    }
}
