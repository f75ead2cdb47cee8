//! Distances for spatial sorting.

use std::fmt;

use crate::error::{Result, TesseraError};

/// Kilometres per statute mile.
const KM_PER_MILE: f64 = 1.609344;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Unit distances are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpatialUnits {
    #[default]
    Kilometers,
    Miles,
}

impl fmt::Display for SpatialUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialUnits::Kilometers => f.write_str("Kilometers"),
            SpatialUnits::Miles => f.write_str("Miles"),
        }
    }
}

/// A point on the globe, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(TesseraError::query(format!(
                "Invalid latitude: {lat} (must be between -90 and 90)"
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(TesseraError::query(format!(
                "Invalid longitude: {lon} (must be between -180 and 180)"
            )));
        }
        Ok(GeoPoint { lat, lon })
    }

    /// Haversine distance in kilometres.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lon = (other.lon - self.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}

/// Distance from `center` to `point` in `units`, rounded to the nearest
/// multiple of `round` when `round` is positive.
pub fn distance(center: &GeoPoint, point: &GeoPoint, round: f64, units: SpatialUnits) -> f64 {
    let km = center.distance_to(point);
    let value = match units {
        SpatialUnits::Kilometers => km,
        SpatialUnits::Miles => km / KM_PER_MILE,
    };
    if round > 0.0 {
        (value / round).round() * round
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let berlin = GeoPoint::new(52.52, 13.405).unwrap();
        let paris = GeoPoint::new(48.8566, 2.3522).unwrap();

        let km = distance(&berlin, &paris, 0.0, SpatialUnits::Kilometers);
        assert!((km - 878.0).abs() < 5.0, "{km}");

        let miles = distance(&berlin, &paris, 0.0, SpatialUnits::Miles);
        assert!((miles * KM_PER_MILE - km).abs() < 1e-9);

        assert_eq!(distance(&berlin, &paris, 100.0, SpatialUnits::Kilometers), 900.0);
        assert_eq!(distance(&berlin, &berlin, 0.0, SpatialUnits::Kilometers), 0.0);
    }

    #[test]
    fn test_invalid_point() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -181.0).is_err());
    }
}
