use serde::{Deserialize, Serialize};

/// A branch location as stored on branch documents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Calculate distance between two coordinates in kilometers
///
/// Uses Haversine formula for accuracy on Earth's surface
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlng / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_riyadh_local() {
        // Riyadh center to a nearby district (~13 km)
        let riyadh = GeoPoint {
            latitude: 24.7136,
            longitude: 46.6753,
        };
        let nearby = GeoPoint {
            latitude: 24.6,
            longitude: 46.7,
        };

        let distance = distance_km(&riyadh, &nearby);
        assert!(distance > 10.0 && distance < 16.0);
    }

    #[test]
    fn test_distance_riyadh_jeddah() {
        // Riyadh to Jeddah (~850 km)
        let riyadh = GeoPoint {
            latitude: 24.7136,
            longitude: 46.6753,
        };
        let jeddah = GeoPoint {
            latitude: 21.0,
            longitude: 39.0,
        };

        let distance = distance_km(&riyadh, &jeddah);
        assert!(distance > 800.0 && distance < 900.0);
    }

    #[test]
    fn test_distance_same_point() {
        let p = GeoPoint {
            latitude: 24.7136,
            longitude: 46.6753,
        };
        assert!(distance_km(&p, &p) < 0.001);
    }
}
