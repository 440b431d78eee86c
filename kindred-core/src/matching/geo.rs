use crate::models::GeoPoint;
use crate::store::BoundingBox;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in km between two lat/lng points.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

/// Smallest lat/lng window containing every point within `radius_km` of
/// `center`, padded slightly so float error never excludes a true match.
pub fn bounding_box(center: GeoPoint, radius_km: f64) -> BoundingBox {
    let angular = (radius_km * 1.001 + 0.01) / EARTH_RADIUS_KM;
    let d_lat = angular.to_degrees();
    let min_lat = center.latitude - d_lat;
    let max_lat = center.latitude + d_lat;

    if min_lat <= -90.0 || max_lat >= 90.0 {
        return BoundingBox {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            lon: None,
        };
    }

    let ratio = angular.sin() / center.latitude.to_radians().cos();
    if ratio >= 1.0 {
        return BoundingBox { min_lat, max_lat, lon: None };
    }
    let d_lon = ratio.asin().to_degrees();
    let (min_lon, max_lon) = (center.longitude - d_lon, center.longitude + d_lon);
    let lon = (min_lon >= -180.0 && max_lon <= 180.0).then_some((min_lon, max_lon));
    BoundingBox { min_lat, max_lat, lon }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint { latitude, longitude }
    }

    #[test]
    fn known_distance() {
        // Taipei 101 to Taipei Main Station, roughly 5.2 km.
        let d = haversine_km(point(25.0340, 121.5645), point(25.0478, 121.5170));
        assert!((d - 5.0).abs() < 0.6, "got {d}");
        assert_eq!(haversine_km(point(10.0, 10.0), point(10.0, 10.0)), 0.0);
    }

    #[test]
    fn box_contains_circle_edge() {
        let center = point(48.8566, 2.3522);
        let bounds = bounding_box(center, 50.0);
        // Points due north and due east at 49.9 km.
        let north = point(center.latitude + 49.9 / 111.195, center.longitude);
        assert!(haversine_km(center, north) < 50.0);
        assert!(bounds.contains(north.latitude, north.longitude));
        let east_lon = center.longitude + 49.9 / (111.195 * center.latitude.to_radians().cos());
        assert!(bounds.contains(center.latitude, east_lon));
        assert!(!bounds.contains(center.latitude + 1.0, center.longitude));
    }

    #[test]
    fn antimeridian_drops_longitude_bound() {
        let bounds = bounding_box(point(0.0, 179.9), 100.0);
        assert!(bounds.lon.is_none());
        let polar = bounding_box(point(89.9, 0.0), 100.0);
        assert!(polar.lon.is_none());
        assert_eq!(polar.max_lat, 90.0);
    }
}
