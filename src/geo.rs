use serde::{Deserialize, Serialize};

/// Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Tolerance for radius containment so a zero radius still matches the
/// exact point under floating-point noise
const RADIUS_EPSILON_KM: f64 = 1e-9;

/// A geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check the point has finite components within the WGS84 range
    /// (latitude [-90, 90], longitude [-180, 180])
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Haversine great-circle distance between two points in kilometers.
/// Symmetric, and zero (up to floating point) for identical points.
/// NaN coordinates propagate NaN, which radius checks treat as "outside".
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Whether `point` lies within `radius_km` of `center`. A zero radius
/// matches only the exact point; NaN distances never match.
pub fn is_within_radius(center: GeoPoint, point: GeoPoint, radius_km: f64) -> bool {
    haversine_km(center, point) <= radius_km + RADIUS_EPSILON_KM
}

/// Initial bearing from `from` towards `to`, in radians
fn bearing(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    y.atan2(x)
}

/// Point exactly `radius_km` from `center` along the bearing towards
/// `target`. Used to pin an aggregate marker to the radius circle when its
/// tile center falls outside the circle but a member item is inside.
pub fn border_point(center: GeoPoint, target: GeoPoint, radius_km: f64) -> GeoPoint {
    let brg = bearing(center, target);
    let ang = radius_km / EARTH_RADIUS_KM;
    let lat1 = center.latitude.to_radians();
    let lon1 = center.longitude.to_radians();

    let lat2 = (lat1.sin() * ang.cos() + lat1.cos() * ang.sin() * brg.cos()).asin();
    let lon2 =
        lon1 + (brg.sin() * ang.sin() * lat1.cos()).atan2(ang.cos() - lat1.sin() * lat2.sin());

    GeoPoint::new(lat2.to_degrees(), lon2.to_degrees())
}
