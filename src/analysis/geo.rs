//! Spherical geometry between the reference point and a strike.

use crate::model::{BearingDistance, GeoPoint, Octant};

/// Mean Earth radius used by the haversine formula, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres (haversine).
pub fn distance_km(origin: &GeoPoint, target: &GeoPoint) -> f64 {
    let lat1 = origin.lat.to_radians();
    let lat2 = target.lat.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (target.lon - origin.lon).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Initial (forward azimuth) bearing in degrees, normalized to `[0, 360)`.
pub fn initial_bearing(origin: &GeoPoint, target: &GeoPoint) -> f64 {
    let lat1 = origin.lat.to_radians();
    let lat2 = target.lat.to_radians();
    let d_lon = (target.lon - origin.lon).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Octant and distance of `target` as seen from `origin`.
pub fn bearing_and_distance(origin: &GeoPoint, target: &GeoPoint) -> BearingDistance {
    BearingDistance {
        octant: Octant::from_bearing(initial_bearing(origin, target)),
        distance_km: distance_km(origin, target),
    }
}
