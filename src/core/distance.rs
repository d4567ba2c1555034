use crate::domain::model::{Coordinate, GeocodedResource};

// The Earth's radius in miles.
const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Great-circle distance in miles (haversine).
pub fn distance_miles(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_MILES * c
}

pub fn sort_by_distance(resources: &mut [GeocodedResource], origin: &Coordinate) {
    resources.sort_by(|a, b| {
        let da = distance_miles(origin, &a.coordinate());
        let db = distance_miles(origin, &b.coordinate());
        da.total_cmp(&db)
    });
}
