use crate::rides::Driver;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates in kilometres
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1, lng1) = (lat1.to_radians(), lng1.to_radians());
    let (lat2, lng2) = (lat2.to_radians(), lng2.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlng = (dlng * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Select the best candidate driver for a pickup point.
///
/// Candidates are assumed pre-filtered (active, online, available, verified,
/// service affiliation). When at least one candidate has known coordinates,
/// the nearest by great-circle distance wins; otherwise the first candidate
/// in retrieval order is taken. Empty pool yields `None`.
pub fn nearest_driver<'a>(pickup: (f64, f64), candidates: &'a [Driver]) -> Option<&'a Driver> {
    let (pickup_lat, pickup_lng) = pickup;

    let nearest = candidates
        .iter()
        .filter_map(|driver| {
            let (lat, lng) = (driver.lat?, driver.lng?);
            Some((driver, haversine_km(pickup_lat, pickup_lng, lat, lng)))
        })
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    match nearest {
        Some((driver, _)) => Some(driver),
        // No candidate has a known position; fall back to retrieval order
        None => candidates.first(),
    }
}
