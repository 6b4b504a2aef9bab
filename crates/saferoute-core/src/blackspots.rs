//! Known accident blackspots for Bengaluru.
//!
//! Coordinates from Bengaluru Traffic Police 2024-25 high risk reports.

use serde::Serialize;

use crate::models::GeoPoint;
use crate::spatial::haversine_distance;

#[derive(Debug, Clone, Copy)]
pub struct Blackspot {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

pub const BLACKSPOTS: &[Blackspot] = &[
    Blackspot { name: "Silk Board Junction", lat: 12.9177, lng: 77.6238 },
    Blackspot { name: "Hebbal Flyover", lat: 13.0359, lng: 77.5970 },
    Blackspot { name: "KR Puram Tin Factory", lat: 13.0120, lng: 77.6778 },
    Blackspot { name: "Goraguntepalya", lat: 13.0285, lng: 77.5414 },
    Blackspot { name: "Electronic City Toll", lat: 12.8399, lng: 77.6770 },
    Blackspot { name: "Ibbalur Junction (ORR)", lat: 12.9207, lng: 77.6626 },
    Blackspot { name: "Marathahalli Bridge", lat: 12.9569, lng: 77.7011 },
    Blackspot { name: "Dairy Circle", lat: 12.9363, lng: 77.6058 },
    Blackspot { name: "Banashankari Signal", lat: 12.9259, lng: 77.5702 },
    Blackspot { name: "Summanahalli Junction", lat: 13.0016, lng: 77.5190 },
    Blackspot { name: "Koramangala Sony Signal", lat: 12.9367, lng: 77.6259 },
    Blackspot { name: "Nayandahalli Junction", lat: 12.9409, lng: 77.5265 },
];

/// Default map center (Bengaluru).
pub const CITY_CENTER: GeoPoint = GeoPoint::new(12.9716, 77.5946);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestBlackspot {
    pub name: String,
    pub distance_km: f64,
}

/// Nearest blackspot by great-circle distance.
pub fn nearest_blackspot(point: &GeoPoint) -> Option<NearestBlackspot> {
    nearest_in(BLACKSPOTS, point)
}

pub fn nearest_in(spots: &[Blackspot], point: &GeoPoint) -> Option<NearestBlackspot> {
    spots
        .iter()
        .map(|spot| {
            let km = haversine_distance(point.lat, point.lng, spot.lat, spot.lng) / 1000.0;
            (spot, km)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(spot, distance_km)| NearestBlackspot {
            name: spot.name.to_string(),
            distance_km,
        })
}
