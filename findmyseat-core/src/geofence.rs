use crate::{CoreError, CoreResult};
use serde::Deserialize;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Fixed venue coordinate and the radius inside which booking is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Venue {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

impl Default for Venue {
    fn default() -> Self {
        Self {
            latitude: 18.457918,
            longitude: 73.850601,
            radius_meters: 150_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GeofenceValidator {
    venue: Venue,
}

impl GeofenceValidator {
    pub fn new(venue: Venue) -> Self {
        Self { venue }
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    /// Great-circle distance in meters from the venue.
    pub fn distance_meters(&self, lat: f64, lon: f64) -> CoreResult<f64> {
        check_coordinate(lat, lon)?;
        Ok(haversine(lat, lon, self.venue.latitude, self.venue.longitude))
    }

    /// True iff the coordinate lies within the radius. The boundary is inclusive.
    pub fn is_within_range(&self, lat: f64, lon: f64) -> CoreResult<bool> {
        Ok(self.distance_meters(lat, lon)? <= self.venue.radius_meters)
    }

    /// Like `is_within_range`, but rejects out-of-range coordinates with a geofence error.
    pub fn check(&self, lat: f64, lon: f64) -> CoreResult<()> {
        let distance_meters = self.distance_meters(lat, lon)?;
        if distance_meters > self.venue.radius_meters {
            return Err(CoreError::Geofence { distance_meters });
        }
        Ok(())
    }
}

fn check_coordinate(lat: f64, lon: f64) -> CoreResult<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(CoreError::Validation(format!("latitude out of range: {}", lat)));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(CoreError::Validation(format!("longitude out of range: {}", lon)));
    }
    Ok(())
}

fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}
