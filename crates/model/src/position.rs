use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate with an optional heading in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: Option<f64>,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ModelError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ModelError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ModelError::LongitudeOutOfRange(longitude));
        }
        Ok(GeoPosition {
            latitude,
            longitude,
            bearing: None,
        })
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing.rem_euclid(360.0));
        self
    }
}
