use crate::core::error::{AppError, Result};

/// WGS 84 point as stored in the `location` geometry column (SRID 4326)
pub const SRID: i32 = 4326;

/// A validated (longitude, latitude) pair.
///
/// Only constructed through [`GeoPoint::encode`], so every value satisfies
/// longitude ∈ [-180, 180] and latitude ∈ [-90, 90].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    longitude: f64,
    latitude: f64,
}

impl GeoPoint {
    pub fn encode(longitude: f64, latitude: f64) -> Result<Self> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::Validation(format!(
                "Longitude must be between -180 and 180, got {}",
                longitude
            )));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::Validation(format!(
                "Latitude must be between -90 and 90, got {}",
                latitude
            )));
        }

        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Lossless inverse of [`GeoPoint::encode`]
    pub fn decode(&self) -> (f64, f64) {
        (self.longitude, self.latitude)
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Build from an optional coordinate pair; one without the other is rejected
    pub fn from_optional(longitude: Option<f64>, latitude: Option<f64>) -> Result<Option<Self>> {
        match (longitude, latitude) {
            (Some(lon), Some(lat)) => Self::encode(lon, lat).map(Some),
            (None, None) => Ok(None),
            _ => Err(AppError::Validation(
                "Longitude and latitude must be provided together".to_string(),
            )),
        }
    }
}

/// Axis-aligned box used to restrict map queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl BoundingBox {
    pub fn new(south_west: GeoPoint, north_east: GeoPoint) -> Result<Self> {
        if south_west.longitude > north_east.longitude || south_west.latitude > north_east.latitude
        {
            return Err(AppError::Validation(
                "Bounding box minimum must not exceed its maximum".to_string(),
            ));
        }
        Ok(Self {
            south_west,
            north_east,
        })
    }

    /// Smallest box holding every point; `None` when there are none
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        let (south_west, north_east) = points.fold((first, first), |(sw, ne), p| {
            (
                GeoPoint {
                    longitude: sw.longitude.min(p.longitude),
                    latitude: sw.latitude.min(p.latitude),
                },
                GeoPoint {
                    longitude: ne.longitude.max(p.longitude),
                    latitude: ne.latitude.max(p.latitude),
                },
            )
        });
        Some(Self {
            south_west,
            north_east,
        })
    }

    #[cfg(test)]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.south_west.longitude..=self.north_east.longitude).contains(&point.longitude)
            && (self.south_west.latitude..=self.north_east.latitude).contains(&point.latitude)
    }
}
