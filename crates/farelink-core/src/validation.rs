//! Field-level input checks shared by the tap, top-up and location requests.

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::GeoFix;

/// Latitude bounds in degrees.
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);

/// Longitude bounds in degrees.
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// Validates that an amount is strictly positive and, when a ceiling is
/// configured, not above it.
pub fn validate_amount(field: &str, amount: Money, max: Option<Money>) -> Result<Money, ValidationError> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    if let Some(max) = max {
        if amount > max {
            return Err(ValidationError::TooLarge {
                field: field.to_string(),
                max: max.to_string(),
            });
        }
    }
    Ok(amount)
}

/// Validates that an id is a positive integer.
pub fn validate_id(field: &str, id: i64) -> Result<i64, ValidationError> {
    if id > 0 {
        Ok(id)
    } else {
        Err(ValidationError::MustBePositive {
            field: field.to_string(),
        })
    }
}

fn validate_range(field: &str, value: f64, (min, max): (f64, f64)) -> Result<f64, ValidationError> {
    // NaN fails both comparisons, so it is rejected here too
    if value >= min && value <= max {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
        })
    }
}

/// Builds a GPS fix from optional request fields.
///
/// Coordinates count only when both are present; a lone latitude or
/// longitude is ignored, as is an accuracy without coordinates.
pub fn validate_geo(
    latitude: Option<f64>,
    longitude: Option<f64>,
    accuracy: Option<f64>,
) -> Result<Option<GeoFix>, ValidationError> {
    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return Ok(None);
    };

    let latitude = validate_range("latitude", latitude, LATITUDE_RANGE)?;
    let longitude = validate_range("longitude", longitude, LONGITUDE_RANGE)?;

    let accuracy = match accuracy {
        Some(a) if a.is_nan() || a < 0.0 => {
            return Err(ValidationError::InvalidFormat {
                field: "location_accuracy".to_string(),
                reason: "must be a non-negative number of metres".to_string(),
            })
        }
        other => other,
    };

    Ok(Some(GeoFix {
        latitude,
        longitude,
        accuracy,
    }))
}
