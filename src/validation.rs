// Validation utilities module
// Provides custom validation functions for domain-specific rules

use validator::ValidationError;

/// Validates that a latitude is within [-90, 90]
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        Err(ValidationError::new("latitude_out_of_range"))
    }
}

/// Validates that a longitude is within [-180, 180]
pub fn validate_longitude(lng: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lng) {
        Ok(())
    } else {
        Err(ValidationError::new("longitude_out_of_range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latitude_bounds() {
        assert!(validate_latitude(0.0).is_ok());
        assert!(validate_latitude(90.0).is_ok());
        assert!(validate_latitude(-90.0).is_ok());
        assert!(validate_latitude(90.1).is_err());
        assert!(validate_latitude(-120.0).is_err());
    }

    #[test]
    fn test_longitude_bounds() {
        assert!(validate_longitude(180.0).is_ok());
        assert!(validate_longitude(-180.0).is_ok());
        assert!(validate_longitude(181.0).is_err());
    }
}
