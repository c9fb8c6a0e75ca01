//! Validation utilities

use crate::types::*;
use chrono::NaiveDate;

/// Validate that a description is present and within bounds
pub fn validate_description(description: &str) -> ReconResult<()> {
    if description.trim().is_empty() {
        return Err(ReconError::Validation(
            "Description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(ReconError::Validation(
            "Description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate an adjustment classification label
pub fn validate_adjustment_type(adjustment_type: &str) -> ReconResult<()> {
    if adjustment_type.trim().is_empty() {
        return Err(ReconError::Validation(
            "Adjustment type cannot be empty".to_string(),
        ));
    }

    if adjustment_type.len() > 100 {
        return Err(ReconError::Validation(
            "Adjustment type cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a date range is ordered
pub fn validate_date_range(from: NaiveDate, to: NaiveDate) -> ReconResult<()> {
    if from > to {
        return Err(ReconError::Validation(format!(
            "Date range start {} is after end {}",
            from, to
        )));
    }
    Ok(())
}

/// Validate a match date tolerance in days
pub fn validate_tolerance_days(tolerance_days: i64) -> ReconResult<()> {
    if tolerance_days < 0 {
        return Err(ReconError::Validation(
            "Date tolerance cannot be negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_description_rejected() {
        assert!(validate_description("  ").is_err());
        assert!(validate_description("Bank fee").is_ok());
    }

    #[test]
    fn test_date_range_order() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(validate_date_range(from, to).is_err());
        assert!(validate_date_range(to, from).is_ok());
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        assert!(validate_tolerance_days(-1).is_err());
        assert!(validate_tolerance_days(0).is_ok());
        assert!(validate_tolerance_days(3).is_ok());
    }
}
