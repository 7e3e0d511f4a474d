//! Validation utilities for the Pharmaceutical Inventory Tracker

// ============================================================================
// Forecast and Report Parameters
// ============================================================================

/// Validate the exponential smoothing factor lies in (0, 1]
pub fn validate_alpha(alpha: f64) -> Result<(), &'static str> {
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(())
    } else {
        Err("Smoothing factor must be greater than 0 and at most 1")
    }
}

/// Validate the expiry look-ahead window (1 day to 2 years)
pub fn validate_expiry_window_days(days: u32) -> Result<(), &'static str> {
    if (1..=730).contains(&days) {
        Ok(())
    } else {
        Err("Expiry window must be between 1 and 730 days")
    }
}

/// Validate snapshot type labels (1-50 chars of lowercase letters, digits, `_`)
pub fn validate_snapshot_type(label: &str) -> Result<(), &'static str> {
    if label.is_empty() || label.len() > 50 {
        return Err("Snapshot type must be 1-50 characters");
    }
    if !label
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err("Snapshot type may only contain lowercase letters, digits and underscores");
    }
    Ok(())
}

// ============================================================================
// Inventory Validations
// ============================================================================

/// Validate batch number format (1-50 alphanumeric chars, `-` or `/` allowed)
pub fn validate_batch_number(batch_number: &str) -> Result<(), &'static str> {
    let trimmed = batch_number.trim();
    if trimmed.is_empty() || trimmed.len() > 50 {
        return Err("Batch number must be 1-50 characters");
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '/')
    {
        return Err("Batch number may only contain letters, digits, '-' and '/'");
    }
    Ok(())
}

/// Validate a usage quantity against the stock it is drawn from
pub fn validate_usage_quantity(quantity: i32, current_stock: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity used must be positive");
    }
    if quantity > current_stock {
        return Err("Quantity used exceeds current stock");
    }
    Ok(())
}

/// Check whether a batch has dropped to or below its reorder threshold
pub fn needs_reorder(current_stock: i32, reorder_threshold: i32) -> bool {
    current_stock <= reorder_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_alpha() {
        assert!(validate_alpha(0.4).is_ok());
        assert!(validate_alpha(1.0).is_ok());
        assert!(validate_alpha(0.0001).is_ok());
        assert!(validate_alpha(0.0).is_err());
        assert!(validate_alpha(-0.2).is_err());
        assert!(validate_alpha(1.01).is_err());
        assert!(validate_alpha(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_expiry_window_days() {
        assert!(validate_expiry_window_days(30).is_ok());
        assert!(validate_expiry_window_days(1).is_ok());
        assert!(validate_expiry_window_days(0).is_err());
        assert!(validate_expiry_window_days(731).is_err());
    }

    #[test]
    fn test_validate_snapshot_type() {
        assert!(validate_snapshot_type("weekly_opening").is_ok());
        assert!(validate_snapshot_type("week2").is_ok());
        assert!(validate_snapshot_type("").is_err());
        assert!(validate_snapshot_type("Weekly").is_err());
        assert!(validate_snapshot_type("weekly-opening").is_err());
    }

    #[test]
    fn test_validate_batch_number() {
        assert!(validate_batch_number("AMX-2025-001").is_ok());
        assert!(validate_batch_number("LOT/77").is_ok());
        assert!(validate_batch_number("   ").is_err());
        assert!(validate_batch_number("AMX 001").is_err());
        assert!(validate_batch_number(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_usage_quantity() {
        assert!(validate_usage_quantity(5, 10).is_ok());
        assert!(validate_usage_quantity(10, 10).is_ok());
        assert!(validate_usage_quantity(0, 10).is_err());
        assert!(validate_usage_quantity(11, 10).is_err());
    }

    #[test]
    fn test_needs_reorder() {
        assert!(needs_reorder(10, 10));
        assert!(needs_reorder(3, 10));
        assert!(!needs_reorder(11, 10));
    }
}
