//! Validation helpers shared by the services

use rust_decimal::Decimal;

use crate::error::DomainError;

/// Required free-text field; returns the trimmed value
pub fn require_text<'a>(field: &'static str, value: &'a str) -> Result<&'a str, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::invalid(field, format!("{} is required", field)));
    }
    Ok(trimmed)
}

/// Strictly positive quantity or weight
pub fn require_positive(field: &'static str, value: Decimal) -> Result<Decimal, DomainError> {
    if value <= Decimal::ZERO {
        return Err(DomainError::invalid(field, format!("{} must be greater than 0", field)));
    }
    Ok(value)
}

/// Decimal places stored for weights and quantities
pub const QUANTITY_SCALE: u32 = 3;

/// Reject values with more decimal places than the column keeps
pub fn require_max_scale(
    field: &'static str,
    value: Decimal,
    max_scale: u32,
) -> Result<Decimal, DomainError> {
    if value.normalize().scale() > max_scale {
        return Err(DomainError::invalid(
            field,
            format!("{} allows at most {} decimal places", field, max_scale),
        ));
    }
    Ok(value)
}

/// Optional threshold or price, which may be zero but not negative
pub fn require_non_negative(
    field: &'static str,
    value: Option<Decimal>,
) -> Result<Option<Decimal>, DomainError> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(DomainError::invalid(
            field,
            format!("{} cannot be negative", field),
        )),
        other => Ok(other),
    }
}

/// Trim optional text, treating blank as absent
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Basic address check for alert recipients
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && email.len() >= 5 => {
            Ok(())
        }
        _ => Err("Invalid email format"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("seal", "  P-123 ").unwrap(), "P-123");
        assert!(require_text("seal", "   ").is_err());
        assert!(require_text("seal", "").is_err());
    }

    #[test]
    fn test_require_positive() {
        assert!(require_positive("weight_kg", Decimal::new(1, 3)).is_ok());
        assert!(require_positive("weight_kg", Decimal::ZERO).is_err());
        assert!(require_positive("weight_kg", Decimal::from(-5)).is_err());
    }

    #[test]
    fn test_require_max_scale() {
        assert!(require_max_scale("weight_kg", Decimal::new(12345, 3), QUANTITY_SCALE).is_ok());
        // trailing zeros do not count
        assert!(require_max_scale("weight_kg", Decimal::new(400, 5), QUANTITY_SCALE).is_ok());
        assert!(require_max_scale("weight_kg", Decimal::new(4, 4), QUANTITY_SCALE).is_err());
    }

    #[test]
    fn test_require_non_negative() {
        assert_eq!(require_non_negative("critical_stock", None).unwrap(), None);
        assert!(require_non_negative("critical_stock", Some(Decimal::ZERO)).is_ok());
        assert!(require_non_negative("critical_stock", Some(Decimal::from(-1))).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" x ".into())), Some("x".into()));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("bodega@planta.com.ar").is_ok());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("no@domain").is_err());
        assert!(validate_email("@x.com").is_err());
    }
}
