//! Common validation rules shared across request payloads.

use rust_decimal::Decimal;
use validator::ValidationError;

const MAX_DURATION_HOURS: i64 = 24;

/// Validates username format.
///
/// Requirements:
/// - Only alphanumeric characters, dots and underscores
/// - 3-50 characters in length
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.len() < 3 || username.len() > 50 {
        return Err(ValidationError::new("username_invalid_length"));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    {
        return Err(ValidationError::new("username_invalid_characters"));
    }

    Ok(())
}

/// Minimum 8 characters with at least one letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < 8 {
        return Err(ValidationError::new("password_too_short"));
    }
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        return Err(ValidationError::new("password_too_weak"));
    }
    Ok(())
}

/// Hourly rates must be strictly positive and carry at most two decimal places.
pub fn validate_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if *rate <= Decimal::ZERO {
        return Err(ValidationError::new("rate_not_positive"));
    }
    if rate.scale() > 2 && rate.normalize().scale() > 2 {
        return Err(ValidationError::new("rate_too_precise"));
    }
    Ok(())
}

/// Worked hours per timesheet: (0, 24], two decimal places.
pub fn validate_duration(hours: &Decimal) -> Result<(), ValidationError> {
    if *hours <= Decimal::ZERO || *hours > Decimal::from(MAX_DURATION_HOURS) {
        return Err(ValidationError::new("duration_out_of_range"));
    }
    if hours.normalize().scale() > 2 {
        return Err(ValidationError::new("duration_too_precise"));
    }
    Ok(())
}

/// Loose UK postcode shape check ("SW1A 1AA", "m1 1ae").
pub fn validate_post_code(post_code: &str) -> Result<(), ValidationError> {
    let compact: String = post_code
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    let valid_len = (5..=7).contains(&compact.len());
    let alnum = compact.chars().all(|c| c.is_ascii_alphanumeric());
    let starts_alpha = compact.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let inward_ok = compact.len() >= 3 && {
        let inward: Vec<char> = compact.chars().rev().take(3).collect();
        inward[0].is_ascii_alphabetic()
            && inward[1].is_ascii_alphabetic()
            && inward[2].is_ascii_digit()
    };
    if valid_len && alnum && starts_alpha && inward_ok {
        Ok(())
    } else {
        Err(ValidationError::new("post_code_invalid"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn username_rules() {
        assert!(validate_username("").is_err());
        assert!(validate_username("user@name").is_err());
        assert!(validate_username("anna.smith_2").is_ok());
    }

    #[test]
    fn password_strength_requires_letters_and_digits() {
        assert!(validate_password_strength("short1").is_err());
        assert!(validate_password_strength("onlyletters").is_err());
        assert!(validate_password_strength("letters4ndDigits").is_ok());
    }

    #[test]
    fn rate_must_be_positive_pence() {
        assert!(validate_rate(&Decimal::from_str("0").unwrap()).is_err());
        assert!(validate_rate(&Decimal::from_str("-1").unwrap()).is_err());
        assert!(validate_rate(&Decimal::from_str("15.555").unwrap()).is_err());
        assert!(validate_rate(&Decimal::from_str("15.50").unwrap()).is_ok());
        assert!(validate_rate(&Decimal::from_str("15.500").unwrap()).is_ok());
    }

    #[test]
    fn duration_range() {
        assert!(validate_duration(&Decimal::from_str("0").unwrap()).is_err());
        assert!(validate_duration(&Decimal::from_str("24.5").unwrap()).is_err());
        assert!(validate_duration(&Decimal::from_str("2.25").unwrap()).is_ok());
    }

    #[test]
    fn post_codes() {
        assert!(validate_post_code("SW1A 1AA").is_ok());
        assert!(validate_post_code("m1 1ae").is_ok());
        assert!(validate_post_code("12345").is_err());
        assert!(validate_post_code("SW1A").is_err());
    }
}
