use std::sync::LazyLock;

use regex::Regex;

use super::ApiError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

pub fn validate_email(email: &str) -> Result<String, ApiError> {
    let trimmed = email.trim().to_lowercase();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if !EMAIL_RE.is_match(&trimmed) {
        return Err(ApiError::validation("Please enter a valid email"));
    }
    Ok(trimmed)
}

/// Minimum 8 chars with at least one lowercase, one uppercase, one digit,
/// and one special character.
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_ascii_alphanumeric());

    if !(has_lower && has_upper && has_digit && has_special) {
        return Err(ApiError::validation(
            "Password must contain at least one uppercase letter, one lowercase letter, \
             one number, and one special character",
        ));
    }
    Ok(())
}

pub fn validate_one_time_code(code: &str) -> Result<&str, ApiError> {
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::validation("Code must be exactly 6 digits"));
    }
    Ok(code)
}

pub fn validate_url(url: &str) -> Result<&str, ApiError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("URL is required"));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ApiError::validation("URL must start with http:// or https://"));
    }
    Ok(trimmed)
}

pub fn validate_short_code(code: &str) -> Result<&str, ApiError> {
    if code.is_empty() || code.len() > 32 {
        return Err(ApiError::validation(
            "Short code must be between 1 and 32 characters",
        ));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::validation(
            "Short code can only contain letters, numbers, hyphens, and underscores",
        ));
    }
    Ok(code)
}

pub fn validate_name(name: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    if trimmed.len() > 100 {
        return Err(ApiError::validation(format!(
            "{field} must be 100 characters or less"
        )));
    }
    Ok(trimmed.to_string())
}

const CURRENCIES: &[&str] = &["USD", "EUR", "GBP", "INR", "AUD", "CAD"];
const FREQUENCIES: &[&str] = &["daily", "weekly", "monthly", "yearly"];
const PAYMENT_METHODS: &[&str] = &["credit_card", "debit_card", "paypal", "bank_transfer"];
const STATUSES: &[&str] = &["active", "inactive", "cancelled", "expired"];

pub fn validate_currency(currency: &str) -> Result<&str, ApiError> {
    if CURRENCIES.contains(&currency) {
        Ok(currency)
    } else {
        Err(ApiError::validation(format!(
            "Currency must be one of: {}",
            CURRENCIES.join(", ")
        )))
    }
}

pub fn validate_frequency(frequency: &str) -> Result<&str, ApiError> {
    if FREQUENCIES.contains(&frequency) {
        Ok(frequency)
    } else {
        Err(ApiError::validation(format!(
            "Frequency must be one of: {}",
            FREQUENCIES.join(", ")
        )))
    }
}

pub fn validate_payment_method(method: &str) -> Result<&str, ApiError> {
    if PAYMENT_METHODS.contains(&method) {
        Ok(method)
    } else {
        Err(ApiError::validation(format!(
            "Payment method must be one of: {}",
            PAYMENT_METHODS.join(", ")
        )))
    }
}

pub fn validate_subscription_status(status: &str) -> Result<&str, ApiError> {
    if STATUSES.contains(&status) {
        Ok(status)
    } else {
        Err(ApiError::validation(format!(
            "Status must be one of: {}",
            STATUSES.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("a@b.com").unwrap(), "a@b.com");
        assert_eq!(validate_email("  A@B.COM  ").unwrap(), "a@b.com");
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Str0ng!pass").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("alllowercase1!").is_err());
        assert!(validate_password("ALLUPPERCASE1!").is_err());
        assert!(validate_password("NoDigits!!").is_err());
        assert!(validate_password("NoSpecial123").is_err());
    }

    #[test]
    fn test_validate_one_time_code() {
        assert!(validate_one_time_code("123456").is_ok());
        assert!(validate_one_time_code("12345").is_err());
        assert!(validate_one_time_code("1234567").is_err());
        assert!(validate_one_time_code("12345a").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/page").is_ok());
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_validate_short_code() {
        assert!(validate_short_code("abc-123_X").is_ok());
        assert!(validate_short_code("").is_err());
        assert!(validate_short_code(&"a".repeat(33)).is_err());
        assert!(validate_short_code("has space").is_err());
    }

    #[test]
    fn test_validate_subscription_enums() {
        assert!(validate_currency("USD").is_ok());
        assert!(validate_currency("JPY").is_err());
        assert!(validate_frequency("monthly").is_ok());
        assert!(validate_frequency("fortnightly").is_err());
        assert!(validate_payment_method("paypal").is_ok());
        assert!(validate_payment_method("cash").is_err());
        assert!(validate_subscription_status("active").is_ok());
        assert!(validate_subscription_status("paused").is_err());
    }
}
