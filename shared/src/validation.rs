//! Input validation functions

/// Characters that satisfy the special-character requirement.
pub const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Validate password strength
///
/// Passwords must be 8-100 characters and contain at least one uppercase
/// letter, one lowercase letter, one digit, and one special character.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if password.len() > 100 {
        return Err("Password must be at most 100 characters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }
    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err(format!(
            "Password must contain at least one special character ({})",
            PASSWORD_SPECIAL_CHARS
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strong_password_accepted() {
        assert!(validate_password_strength("SecurePassword123!").is_ok());
    }

    #[test]
    fn test_too_short_rejected() {
        assert!(validate_password_strength("Ab1!").is_err());
    }

    #[test]
    fn test_missing_uppercase_rejected() {
        assert!(validate_password_strength("securepassword123!").is_err());
    }

    #[test]
    fn test_missing_lowercase_rejected() {
        assert!(validate_password_strength("SECUREPASSWORD123!").is_err());
    }

    #[test]
    fn test_missing_digit_rejected() {
        assert!(validate_password_strength("SecurePassword!").is_err());
    }

    #[test]
    fn test_missing_special_rejected() {
        assert!(validate_password_strength("SecurePassword123").is_err());
    }

    #[test]
    fn test_too_long_rejected() {
        let password = format!("Aa1!{}", "x".repeat(100));
        assert!(validate_password_strength(&password).is_err());
    }

    proptest! {
        /// Property: passwords without any digit never validate
        #[test]
        fn prop_digitless_passwords_rejected(password in "[A-Za-z!@#$%^&*]{8,40}") {
            prop_assert!(validate_password_strength(&password).is_err());
        }
    }
}
