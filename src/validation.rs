use once_cell::sync::Lazy;
use regex::Regex;

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").unwrap());
static RE_PLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{1,8}([ -][A-Z0-9]{1,8}){0,2}$").unwrap());
static RE_SLOT_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{1,3}\d{1,4}$").unwrap());
static RE_DISPLAY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 .'\-]{1,63}$").unwrap());

pub fn email(s: &str) -> bool {
    RE_EMAIL.is_match(s)
}

/// License plates are stored uppercased; validate the normalized form.
pub fn plate_number(s: &str) -> bool {
    RE_PLATE.is_match(s)
}

/// Slot labels like "P001"; validated against the uppercased input.
pub fn slot_number(s: &str) -> bool {
    RE_SLOT_NUMBER.is_match(s)
}

pub fn display_name(s: &str) -> bool {
    RE_DISPLAY_NAME.is_match(s)
}

pub fn vehicle_year(year: i32) -> bool {
    (1900..=2100).contains(&year)
}

pub fn validate_plate_number(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Err("Plate number is required".into());
    }
    if !plate_number(s) {
        return Err("Invalid plate number format".into());
    }
    Ok(())
}

pub fn validate_slot_number(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Err("Slot number is required".into());
    }
    if !slot_number(s) {
        return Err("Slot numbers look like P001".into());
    }
    Ok(())
}

pub fn validate_vehicle_year(year: i32) -> Result<(), String> {
    if !vehicle_year(year) {
        return Err("Year must be between 1900 and 2100".into());
    }
    Ok(())
}

// Authentication validation
pub fn password_strength(password: &str) -> Result<(), String> {
    if password.len() < 12 {
        return Err("Password must be at least 12 characters".into());
    }
    if password.len() > 128 {
        return Err("Password must be less than 128 characters".into());
    }

    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password
        .chars()
        .any(|c| "!@#$%^&*()_+-=[]{}|;:,.<>?".contains(c));

    if !has_lowercase {
        return Err("Password must contain at least one lowercase letter".into());
    }
    if !has_uppercase {
        return Err("Password must contain at least one uppercase letter".into());
    }
    if !has_digit {
        return Err("Password must contain at least one number".into());
    }
    if !has_special {
        return Err("Password must contain at least one special character (!@#$%^&*...)".into());
    }

    // Check for common patterns
    let lower = password.to_lowercase();
    if lower.contains("password") || lower.contains("123456") || lower.contains("qwerty") {
        return Err("Password contains common patterns".into());
    }

    Ok(())
}

pub fn validate_email_strict(email_str: &str) -> Result<(), String> {
    if !email(email_str) {
        return Err("Invalid email format".into());
    }
    if email_str.len() > 254 {
        return Err("Email too long".into());
    }
    let parts: Vec<&str> = email_str.split('@').collect();
    if parts.len() != 2 {
        return Err("Invalid email format".into());
    }
    let (local, domain) = (parts[0], parts[1]);
    if local.is_empty() || local.len() > 64 {
        return Err("Invalid email local part".into());
    }
    if domain.is_empty() || !domain.contains('.') {
        return Err("Invalid email domain".into());
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.len() < 2 {
        return Err("Name must be at least 2 characters".into());
    }
    if !display_name(trimmed) {
        return Err("Name contains invalid characters".into());
    }
    Ok(())
}
