//! Validation utilities for the field-service ERP
//!
//! Includes India-specific formats (mobile numbers, IFSC codes) used on
//! customer and payment records.

use rust_decimal::Decimal;

// ============================================================================
// Identity & Contact Validations
// ============================================================================

/// Validate an Indian mobile number: 10 digits starting with 6-9, optionally
/// prefixed with +91 or 0
pub fn validate_phone_number(phone: &str) -> Result<(), &'static str> {
    let digits: String = phone.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    let national = digits
        .strip_prefix("+91")
        .or_else(|| digits.strip_prefix('0'))
        .unwrap_or(digits.as_str());

    if national.len() != 10 || !national.chars().all(|c| c.is_ascii_digit()) {
        return Err("Phone number must have 10 digits");
    }
    if !matches!(national.chars().next(), Some('6'..='9')) {
        return Err("Phone number must start with 6, 7, 8 or 9");
    }
    Ok(())
}

/// Strip formatting so that equal numbers compare equal
pub fn normalize_phone_number(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() > 10 {
        digits[digits.len() - 10..].to_string()
    } else {
        digits
    }
}

// ============================================================================
// Inventory Validations
// ============================================================================

/// Item codes are short upper-case alphanumerics such as `CAM01`
pub fn validate_item_id(item_id: &str) -> Result<(), &'static str> {
    if item_id.is_empty() || item_id.len() > 32 {
        return Err("Item ID must be between 1 and 32 characters");
    }
    if !item_id
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err("Item ID may only contain upper-case letters, digits, '-' and '_'");
    }
    Ok(())
}

pub fn validate_serial_number(serial: &str) -> Result<(), &'static str> {
    let serial = serial.trim();
    if serial.is_empty() {
        return Err("Serial number cannot be empty");
    }
    if serial.len() > 64 {
        return Err("Serial number cannot exceed 64 characters");
    }
    if serial.chars().any(char::is_whitespace) {
        return Err("Serial number cannot contain whitespace");
    }
    Ok(())
}

// ============================================================================
// Workflow Validations
// ============================================================================

pub const MIN_REJECTION_REASON_LEN: usize = 5;

/// Bill rejections must carry a meaningful reason
pub fn validate_rejection_reason(reason: &str) -> Result<(), &'static str> {
    if reason.trim().chars().count() < MIN_REJECTION_REASON_LEN {
        return Err("Rejection reason must be at least 5 characters long");
    }
    Ok(())
}

// ============================================================================
// Payment Validations
// ============================================================================

pub fn validate_payment_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Payment amount must be greater than zero");
    }
    if amount.scale() > 2 && amount.round_dp(2) != amount {
        return Err("Payment amount cannot have more than two decimal places");
    }
    Ok(())
}

/// Validate IFSC code format: 4 letters, a zero, 6 alphanumerics
pub fn validate_ifsc(ifsc: &str) -> Result<(), &'static str> {
    let bytes = ifsc.as_bytes();
    if bytes.len() != 11 {
        return Err("IFSC code must be 11 characters");
    }
    if !bytes[..4].iter().all(u8::is_ascii_uppercase) {
        return Err("IFSC code must start with 4 letters");
    }
    if bytes[4] != b'0' {
        return Err("Fifth character of IFSC code must be 0");
    }
    if !bytes[5..]
        .iter()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    {
        return Err("IFSC code branch part must be alphanumeric");
    }
    Ok(())
}
