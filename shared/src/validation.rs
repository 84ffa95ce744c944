//! Validation utilities for the Resto Back Office Platform
//!
//! Includes Indonesia-specific validations for compliance with local formats.

use chrono::NaiveDate;
use rust_decimal::Decimal;

// ============================================================================
// Stock & Reconciliation Validations
// ============================================================================

/// Validate a reporting date range (end must not precede start)
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), &'static str> {
    if end < start {
        return Err("End date must not be before start date");
    }
    Ok(())
}

/// Validate a received quantity (must be strictly positive)
pub fn validate_received_quantity(qty: Decimal) -> Result<(), &'static str> {
    if qty <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a stock count quantity (zero is a legitimate count)
pub fn validate_stock_quantity(qty: Decimal) -> Result<(), &'static str> {
    if qty < Decimal::ZERO {
        return Err("Stock quantity cannot be negative");
    }
    Ok(())
}

/// Validate a tolerance percentage (0-100)
pub fn validate_tolerance_percentage(pct: Decimal) -> Result<(), &'static str> {
    if pct < Decimal::ZERO || pct > Decimal::from(100) {
        return Err("Tolerance percentage must be between 0 and 100");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate branch code format (2-10 uppercase alphanumeric)
pub fn validate_branch_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 2 {
        return Err("Branch code must be at least 2 characters");
    }
    if code.len() > 10 {
        return Err("Branch code must be at most 10 characters");
    }
    if !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return Err("Branch code must be uppercase alphanumeric only");
    }
    Ok(())
}

/// Validate purchase order number format
/// Format: PO-YYYY-NNNNN (e.g., PO-2024-00017)
pub fn validate_po_number(po_number: &str) -> Result<(), &'static str> {
    let parts: Vec<&str> = po_number.split('-').collect();

    if parts.len() != 3 {
        return Err("PO number must be in format PO-YYYY-NNNNN");
    }

    if parts[0] != "PO" {
        return Err("PO number must start with 'PO'");
    }

    // Validate year
    if parts[1].len() != 4 || !parts[1].chars().all(|c| c.is_ascii_digit()) {
        return Err("Invalid year in PO number");
    }

    // Validate sequence number
    if parts[2].len() != 5 || !parts[2].chars().all(|c| c.is_ascii_digit()) {
        return Err("Invalid sequence number in PO number");
    }

    Ok(())
}

// ============================================================================
// Indonesia-Specific Validations
// ============================================================================

/// Validate Indonesian phone number format
/// Accepts: 081234567890, 0812-3456-7890, +6281234567890
pub fn validate_indonesian_phone(phone: &str) -> Result<(), &'static str> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    // Domestic mobile: 10-13 digits starting with 08
    if (10..=13).contains(&digits.len()) && digits.starts_with("08") {
        return Ok(());
    }
    // Without leading zero: 9-12 digits starting with 8
    if (9..=12).contains(&digits.len()) && digits.starts_with('8') {
        return Ok(());
    }
    // International format with country code: 11-14 digits starting with 62
    if (11..=14).contains(&digits.len()) && digits.starts_with("62") {
        return Ok(());
    }

    Err("Invalid Indonesian phone number format")
}

/// Validate Indonesian tax number (NPWP)
/// 15-digit number, commonly written XX.XXX.XXX.X-XXX.XXX
pub fn validate_npwp(npwp: &str) -> Result<(), &'static str> {
    let digits: String = npwp.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() != 15 {
        return Err("NPWP must be 15 digits");
    }

    if npwp
        .chars()
        .any(|c| !c.is_ascii_digit() && c != '.' && c != '-')
    {
        return Err("NPWP may only contain digits, dots and dashes");
    }

    Ok(())
}
