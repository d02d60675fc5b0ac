//! Input rules shared by the event and ticket services.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::utils::error::{AppError, AppResult};

const CPF_DIGITS: usize = 11;
const CPF_MASKED_LEN: usize = 14;

pub fn ensure_not_in_past(date: NaiveDate, today: NaiveDate) -> AppResult<()> {
    if date < today {
        return Err(AppError::ValidationError(format!(
            "Event date {date} is in the past"
        )));
    }
    Ok(())
}

pub fn ensure_time_order(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<()> {
    if start >= end {
        return Err(AppError::ValidationError(
            "start_time must be before end_time".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_positive_capacity(total_tickets: i32) -> AppResult<()> {
    if total_tickets <= 0 {
        return Err(AppError::ValidationError(
            "total_tickets must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_non_negative_price(price: Decimal) -> AppResult<()> {
    if price < Decimal::ZERO {
        return Err(AppError::ValidationError(
            "price cannot be negative".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_present(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{field} cannot be empty")));
    }
    Ok(())
}

pub fn ensure_email(email: &str) -> AppResult<()> {
    let valid = match email.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    };
    if !valid {
        return Err(AppError::ValidationError(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(())
}

pub fn ensure_birth_date(birth_date: NaiveDate, today: NaiveDate) -> AppResult<()> {
    if birth_date > today {
        return Err(AppError::ValidationError(
            "birth_date cannot be in the future".to_string(),
        ));
    }
    Ok(())
}

/// Accepts a CPF as 11 digits or in its masked `000.000.000-00` form and
/// returns the bare digits.
pub fn normalize_cpf(raw: &str) -> AppResult<String> {
    let raw = raw.trim();
    if raw.len() != CPF_DIGITS && raw.len() != CPF_MASKED_LEN {
        return Err(AppError::ValidationError(
            "CPF must have 11 digits".to_string(),
        ));
    }
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != CPF_DIGITS {
        return Err(AppError::ValidationError(
            "CPF must have 11 digits".to_string(),
        ));
    }
    Ok(digits)
}

/// Entry token printed on the ticket: SHA-256 of the bare CPF digits.
///
/// Depends on the CPF alone, so one person gets the same token for every
/// event and again after re-registering.
pub fn qr_token(cpf: &str) -> String {
    format!("{:x}", Sha256::digest(cpf.as_bytes()))
}
