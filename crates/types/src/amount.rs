//! Integer amount parsing.
//!
//! All amounts are carried in the asset's smallest unit as `Uint256`. Decimal
//! strings are only accepted at the edge and converted with [`parse_units`];
//! nothing in the engine goes through floating point.

use cosmwasm_std::Uint256;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount must be an unsigned integer, got {0:?}")]
    NotAnInteger(String),

    #[error("amount has more than {decimals} fractional digits: {value:?}")]
    TooPrecise { value: String, decimals: u32 },

    #[error("amount does not fit in 256 bits: {0}")]
    Overflow(String),
}

/// Parse an unsigned integer amount in base units.
///
/// Signs, whitespace, exponents and fractional parts are all rejected.
pub fn parse_amount(value: &str) -> Result<Uint256, AmountError> {
    if value.is_empty() {
        return Err(AmountError::Empty);
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::NotAnInteger(value.to_string()));
    }
    Uint256::from_str(value).map_err(|_| AmountError::Overflow(value.to_string()))
}

/// Convert a human decimal string (e.g. `"1.5"`) into base units with the
/// given number of decimals (e.g. 6 for USDC -> `1500000`).
pub fn parse_units(value: &str, decimals: u32) -> Result<Uint256, AmountError> {
    if value.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, frac) = match value.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (value, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::NotAnInteger(value.to_string()));
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(AmountError::NotAnInteger(value.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(AmountError::TooPrecise {
            value: value.to_string(),
            decimals,
        });
    }

    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(frac);
    for _ in frac.len()..decimals as usize {
        digits.push('0');
    }

    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return Ok(Uint256::zero());
    }
    parse_amount(trimmed)
}
