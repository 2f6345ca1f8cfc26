//! Amount parsing
//!
//! Amounts arrive as decimal strings in display units ("1.5").

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::error::WorkflowError;

/// Decimals of the native asset
pub const NATIVE_DECIMALS: u32 = 18;

/// Parse a strictly positive decimal amount
pub fn parse_amount(raw: &str) -> Result<Decimal, WorkflowError> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|_| WorkflowError::InvalidAmount(raw.to_string()))?;
    if amount <= Decimal::ZERO {
        return Err(WorkflowError::InvalidAmount(raw.to_string()));
    }
    Ok(amount.normalize())
}

/// Convert a display amount to integer base units
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<u128, WorkflowError> {
    if amount.scale() > decimals {
        return Err(WorkflowError::PrecisionOverflow(decimals));
    }
    let factor = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or(WorkflowError::Overflow)?;
    amount
        .checked_mul(factor)
        .and_then(|v| v.trunc().to_u128())
        .ok_or(WorkflowError::Overflow)
}

/// Parse a display amount of the native asset into a wei string
pub fn parse_wei(raw: &str) -> Result<String, WorkflowError> {
    let amount = parse_amount(raw)?;
    Ok(to_base_units(amount, NATIVE_DECIMALS)?.to_string())
}

/// Scale an integer fixed-point value with 18 decimals down to display units
pub fn from_wei(raw: &str) -> Result<Decimal, WorkflowError> {
    let value =
        Decimal::from_str(raw.trim()).map_err(|_| WorkflowError::ContractRead(raw.to_string()))?;
    Ok(value / Decimal::from(10u64.pow(NATIVE_DECIMALS)))
}
