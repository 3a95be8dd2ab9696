//! Token amount conversion

use bigdecimal::{BigDecimal, ToPrimitive};
use std::str::FromStr;

use super::error::{IndexerError, IndexerResult};

/// Number of decimals of the GLM token
pub const GLM_DECIMALS: u32 = 18;

/// Convert an exact integer base-unit amount into the display unit
///
/// The integer is parsed with arbitrary precision and rescaled by
/// `10^decimals` before the single lossy step to `f64`.
pub fn wei_to_units(value_wei: &str, decimals: u32) -> IndexerResult<f64> {
    let value_wei = value_wei.trim();
    if value_wei.is_empty() || !value_wei.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IndexerError::Validation(format!(
            "amount is not an unsigned integer: {:?}",
            value_wei
        )));
    }

    let (digits, scale) = BigDecimal::from_str(value_wei)
        .map_err(|e| IndexerError::Validation(format!("invalid amount {}: {}", value_wei, e)))?
        .into_bigint_and_exponent();
    let scaled = BigDecimal::new(digits, scale + i64::from(decimals));

    scaled
        .to_f64()
        .ok_or_else(|| IndexerError::Validation(format!("amount out of range: {}", value_wei)))
}
