//! # Fixed-Point Math
//!
//! Share/asset conversion multiplies two 1e18-scaled quantities before
//! dividing, and `1e27 * 1e18` does not fit in a `u128`. Every such
//! product is computed in a 256-bit intermediate and narrowed back only
//! after the division.
//!
//! ## Rounding
//!
//! | Conversion                 | Direction | Who it favors |
//! |----------------------------|-----------|---------------|
//! | asset -> shares (deposit)  | DOWN      | the pool      |
//! | shares -> asset (redeem)   | DOWN      | the pool      |
//! | shares -> asset (charge)   | UP        | the pool      |

use thiserror::Error;
use uint::construct_uint;

use crate::config::{BPS_DENOMINATOR, RATE_PRECISION};
use crate::types::Amount;

construct_uint! {
    /// 256-bit unsigned integer used only as a multiplication scratchpad.
    pub struct U256(4);
}

/// Errors from fixed-point arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    /// Division by zero (a zero rate or an empty denominator).
    #[error("division by zero")]
    DivisionByZero,

    /// The quotient does not fit back into a `u128`.
    #[error("result overflows u128: {a} * {b} / {denominator}")]
    Overflow {
        /// Left factor.
        a: Amount,
        /// Right factor.
        b: Amount,
        /// Divisor.
        denominator: Amount,
    },

    /// A checked addition or subtraction left the `u128` range.
    #[error("arithmetic out of range")]
    OutOfRange,
}

fn narrow(value: U256, a: Amount, b: Amount, denominator: Amount) -> Result<Amount, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow { a, b, denominator });
    }
    Ok(value.as_u128())
}

/// Computes `floor(a * b / denominator)` without intermediate overflow.
///
/// # Errors
///
/// Returns [`MathError::DivisionByZero`] for a zero denominator and
/// [`MathError::Overflow`] if the quotient exceeds `u128::MAX`.
pub fn mul_div(a: Amount, b: Amount, denominator: Amount) -> Result<Amount, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    narrow(product / U256::from(denominator), a, b, denominator)
}

/// Computes `ceil(a * b / denominator)` without intermediate overflow.
///
/// # Errors
///
/// Same as [`mul_div`].
pub fn mul_div_up(a: Amount, b: Amount, denominator: Amount) -> Result<Amount, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    let d = U256::from(denominator);
    let mut quotient = product / d;
    if !(product % d).is_zero() {
        quotient = quotient + U256::one();
    }
    narrow(quotient, a, b, denominator)
}

/// Applies a basis-point fraction: `floor(amount * bps / 10_000)`.
pub fn apply_bps(amount: Amount, bps: u32) -> Result<Amount, MathError> {
    mul_div(amount, Amount::from(bps), Amount::from(BPS_DENOMINATOR))
}

/// Converts an asset amount into shares at `rate` (asset-wei per 1e18
/// shares), rounding down.
pub fn assets_to_shares(assets: Amount, rate: Amount) -> Result<Amount, MathError> {
    mul_div(assets, RATE_PRECISION, rate)
}

/// Converts shares into asset at `rate`, rounding down.
pub fn shares_to_assets(shares: Amount, rate: Amount) -> Result<Amount, MathError> {
    mul_div(shares, rate, RATE_PRECISION)
}

/// Converts shares into asset at `rate`, rounding up. Used when charging
/// a depositor for a clamped number of shares.
pub fn shares_to_assets_up(shares: Amount, rate: Amount) -> Result<Amount, MathError> {
    mul_div_up(shares, rate, RATE_PRECISION)
}

/// Checked addition that reports [`MathError::OutOfRange`].
pub fn add(a: Amount, b: Amount) -> Result<Amount, MathError> {
    a.checked_add(b).ok_or(MathError::OutOfRange)
}

/// Checked subtraction that reports [`MathError::OutOfRange`].
pub fn sub(a: Amount, b: Amount) -> Result<Amount, MathError> {
    a.checked_sub(b).ok_or(MathError::OutOfRange)
}

/// Lossless-or-error conversion into the signed domain used for surplus.
pub fn to_signed(value: Amount) -> Result<i128, MathError> {
    i128::try_from(value).map_err(|_| MathError::OutOfRange)
}
