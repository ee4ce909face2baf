//! Funding amount arithmetic.
//!
//! Amounts are computed in NEAR as [`Decimal`] and converted to yoctoNEAR
//! (10^-24 NEAR) only when attached to a call.

use rust_decimal::Decimal;
use thiserror::Error;

/// yoctoNEAR per NEAR, as a power of ten.
const YOCTO_DECIMALS: u32 = 24;
const YOCTO_PER_NEAR: u128 = 1_000_000_000_000_000_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Number of keys must be at least 1")]
    ZeroKeys,

    #[error("Uses per key must be at least 1")]
    ZeroUses,

    #[error("Amount must not be negative: {0}")]
    Negative(Decimal),

    #[error("Amount overflow")]
    Overflow,
}

/// Fixed fees charged by the drop contract, in NEAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    /// Charged per key use.
    pub key_fee: Decimal,
    /// Allowance and storage reserved per key use.
    pub key_offset: Decimal,
    /// Charged once per drop.
    pub drop_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            key_fee: Decimal::new(5, 3),
            key_offset: Decimal::new(2, 0),
            drop_fee: Decimal::ONE,
        }
    }
}

/// Balance to attach to `add_to_balance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingAmount {
    pub near: Decimal,
    pub yocto: u128,
}

/// Compute the balance needed to fund `num_keys` keys with `uses_per_key`
/// uses each.
///
/// `(deposit_per_use + key_fee + key_offset) * num_keys * uses_per_key + drop_fee`
///
/// The drop fee is added once, independent of the key count.
pub fn required_funding(
    deposit_per_use: Decimal,
    num_keys: u64,
    uses_per_key: u64,
    fees: &FeeSchedule,
) -> Result<FundingAmount, AmountError> {
    if num_keys == 0 {
        return Err(AmountError::ZeroKeys);
    }
    if uses_per_key == 0 {
        return Err(AmountError::ZeroUses);
    }
    for amount in [deposit_per_use, fees.key_fee, fees.key_offset, fees.drop_fee] {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(AmountError::Negative(amount));
        }
    }

    let per_use = deposit_per_use
        .checked_add(fees.key_fee)
        .and_then(|v| v.checked_add(fees.key_offset))
        .ok_or(AmountError::Overflow)?;
    let near = per_use
        .checked_mul(Decimal::from(num_keys))
        .and_then(|v| v.checked_mul(Decimal::from(uses_per_key)))
        .and_then(|v| v.checked_add(fees.drop_fee))
        .ok_or(AmountError::Overflow)?;

    Ok(FundingAmount {
        near,
        yocto: near_to_yocto(near)?,
    })
}

/// Convert NEAR to yoctoNEAR. Digits below one yocto are truncated.
pub fn near_to_yocto(amount: Decimal) -> Result<u128, AmountError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::Negative(amount));
    }
    let mantissa = amount.mantissa().unsigned_abs();
    let scale = amount.scale();

    if scale <= YOCTO_DECIMALS {
        mantissa
            .checked_mul(10u128.pow(YOCTO_DECIMALS - scale))
            .ok_or(AmountError::Overflow)
    } else {
        Ok(mantissa / 10u128.pow(scale - YOCTO_DECIMALS))
    }
}

/// Render yoctoNEAR as a NEAR amount for logs.
pub fn yocto_to_near(yocto: u128) -> String {
    let whole = yocto / YOCTO_PER_NEAR;
    let fraction = yocto % YOCTO_PER_NEAR;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:024}", fraction);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Fungible tokens to transfer so every key use can pay out.
pub fn ft_transfer_amount(
    balance_per_use: u128,
    num_keys: u64,
    uses_per_key: u64,
) -> Result<u128, AmountError> {
    balance_per_use
        .checked_mul(u128::from(num_keys))
        .and_then(|v| v.checked_mul(u128::from(uses_per_key)))
        .ok_or(AmountError::Overflow)
}
