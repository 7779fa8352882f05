//! WAD fixed-point arithmetic for reward accrual
//!
//! Reward indices and per-share rates are stored as `Wad` values: an unsigned
//! 256-bit integer scaled by 10^18. Amounts and supplies stay `u128`; only
//! the index side is widened.
//!
//! ## Headroom
//!
//! With `reward_per_day < 2^128` and a supply of at least 1, the per-second
//! rate is below `2^128 * 2^60 / 86400 < 2^172`. A program runs for fewer
//! than `2^64` seconds, so its index stays below `2^236` and a dust holder
//! can never push it out of range.

use core::fmt;

use primitive_types::U256;

/// Fixed-point scale factor (10^18)
pub const WAD: u128 = 1_000_000_000_000_000_000;

const WAD_WIDE: U256 = U256([WAD as u64, 0, 0, 0]);

/// Arithmetic failure inside the accrual math
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MathError {
    /// Result does not fit in its type
    Overflow,
    /// Subtraction went below zero
    Underflow,
    /// Divisor was zero
    DivisionByZero,
}

impl fmt::Display for MathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MathError::Overflow => f.write_str("arithmetic overflow"),
            MathError::Underflow => f.write_str("arithmetic underflow"),
            MathError::DivisionByZero => f.write_str("division by zero"),
        }
    }
}

/// WAD-scaled unsigned fixed-point number
///
/// - `Wad::ONE` represents 1.0
/// - Used for the cumulative reward index and the per-second reward per share
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Wad(pub U256);

impl Wad {
    /// 0.0
    pub const ZERO: Wad = Wad(U256([0, 0, 0, 0]));

    /// 1.0
    pub const ONE: Wad = Wad(WAD_WIDE);

    /// Raw scaled value
    #[inline]
    pub const fn raw(self) -> U256 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// WAD ratio `numer / denom`, rounded toward zero
    ///
    /// # Errors
    /// `DivisionByZero` if `denom == 0`
    #[inline]
    pub fn ratio(numer: u128, denom: u128) -> Result<Self, MathError> {
        Self::ratio_wide(numer, U256::from(denom))
    }

    /// WAD ratio over a denominator wider than 128 bits
    pub fn ratio_wide(numer: u128, denom: U256) -> Result<Self, MathError> {
        if denom.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let scaled = U256::from(numer)
            .checked_mul(WAD_WIDE)
            .ok_or(MathError::Overflow)?;
        Ok(Wad(scaled / denom))
    }

    /// Apply this ratio to an integer amount: `amount * self / WAD`, floored
    ///
    /// The product is taken at 512 bits, so only a result above `u128::MAX`
    /// fails.
    #[inline]
    pub fn mul_amount(self, amount: u128) -> Result<u128, MathError> {
        if amount == 0 || self.is_zero() {
            return Ok(0);
        }
        let wide = self.0.full_mul(U256::from(amount)) / WAD_WIDE.full_mul(U256::one());
        if wide > U256::from(u128::MAX).full_mul(U256::one()) {
            return Err(MathError::Overflow);
        }
        Ok(wide.low_u128())
    }

    /// Scale by an integer number of elapsed units (seconds)
    #[inline]
    pub fn checked_mul_int(self, n: u64) -> Result<Self, MathError> {
        self.0
            .checked_mul(U256::from(n))
            .map(Wad)
            .ok_or(MathError::Overflow)
    }

    #[inline]
    pub fn checked_add(self, other: Wad) -> Result<Self, MathError> {
        self.0
            .checked_add(other.0)
            .map(Wad)
            .ok_or(MathError::Overflow)
    }

    /// `self - other`, saturating at zero
    ///
    /// Index deltas are always taken newer-minus-older, so a negative delta can
    /// only mean the snapshot belongs to another index lineage; it is treated as
    /// no growth.
    #[inline]
    pub fn saturating_sub(self, other: Wad) -> Self {
        Wad(self.0.saturating_sub(other.0))
    }
}

impl From<u128> for Wad {
    #[inline]
    fn from(raw: u128) -> Self {
        Wad(U256::from(raw))
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int = self.0 / WAD_WIDE;
        let frac = (self.0 % WAD_WIDE).low_u64();
        write!(f, "{}.{:018}", int, frac)
    }
}
