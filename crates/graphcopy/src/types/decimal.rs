//! Fixed-point decimal value.
//!
//! The implementation uses a coefficient (BigInt) and an exponent (i32) representation:
//! value = coefficient * 10^exponent
//!
//! Decimals are immutable and sit on the atomic whitelist, so the copy engine hands
//! them through unchanged. Only construction, normalisation and formatting live here;
//! arithmetic is the host's business.

use std::{fmt, str::FromStr};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, Zero};

/// A decimal number with arbitrary precision.
///
/// Stored as coefficient * 10^exponent. Trailing zeros are preserved, so `1.50`
/// and `1.5` are distinct representations (compare [`Decimal::normalized`] values
/// for numeric equality).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Decimal {
    /// The significand/coefficient of the decimal number.
    coefficient: BigInt,
    /// The exponent (power of 10).
    exponent: i32,
}

impl Decimal {
    /// Creates a new Decimal from coefficient and exponent.
    #[must_use]
    pub fn new(coefficient: BigInt, exponent: i32) -> Self {
        Self { coefficient, exponent }
    }

    /// Returns zero with exponent 0.
    #[must_use]
    pub fn zero() -> Self {
        Self::new(BigInt::ZERO, 0)
    }

    /// Creates a Decimal from an i64.
    #[must_use]
    pub fn from_i64(n: i64) -> Self {
        Self::new(BigInt::from(n), 0)
    }

    /// Creates a Decimal from a string.
    ///
    /// Supports formats like:
    /// - "123", "-123", "+123"
    /// - "123.456", "-123.456"
    /// - "1.23E+10", "1.23e-10"
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal representation.
    pub fn from_string(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let (negative, rest) = if let Some(rest) = s.strip_prefix('-') {
            (true, rest)
        } else if let Some(rest) = s.strip_prefix('+') {
            (false, rest)
        } else {
            (false, s)
        };

        let (mantissa, exp_str) = match rest.find(['e', 'E']) {
            Some(pos) => (&rest[..pos], &rest[pos + 1..]),
            None => (rest, ""),
        };

        let mut exponent: i32 = 0;
        if !exp_str.is_empty() {
            exponent = exp_str
                .parse::<i32>()
                .map_err(|_| format!("Invalid exponent in decimal string: {s}"))?;
        }

        let (int_part, frac_part) = match mantissa.find('.') {
            Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("Invalid decimal string: {s}"));
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(format!("Invalid digits in decimal string: {s}"));
        }

        let digits = format!("{}{}", int_part.trim_start_matches('0'), frac_part);
        let frac_len = i32::try_from(frac_part.len()).map_err(|_| format!("Decimal string too long: {s}"))?;
        exponent -= frac_len;

        let coefficient = if digits.chars().all(|c| c == '0') {
            BigInt::ZERO
        } else {
            BigInt::from_str(&digits).map_err(|_| format!("Invalid digits in decimal string: {s}"))?
        };

        let coefficient = if negative { -coefficient } else { coefficient };
        Ok(Self::new(coefficient, exponent))
    }

    /// Returns a normalized copy (trailing zeros removed).
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut normalized = self.clone();
        normalized.normalize();
        normalized
    }

    fn normalize(&mut self) {
        if self.coefficient.is_zero() {
            self.exponent = 0;
            return;
        }
        let ten = BigInt::from(10u8);
        loop {
            let (quotient, remainder) = self.coefficient.div_rem(&ten);
            if !remainder.is_zero() {
                break;
            }
            self.coefficient = quotient;
            self.exponent += 1;
        }
    }

    /// Returns the exponent field.
    #[must_use]
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Returns the coefficient.
    #[must_use]
    pub fn coefficient(&self) -> &BigInt {
        &self.coefficient
    }
}

impl FromStr for Decimal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coefficient.is_zero() {
            if self.exponent >= 0 {
                return write!(f, "0");
            }
            let frac_zeros = usize::try_from(-self.exponent - 1).unwrap_or(0);
            return write!(f, "0.{}0", "0".repeat(frac_zeros));
        }

        let digits = self.coefficient.abs().to_string();
        let sign = if self.coefficient.is_negative() { "-" } else { "" };

        if self.exponent >= 0 {
            let zeros = usize::try_from(self.exponent).unwrap_or(0);
            return write!(f, "{sign}{digits}{}", "0".repeat(zeros));
        }

        let point = i32::try_from(digits.len()).unwrap_or(i32::MAX) + self.exponent;
        if point > 0 {
            let point = usize::try_from(point).unwrap_or(0);
            let (int_part, frac_part) = digits.split_at(point);
            write!(f, "{sign}{int_part}.{frac_part}")
        } else {
            let zeros = usize::try_from(-point).unwrap_or(0);
            write!(f, "{sign}0.{}{}", "0".repeat(zeros), digits)
        }
    }
}
