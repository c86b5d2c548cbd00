//! Fixed-precision knot values.
//!
//! Wind components, claims and discrepancies are all held as signed
//! hundredths of a knot. Rounding happens exactly once, when a value enters
//! this type; every comparison after that is integer arithmetic, so a
//! discrepancy of exactly the tolerance always compares equal to it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const SCALE: i64 = 100;
const SCALE_F: f64 = 100.0;

/// Largest magnitude accepted from floating point (hundredths).
const MAX_SCALED: f64 = 9.0e15;

/// A speed in knots with two fixed decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Knots(i64);

impl Knots {
    pub const ZERO: Knots = Knots(0);

    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    pub const fn hundredths(self) -> i64 {
        self.0
    }

    /// Converts a float, rounding half-to-even at two decimals.
    ///
    /// Returns `None` for NaN, infinities and magnitudes beyond the fixed range.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * SCALE_F).round_ties_even();
        if scaled.abs() > MAX_SCALED {
            return None;
        }
        Some(Self(scaled as i64))
    }

    /// Same rounding as [`Knots::from_f64`] for values already known to be finite
    /// and in range (computed wind components). Out-of-range input saturates.
    pub(crate) fn round(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(|| {
            if value.is_nan() {
                Self::ZERO
            } else if value > 0.0 {
                Self(MAX_SCALED as i64)
            } else {
                Self(-(MAX_SCALED as i64))
            }
        })
    }

    /// Parses decimal text such as `"7.66"` or `"15"` without going through
    /// binary floating point. Digits past the second decimal are rounded
    /// half-to-even.
    pub fn parse_decimal(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let mut whole: i64 = 0;
        for b in int_part.bytes() {
            whole = whole.checked_mul(10)?.checked_add(i64::from(b - b'0'))?;
        }

        let frac = frac_part.as_bytes();
        let digit = |i: usize| frac.get(i).map_or(0, |b| i64::from(b - b'0'));
        let mut cents = digit(0) * 10 + digit(1);

        if frac.len() > 2 {
            let dropped = digit(2);
            let rest_nonzero = frac[3..].iter().any(|b| *b != b'0');
            let round_up = dropped > 5 || (dropped == 5 && (rest_nonzero || cents % 2 == 1));
            if round_up {
                cents += 1;
            }
        }

        let value = whole.checked_mul(SCALE)?.checked_add(cents)?;
        Some(Self(if negative { -value } else { value }))
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SCALE_F
    }

    pub fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// |self − other|, exact.
    pub fn abs_diff(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0).saturating_abs())
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// One-decimal rendering used in runway phrases ("6.8").
    pub fn to_tenths_string(self) -> String {
        format!("{:.1}", self.as_f64())
    }
}

impl fmt::Display for Knots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, magnitude / 100, magnitude % 100)
    }
}

impl Serialize for Knots {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Knots {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Knots::from_f64(value)
            .ok_or_else(|| serde::de::Error::custom(format!("knot value out of range: {}", value)))
    }
}
