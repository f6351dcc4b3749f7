//! Bandwidth and meter rates.
//!
//! Rates are held as whole kbit/s so clamping, aggregation and comparison
//! are exact and byte-stable. Intent documents and profiles speak Mbps; the
//! conversion happens once, at the validation boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A data rate in kbit/s
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rate(u64);

impl Rate {
    /// The zero rate
    pub const ZERO: Self = Self(0);

    /// Create from kbit/s
    #[must_use]
    pub const fn from_kbps(kbps: u64) -> Self {
        Self(kbps)
    }

    /// Create from whole Mbit/s
    #[must_use]
    pub const fn from_mbps(mbps: u64) -> Self {
        Self(mbps.saturating_mul(1000))
    }

    /// Create from fractional Mbit/s, rounding to the nearest kbit/s
    ///
    /// Negative and non-finite inputs yield `None`.
    #[must_use]
    pub fn from_mbps_f64(mbps: f64) -> Option<Self> {
        if !mbps.is_finite() || mbps < 0.0 {
            return None;
        }
        // `as` saturates on overflow
        Some(Self((mbps * 1000.0).round() as u64))
    }

    /// Value in kbit/s
    #[must_use]
    pub const fn kbps(self) -> u64 {
        self.0
    }

    /// Value in Mbit/s
    #[must_use]
    pub fn as_mbps(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Saturating addition
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Clamp into `[min, max]`
    #[must_use]
    pub fn clamp_to(self, min: Self, max: Self) -> Self {
        self.max(min).min(max)
    }

    /// Scale by `numerator / denominator`, rounding down
    ///
    /// A zero denominator yields zero.
    #[must_use]
    pub fn scale(self, numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        let scaled = u128::from(self.0) * u128::from(numerator) / u128::from(denominator);
        Self(u64::try_from(scaled).unwrap_or(u64::MAX))
    }

    /// Bytes transmitted at this rate over `millis` milliseconds
    #[must_use]
    pub const fn bytes_over_ms(self, millis: u64) -> u64 {
        // kbit/s * ms = bits
        self.0.saturating_mul(millis) / 8
    }
}

impl std::iter::Sum for Rate {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Mbps", self.as_mbps())
    }
}
