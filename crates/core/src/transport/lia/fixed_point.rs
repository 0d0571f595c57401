//! Fixed-point arithmetic for the coupling coefficient.
//!
//! All intermediate terms are held in a 128-bit [`Wide`] value. Inputs are
//! 32-bit windows and RTTs, so scaled numerators fit exactly; products and the
//! squared denominator saturate instead of wrapping.

use std::fmt;

use serde::Serialize;

use super::config::ALPHA_SCALE;

/// Coupling coefficient, scaled by `2^ALPHA_SCALE`.
///
/// The raw value `1` is the neutral coefficient a connection starts with and
/// falls back to whenever at most one path is usable. A raw value of zero is
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Alpha(u64);

impl Alpha {
    /// Single-flow-equivalent coefficient.
    pub const NEUTRAL: Self = Self(1);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Zero would stall window growth entirely; treat it as neutral.
    pub const fn or_neutral(self) -> Self {
        if self.0 == 0 {
            Self::NEUTRAL
        } else {
            self
        }
    }

    /// Packets that must be acknowledged per window increment, before the
    /// subflow's own window is applied as a floor.
    pub const fn growth_target(self) -> u64 {
        (1u64 << ALPHA_SCALE) / self.or_neutral().0
    }

    /// Unscaled value, for display only.
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / (1u64 << ALPHA_SCALE) as f64
    }
}

impl Default for Alpha {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl fmt::Display for Alpha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (~{:.5})", self.0, self.as_f64())
    }
}

/// 128-bit unsigned intermediate used by the coefficient computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub(crate) struct Wide(u128);

impl Wide {
    pub(crate) const ZERO: Self = Self(0);

    /// `value << shift`.
    pub(crate) fn scaled(value: u32, shift: u32) -> Self {
        Self(u128::from(value) << shift)
    }

    pub(crate) fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    pub(crate) fn saturating_mul(self, rhs: u32) -> Self {
        Self(self.0.saturating_mul(u128::from(rhs)))
    }

    pub(crate) fn saturating_square(self) -> Self {
        Self(self.0.saturating_mul(self.0))
    }

    /// Integer division; `None` on a zero divisor.
    pub(crate) fn checked_div(self, rhs: Self) -> Option<Self> {
        self.0.checked_div(rhs.0).map(Self)
    }

    pub(crate) fn checked_div_u32(self, rhs: u32) -> Option<Self> {
        self.0.checked_div(u128::from(rhs)).map(Self)
    }

    /// `rtt²` as a divisor.
    pub(crate) fn squared(value: u32) -> Self {
        Self(u128::from(value) * u128::from(value))
    }

    /// Narrows into a coefficient, saturating at `u64::MAX`.
    pub(crate) fn to_alpha(self) -> Alpha {
        Alpha(u64::try_from(self.0).unwrap_or(u64::MAX))
    }
}
