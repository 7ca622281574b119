use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};

/// Fixed-point scale of every persisted monetary value.
pub const SCALE: i64 = 1_000_000_000;

/// A monetary amount in units of 1e-9 coin.
///
/// Floating amounts are converted exactly once, via [`Scaled::from_coins`];
/// everything past that point is integer arithmetic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scaled(i64);

impl Scaled {
    pub const ZERO: Scaled = Scaled(0);

    pub const fn from_units(units: i64) -> Self {
        Scaled(units)
    }

    pub fn from_whole(coins: i64) -> Self {
        Scaled(coins.saturating_mul(SCALE))
    }

    /// Rounds to the nearest unit.
    pub fn from_coins(coins: f64) -> Self {
        Scaled((coins * SCALE as f64).round() as i64)
    }

    pub const fn units(self) -> i64 {
        self.0
    }

    /// For display only.
    pub fn as_coins(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

impl fmt::Display for Scaled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Scaled {
    type Output = Scaled;

    fn add(self, rhs: Scaled) -> Scaled {
        Scaled(self.0 + rhs.0)
    }
}

impl AddAssign for Scaled {
    fn add_assign(&mut self, rhs: Scaled) {
        self.0 += rhs.0;
    }
}

impl Sub for Scaled {
    type Output = Scaled;

    fn sub(self, rhs: Scaled) -> Scaled {
        Scaled(self.0 - rhs.0)
    }
}

impl Neg for Scaled {
    type Output = Scaled;

    fn neg(self) -> Scaled {
        Scaled(-self.0)
    }
}

impl Sum for Scaled {
    fn sum<I: Iterator<Item = Scaled>>(iter: I) -> Scaled {
        iter.fold(Scaled::ZERO, Add::add)
    }
}
