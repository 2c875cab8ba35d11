use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub},
};

use serde::{Deserialize, Serialize};

/// Signed ledger amount represented as **integer milliunits**.
///
/// The ledger service reports every amount (transactions, account balances,
/// budgeted/activity/balance of a category) as thousandths of the ledger's
/// currency. Balances are accumulated in milliunits so that replaying a long
/// history never drifts; conversion to major units only happens when a row
/// is written.
///
/// # Examples
///
/// ```rust
/// use engine::Milliunits;
///
/// let amount = Milliunits::new(12_340);
/// assert_eq!(amount.milli(), 12340);
/// assert_eq!(amount.to_major(), 12.34);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Milliunits(i64);

impl Milliunits {
    pub const ZERO: Milliunits = Milliunits(0);

    /// Milliunits in one major unit.
    pub const PER_UNIT: i64 = 1000;

    /// Creates a new amount from integer milliunits.
    #[must_use]
    pub const fn new(milli: i64) -> Self {
        Self(milli)
    }

    /// Returns the raw value in milliunits.
    #[must_use]
    pub const fn milli(self) -> i64 {
        self.0
    }

    /// Returns the value in major units (e.g. dollars).
    #[must_use]
    pub fn to_major(self) -> f64 {
        self.0 as f64 / Self::PER_UNIT as f64
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Milliunits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_major())
    }
}

impl From<i64> for Milliunits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Add for Milliunits {
    type Output = Milliunits;

    fn add(self, rhs: Milliunits) -> Self::Output {
        Milliunits(self.0 + rhs.0)
    }
}

impl AddAssign for Milliunits {
    fn add_assign(&mut self, rhs: Milliunits) {
        self.0 += rhs.0;
    }
}

impl Sub for Milliunits {
    type Output = Milliunits;

    fn sub(self, rhs: Milliunits) -> Self::Output {
        Milliunits(self.0 - rhs.0)
    }
}

impl Neg for Milliunits {
    type Output = Milliunits;

    fn neg(self) -> Self::Output {
        Milliunits(-self.0)
    }
}
