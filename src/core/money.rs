//! Fixed-point currency helpers. Every amount in the crate is a `Decimal`
//! holding whole cents; derived amounts are rounded half away from zero at
//! the moment they are created so later sums stay exact.

use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Largest amount any configured value may carry.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

pub const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// True when `value` carries no fraction of a cent.
pub fn is_whole_cents(value: Decimal) -> bool {
    round_cents(value) == value
}

pub fn to_cents(value: Decimal) -> i64 {
    let mut rounded = round_cents(value);
    rounded.rescale(2);
    rounded.mantissa() as i64
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Draws a whole-cent amount uniformly from `[min, max]`.
pub fn sample_between<R: Rng + ?Sized>(rng: &mut R, min: Decimal, max: Decimal) -> Decimal {
    let lo = to_cents(min);
    let hi = to_cents(max).max(lo);
    from_cents(rng.gen_range(lo..=hi))
}

/// Inclusive currency range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl AmountRange {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    pub fn exactly(amount: Decimal) -> Self {
        Self {
            min: amount,
            max: amount,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.min >= Decimal::ZERO
            && self.min <= self.max
            && self.max <= MAX_AMOUNT
            && is_whole_cents(self.min)
            && is_whole_cents(self.max)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Decimal {
        sample_between(rng, self.min, self.max)
    }

    /// Samples with the lower bound lifted by `floor_fraction` of the span,
    /// which skews draws toward the top of the range.
    pub fn sample_lifted<R: Rng + ?Sized>(&self, rng: &mut R, floor_fraction: Decimal) -> Decimal {
        let fraction = floor_fraction.clamp(Decimal::ZERO, Decimal::ONE);
        let lifted = round_cents(self.min + (self.max - self.min) * fraction);
        sample_between(rng, lifted.min(self.max), self.max)
    }

    pub fn clamp(&self, value: Decimal) -> Decimal {
        value.clamp(self.min, self.max)
    }
}
