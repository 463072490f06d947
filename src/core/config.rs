use chrono::NaiveDate;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::SimError;
use super::money::{AmountRange, MAX_AMOUNT, is_whole_cents};
use super::retirement::RetirementPlan;
use super::types::{Category, PeriodId};
use super::utility::UtilityService;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountKind {
    Checking,
    Savings,
    Retirement,
    Utility,
}

impl AccountKind {
    pub fn forbids_negative(self) -> bool {
        matches!(self, AccountKind::Checking | AccountKind::Savings)
    }

    pub fn is_monthly(self) -> bool {
        matches!(self, AccountKind::Checking | AccountKind::Savings)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayDay {
    Day(u32),
    LastDay,
}

impl PayDay {
    pub fn date_in(self, period: &PeriodId) -> NaiveDate {
        match self {
            PayDay::Day(day) => period.day(day),
            PayDay::LastDay => period.end(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSource {
    pub description: String,
    pub amount: Decimal,
    pub pay_days: Vec<PayDay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedItem {
    pub description: String,
    pub category: Category,
    pub amount: Decimal,
    pub day: u32,
}

/// Day-of-month window; both ends are clipped to the month being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub first: u32,
    pub last: u32,
}

impl DayWindow {
    pub const WHOLE_MONTH: DayWindow = DayWindow { first: 1, last: 31 };

    pub fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, period: &PeriodId) -> NaiveDate {
        let last = self.last.min(period.days());
        let first = self.first.min(last);
        period.day(rng.gen_range(first..=last))
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        (1..=31).contains(&self.first) && (1..=31).contains(&self.last) && self.first <= self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrences {
    pub min: u32,
    pub max: u32,
}

impl Occurrences {
    pub const ONCE: Occurrences = Occurrences { min: 1, max: 1 };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seasonality {
    pub peak_months: Vec<u32>,
    /// Fraction of the range below which peak-month draws never fall.
    pub peak_floor: Decimal,
}

impl Seasonality {
    pub fn is_peak(&self, month: u32) -> bool {
        self.peak_months.contains(&month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableItem {
    pub description: String,
    /// When set, each occurrence picks one and is described as
    /// "{description} - {merchant}".
    #[serde(default)]
    pub merchants: Vec<String>,
    pub category: Category,
    pub amount: AmountRange,
    /// When set, amounts are picked from this list instead of the range.
    #[serde(default)]
    pub amount_choices: Vec<Decimal>,
    pub days: DayWindow,
    pub occurrences: Occurrences,
    #[serde(default)]
    pub seasonality: Option<Seasonality>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccasionalChoice {
    pub description: String,
    pub amount: AmountRange,
}

/// Splits a drawn total into several smaller debits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installments {
    pub min_chunk: Decimal,
    pub max_chunk: Decimal,
    /// Once the remainder is at or below this, it posts as one chunk.
    pub settle_below: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccasionalItem {
    pub probability: f64,
    pub category: Category,
    pub choices: Vec<OccasionalChoice>,
    pub days: DayWindow,
    #[serde(default)]
    pub installments: Option<Installments>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferDirection {
    Outgoing,
    Incoming,
}

/// One side of a transfer between two accounts. Both sides carry the same
/// `link`, amount and window; the posting day is derived from the link so the
/// two generators agree without sharing a random source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedTransfer {
    pub link: String,
    pub description: String,
    pub amount: Decimal,
    pub direction: TransferDirection,
    pub days: DayWindow,
}

impl LinkedTransfer {
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            TransferDirection::Outgoing => -self.amount,
            TransferDirection::Incoming => self.amount,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverdraftPolicy {
    /// Shrink a discretionary debit to what the balance can bear.
    #[default]
    Clamp,
    /// Drop a discretionary debit the balance cannot bear.
    Skip,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterestBasis {
    Closing,
    AverageDaily,
    Opening,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Compounding {
    #[default]
    Monthly,
    Annual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestConfig {
    /// Annual percentage yield as a fraction (0.0425 = 4.25%).
    pub apy: Decimal,
    pub basis: InterestBasis,
    #[serde(default)]
    pub compounding: Compounding,
    #[serde(default = "default_interest_description")]
    pub description: String,
}

fn default_interest_description() -> String {
    "Interest Payment".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    pub kind: AccountKind,
    pub name: String,
    pub account_number: String,
    pub starting_balance: Decimal,
    #[serde(default)]
    pub balance_floor: Decimal,
    #[serde(default)]
    pub overdraft: OverdraftPolicy,
    #[serde(default)]
    pub income: Vec<IncomeSource>,
    #[serde(default)]
    pub fixed: Vec<FixedItem>,
    #[serde(default)]
    pub variable: Vec<VariableItem>,
    #[serde(default)]
    pub occasional: Vec<OccasionalItem>,
    #[serde(default)]
    pub transfers: Vec<LinkedTransfer>,
    #[serde(default)]
    pub interest: Option<InterestConfig>,
    #[serde(default)]
    pub retirement: Option<RetirementPlan>,
    #[serde(default)]
    pub utility: Option<UtilityService>,
}

impl AccountConfig {
    pub fn new(kind: AccountKind, name: impl Into<String>, account_number: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            account_number: account_number.into(),
            starting_balance: Decimal::ZERO,
            balance_floor: Decimal::ZERO,
            overdraft: OverdraftPolicy::Clamp,
            income: Vec::new(),
            fixed: Vec::new(),
            variable: Vec::new(),
            occasional: Vec::new(),
            transfers: Vec::new(),
            interest: None,
            retirement: None,
            utility: None,
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.name, self.account_number)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let name = self.label();
        let fail = |reason: String| Err(SimError::config(&name, reason));

        if self.name.trim().is_empty() {
            return fail("account name must not be empty".to_string());
        }
        if !is_amount(self.starting_balance.abs()) {
            return fail("starting balance must be whole cents within the maximum amount".to_string());
        }
        if self.kind.forbids_negative() && self.starting_balance < Decimal::ZERO {
            return fail("starting balance must be >= 0".to_string());
        }
        if !is_amount(self.balance_floor) {
            return fail("balance floor must be whole cents between 0 and the maximum amount".to_string());
        }

        match self.kind {
            AccountKind::Checking if self.fixed.is_empty() => {
                return fail("checking accounts need at least one fixed item".to_string());
            }
            AccountKind::Savings if self.interest.is_none() => {
                return fail("savings accounts need an interest section".to_string());
            }
            AccountKind::Retirement if self.retirement.is_none() => {
                return fail("retirement accounts need a retirement plan section".to_string());
            }
            AccountKind::Utility if self.utility.is_none() => {
                return fail("utility accounts need a utility service section".to_string());
            }
            _ => {}
        }

        for source in &self.income {
            if !is_positive_amount(source.amount) {
                return fail(format!("income \"{}\" must be a whole-cent amount > 0", source.description));
            }
            if source.pay_days.is_empty() {
                return fail(format!("income \"{}\" has no pay days", source.description));
            }
            for pay_day in &source.pay_days {
                if let PayDay::Day(day) = pay_day {
                    if !(1..=31).contains(day) {
                        return fail(format!(
                            "income \"{}\" pay day {day} must be between 1 and 31",
                            source.description
                        ));
                    }
                }
            }
        }

        for item in &self.fixed {
            if !is_positive_amount(item.amount) {
                return fail(format!("fixed item \"{}\" must be a whole-cent amount > 0", item.description));
            }
            if !(1..=31).contains(&item.day) {
                return fail(format!(
                    "fixed item \"{}\" day {} must be between 1 and 31",
                    item.description, item.day
                ));
            }
        }

        for item in &self.variable {
            if !item.amount.is_well_formed() {
                return fail(format!(
                    "variable item \"{}\" range must be whole cents with 0 <= min <= max",
                    item.description
                ));
            }
            if item.amount_choices.iter().any(|v| !is_amount(*v)) {
                return fail(format!(
                    "variable item \"{}\" amount choices must be whole cents >= 0",
                    item.description
                ));
            }
            if !item.days.is_well_formed() {
                return fail(format!("variable item \"{}\" day window is invalid", item.description));
            }
            if item.occurrences.min > item.occurrences.max || item.occurrences.max > 100 {
                return fail(format!(
                    "variable item \"{}\" occurrences must satisfy min <= max <= 100",
                    item.description
                ));
            }
            if let Some(season) = &item.seasonality {
                if season.peak_months.iter().any(|m| !(1..=12).contains(m)) {
                    return fail(format!(
                        "variable item \"{}\" peak months must be between 1 and 12",
                        item.description
                    ));
                }
                if season.peak_floor < Decimal::ZERO || season.peak_floor > Decimal::ONE {
                    return fail(format!(
                        "variable item \"{}\" peak floor must be between 0 and 1",
                        item.description
                    ));
                }
            }
        }

        for item in &self.occasional {
            if !item.probability.is_finite() || !(0.0..=1.0).contains(&item.probability) {
                return fail("occasional item probability must be between 0 and 1".to_string());
            }
            if item.choices.is_empty() {
                return fail("occasional item needs at least one choice".to_string());
            }
            if let Some(bad) = item.choices.iter().find(|c| !c.amount.is_well_formed()) {
                return fail(format!(
                    "occasional choice \"{}\" range must be whole cents with 0 <= min <= max",
                    bad.description
                ));
            }
            if !item.days.is_well_formed() {
                return fail("occasional item day window is invalid".to_string());
            }
            if let Some(split) = &item.installments {
                if !is_positive_amount(split.min_chunk)
                    || !is_amount(split.max_chunk)
                    || split.min_chunk > split.max_chunk
                    || !is_amount(split.settle_below)
                {
                    return fail(
                        "installments must be whole cents with 0.01 <= min_chunk <= max_chunk and settle_below >= 0"
                            .to_string(),
                    );
                }
            }
        }

        for transfer in &self.transfers {
            if transfer.link.trim().is_empty() {
                return fail(format!("transfer \"{}\" has no link", transfer.description));
            }
            if !is_positive_amount(transfer.amount) {
                return fail(format!("transfer \"{}\" must be a whole-cent amount > 0", transfer.description));
            }
            if !transfer.days.is_well_formed() {
                return fail(format!("transfer \"{}\" day window is invalid", transfer.description));
            }
        }

        if let Some(interest) = &self.interest {
            if interest.apy < Decimal::ZERO || interest.apy > Decimal::ONE {
                return fail("interest apy must be between 0 and 1".to_string());
            }
        }

        if let Some(plan) = &self.retirement {
            plan.validate(&name)?;
        }
        if let Some(service) = &self.utility {
            service.validate(&name)?;
        }

        Ok(())
    }
}

/// A currency amount: whole cents between zero and `MAX_AMOUNT`.
pub(crate) fn is_amount(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= MAX_AMOUNT && is_whole_cents(value)
}

pub(crate) fn is_positive_amount(value: Decimal) -> bool {
    value > Decimal::ZERO && is_amount(value)
}

/// A per-unit price, which may be finer than a cent.
pub(crate) fn is_rate(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= MAX_AMOUNT
}

pub(crate) fn is_fraction(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE
}
