use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, TimeDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::SimError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Income,
    Housing,
    Insurance,
    Loan,
    Utilities,
    Telecom,
    Subscriptions,
    Fitness,
    Groceries,
    Fuel,
    Dining,
    Shopping,
    Personal,
    Cash,
    Gambling,
    Transfer,
    Withdrawal,
    Interest,
    EmployeeContribution,
    EmployerContribution,
    InvestmentGain,
    Fees,
    UtilityCharge,
    UtilityPayment,
}

/// One statement cycle: a calendar month, or a whole year for annual
/// documents. The date bounds are resolved once at construction.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodId {
    year: i32,
    month: Option<u32>,
    start: NaiveDate,
    end: NaiveDate,
}

impl PeriodId {
    pub fn monthly(year: i32, month: u32) -> Result<Self, SimError> {
        let invalid = || SimError::config("period", format!("no such month {year}-{month:02}"));
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let end = next.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;
        Ok(Self {
            year,
            month: Some(month),
            start,
            end,
        })
    }

    pub fn annual(year: i32) -> Result<Self, SimError> {
        let invalid = || SimError::config("period", format!("no such year {year}"));
        let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid)?;
        Ok(Self {
            year,
            month: None,
            start,
            end,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Option<u32> {
        self.month
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }

    pub fn is_monthly(&self) -> bool {
        self.month.is_some()
    }

    /// Date of `day` counted from the start of the period, clipped into the
    /// period (day 31 of a 30-day month lands on the 30th).
    pub fn day(&self, day: u32) -> NaiveDate {
        let offset = day.clamp(1, self.days()) - 1;
        self.start + TimeDelta::days(offset as i64)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn label(&self) -> String {
        match self.month {
            Some(month) => format!("{}-{month:02}", self.year),
            None => self.year.to_string(),
        }
    }

    pub fn title(&self) -> String {
        match self.month {
            Some(_) => self.start.format("%B %Y").to_string(),
            None => format!("Year Ending {}", self.end.format("%B %d, %Y")),
        }
    }
}

/// A transaction drawn by a generator, before the reconciler gives it a
/// running balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub date: NaiveDate,
    pub description: String,
    pub category: Category,
    /// Positive = credit, negative = debit.
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Entry {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        category: Category,
        amount: Decimal,
    ) -> Self {
        Self {
            date,
            description: description.into(),
            category,
            amount,
            link: None,
        }
    }

    pub fn linked(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    pub category: Category,
    pub amount: Decimal,
    pub running_balance_after: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Transaction {
    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_debit(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub id: PeriodId,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub period: String,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub total_credits: Decimal,
    pub total_debits: Decimal,
    pub by_category: BTreeMap<Category, Decimal>,
    pub interest: Decimal,
    pub ytd_interest: Decimal,
    pub transaction_count: usize,
}

impl PeriodSummary {
    pub fn category_total(&self, category: Category) -> Decimal {
        self.by_category
            .get(&category)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Interest state threaded from one period into the next of the same year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearToDate {
    pub interest: Decimal,
    /// Accrued but not yet posted (annual compounding).
    pub accrued: Decimal,
}

pub(crate) fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}
