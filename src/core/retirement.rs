use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::config::{AccountConfig, is_fraction, is_positive_amount};
use super::error::SimError;
use super::money::round_cents;
use super::types::{Category, Entry, Period, PeriodId, quarter_of};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContributionFrequency {
    #[default]
    Quarterly,
    Annual,
}

impl ContributionFrequency {
    fn periods(self) -> u32 {
        match self {
            ContributionFrequency::Quarterly => 4,
            ContributionFrequency::Annual => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundAllocation {
    pub fund: String,
    pub weight: Decimal,
    /// Absent for products quoted as a single contract (fixed annuities).
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementPlan {
    pub plan_name: String,
    pub administrator: String,
    pub participant: String,
    pub annual_salary: Decimal,
    pub employee_rate: Decimal,
    pub employer_rate: Decimal,
    /// Annual market return as a fraction; negative for a down year.
    pub annual_return: Decimal,
    #[serde(default)]
    pub contribution_frequency: ContributionFrequency,
    #[serde(default)]
    pub fee_rate: Decimal,
    pub allocations: Vec<FundAllocation>,
}

impl RetirementPlan {
    pub fn validate(&self, account: &str) -> Result<(), SimError> {
        let fail = |reason: &str| Err(SimError::config(account, reason));

        if self.plan_name.trim().is_empty() {
            return fail("plan name must not be empty");
        }
        if !is_positive_amount(self.annual_salary) {
            return fail("annual salary must be > 0");
        }
        if !is_fraction(self.employee_rate) || !is_fraction(self.employer_rate) {
            return fail("contribution rates must be between 0 and 1");
        }
        if self.annual_return < -Decimal::ONE || self.annual_return > Decimal::ONE {
            return fail("annual return must be between -1 and 1");
        }
        if !is_fraction(self.fee_rate) {
            return fail("fee rate must be between 0 and 1");
        }
        if self.allocations.is_empty() {
            return fail("plan needs at least one fund allocation");
        }
        if self.allocations.iter().any(|a| !is_fraction(a.weight)) {
            return fail("allocation weights must be between 0 and 1");
        }
        if self.allocations.iter().map(|a| a.weight).sum::<Decimal>() != Decimal::ONE {
            return fail("allocation weights must sum to 1");
        }
        if self
            .allocations
            .iter()
            .any(|a| a.unit_price.is_some_and(|p| p <= Decimal::ZERO))
        {
            return fail("fund unit prices must be > 0");
        }
        Ok(())
    }

    pub fn employee_annual(&self) -> Decimal {
        round_cents(self.annual_salary * self.employee_rate)
    }

    pub fn employer_annual(&self) -> Decimal {
        round_cents(self.annual_salary * self.employer_rate)
    }
}

/// Equal rounded shares of `annual`; the last share absorbs the remainder.
fn shares(annual: Decimal, parts: u32) -> Vec<Decimal> {
    let share = round_cents(annual / Decimal::from(parts));
    let mut out = vec![share; parts as usize];
    if let Some(last) = out.last_mut() {
        *last = annual - share * Decimal::from(parts - 1);
    }
    out
}

fn sub_period_ends(year: i32, parts: u32) -> Result<Vec<NaiveDate>, SimError> {
    let months: &[u32] = if parts == 4 { &[3, 6, 9, 12] } else { &[12] };
    months
        .iter()
        .map(|&m| PeriodId::monthly(year, m).map(|p| p.end()))
        .collect()
}

/// Entries for one plan year: per sub-period an investment gain on the
/// balance carried in, then the employee and employer contributions, and the
/// administrative fee on the last day of the year.
pub fn plan_entries(
    config: &AccountConfig,
    plan: &RetirementPlan,
    period: &PeriodId,
    opening_balance: Decimal,
) -> Result<Vec<Entry>, SimError> {
    if period.is_monthly() {
        return Err(SimError::config(
            &config.label(),
            "retirement statements cover a whole year",
        ));
    }

    let parts = plan.contribution_frequency.periods();
    let period_return = plan.annual_return / Decimal::from(parts);
    let employee = shares(plan.employee_annual(), parts);
    let employer = shares(plan.employer_annual(), parts);
    let ends = sub_period_ends(period.year(), parts)?;

    let mut entries = Vec::with_capacity(ends.len() * 3 + 1);
    let mut balance = opening_balance;

    for ((date, employee), employer) in ends.into_iter().zip(employee).zip(employer) {
        let gain = round_cents(balance * period_return);
        if !gain.is_zero() {
            let description = if gain > Decimal::ZERO {
                "Investment Gain"
            } else {
                "Investment Loss"
            };
            entries.push(Entry::new(date, description, Category::InvestmentGain, gain));
        }
        entries.push(Entry::new(
            date,
            "Employee Contribution",
            Category::EmployeeContribution,
            employee,
        ));
        entries.push(Entry::new(
            date,
            "Employer Match",
            Category::EmployerContribution,
            employer,
        ));
        balance += gain + employee + employer;
    }

    let fee = round_cents(opening_balance.max(Decimal::ZERO) * plan.fee_rate);
    if fee > Decimal::ZERO {
        entries.push(Entry::new(
            period.end(),
            "Administrative Fee",
            Category::Fees,
            -fee,
        ));
    }

    Ok(entries)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterActivity {
    pub quarter: String,
    pub employee: Decimal,
    pub employer: Decimal,
    pub gain: Decimal,
    pub fees: Decimal,
    pub ending_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub fund: String,
    pub shares: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub value: Decimal,
    pub weight: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementSummary {
    pub plan_name: String,
    pub administrator: String,
    pub participant: String,
    pub beginning_balance: Decimal,
    pub employee_contributions: Decimal,
    pub employer_contributions: Decimal,
    pub investment_gain: Decimal,
    pub fees: Decimal,
    pub ending_balance: Decimal,
    pub quarters: Vec<QuarterActivity>,
    pub holdings: Vec<Holding>,
}

/// Per-quarter activity read back from a reconciled plan year.
pub fn quarterly_activity(period: &Period) -> Vec<QuarterActivity> {
    let mut quarters = Vec::with_capacity(4);
    let mut balance = period.opening_balance;
    for quarter in 1..=4 {
        let mut row = QuarterActivity {
            quarter: format!("Q{quarter} {}", period.id.year()),
            employee: Decimal::ZERO,
            employer: Decimal::ZERO,
            gain: Decimal::ZERO,
            fees: Decimal::ZERO,
            ending_balance: balance,
        };
        for t in period
            .transactions
            .iter()
            .filter(|t| quarter_of(t.date) == quarter)
        {
            match t.category {
                Category::EmployeeContribution => row.employee += t.amount,
                Category::EmployerContribution => row.employer += t.amount,
                Category::InvestmentGain => row.gain += t.amount,
                Category::Fees => row.fees -= t.amount,
                _ => {}
            }
            balance = t.running_balance_after;
        }
        row.ending_balance = balance;
        quarters.push(row);
    }
    quarters
}

/// Splits `closing` across the plan's funds. Values are rounded to the cent
/// with the last fund taking the remainder, so holdings sum to `closing`.
pub fn holdings(plan: &RetirementPlan, closing: Decimal) -> Vec<Holding> {
    let mut allocated = Decimal::ZERO;
    let last = plan.allocations.len().saturating_sub(1);
    plan.allocations
        .iter()
        .enumerate()
        .map(|(idx, allocation)| {
            let value = if idx == last {
                closing - allocated
            } else {
                round_cents(closing * allocation.weight)
            };
            allocated += value;
            let shares = allocation.unit_price.map(|price| {
                (value / price).round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
            });
            Holding {
                fund: allocation.fund.clone(),
                shares,
                unit_price: allocation.unit_price,
                value,
                weight: allocation.weight,
            }
        })
        .collect()
}

pub fn summarize(plan: &RetirementPlan, period: &Period) -> RetirementSummary {
    let total = |category: Category| -> Decimal {
        period
            .transactions
            .iter()
            .filter(|t| t.category == category)
            .map(|t| t.amount)
            .sum()
    };

    RetirementSummary {
        plan_name: plan.plan_name.clone(),
        administrator: plan.administrator.clone(),
        participant: plan.participant.clone(),
        beginning_balance: period.opening_balance,
        employee_contributions: total(Category::EmployeeContribution),
        employer_contributions: total(Category::EmployerContribution),
        investment_gain: total(Category::InvestmentGain),
        fees: -total(Category::Fees),
        ending_balance: period.closing_balance,
        quarters: quarterly_activity(period),
        holdings: holdings(plan, period.closing_balance),
    }
}
