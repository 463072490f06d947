use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::config::{is_amount, is_fraction};
use super::error::SimError;
use super::money::round_cents;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WageStatement {
    pub employer: String,
    pub employee: String,
    pub wages: Decimal,
    pub federal_withheld: Decimal,
}

/// Upper edge of a bracket; `None` for the open top bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub upper: Option<Decimal>,
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxConfig {
    pub tax_year: i32,
    pub filing_status: String,
    pub wages: Vec<WageStatement>,
    #[serde(default)]
    pub interest_income: Decimal,
    #[serde(default)]
    pub dividend_income: Decimal,
    pub standard_deduction: Decimal,
    pub brackets: Vec<TaxBracket>,
}

impl TaxConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        let fail = |reason: &str| Err(SimError::config("tax return", reason));

        if self.wages.iter().any(|w| !is_amount(w.wages) || !is_amount(w.federal_withheld)) {
            return fail("wages and withholding must be >= 0");
        }
        if !is_amount(self.interest_income)
            || !is_amount(self.dividend_income)
            || !is_amount(self.standard_deduction)
        {
            return fail("income and deduction amounts must be >= 0");
        }
        if self.brackets.is_empty() {
            return fail("at least one tax bracket is required");
        }
        if self.brackets.iter().any(|b| !is_fraction(b.rate)) {
            return fail("bracket rates must be between 0 and 1");
        }
        let (open, bounded): (Vec<&TaxBracket>, Vec<&TaxBracket>) =
            self.brackets.iter().partition(|b| b.upper.is_none());
        if open.len() != 1 || self.brackets.last().is_some_and(|b| b.upper.is_some()) {
            return fail("only the last bracket may be open-ended");
        }
        let uppers: Vec<Decimal> = bounded.iter().filter_map(|b| b.upper).collect();
        if uppers.windows(2).any(|w| w[0] >= w[1]) || uppers.first().is_some_and(|u| *u <= Decimal::ZERO) {
            return fail("bracket edges must be positive and increasing");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSlice {
    pub lower: Decimal,
    pub upper: Option<Decimal>,
    pub rate: Decimal,
    pub taxable: Decimal,
    pub tax: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxReturn {
    pub tax_year: i32,
    pub filing_status: String,
    pub total_wages: Decimal,
    pub interest_income: Decimal,
    pub dividend_income: Decimal,
    pub total_income: Decimal,
    pub standard_deduction: Decimal,
    pub taxable_income: Decimal,
    pub slices: Vec<BracketSlice>,
    pub total_tax: Decimal,
    pub effective_rate: Decimal,
    pub marginal_rate: Decimal,
    pub total_withheld: Decimal,
    pub refund: Decimal,
    pub amount_owed: Decimal,
}

pub fn compute_return(config: &TaxConfig) -> Result<TaxReturn, SimError> {
    config.validate()?;

    let total_wages: Decimal = config.wages.iter().map(|w| w.wages).sum();
    let total_withheld: Decimal = config.wages.iter().map(|w| w.federal_withheld).sum();
    let total_income = total_wages + config.interest_income + config.dividend_income;
    let taxable_income = (total_income - config.standard_deduction).max(Decimal::ZERO);

    let slices = bracket_slices(taxable_income, &config.brackets);
    let total_tax: Decimal = slices.iter().map(|s| s.tax).sum();
    let marginal_rate = slices
        .last()
        .map(|s| s.rate)
        .or_else(|| config.brackets.first().map(|b| b.rate))
        .unwrap_or(Decimal::ZERO);
    let effective_rate = if total_income.is_zero() {
        Decimal::ZERO
    } else {
        (total_tax / total_income).round_dp(4)
    };

    let balance = total_withheld - total_tax;
    Ok(TaxReturn {
        tax_year: config.tax_year,
        filing_status: config.filing_status.clone(),
        total_wages,
        interest_income: config.interest_income,
        dividend_income: config.dividend_income,
        total_income,
        standard_deduction: config.standard_deduction,
        taxable_income,
        slices,
        total_tax,
        effective_rate,
        marginal_rate,
        total_withheld,
        refund: balance.max(Decimal::ZERO),
        amount_owed: (-balance).max(Decimal::ZERO),
    })
}

/// Taxable slice and tax of every bracket the income reaches.
fn bracket_slices(taxable_income: Decimal, brackets: &[TaxBracket]) -> Vec<BracketSlice> {
    let mut slices = Vec::new();
    let mut lower = Decimal::ZERO;
    for bracket in brackets {
        if taxable_income <= lower {
            break;
        }
        let top = bracket.upper.map_or(taxable_income, |u| u.min(taxable_income));
        let taxable = top - lower;
        slices.push(BracketSlice {
            lower,
            upper: bracket.upper,
            rate: bracket.rate,
            taxable,
            tax: round_cents(taxable * bracket.rate),
        });
        match bracket.upper {
            Some(upper) => lower = upper,
            None => break,
        }
    }
    slices
}
