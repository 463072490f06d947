use chrono::{Datelike, Months, NaiveDate, TimeDelta};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::config::{DayWindow, is_amount, is_positive_amount, is_rate};
use super::error::SimError;
use super::money::{AmountRange, round_cents};
use super::types::{Category, Entry, PeriodId};

/// Largest metered usage a single bill may carry.
pub const MAX_USAGE: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBand {
    pub months: Vec<u32>,
    pub extra: UsageRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surcharge {
    pub label: String,
    pub rate_per_unit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeteredRate {
    pub usage_label: String,
    pub base_usage: u32,
    /// First band listing the bill month wins; otherwise `default_extra`.
    #[serde(default)]
    pub bands: Vec<UsageBand>,
    pub default_extra: UsageRange,
    pub rate_per_unit: Decimal,
    #[serde(default)]
    pub base_charge: Decimal,
    #[serde(default)]
    pub surcharges: Vec<Surcharge>,
    #[serde(default)]
    pub amount_range: Option<AmountRange>,
}

impl MeteredRate {
    fn extra_for(&self, month: u32) -> UsageRange {
        self.bands
            .iter()
            .find(|band| band.months.contains(&month))
            .map(|band| band.extra)
            .unwrap_or(self.default_extra)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Billing {
    Metered(MeteredRate),
    Flat { amount: Decimal, plan: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilityService {
    pub provider: String,
    pub account_number: String,
    pub unit: String,
    pub billing: Billing,
    pub bill_days: DayWindow,
    #[serde(default = "default_due_after_days")]
    pub due_after_days: u32,
    #[serde(default = "default_autopay")]
    pub autopay: bool,
}

fn default_due_after_days() -> u32 {
    21
}

fn default_autopay() -> bool {
    true
}

impl UtilityService {
    pub fn validate(&self, account: &str) -> Result<(), SimError> {
        let fail = |reason: String| Err(SimError::config(account, reason));

        if self.provider.trim().is_empty() {
            return fail("utility provider must not be empty".to_string());
        }
        if !self.bill_days.is_well_formed() {
            return fail(format!("{} bill day window is invalid", self.provider));
        }
        if self.due_after_days > 60 {
            return fail(format!("{} due date must be within 60 days", self.provider));
        }

        match &self.billing {
            Billing::Flat { amount, .. } => {
                if !is_positive_amount(*amount) {
                    return fail(format!("{} flat amount must be a whole-cent amount > 0", self.provider));
                }
            }
            Billing::Metered(rate) => {
                let ranges = rate
                    .bands
                    .iter()
                    .map(|band| band.extra)
                    .chain(std::iter::once(rate.default_extra));
                for range in ranges {
                    if range.min > range.max {
                        return fail(format!("{} usage band must satisfy min <= max", self.provider));
                    }
                }
                if rate
                    .bands
                    .iter()
                    .flat_map(|band| &band.months)
                    .any(|m| !(1..=12).contains(m))
                {
                    return fail(format!("{} band months must be between 1 and 12", self.provider));
                }
                let peak = rate
                    .bands
                    .iter()
                    .map(|band| band.extra.max)
                    .chain(std::iter::once(rate.default_extra.max))
                    .max()
                    .unwrap_or(0);
                if u64::from(rate.base_usage) + u64::from(peak) > u64::from(MAX_USAGE) {
                    return fail(format!(
                        "{} usage may not exceed {MAX_USAGE} units",
                        self.provider
                    ));
                }
                let mut rates = std::iter::once(rate.rate_per_unit)
                    .chain(rate.surcharges.iter().map(|s| s.rate_per_unit));
                if !rates.all(is_rate) || !is_amount(rate.base_charge) {
                    return fail(format!("{} rates and charges must be >= 0", self.provider));
                }
                if rate.amount_range.is_some_and(|r| !r.is_well_formed()) {
                    return fail(format!(
                        "{} amount range must be whole cents with 0 <= min <= max",
                        self.provider
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub label: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilityBill {
    pub provider: String,
    pub bill_date: NaiveDate,
    pub due_date: NaiveDate,
    pub service_from: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<u32>,
    pub line_items: Vec<LineItem>,
    pub total: Decimal,
}

/// Draws one bill per month of the (annual) `period`.
pub fn generate_bills<R: Rng + ?Sized>(
    service: &UtilityService,
    period: &PeriodId,
    rng: &mut R,
) -> Result<Vec<UtilityBill>, SimError> {
    if period.is_monthly() {
        return Err(SimError::config(
            &service.provider,
            "utility statements cover a whole year",
        ));
    }

    let mut bills = Vec::with_capacity(12);
    for month in 1..=12 {
        let month_period = PeriodId::monthly(period.year(), month)?;
        let bill_date = service.bill_days.sample(rng, &month_period);
        let due_date = bill_date + TimeDelta::days(i64::from(service.due_after_days));
        let service_from = bill_date
            .checked_sub_months(Months::new(1))
            .unwrap_or(bill_date);

        let (usage, line_items) = match &service.billing {
            Billing::Flat { amount, plan } => (
                None,
                vec![LineItem {
                    label: plan.clone(),
                    amount: *amount,
                }],
            ),
            Billing::Metered(rate) => {
                let extra = rate.extra_for(month);
                let usage = rate
                    .base_usage
                    .checked_add(rng.gen_range(extra.min..=extra.max))
                    .filter(|u| *u <= MAX_USAGE)
                    .ok_or_else(|| {
                        SimError::config(
                            &service.provider,
                            format!("usage may not exceed {MAX_USAGE} units"),
                        )
                    })?;
                (Some(usage), metered_lines(rate, usage, &service.unit))
            }
        };

        bills.push(finish_bill(service, bill_date, due_date, service_from, usage, line_items));
    }
    Ok(bills)
}

fn metered_lines(rate: &MeteredRate, usage: u32, unit: &str) -> Vec<LineItem> {
    let units = Decimal::from(usage);
    let mut lines = vec![LineItem {
        label: format!("{} ({usage} {unit} @ ${})", rate.usage_label, rate.rate_per_unit),
        amount: round_cents(units * rate.rate_per_unit),
    }];
    if !rate.base_charge.is_zero() {
        lines.push(LineItem {
            label: "Base Charge".to_string(),
            amount: rate.base_charge,
        });
    }
    for surcharge in &rate.surcharges {
        lines.push(LineItem {
            label: format!("{} ({usage} {unit} @ ${})", surcharge.label, surcharge.rate_per_unit),
            amount: round_cents(units * surcharge.rate_per_unit),
        });
    }
    lines
}

fn finish_bill(
    service: &UtilityService,
    bill_date: NaiveDate,
    due_date: NaiveDate,
    service_from: NaiveDate,
    usage: Option<u32>,
    mut line_items: Vec<LineItem>,
) -> UtilityBill {
    let raw: Decimal = line_items.iter().map(|l| l.amount).sum();
    let total = match &service.billing {
        Billing::Metered(MeteredRate {
            amount_range: Some(range),
            ..
        }) => range.clamp(raw),
        _ => raw,
    };
    if total != raw {
        line_items.push(LineItem {
            label: "Rate Adjustment".to_string(),
            amount: total - raw,
        });
    }
    UtilityBill {
        provider: service.provider.clone(),
        bill_date,
        due_date,
        service_from,
        usage,
        line_items,
        total,
    }
}

/// Ledger entries for a year of bills. Each bill posts as a charge on its
/// bill date; with autopay the payment posts on the due date when that date
/// is still inside the year. A balance carried in from last year (negative:
/// owed) is paid on the first bill date.
pub fn bill_entries(
    service: &UtilityService,
    bills: &[UtilityBill],
    period: &PeriodId,
    opening_balance: Decimal,
) -> Vec<Entry> {
    let mut entries = Vec::with_capacity(bills.len() * 2 + 1);

    if service.autopay && opening_balance < Decimal::ZERO {
        let date = bills.first().map_or(period.start(), |b| b.bill_date);
        entries.push(Entry::new(
            date,
            "Payment - Previous Balance",
            Category::UtilityPayment,
            -opening_balance,
        ));
    }

    for bill in bills {
        entries.push(Entry::new(
            bill.bill_date,
            format!("{} - {} Bill", service.provider, bill.bill_date.format("%B")),
            Category::UtilityCharge,
            -bill.total,
        ));
        if service.autopay && bill.due_date.year() == period.year() {
            entries.push(Entry::new(
                bill.due_date,
                "AutoPay Payment - Thank You",
                Category::UtilityPayment,
                bill.total,
            ));
        }
    }

    entries
}
