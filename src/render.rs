//! Statement rendering. A renderer receives a statement in three blocks
//! (header, transaction table, footer); `TextRenderer` lays them out as a
//! fixed-width plain-text document.

use std::fmt::{self, Write};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::core::{
    AccountYear, Holding, Period, PeriodSummary, RetirementSummary, TaxReturn, Transaction,
    UtilityBill, round_cents,
};

const DESCRIPTION_WIDTH: usize = 45;
const AMOUNT_WIDTH: usize = 14;
const RULE_WIDTH: usize = 10 + 2 + DESCRIPTION_WIDTH + 2 + AMOUNT_WIDTH + 2 + AMOUNT_WIDTH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementHeader {
    pub institution: String,
    pub holder: String,
    pub account_name: String,
    pub account_number: String,
    pub title: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StatementHeader {
    pub fn new(institution: &str, holder: &str, account: &AccountYear, period: &Period) -> Self {
        Self {
            institution: institution.to_string(),
            holder: holder.to_string(),
            account_name: account.name.clone(),
            account_number: account.account_number.clone(),
            title: period.id.title(),
            start: period.id.start(),
            end: period.id.end(),
        }
    }
}

pub trait StatementRenderer {
    fn header(&mut self, header: &StatementHeader) -> fmt::Result;
    fn transactions(&mut self, transactions: &[Transaction]) -> fmt::Result;
    fn footer(&mut self, summary: &PeriodSummary) -> fmt::Result;
}

pub fn render_statement<R: StatementRenderer + ?Sized>(
    renderer: &mut R,
    header: &StatementHeader,
    period: &Period,
    summary: &PeriodSummary,
) -> fmt::Result {
    renderer.header(header)?;
    renderer.transactions(&period.transactions)?;
    renderer.footer(summary)
}

pub struct TextRenderer<W> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn rule(&mut self, ch: char) -> fmt::Result {
        writeln!(self.out, "{}", ch.to_string().repeat(RULE_WIDTH))
    }

    fn total_line(&mut self, label: &str, amount: Decimal) -> fmt::Result {
        writeln!(
            self.out,
            "{label:<width$}{:>AMOUNT_WIDTH$}",
            format_usd(amount),
            width = RULE_WIDTH - AMOUNT_WIDTH
        )
    }
}

impl<W: Write> StatementRenderer for TextRenderer<W> {
    fn header(&mut self, header: &StatementHeader) -> fmt::Result {
        self.rule('=')?;
        writeln!(self.out, "{}", header.institution)?;
        writeln!(self.out, "{}", header.holder)?;
        writeln!(self.out, "{} {}", header.account_name, header.account_number)?;
        writeln!(
            self.out,
            "Statement Period: {} ({} - {})",
            header.title,
            header.start.format("%m/%d/%Y"),
            header.end.format("%m/%d/%Y")
        )?;
        self.rule('=')
    }

    fn transactions(&mut self, transactions: &[Transaction]) -> fmt::Result {
        writeln!(
            self.out,
            "{:<10}  {:<DESCRIPTION_WIDTH$}  {:>AMOUNT_WIDTH$}  {:>AMOUNT_WIDTH$}",
            "Date", "Description", "Amount", "Balance"
        )?;
        self.rule('-')?;
        if transactions.is_empty() {
            writeln!(self.out, "No activity this period.")?;
        }
        for t in transactions {
            writeln!(
                self.out,
                "{:<10}  {:<DESCRIPTION_WIDTH$}  {:>AMOUNT_WIDTH$}  {:>AMOUNT_WIDTH$}",
                t.date.format("%m/%d/%Y"),
                truncate_description(&t.description),
                format_usd(t.amount),
                format_usd(t.running_balance_after)
            )?;
        }
        self.rule('-')
    }

    fn footer(&mut self, summary: &PeriodSummary) -> fmt::Result {
        self.total_line("Opening Balance", summary.opening_balance)?;
        self.total_line("Total Credits", summary.total_credits)?;
        self.total_line("Total Debits", -summary.total_debits)?;
        if !summary.ytd_interest.is_zero() {
            self.total_line("Interest Paid This Period", summary.interest)?;
            self.total_line("Interest Paid Year to Date", summary.ytd_interest)?;
        }
        self.total_line("Closing Balance", summary.closing_balance)?;
        writeln!(self.out)
    }
}

/// Every statement of the account's year, followed by the plan holdings or
/// the bill list where the account has them.
pub fn render_account_year<W: Write>(
    out: W,
    institution: &str,
    holder: &str,
    account: &AccountYear,
) -> fmt::Result {
    let mut renderer = TextRenderer::new(out);
    for statement in &account.statements {
        let header = StatementHeader::new(institution, holder, account, &statement.period);
        render_statement(&mut renderer, &header, &statement.period, &statement.summary)?;
    }
    let mut out = renderer.into_inner();
    if let Some(plan) = &account.retirement {
        writeln!(out, "{} ({})", plan.plan_name, plan.administrator)?;
        writeln!(out, "Participant: {}", plan.participant)?;
        write_quarters(&mut out, plan)?;
        write_holdings(&mut out, &plan.holdings)?;
    }
    if !account.bills.is_empty() {
        write_bills(&mut out, &account.bills)?;
    }
    Ok(())
}

fn write_quarters<W: Write>(out: &mut W, plan: &RetirementSummary) -> fmt::Result {
    writeln!(
        out,
        "{:<8}{:>14}{:>14}{:>14}{:>12}{:>16}",
        "Quarter", "Employee", "Employer", "Gain/Loss", "Fees", "Ending Balance"
    )?;
    for q in &plan.quarters {
        writeln!(
            out,
            "{:<8}{:>14}{:>14}{:>14}{:>12}{:>16}",
            q.quarter.split(' ').next().unwrap_or_default(),
            format_usd(q.employee),
            format_usd(q.employer),
            format_usd(q.gain),
            format_usd(q.fees),
            format_usd(q.ending_balance)
        )?;
    }
    writeln!(out)
}

fn write_holdings<W: Write>(out: &mut W, holdings: &[Holding]) -> fmt::Result {
    writeln!(out, "{:<40}{:>14}{:>12}{:>16}", "Fund", "Shares", "Price", "Value")?;
    for h in holdings {
        let shares = h.shares.map_or_else(|| "-".to_string(), |s| s.to_string());
        let price = h.unit_price.map_or_else(|| "-".to_string(), format_usd);
        writeln!(
            out,
            "{:<40}{:>14}{:>12}{:>16}",
            truncate_description(&h.fund),
            shares,
            price,
            format_usd(h.value)
        )?;
    }
    writeln!(out)
}

fn write_bills<W: Write>(out: &mut W, bills: &[UtilityBill]) -> fmt::Result {
    for bill in bills {
        let usage = bill
            .usage
            .map(|u| format!(" ({u} units)"))
            .unwrap_or_default();
        writeln!(
            out,
            "{} bill {} due {}{usage}: {}",
            bill.provider,
            bill.bill_date.format("%m/%d/%Y"),
            bill.due_date.format("%m/%d/%Y"),
            format_usd(bill.total)
        )?;
        for item in &bill.line_items {
            writeln!(out, "    {:<40}{:>14}", item.label, format_usd(item.amount))?;
        }
    }
    writeln!(out)
}

pub fn render_tax_return<W: Write>(mut out: W, holder: &str, ret: &TaxReturn) -> fmt::Result {
    let line = |out: &mut W, label: &str, amount: Decimal| {
        writeln!(out, "{label:<40}{:>16}", format_usd(amount))
    };

    writeln!(out, "Form 1040 U.S. Individual Income Tax Return {}", ret.tax_year)?;
    writeln!(out, "{holder} ({})", ret.filing_status)?;
    line(&mut out, "Wages, salaries, tips", ret.total_wages)?;
    line(&mut out, "Taxable interest", ret.interest_income)?;
    line(&mut out, "Ordinary dividends", ret.dividend_income)?;
    line(&mut out, "Total income", ret.total_income)?;
    line(&mut out, "Standard deduction", ret.standard_deduction)?;
    line(&mut out, "Taxable income", ret.taxable_income)?;
    for slice in &ret.slices {
        let upper = slice.upper.map_or_else(|| "and over".to_string(), format_usd);
        writeln!(
            out,
            "  {} - {} at {}%: {}",
            format_usd(slice.lower),
            upper,
            (slice.rate * Decimal::ONE_HUNDRED).normalize(),
            format_usd(slice.tax)
        )?;
    }
    line(&mut out, "Total tax", ret.total_tax)?;
    line(&mut out, "Federal income tax withheld", ret.total_withheld)?;
    writeln!(
        out,
        "Effective rate {}%, marginal rate {}%",
        (ret.effective_rate * Decimal::ONE_HUNDRED).normalize(),
        (ret.marginal_rate * Decimal::ONE_HUNDRED).normalize()
    )?;
    if ret.amount_owed.is_zero() {
        line(&mut out, "Refund", ret.refund)
    } else {
        line(&mut out, "Amount you owe", ret.amount_owed)
    }
}

/// `$1,234.56`, with a leading minus for negatives.
pub fn format_usd(amount: Decimal) -> String {
    let amount = round_cents(amount);
    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = format!("{:.2}", amount.abs());
    let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}.{cents}")
}

fn truncate_description(description: &str) -> String {
    if description.chars().count() > DESCRIPTION_WIDTH {
        let kept: String = description.chars().take(DESCRIPTION_WIDTH - 3).collect();
        format!("{kept}...")
    } else {
        description.to_string()
    }
}
