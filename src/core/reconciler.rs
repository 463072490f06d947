use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::config::{Compounding, InterestBasis, InterestConfig};
use super::error::SimError;
use super::money::round_cents;
use super::types::{Category, Entry, Period, PeriodId, PeriodSummary, Transaction, YearToDate};

const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub period: Period,
    pub summary: PeriodSummary,
    pub ytd: YearToDate,
}

/// Orders `entries` by date (stable), posts interest for interest-bearing
/// accounts and annotates every transaction with its running balance.
///
/// `ytd` is the year-to-date state left by the previous period of the same
/// year; pass `YearToDate::default()` for January or for annual periods.
pub fn reconcile(
    period: &PeriodId,
    opening_balance: Decimal,
    mut entries: Vec<Entry>,
    interest: Option<&InterestConfig>,
    ytd: YearToDate,
) -> Result<Reconciled, SimError> {
    entries.sort_by_key(|e| e.date);

    let mut ytd = ytd;
    let mut interest_posted = Decimal::ZERO;

    if let (Some(config), Some(month)) = (interest, period.month()) {
        let basis = interest_basis(config.basis, period, opening_balance, &entries);
        let accrued = round_cents(basis.max(Decimal::ZERO) * config.apy / MONTHS_PER_YEAR);
        let to_post = match config.compounding {
            Compounding::Monthly => accrued,
            Compounding::Annual => {
                ytd.accrued += accrued;
                if month == 12 {
                    std::mem::take(&mut ytd.accrued)
                } else {
                    Decimal::ZERO
                }
            }
        };
        if to_post > Decimal::ZERO {
            entries.push(Entry::new(
                period.end(),
                config.description.clone(),
                Category::Interest,
                to_post,
            ));
            interest_posted = to_post;
            ytd.interest += to_post;
        }
    }

    let mut balance = opening_balance;
    let transactions = entries
        .into_iter()
        .map(|entry| {
            balance += entry.amount;
            Transaction {
                date: entry.date,
                description: entry.description,
                category: entry.category,
                amount: entry.amount,
                running_balance_after: balance,
                link: entry.link,
            }
        })
        .collect::<Vec<_>>();

    let closing_balance = balance;
    let net: Decimal = transactions.iter().map(|t| t.amount).sum();
    let expected = opening_balance + net;
    if expected != closing_balance {
        return Err(SimError::BalanceInvariant {
            period: period.label(),
            opening: opening_balance,
            net,
            expected,
            closing: closing_balance,
        });
    }

    let summary = summarize(
        period,
        opening_balance,
        closing_balance,
        &transactions,
        interest_posted,
        ytd.interest,
    );

    Ok(Reconciled {
        period: Period {
            id: *period,
            opening_balance,
            closing_balance,
            transactions,
        },
        summary,
        ytd,
    })
}

fn interest_basis(
    basis: InterestBasis,
    period: &PeriodId,
    opening_balance: Decimal,
    entries: &[Entry],
) -> Decimal {
    match basis {
        InterestBasis::Opening => opening_balance,
        InterestBasis::Closing => opening_balance + entries.iter().map(|e| e.amount).sum::<Decimal>(),
        InterestBasis::AverageDaily => {
            let mut balance = opening_balance;
            let mut total = Decimal::ZERO;
            let mut pending = entries.iter().peekable();
            let mut day = period.start();
            while day <= period.end() {
                while let Some(entry) = pending.next_if(|e| e.date <= day) {
                    balance += entry.amount;
                }
                total += balance;
                let Some(next) = day.succ_opt() else {
                    break;
                };
                day = next;
            }
            total / Decimal::from(period.days())
        }
    }
}

fn summarize(
    period: &PeriodId,
    opening_balance: Decimal,
    closing_balance: Decimal,
    transactions: &[Transaction],
    interest: Decimal,
    ytd_interest: Decimal,
) -> PeriodSummary {
    let mut by_category = BTreeMap::new();
    let mut total_credits = Decimal::ZERO;
    let mut total_debits = Decimal::ZERO;

    for t in transactions {
        *by_category.entry(t.category).or_insert(Decimal::ZERO) += t.amount;
        if t.is_credit() {
            total_credits += t.amount;
        } else {
            total_debits -= t.amount;
        }
    }

    PeriodSummary {
        period: period.label(),
        opening_balance,
        closing_balance,
        total_credits,
        total_debits,
        by_category,
        interest,
        ytd_interest,
        transaction_count: transactions.len(),
    }
}

/// Checks that consecutive periods of one account chain: each opening
/// balance equals the previous closing balance.
pub fn verify_continuity(periods: &[Period]) -> Result<(), SimError> {
    for pair in periods.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.opening_balance != prev.closing_balance {
            return Err(SimError::BalanceInvariant {
                period: next.id.label(),
                opening: next.opening_balance,
                net: Decimal::ZERO,
                expected: prev.closing_balance,
                closing: next.opening_balance,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn savings_interest(basis: InterestBasis) -> InterestConfig {
        InterestConfig {
            apy: dec!(0.0425),
            basis,
            compounding: Compounding::Monthly,
            description: "Interest Payment".to_string(),
        }
    }

    #[test]
    fn running_balances_follow_amounts() {
        let period = PeriodId::monthly(2024, 1).unwrap();
        let entries = vec![
            Entry::new(date(1, 1), "Mortgage", Category::Housing, dec!(-2215.27)),
            Entry::new(date(1, 15), "Payroll", Category::Income, dec!(3250.00)),
        ];
        let out = reconcile(&period, dec!(3500.00), entries, None, YearToDate::default()).unwrap();
        let balances: Vec<_> = out
            .period
            .transactions
            .iter()
            .map(|t| t.running_balance_after)
            .collect();
        assert_eq!(balances, vec![dec!(1284.73), dec!(4534.73)]);
        assert_eq!(out.summary.closing_balance, dec!(4534.73));
        assert_eq!(out.summary.total_credits, dec!(3250.00));
        assert_eq!(out.summary.total_debits, dec!(2215.27));
        assert_eq!(out.summary.category_total(Category::Housing), dec!(-2215.27));
    }

    #[test]
    fn unsorted_entries_are_stably_sorted() {
        let period = PeriodId::monthly(2024, 1).unwrap();
        let entries = vec![
            Entry::new(date(1, 20), "Late", Category::Shopping, dec!(-5)),
            Entry::new(date(1, 3), "First", Category::Shopping, dec!(-1)),
            Entry::new(date(1, 3), "Second", Category::Shopping, dec!(-2)),
        ];
        let out = reconcile(&period, dec!(100), entries, None, YearToDate::default()).unwrap();
        let order: Vec<_> = out
            .period
            .transactions
            .iter()
            .map(|t| t.description.as_str())
            .collect();
        assert_eq!(order, vec!["First", "Second", "Late"]);
    }

    #[test]
    fn closing_basis_interest_matches_worked_example() {
        let period = PeriodId::monthly(2024, 3).unwrap();
        let entries = vec![Entry::new(
            date(3, 18),
            "Transfer from Checking",
            Category::Transfer,
            dec!(500.00),
        )];
        let out = reconcile(
            &period,
            dec!(8500.00),
            entries,
            Some(&savings_interest(InterestBasis::Closing)),
            YearToDate::default(),
        )
        .unwrap();
        assert_eq!(out.summary.interest, dec!(31.88));
        assert_eq!(out.summary.closing_balance, dec!(9031.88));
        let last = out.period.transactions.last().unwrap();
        assert_eq!(last.category, Category::Interest);
        assert_eq!(last.date, period.end());
        assert_eq!(out.ytd.interest, dec!(31.88));
    }

    #[test]
    fn opening_basis_uses_start_balance() {
        let period = PeriodId::monthly(2024, 3).unwrap();
        let out = reconcile(
            &period,
            dec!(8500.00),
            Vec::new(),
            Some(&savings_interest(InterestBasis::Opening)),
            YearToDate::default(),
        )
        .unwrap();
        // 8500 * 0.0425 / 12 = 30.1041...
        assert_eq!(out.summary.interest, dec!(30.10));
    }

    #[test]
    fn average_daily_basis_weights_by_days_held() {
        let period = PeriodId::monthly(2024, 4).unwrap();
        let entries = vec![Entry::new(date(4, 16), "Deposit", Category::Transfer, dec!(3000))];
        let out = reconcile(
            &period,
            dec!(6000),
            entries,
            Some(&savings_interest(InterestBasis::AverageDaily)),
            YearToDate::default(),
        )
        .unwrap();
        // 15 days at 6000 and 15 days at 9000 average to 7500.
        assert_eq!(out.summary.interest, round_cents(dec!(7500) * dec!(0.0425) / dec!(12)));
    }

    #[test]
    fn annual_compounding_posts_once_in_december() {
        let config = InterestConfig {
            compounding: Compounding::Annual,
            ..savings_interest(InterestBasis::Opening)
        };
        let mut ytd = YearToDate::default();
        let mut balance = dec!(12000);
        for month in 1..=12 {
            let period = PeriodId::monthly(2024, month).unwrap();
            let out = reconcile(&period, balance, Vec::new(), Some(&config), ytd).unwrap();
            if month < 12 {
                assert_eq!(out.summary.interest, Decimal::ZERO);
            } else {
                assert_eq!(out.summary.interest, dec!(42.50) * dec!(12));
            }
            balance = out.summary.closing_balance;
            ytd = out.ytd;
        }
        assert_eq!(ytd.accrued, Decimal::ZERO);
        assert_eq!(ytd.interest, dec!(510.00));
    }

    #[test]
    fn ytd_interest_accumulates_across_months() {
        let config = savings_interest(InterestBasis::Closing);
        let jan = PeriodId::monthly(2024, 1).unwrap();
        let feb = PeriodId::monthly(2024, 2).unwrap();
        let a = reconcile(&jan, dec!(1200), Vec::new(), Some(&config), YearToDate::default()).unwrap();
        let b = reconcile(&feb, a.summary.closing_balance, Vec::new(), Some(&config), a.ytd).unwrap();
        assert_eq!(b.summary.ytd_interest, a.summary.interest + b.summary.interest);
        verify_continuity(&[a.period, b.period]).unwrap();
    }

    #[test]
    fn broken_chain_is_reported() {
        let jan = PeriodId::monthly(2024, 1).unwrap();
        let feb = PeriodId::monthly(2024, 2).unwrap();
        let a = reconcile(&jan, dec!(100), Vec::new(), None, YearToDate::default()).unwrap();
        let b = reconcile(&feb, dec!(101), Vec::new(), None, YearToDate::default()).unwrap();
        assert!(matches!(
            verify_continuity(&[a.period, b.period]),
            Err(SimError::BalanceInvariant { .. })
        ));
    }

    #[test]
    fn interest_is_ignored_for_annual_periods() {
        let period = PeriodId::annual(2024).unwrap();
        let out = reconcile(
            &period,
            dec!(1000),
            Vec::new(),
            Some(&savings_interest(InterestBasis::Closing)),
            YearToDate::default(),
        )
        .unwrap();
        assert_eq!(out.summary.transaction_count, 0);
        assert_eq!(out.summary.closing_balance, dec!(1000));
    }
}
