use chrono::NaiveDate;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::config::{AccountConfig, AccountKind, Installments, LinkedTransfer, OverdraftPolicy};
use super::engine::{derive_seed, stream_seed};
use super::error::SimError;
use super::money::{CENT, sample_between};
use super::types::{Category, Entry, PeriodId};
use super::{retirement, utility};

#[derive(Debug)]
struct Draft {
    entry: Entry,
    discretionary: bool,
}

impl Draft {
    fn mandatory(entry: Entry) -> Self {
        Self {
            entry,
            discretionary: false,
        }
    }

    fn discretionary(entry: Entry) -> Self {
        Self {
            entry,
            discretionary: true,
        }
    }
}

/// Draws the transactions of one period for `config`, starting from
/// `opening_balance`. Output is sorted by date; same-day entries keep their
/// draw order (income, incoming transfers, fixed items, outgoing transfers,
/// then discretionary spending).
///
/// Monthly accounts (checking, savings) need a monthly period, annual
/// accounts (retirement, utility) an annual one.
pub fn generate_period<R: Rng + ?Sized>(
    config: &AccountConfig,
    period: &PeriodId,
    opening_balance: Decimal,
    rng: &mut R,
) -> Result<Vec<Entry>, SimError> {
    config.validate()?;

    match config.kind {
        AccountKind::Checking | AccountKind::Savings => {
            if !period.is_monthly() {
                return Err(SimError::config(
                    &config.label(),
                    format!("{:?} accounts are generated one month at a time", config.kind),
                ));
            }
            generate_month(config, period, opening_balance, rng)
        }
        AccountKind::Retirement => {
            let plan = required(config, config.retirement.as_ref())?;
            retirement::plan_entries(config, plan, period, opening_balance)
        }
        AccountKind::Utility => {
            let service = required(config, config.utility.as_ref())?;
            let bills = utility::generate_bills(service, period, rng)?;
            Ok(utility::bill_entries(service, &bills, period, opening_balance))
        }
    }
}

fn required<'a, T>(config: &AccountConfig, section: Option<&'a T>) -> Result<&'a T, SimError> {
    section.ok_or_else(|| SimError::config(&config.label(), "missing account section"))
}

fn generate_month<R: Rng + ?Sized>(
    config: &AccountConfig,
    period: &PeriodId,
    opening_balance: Decimal,
    rng: &mut R,
) -> Result<Vec<Entry>, SimError> {
    let mut drafts = Vec::new();
    let month = period.month().unwrap_or(1);

    for source in &config.income {
        for pay_day in &source.pay_days {
            drafts.push(Draft::mandatory(Entry::new(
                pay_day.date_in(period),
                source.description.clone(),
                Category::Income,
                source.amount,
            )));
        }
    }

    for transfer in incoming(&config.transfers) {
        drafts.push(Draft::mandatory(transfer_entry(transfer, period)));
    }

    for item in &config.fixed {
        drafts.push(Draft::mandatory(Entry::new(
            period.day(item.day),
            item.description.clone(),
            item.category,
            -item.amount,
        )));
    }

    for transfer in outgoing(&config.transfers) {
        drafts.push(Draft::mandatory(transfer_entry(transfer, period)));
    }

    for item in &config.variable {
        let count = rng.gen_range(item.occurrences.min..=item.occurrences.max);
        for _ in 0..count {
            let description = match item.merchants.choose(rng) {
                Some(merchant) => format!("{} - {merchant}", item.description),
                None => item.description.clone(),
            };
            let amount = match item.amount_choices.choose(rng) {
                Some(choice) => *choice,
                None => match &item.seasonality {
                    Some(season) if season.is_peak(month) => {
                        item.amount.sample_lifted(rng, season.peak_floor)
                    }
                    _ => item.amount.sample(rng),
                },
            };
            let date = item.days.sample(rng, period);
            drafts.push(Draft::discretionary(Entry::new(
                date,
                description,
                item.category,
                -amount,
            )));
        }
    }

    for item in &config.occasional {
        if !rng.gen_bool(item.probability) {
            continue;
        }
        let Some(choice) = item.choices.choose(rng) else {
            continue;
        };
        let total = choice.amount.sample(rng);
        let chunks = match &item.installments {
            Some(split) => split_installments(total, split, rng),
            None => vec![total],
        };
        for chunk in chunks {
            let date = item.days.sample(rng, period);
            drafts.push(Draft::discretionary(Entry::new(
                date,
                choice.description.clone(),
                item.category,
                -chunk,
            )));
        }
    }

    drafts.sort_by_key(|d| d.entry.date);

    let entries = settle(config, period, opening_balance, drafts)?;
    debug!(
        account = %config.label(),
        period = %period.label(),
        entries = entries.len(),
        "generated period"
    );
    Ok(entries)
}

fn incoming(transfers: &[LinkedTransfer]) -> impl Iterator<Item = &LinkedTransfer> {
    transfers
        .iter()
        .filter(|t| t.signed_amount() > Decimal::ZERO)
}

fn outgoing(transfers: &[LinkedTransfer]) -> impl Iterator<Item = &LinkedTransfer> {
    transfers
        .iter()
        .filter(|t| t.signed_amount() < Decimal::ZERO)
}

fn transfer_entry(transfer: &LinkedTransfer, period: &PeriodId) -> Entry {
    Entry::new(
        transfer_date(transfer, period),
        transfer.description.clone(),
        Category::Transfer,
        transfer.signed_amount(),
    )
    .linked(transfer.link.clone())
}

/// Posting date of a linked transfer. Depends only on the link name, the
/// window and the period, so both accounts of a transfer agree.
pub fn transfer_date(transfer: &LinkedTransfer, period: &PeriodId) -> NaiveDate {
    let slot = period.month().unwrap_or(0);
    let seed = derive_seed(stream_seed(0, &transfer.link), period.year(), slot);
    let mut rng = StdRng::seed_from_u64(seed);
    transfer.days.sample(&mut rng, period)
}

/// Breaks `total` into chunks between `min_chunk` and `max_chunk`; the
/// remainder posts whole once it is small enough. Chunks always sum to
/// `total`.
fn split_installments<R: Rng + ?Sized>(
    total: Decimal,
    split: &Installments,
    rng: &mut R,
) -> Vec<Decimal> {
    let mut chunks = Vec::new();
    let mut remaining = total;
    while remaining > Decimal::ZERO {
        let chunk = if remaining <= split.settle_below || remaining <= split.min_chunk {
            remaining
        } else {
            sample_between(rng, split.min_chunk, split.max_chunk.min(remaining))
        };
        // A chunk below one cent would never shrink the remainder.
        let chunk = if chunk < CENT { remaining } else { chunk };
        chunks.push(chunk);
        remaining -= chunk;
    }
    chunks
}

/// Walks the sorted drafts and applies the overdraft policy to
/// discretionary debits. A discretionary debit may only spend down to the
/// larger of the configured floor and the headroom later mandatory debits in
/// the period still need. Mandatory entries are never altered.
fn settle(
    config: &AccountConfig,
    period: &PeriodId,
    opening_balance: Decimal,
    drafts: Vec<Draft>,
) -> Result<Vec<Entry>, SimError> {
    if !config.kind.forbids_negative() {
        return Ok(drafts.into_iter().map(|d| d.entry).collect());
    }

    let reserve = mandatory_headroom(&drafts);
    let mut balance = opening_balance;
    let mut entries = Vec::with_capacity(drafts.len());

    for (draft, reserve_after) in drafts.into_iter().zip(reserve) {
        let mut entry = draft.entry;

        if draft.discretionary && entry.amount < Decimal::ZERO {
            let keep = config.balance_floor.max(reserve_after);
            let available = balance - keep;
            let wanted = -entry.amount;
            if wanted > available {
                match config.overdraft {
                    OverdraftPolicy::Clamp if available >= CENT => {
                        warn!(
                            account = %config.label(),
                            period = %period.label(),
                            description = %entry.description,
                            %wanted,
                            %available,
                            "clamping discretionary debit"
                        );
                        entry.amount = -available;
                    }
                    _ => {
                        warn!(
                            account = %config.label(),
                            period = %period.label(),
                            description = %entry.description,
                            %wanted,
                            "skipping discretionary debit"
                        );
                        continue;
                    }
                }
            }
        }

        balance += entry.amount;
        if balance < Decimal::ZERO {
            return Err(SimError::NegativeBalance {
                account: config.label(),
                period: period.label(),
                date: entry.date,
                description: entry.description,
                balance,
            });
        }
        entries.push(entry);
    }

    Ok(entries)
}

/// For each draft, the balance that must remain after it so every later
/// mandatory entry in the period keeps the balance non-negative.
fn mandatory_headroom(drafts: &[Draft]) -> Vec<Decimal> {
    let mut reserve = vec![Decimal::ZERO; drafts.len()];
    let mut needed = Decimal::ZERO;
    for (idx, draft) in drafts.iter().enumerate().rev() {
        reserve[idx] = needed;
        if !draft.discretionary {
            needed = (needed - draft.entry.amount).max(Decimal::ZERO);
        }
    }
    reserve
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{
        DayWindow, FixedItem, IncomeSource, OccasionalChoice, OccasionalItem, Occurrences, PayDay,
        Seasonality, TransferDirection, VariableItem,
    };
    use crate::core::money::AmountRange;
    use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};
    use rust_decimal_macros::dec;

    fn period() -> PeriodId {
        PeriodId::monthly(2024, 3).unwrap()
    }

    fn base_checking() -> AccountConfig {
        let mut config = AccountConfig::new(AccountKind::Checking, "Joint Checking", "****4827");
        config.starting_balance = dec!(3500.00);
        config.fixed.push(FixedItem {
            description: "Mortgage w/Escrow".to_string(),
            category: Category::Housing,
            amount: dec!(2215.27),
            day: 1,
        });
        config.income.push(IncomeSource {
            description: "Direct Deposit - ACME".to_string(),
            amount: dec!(3250.00),
            pay_days: vec![PayDay::Day(15), PayDay::LastDay],
        });
        config
    }

    fn groceries(min: Decimal, max: Decimal, count: u32) -> VariableItem {
        VariableItem {
            description: "POS Purchase".to_string(),
            merchants: vec!["Kroger".to_string(), "Publix".to_string()],
            category: Category::Groceries,
            amount: AmountRange::new(min, max),
            amount_choices: Vec::new(),
            days: DayWindow::WHOLE_MONTH,
            occurrences: Occurrences {
                min: count,
                max: count,
            },
            seasonality: None,
        }
    }

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn count_matching(entries: &[Entry], description: &str) -> usize {
        entries
            .iter()
            .filter(|e| e.description == description)
            .count()
    }

    #[test]
    fn fixed_and_income_items_are_placed_on_their_days() {
        let config = base_checking();
        let entries = generate_period(&config, &period(), dec!(3500.00), &mut rng(1)).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].date, period().day(1));
        assert_eq!(entries[0].amount, dec!(-2215.27));
        assert_eq!(entries[1].date, period().day(15));
        assert_eq!(entries[2].date, period().end());
    }

    #[test]
    fn fixed_day_is_clipped_in_short_months() {
        let mut config = base_checking();
        config.fixed[0].day = 31;
        let feb = PeriodId::monthly(2023, 2).unwrap();
        let entries = generate_period(&config, &feb, dec!(3500.00), &mut rng(1)).unwrap();
        let mortgage = entries
            .iter()
            .find(|e| e.category == Category::Housing)
            .unwrap();
        assert_eq!(mortgage.date, feb.end());
    }

    #[test]
    fn same_day_income_precedes_spending() {
        let mut config = base_checking();
        config.fixed[0].day = 15;
        let entries = generate_period(&config, &period(), dec!(0.00), &mut rng(1)).unwrap();
        assert_eq!(entries[0].category, Category::Income);
        assert_eq!(entries[1].category, Category::Housing);
    }

    #[test]
    fn discretionary_debit_is_clamped_to_available_balance() {
        let mut config = base_checking();
        config.income.clear();
        config.fixed[0].amount = dec!(100.00);
        config.fixed[0].day = 28;
        config.variable.push(groceries(dec!(500), dec!(500), 1));
        for seed in 0..20 {
            let entries = generate_period(&config, &period(), dec!(300.00), &mut rng(seed)).unwrap();
            let grocery = entries
                .iter()
                .find(|e| e.category == Category::Groceries)
                .unwrap();
            // The rent on the 28th stays covered whichever side of it the purchase lands.
            assert_eq!(grocery.amount, dec!(-200.00));
            let spent: Decimal = entries.iter().map(|e| e.amount).sum();
            assert_eq!(dec!(300.00) + spent, Decimal::ZERO);
        }
    }

    #[test]
    fn skip_policy_drops_unaffordable_debits() {
        let mut config = base_checking();
        config.income.clear();
        config.fixed[0].amount = dec!(100.00);
        config.overdraft = OverdraftPolicy::Skip;
        config.variable.push(groceries(dec!(500), dec!(500), 3));
        let entries = generate_period(&config, &period(), dec!(300.00), &mut rng(5)).unwrap();
        assert!(entries.iter().all(|e| e.category != Category::Groceries));
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn floor_is_respected_by_discretionary_spending() {
        let mut config = base_checking();
        config.balance_floor = dec!(1000.00);
        config.variable.push(groceries(dec!(50), dec!(400), 30));
        for seed in 0..50 {
            let entries = generate_period(&config, &period(), dec!(3500.00), &mut rng(seed)).unwrap();
            let mut balance = dec!(3500.00);
            for entry in &entries {
                balance += entry.amount;
                if entry.category == Category::Groceries {
                    assert!(balance >= dec!(1000.00), "seed {seed}: {balance}");
                }
            }
        }
    }

    #[test]
    fn mandatory_debit_beyond_funds_fails_with_negative_balance() {
        let config = base_checking();
        let err = generate_period(&config, &period(), dec!(1000.00), &mut rng(1)).unwrap_err();
        match err {
            SimError::NegativeBalance {
                description,
                balance,
                ..
            } => {
                assert_eq!(description, "Mortgage w/Escrow");
                assert_eq!(balance, dec!(-1215.27));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn spending_never_starves_a_later_mandatory_debit() {
        let mut config = base_checking();
        config.fixed[0].day = 14;
        config.variable.push(groceries(dec!(100), dec!(900), 10));
        for seed in 0..100 {
            let result = generate_period(&config, &period(), dec!(2500.00), &mut rng(seed));
            assert!(result.is_ok(), "seed {seed}: {result:?}");
        }
    }

    #[test]
    fn installments_sum_to_the_drawn_total() {
        let split = Installments {
            min_chunk: dec!(15),
            max_chunk: dec!(75),
            settle_below: dec!(25),
        };
        for seed in 0..50 {
            let chunks = split_installments(dec!(700.00), &split, &mut rng(seed));
            assert_eq!(chunks.iter().copied().sum::<Decimal>(), dec!(700.00));
            assert!(chunks.iter().all(|c| *c > Decimal::ZERO && *c <= dec!(75)));
        }
    }

    #[test]
    fn sub_cent_chunks_settle_the_whole_remainder() {
        let split = Installments {
            min_chunk: dec!(0.001),
            max_chunk: dec!(0.004),
            settle_below: Decimal::ZERO,
        };
        let chunks = split_installments(dec!(700.00), &split, &mut rng(1));
        assert_eq!(chunks, vec![dec!(700.00)]);
    }

    #[test]
    fn occasional_item_with_zero_probability_never_fires() {
        let mut config = base_checking();
        config.occasional.push(OccasionalItem {
            probability: 0.0,
            category: Category::Withdrawal,
            choices: vec![OccasionalChoice {
                description: "Vacation".to_string(),
                amount: AmountRange::new(dec!(400), dec!(1000)),
            }],
            days: DayWindow::new(5, 24),
            installments: None,
        });
        for seed in 0..20 {
            let entries = generate_period(&config, &period(), dec!(3500.00), &mut rng(seed)).unwrap();
            assert_eq!(count_matching(&entries, "Vacation"), 0);
        }
    }

    #[test]
    fn seasonal_items_skew_high_in_peak_months() {
        let mut config = base_checking();
        config.variable.push(VariableItem {
            description: "Nashville Electric Service".to_string(),
            merchants: Vec::new(),
            category: Category::Utilities,
            amount: AmountRange::new(dec!(140), dec!(210)),
            amount_choices: Vec::new(),
            days: DayWindow::new(15, 20),
            occurrences: Occurrences::ONCE,
            seasonality: Some(Seasonality {
                peak_months: vec![7],
                peak_floor: dec!(0.6),
            }),
        });
        let july = PeriodId::monthly(2024, 7).unwrap();
        for seed in 0..40 {
            let entries = generate_period(&config, &july, dec!(3500.00), &mut rng(seed)).unwrap();
            let bill = entries
                .iter()
                .find(|e| e.category == Category::Utilities)
                .unwrap();
            assert!(-bill.amount >= dec!(182.00), "{}", bill.amount);
        }
    }

    #[test]
    fn linked_transfer_dates_agree_on_both_sides() {
        let outgoing = LinkedTransfer {
            link: "savings-sweep".to_string(),
            description: "Transfer to Savings".to_string(),
            amount: dec!(500),
            direction: TransferDirection::Outgoing,
            days: DayWindow::new(16, 20),
        };
        let incoming = LinkedTransfer {
            description: "Transfer from Checking".to_string(),
            direction: TransferDirection::Incoming,
            ..outgoing.clone()
        };
        for month in 1..=12 {
            let p = PeriodId::monthly(2024, month).unwrap();
            let date = transfer_date(&outgoing, &p);
            assert_eq!(date, transfer_date(&incoming, &p));
            assert!(p.contains(date));
        }
    }

    #[test]
    fn annual_period_is_rejected_for_checking() {
        let config = base_checking();
        let year = PeriodId::annual(2024).unwrap();
        assert!(matches!(
            generate_period(&config, &year, dec!(3500), &mut rng(1)),
            Err(SimError::Configuration { .. })
        ));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_same_seed_reproduces_entries(seed in any::<u64>(), month in 1u32..13) {
            let mut config = base_checking();
            config.variable.push(groceries(dec!(20), dec!(220), 6));
            let p = PeriodId::monthly(2024, month).unwrap();
            let a = generate_period(&config, &p, dec!(3500), &mut rng(seed)).unwrap();
            let b = generate_period(&config, &p, dec!(3500), &mut rng(seed)).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_entries_are_sorted_and_inside_period(seed in any::<u64>(), month in 1u32..13) {
            let mut config = base_checking();
            config.variable.push(groceries(dec!(20), dec!(220), 8));
            let p = PeriodId::monthly(2023, month).unwrap();
            let entries = generate_period(&config, &p, dec!(3500), &mut rng(seed)).unwrap();
            prop_assert!(entries.windows(2).all(|w| w[0].date <= w[1].date));
            prop_assert!(entries.iter().all(|e| p.contains(e.date)));
        }
    }
}
