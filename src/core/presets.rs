//! The default household: a joint checking account, a high-yield savings
//! account fed from checking, two workplace retirement plans, four utility
//! services and a joint federal return.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::config::{
    AccountConfig, AccountKind, DayWindow, FixedItem, IncomeSource, Installments, InterestBasis,
    InterestConfig, LinkedTransfer, OccasionalChoice, OccasionalItem, Occurrences, PayDay,
    Seasonality, TransferDirection, VariableItem,
};
use super::engine::HouseholdConfig;
use super::money::AmountRange;
use super::retirement::{ContributionFrequency, FundAllocation, RetirementPlan};
use super::tax::{TaxBracket, TaxConfig, WageStatement};
use super::types::Category;
use super::utility::{Billing, MeteredRate, Surcharge, UsageBand, UsageRange, UtilityService};

pub const SAVINGS_SWEEP: &str = "savings-sweep";

pub fn doe_household() -> HouseholdConfig {
    HouseholdConfig {
        holder: "Bob Doe & Jane Doe".to_string(),
        bank_name: "First National Bank of Nashville".to_string(),
        checking: joint_checking(),
        savings: Some(high_yield_savings()),
        retirement: vec![acme_401k(), metro_403b()],
        utilities: vec![
            utility_account(electric()),
            utility_account(gas()),
            utility_account(water()),
            utility_account(internet()),
        ],
        tax: Some(joint_return()),
        tax_interest_from_savings: true,
    }
}

fn fixed(description: &str, category: Category, amount: Decimal, day: u32) -> FixedItem {
    FixedItem {
        description: description.to_string(),
        category,
        amount,
        day,
    }
}

fn purchases(
    category: Category,
    merchants: &[&str],
    min: Decimal,
    max: Decimal,
    occurrences: (u32, u32),
) -> VariableItem {
    VariableItem {
        description: "POS Purchase".to_string(),
        merchants: merchants.iter().map(|m| m.to_string()).collect(),
        category,
        amount: AmountRange::new(min, max),
        amount_choices: Vec::new(),
        days: DayWindow::WHOLE_MONTH,
        occurrences: Occurrences {
            min: occurrences.0,
            max: occurrences.1,
        },
        seasonality: None,
    }
}

fn monthly_bill(
    description: &str,
    min: Decimal,
    max: Decimal,
    days: DayWindow,
    peak_months: &[u32],
) -> VariableItem {
    VariableItem {
        description: description.to_string(),
        merchants: Vec::new(),
        category: Category::Utilities,
        amount: AmountRange::new(min, max),
        amount_choices: Vec::new(),
        days,
        occurrences: Occurrences::ONCE,
        seasonality: (!peak_months.is_empty()).then(|| Seasonality {
            peak_months: peak_months.to_vec(),
            peak_floor: dec!(0.5),
        }),
    }
}

/// Starting balance and floor keep the first half of every month covered:
/// the fixed debits due before the 15th payday total 3,656.23.
pub fn joint_checking() -> AccountConfig {
    let mut config = AccountConfig::new(AccountKind::Checking, "Joint Checking", "****4827");
    config.starting_balance = dec!(4250.00);
    config.balance_floor = dec!(3700.00);

    config.income = vec![
        IncomeSource {
            description: "Direct Deposit - ACME TECHNOLOGY CORP".to_string(),
            amount: dec!(2853.43),
            pay_days: vec![PayDay::Day(15), PayDay::LastDay],
        },
        IncomeSource {
            description: "Direct Deposit - METRO NASHVILLE SCHOOLS".to_string(),
            amount: dec!(1982.39),
            pay_days: vec![PayDay::Day(15), PayDay::LastDay],
        },
    ];

    config.fixed = vec![
        fixed("Mortgage w/Escrow - First TN Bank", Category::Housing, dec!(2215.27), 1),
        fixed("Auto Insurance - State Farm", Category::Insurance, dec!(233.00), 5),
        fixed("Life Insurance - Northwestern", Category::Insurance, dec!(85.00), 10),
        fixed("Internet - Comcast", Category::Telecom, dec!(75.00), 8),
        fixed("Cell Phone - Verizon", Category::Telecom, dec!(140.00), 12),
        fixed("Health Insurance Premium", Category::Insurance, dec!(350.00), 1),
        fixed("Ford Motor Credit - Auto Loan", Category::Loan, dec!(504.00), 15),
        fixed("Harley Davidson Financial", Category::Loan, dec!(385.00), 10),
        fixed("Progressive MC Insurance", Category::Insurance, dec!(75.00), 10),
        fixed("Streaming - Netflix", Category::Subscriptions, dec!(15.99), 7),
        fixed("Streaming - Hulu", Category::Subscriptions, dec!(17.99), 7),
        fixed("Streaming - Disney+", Category::Subscriptions, dec!(13.99), 12),
        fixed("Gym - Planet Fitness", Category::Fitness, dec!(49.99), 3),
    ];

    config.variable = vec![
        monthly_bill(
            "Nashville Electric Service",
            dec!(140),
            dec!(210),
            DayWindow::new(15, 20),
            &[6, 7, 8, 12, 1, 2],
        ),
        monthly_bill(
            "Piedmont Natural Gas",
            dec!(45),
            dec!(85),
            DayWindow::new(18, 22),
            &[11, 12, 1, 2, 3],
        ),
        monthly_bill("Metro Water Services", dec!(50), dec!(65), DayWindow::new(10, 15), &[]),
        purchases(
            Category::Groceries,
            &["Kroger", "Publix", "Whole Foods", "Trader Joe's", "Costco", "Walmart Grocery"],
            dec!(85),
            dec!(220),
            (4, 6),
        ),
        purchases(
            Category::Fuel,
            &["Shell Oil", "Exxon", "BP", "Mapco", "Speedway"],
            dec!(35),
            dec!(75),
            (6, 10),
        ),
        purchases(
            Category::Dining,
            &[
                "Chick-fil-A",
                "Panera Bread",
                "Chipotle",
                "Olive Garden",
                "Cracker Barrel",
                "Starbucks",
                "McDonald's",
                "Wendy's",
                "Local Bistro",
                "DoorDash",
                "Uber Eats",
            ],
            dec!(12),
            dec!(85),
            (8, 12),
        ),
        purchases(
            Category::Shopping,
            &["Amazon.com", "Target", "Walmart", "Home Depot", "Lowe's", "TJ Maxx", "Kohl's", "Best Buy"],
            dec!(25),
            dec!(150),
            (3, 6),
        ),
        purchases(
            Category::Personal,
            &["CVS Pharmacy", "Walgreens", "Great Clips", "PetSmart", "Dollar General"],
            dec!(15),
            dec!(60),
            (2, 4),
        ),
        VariableItem {
            description: "ATM Withdrawal - First National Bank".to_string(),
            merchants: Vec::new(),
            category: Category::Cash,
            amount: AmountRange::new(dec!(40), dec!(120)),
            amount_choices: vec![dec!(40), dec!(60), dec!(80), dec!(100), dec!(120)],
            days: DayWindow::WHOLE_MONTH,
            occurrences: Occurrences { min: 1, max: 3 },
            seasonality: None,
        },
    ];

    config.occasional = vec![OccasionalItem {
        probability: 1.0,
        category: Category::Gambling,
        choices: vec![OccasionalChoice {
            description: "DraftKings".to_string(),
            amount: AmountRange::exactly(dec!(700.00)),
        }],
        days: DayWindow::WHOLE_MONTH,
        installments: Some(Installments {
            min_chunk: dec!(15),
            max_chunk: dec!(75),
            settle_below: dec!(25),
        }),
    }];

    config.transfers = vec![LinkedTransfer {
        link: SAVINGS_SWEEP.to_string(),
        description: "Transfer to Savings ****9821".to_string(),
        amount: dec!(500.00),
        direction: TransferDirection::Outgoing,
        days: DayWindow::new(16, 20),
    }];

    config
}

pub fn high_yield_savings() -> AccountConfig {
    let mut config = AccountConfig::new(AccountKind::Savings, "High-Yield Savings", "****9821");
    config.starting_balance = dec!(8500.00);
    config.balance_floor = dec!(500.00);
    config.interest = Some(InterestConfig {
        apy: dec!(0.0425),
        basis: InterestBasis::AverageDaily,
        compounding: Default::default(),
        description: "Interest Payment".to_string(),
    });
    config.transfers = vec![LinkedTransfer {
        link: SAVINGS_SWEEP.to_string(),
        description: "Transfer from Checking ****4827".to_string(),
        amount: dec!(500.00),
        direction: TransferDirection::Incoming,
        days: DayWindow::new(16, 20),
    }];

    let reasons = [
        ("Car Repair", dec!(200), dec!(600)),
        ("Medical", dec!(150), dec!(400)),
        ("Home Repair", dec!(300), dec!(800)),
        ("Holiday Shopping", dec!(200), dec!(500)),
        ("Vacation", dec!(400), dec!(1000)),
    ];
    config.occasional = vec![OccasionalItem {
        probability: 0.30,
        category: Category::Withdrawal,
        choices: reasons
            .into_iter()
            .map(|(reason, min, max)| OccasionalChoice {
                description: format!("Transfer to Checking - {reason}"),
                amount: AmountRange::new(min, max),
            })
            .collect(),
        days: DayWindow::new(5, 24),
        installments: None,
    }];
    config
}

fn allocations(funds: &[(&str, Decimal, Option<Decimal>)]) -> Vec<FundAllocation> {
    funds
        .iter()
        .map(|(fund, weight, unit_price)| FundAllocation {
            fund: fund.to_string(),
            weight: *weight,
            unit_price: *unit_price,
        })
        .collect()
}

pub fn acme_401k() -> AccountConfig {
    let mut config = AccountConfig::new(AccountKind::Retirement, "401(k)", "Z4827-401K-0001");
    config.starting_balance = dec!(142500.00);
    config.retirement = Some(RetirementPlan {
        plan_name: "Acme Technology Corp 401(k) Plan".to_string(),
        administrator: "Fidelity Investments".to_string(),
        participant: "Bob Doe".to_string(),
        annual_salary: dec!(95000),
        employee_rate: dec!(0.06),
        employer_rate: dec!(0.04),
        annual_return: dec!(0.118),
        contribution_frequency: ContributionFrequency::Quarterly,
        fee_rate: dec!(0.0015),
        allocations: allocations(&[
            ("Fidelity Freedom 2045 Fund", dec!(0.60), Some(dec!(15.82))),
            ("Fidelity 500 Index Fund", dec!(0.20), Some(dec!(178.45))),
            ("Fidelity Total Bond Index", dec!(0.10), Some(dec!(10.25))),
            ("Fidelity International Index", dec!(0.07), Some(dec!(12.34))),
            ("Fidelity Money Market", dec!(0.03), Some(dec!(1.00))),
        ]),
    });
    config
}

pub fn metro_403b() -> AccountConfig {
    let mut config = AccountConfig::new(AccountKind::Retirement, "403(b)", "T9821-403B-0001");
    config.starting_balance = dec!(98750.00);
    config.retirement = Some(RetirementPlan {
        plan_name: "Metro Nashville Public Schools 403(b) Plan".to_string(),
        administrator: "TIAA".to_string(),
        participant: "Jane Doe".to_string(),
        annual_salary: dec!(65000),
        employee_rate: dec!(0.08),
        employer_rate: dec!(0.03),
        annual_return: dec!(0.105),
        contribution_frequency: ContributionFrequency::Quarterly,
        fee_rate: dec!(0.0020),
        allocations: allocations(&[
            ("TIAA-CREF Lifecycle 2045 Fund", dec!(0.50), Some(dec!(14.25))),
            ("TIAA-CREF Equity Index Fund", dec!(0.20), Some(dec!(32.18))),
            ("TIAA Traditional Annuity", dec!(0.15), None),
            ("TIAA-CREF Bond Index Fund", dec!(0.10), Some(dec!(9.87))),
            ("TIAA-CREF International Equity", dec!(0.05), Some(dec!(18.45))),
        ]),
    });
    config
}

fn utility_account(service: UtilityService) -> AccountConfig {
    let mut config = AccountConfig::new(
        AccountKind::Utility,
        service.provider.clone(),
        service.account_number.clone(),
    );
    config.utility = Some(service);
    config
}

fn usage(min: u32, max: u32) -> UsageRange {
    UsageRange { min, max }
}

pub fn electric() -> UtilityService {
    UtilityService {
        provider: "Nashville Electric Service".to_string(),
        account_number: "8429-3756-4821".to_string(),
        unit: "kWh".to_string(),
        billing: Billing::Metered(MeteredRate {
            usage_label: "Energy Charge".to_string(),
            base_usage: 950,
            bands: vec![
                UsageBand {
                    months: vec![6, 7, 8],
                    extra: usage(400, 800),
                },
                UsageBand {
                    months: vec![12, 1, 2],
                    extra: usage(200, 400),
                },
            ],
            default_extra: usage(50, 200),
            rate_per_unit: dec!(0.12),
            base_charge: dec!(18.50),
            surcharges: Vec::new(),
            amount_range: Some(AmountRange::new(dec!(140), dec!(210))),
        }),
        bill_days: DayWindow::new(15, 20),
        due_after_days: 21,
        autopay: true,
    }
}

pub fn gas() -> UtilityService {
    UtilityService {
        provider: "Piedmont Natural Gas".to_string(),
        account_number: "6912-4387-9021".to_string(),
        unit: "Therms".to_string(),
        billing: Billing::Metered(MeteredRate {
            usage_label: "Gas Supply".to_string(),
            base_usage: 0,
            bands: vec![
                UsageBand {
                    months: vec![11, 12, 1, 2, 3],
                    extra: usage(45, 65),
                },
                UsageBand {
                    months: vec![6, 7, 8, 9],
                    extra: usage(8, 15),
                },
            ],
            default_extra: usage(20, 35),
            rate_per_unit: dec!(1.15),
            base_charge: dec!(12.00),
            surcharges: Vec::new(),
            amount_range: Some(AmountRange::new(dec!(45), dec!(85))),
        }),
        bill_days: DayWindow::new(18, 22),
        due_after_days: 21,
        autopay: true,
    }
}

pub fn water() -> UtilityService {
    UtilityService {
        provider: "Metro Water Services".to_string(),
        account_number: "4521-8936-7104".to_string(),
        unit: "CCF".to_string(),
        billing: Billing::Metered(MeteredRate {
            usage_label: "Water Usage".to_string(),
            base_usage: 8,
            bands: Vec::new(),
            default_extra: usage(0, 4),
            rate_per_unit: dec!(4.82),
            base_charge: dec!(8.50),
            surcharges: vec![Surcharge {
                label: "Sewer Charges".to_string(),
                rate_per_unit: dec!(5.20),
            }],
            amount_range: Some(AmountRange::new(dec!(50), dec!(65))),
        }),
        bill_days: DayWindow::new(10, 15),
        due_after_days: 21,
        autopay: true,
    }
}

pub fn internet() -> UtilityService {
    UtilityService {
        provider: "Comcast Xfinity".to_string(),
        account_number: "8482-9357-1046-2845".to_string(),
        unit: "month".to_string(),
        billing: Billing::Flat {
            amount: dec!(75.00),
            plan: "Xfinity Performance Pro+ (200 Mbps)".to_string(),
        },
        bill_days: DayWindow::new(8, 8),
        due_after_days: 21,
        autopay: true,
    }
}

pub fn joint_return() -> TaxConfig {
    let brackets = [
        (Some(dec!(22000)), dec!(0.10)),
        (Some(dec!(89450)), dec!(0.12)),
        (Some(dec!(190750)), dec!(0.22)),
        (Some(dec!(364200)), dec!(0.24)),
        (Some(dec!(462500)), dec!(0.32)),
        (Some(dec!(693750)), dec!(0.35)),
        (None, dec!(0.37)),
    ];
    TaxConfig {
        tax_year: 2023,
        filing_status: "Married Filing Jointly".to_string(),
        wages: vec![
            WageStatement {
                employer: "Acme Technology Corp".to_string(),
                employee: "Bob Doe".to_string(),
                wages: dec!(95000.00),
                federal_withheld: dec!(14250.00),
            },
            WageStatement {
                employer: "Metro Nashville Public Schools".to_string(),
                employee: "Jane Doe".to_string(),
                wages: dec!(65000.00),
                federal_withheld: dec!(8450.00),
            },
        ],
        interest_income: dec!(385.00),
        dividend_income: Decimal::ZERO,
        standard_deduction: dec!(27700.00),
        brackets: brackets
            .into_iter()
            .map(|(upper, rate)| TaxBracket { upper, rate })
            .collect(),
    }
}
