mod config;
mod engine;
mod error;
mod generator;
mod money;
pub mod presets;
mod reconciler;
mod retirement;
mod tax;
mod types;
mod utility;

pub use config::{
    AccountConfig, AccountKind, Compounding, DayWindow, FixedItem, IncomeSource, Installments,
    InterestBasis, InterestConfig, LinkedTransfer, OccasionalChoice, OccasionalItem, Occurrences,
    OverdraftPolicy, PayDay, Seasonality, TransferDirection, VariableItem,
};
pub use engine::{
    AccountYear, HouseholdConfig, HouseholdReport, Statement, simulate_account_year,
    simulate_household, simulate_household_years, verify_transfers,
};
pub use error::SimError;
pub use generator::{generate_period, transfer_date};
pub use money::{AmountRange, CENT, MAX_AMOUNT, round_cents};
pub use reconciler::{Reconciled, reconcile, verify_continuity};
pub use retirement::{
    ContributionFrequency, FundAllocation, Holding, QuarterActivity, RetirementPlan,
    RetirementSummary,
};
pub use tax::{BracketSlice, TaxBracket, TaxConfig, TaxReturn, WageStatement, compute_return};
pub use types::{
    Category, Entry, Period, PeriodId, PeriodSummary, Transaction, YearToDate,
};
pub use utility::{
    Billing, LineItem, MAX_USAGE, MeteredRate, Surcharge, UsageBand, UsageRange, UtilityBill,
    UtilityService,
};
