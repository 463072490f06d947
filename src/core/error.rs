use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Everything that can stop a statement from being produced. Each variant is
/// terminal for the period (or year) being generated and leaves other
/// independently generated documents untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("invalid configuration for {account}: {reason}")]
    Configuration { account: String, reason: String },

    #[error(
        "balance invariant violated for {period}: opening {opening} + net {net} = {expected}, ledger closed at {closing}"
    )]
    BalanceInvariant {
        period: String,
        opening: Decimal,
        net: Decimal,
        expected: Decimal,
        closing: Decimal,
    },

    #[error("{account} goes negative in {period} on {date}: \"{description}\" leaves {balance}")]
    NegativeBalance {
        account: String,
        period: String,
        date: NaiveDate,
        description: String,
        balance: Decimal,
    },

    #[error("linked transfer {link} does not net out in {period}: sent {sent}, received {received}")]
    TransferMismatch {
        link: String,
        period: String,
        sent: Decimal,
        received: Decimal,
    },
}

impl SimError {
    pub(crate) fn config(account: &str, reason: impl Into<String>) -> Self {
        SimError::Configuration {
            account: account.to_string(),
            reason: reason.into(),
        }
    }
}
