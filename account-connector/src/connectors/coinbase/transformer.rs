use thiserror::Error;

use crate::types::{BalanceEntry, Balances};

use super::api::CoinbaseBalance;

/// A balance response that cannot be reported to the host.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BalanceError {
    #[error("invalid currency code '{0}'")]
    InvalidCurrency(String),

    #[error("invalid amount '{amount}' for {currency}")]
    InvalidAmount { amount: String, currency: String },
}

/// Transform a Coinbase balance into the host's balance map.
///
/// Single entry: lowercase currency code → `{confirmed: amount}`. The amount
/// string is passed through untouched once it is known to be a decimal.
pub fn balance_to_balances(balance: &CoinbaseBalance) -> Result<Balances, BalanceError> {
    let currency = balance.currency.trim().to_lowercase();
    if currency.is_empty() || !currency.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(BalanceError::InvalidCurrency(balance.currency.clone()));
    }

    let amount = balance.amount.as_decimal_string();
    if !is_decimal(&amount) {
        return Err(BalanceError::InvalidAmount { amount, currency });
    }

    let mut balances = Balances::new();
    balances.insert(currency, BalanceEntry { confirmed: amount });
    Ok(balances)
}

/// `-?digits(.digits)?`
fn is_decimal(value: &str) -> bool {
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    let (int, frac) = match unsigned.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (unsigned, None),
    };

    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    digits(int) && frac.map_or(true, digits)
}
