use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_CURRENCY: &str = "THB";

/// Rates used when neither the remote source nor a persisted table is
/// available. Each value converts one unit of the currency into THB.
pub fn default_rates() -> HashMap<String, f64> {
    [
        ("THB", 1.0),
        ("USD", 35.0),
        ("EUR", 38.0),
        ("GBP", 44.0),
        ("JPY", 0.24),
        ("CNY", 4.9),
        ("HKD", 4.5),
        ("SGD", 26.0),
        ("MYR", 7.5),
        ("AUD", 23.0),
    ]
    .into_iter()
    .map(|(code, rate)| (code.to_string(), rate))
    .collect()
}

/// Currency → rate-to-base table with the time it was fetched.
///
/// `amount * rates[currency]` is the amount expressed in the base currency.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateTable {
    pub rates: HashMap<String, f64>,
    /// Unix epoch milliseconds; 0 for the built-in table.
    pub fetched_at_ms: i64,
}

impl ExchangeRateTable {
    pub fn new(rates: HashMap<String, f64>, fetched_at_ms: i64) -> Self {
        Self {
            rates: rates
                .into_iter()
                .map(|(code, rate)| (normalize_code(&code), rate))
                .collect(),
            fetched_at_ms,
        }
    }

    /// Forces the base currency to exactly 1.0 so converting a base amount is
    /// the identity.
    pub fn with_base(mut self, base_currency: &str) -> Self {
        self.rates.insert(normalize_code(base_currency), 1.0);
        self
    }

    pub fn rate(&self, currency: &str) -> Option<f64> {
        self.rates
            .get(&normalize_code(currency))
            .copied()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
    }

    /// Converts `amount` of `currency` into the base currency.
    pub fn convert(&self, amount: f64, currency: &str) -> Option<f64> {
        self.rate(currency).map(|rate| amount * rate)
    }

    /// Milliseconds elapsed between the fetch and `now_ms`.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.fetched_at_ms)
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
