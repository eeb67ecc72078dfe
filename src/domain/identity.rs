//! Stable identity for quotes.
//!
//! The id doubles as the dedup key and the selection key. Collisions are the
//! point: two offers agreeing on carrier, service, transit time and price are
//! the same offer as far as the user is concerned.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entities::{Quote, MANUAL_CARRIER_ID};

const NULL_SENTINEL: &str = "null";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateId(String);

impl RateId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fixed id of the user-priced courier quote, independent of its amount.
    pub fn manual() -> Self {
        Self(MANUAL_CARRIER_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_manual(&self) -> bool {
        self.0 == MANUAL_CARRIER_ID
    }
}

impl fmt::Display for RateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the identity of a quote from carrier, service type, transit time
/// and total charge. Missing values collapse to `null`/`0`.
pub fn rate_identity(quote: &Quote) -> RateId {
    if quote.is_manual() {
        return RateId::manual();
    }

    let transit = quote
        .transit_time_days
        .map(|days| days.to_string())
        .unwrap_or_else(|| NULL_SENTINEL.to_string());

    let (amount, currency) = match quote.total_charge.as_ref() {
        Some(charge) => {
            let currency = charge.currency.trim();
            (
                charge.amount,
                if currency.is_empty() {
                    NULL_SENTINEL
                } else {
                    currency
                },
            )
        }
        None => (0.0, NULL_SENTINEL),
    };

    RateId(format!(
        "{}-{}-{}-{}-{}",
        quote.carrier_id, quote.service_type, transit, amount, currency
    ))
}

impl Quote {
    pub fn id(&self) -> RateId {
        rate_identity(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ChargeWeight, Money};
    use crate::domain::test_support::quote;

    #[test]
    fn composes_identity_fields() {
        let q = quote("dhl", "express", Some(2), 450.0, "THB");
        assert_eq!(rate_identity(&q).as_str(), "dhl-express-2-450-THB");
    }

    #[test]
    fn ignores_fields_outside_identity() {
        let a = quote("dhl", "express", Some(2), 450.5, "THB");
        let mut b = a.clone();
        b.service_name = "DHL Express Worldwide".to_string();
        b.carrier_slug = "dhl-express".to_string();
        b.charge_weight = Some(ChargeWeight {
            value: 3.0,
            unit: "kg".to_string(),
        });
        b.info_message = Some("Fuel surcharge included".to_string());

        assert_eq!(rate_identity(&a), rate_identity(&b));
    }

    #[test]
    fn missing_fields_collide_on_sentinels() {
        let mut a = quote("fedex", "economy", None, 0.0, "");
        a.total_charge = None;
        let mut b = a.clone();
        b.total_charge = Some(Money::new(0.0, " "));

        assert_eq!(rate_identity(&a).as_str(), "fedex-economy-null-0-null");
        assert_eq!(rate_identity(&a), rate_identity(&b));
    }

    #[test]
    fn price_and_transit_distinguish_offers() {
        let base = quote("ups", "saver", Some(3), 900.0, "THB");
        let cheaper = quote("ups", "saver", Some(3), 850.0, "THB");
        let slower = quote("ups", "saver", Some(5), 900.0, "THB");

        assert_ne!(rate_identity(&base), rate_identity(&cheaper));
        assert_ne!(rate_identity(&base), rate_identity(&slower));
    }

    #[test]
    fn manual_quote_keeps_fixed_id_across_amounts() {
        let a = quote(MANUAL_CARRIER_ID, "manual", None, 100.0, "THB");
        let b = quote(MANUAL_CARRIER_ID, "manual", None, 250.0, "USD");

        assert_eq!(rate_identity(&a), RateId::manual());
        assert_eq!(rate_identity(&b), RateId::manual());
    }
}
