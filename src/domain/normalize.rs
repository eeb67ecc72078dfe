use std::{cmp::Ordering, collections::HashSet};

use super::entities::{Quote, ServiceMode};
use super::exchange_rates::ExchangeRateTable;
use super::identity::rate_identity;

/// How much of the deduplicated set is offered to the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AvailabilityMode {
    #[default]
    All,
    /// Collapse to the single cheapest quote in base currency.
    CheapestOnly,
}

impl ServiceMode {
    pub fn availability_mode(&self) -> AvailabilityMode {
        match self {
            ServiceMode::Urgent => AvailabilityMode::CheapestOnly,
            ServiceMode::Normal | ServiceMode::ManualCourier | ServiceMode::NoRateRequired => {
                AvailabilityMode::All
            }
        }
    }
}

/// Quotes the user can book: errored and unpriced entries removed, duplicates
/// collapsed to their first occurrence in input order.
///
/// Feeding the output back in yields the same output.
pub fn filter_available(
    quotes: &[Quote],
    mode: AvailabilityMode,
    rates: &ExchangeRateTable,
) -> Vec<Quote> {
    let mut seen = HashSet::new();
    let available: Vec<Quote> = quotes
        .iter()
        .filter(|quote| !quote.has_error() && quote.is_priced())
        .filter(|quote| seen.insert(rate_identity(quote)))
        .cloned()
        .collect();

    match mode {
        AvailabilityMode::All => available,
        AvailabilityMode::CheapestOnly => cheapest(available, rates).into_iter().collect(),
    }
}

/// Quotes a carrier declined, kept for explaining missing prices.
pub fn filter_errors(quotes: &[Quote]) -> Vec<Quote> {
    quotes
        .iter()
        .filter(|quote| quote.has_error())
        .cloned()
        .collect()
}

/// Total charge converted to the base currency, if the currency is known.
pub fn base_amount(quote: &Quote, rates: &ExchangeRateTable) -> Option<f64> {
    quote
        .total_charge
        .as_ref()
        .and_then(|charge| rates.convert(charge.amount, &charge.currency))
}

// First minimal entry wins; unconvertible quotes lose to any convertible one.
fn cheapest(quotes: Vec<Quote>, rates: &ExchangeRateTable) -> Option<Quote> {
    let mut best: Option<(f64, Quote)> = None;
    for quote in quotes {
        let amount = base_amount(&quote, rates).unwrap_or(f64::INFINITY);
        let replace = match &best {
            Some((current, _)) => amount < *current,
            None => true,
        };
        if replace {
            best = Some((amount, quote));
        }
    }
    best.map(|(_, quote)| quote)
}

/// Sorting options for the rates table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RateSort {
    #[default]
    PriceAscending,
    PriceDescending,
    TransitAscending,
    TransitDescending,
}

impl RateSort {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PriceAscending => "Price: low to high",
            Self::PriceDescending => "Price: high to low",
            Self::TransitAscending => "Fastest first",
            Self::TransitDescending => "Slowest first",
        }
    }
}

/// Filter options for the rates table.
#[derive(Clone, Debug, Default)]
pub struct RateFilter {
    pub carrier_slug: Option<String>,
}

impl RateFilter {
    pub fn matches(&self, quote: &Quote) -> bool {
        if let Some(ref slug) = self.carrier_slug {
            if !quote.carrier_slug.eq_ignore_ascii_case(slug) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, quotes: &[Quote]) -> Vec<Quote> {
        quotes
            .iter()
            .filter(|quote| self.matches(quote))
            .cloned()
            .collect()
    }
}

/// Stable sort: equal keys keep their relative order. Quotes without a
/// comparable key go last in either direction.
pub fn sort_quotes(quotes: &mut [Quote], sort: RateSort, rates: &ExchangeRateTable) {
    quotes.sort_by(|a, b| match sort {
        RateSort::PriceAscending => {
            compare_present_first(base_amount(a, rates), base_amount(b, rates), false)
        }
        RateSort::PriceDescending => {
            compare_present_first(base_amount(a, rates), base_amount(b, rates), true)
        }
        RateSort::TransitAscending => compare_present_first(
            a.transit_time_days.map(f64::from),
            b.transit_time_days.map(f64::from),
            false,
        ),
        RateSort::TransitDescending => compare_present_first(
            a.transit_time_days.map(f64::from),
            b.transit_time_days.map(f64::from),
            true,
        ),
    });
}

fn compare_present_first(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
