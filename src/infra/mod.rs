//! Collaborators outside the process: the rating service and local storage.

pub mod cache;
pub mod rating;

pub use cache::{
    CacheStatus, ExchangeRateCache, FileRateStore, MemoryRateStore, RateStore, RatesLookup,
    StoreError, EXCHANGE_RATE_TTL,
};
pub use rating::{ExchangeRateSource, QuoteSource, RateRequest, RatingClient, RatingError};
