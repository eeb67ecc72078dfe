//! Rate engine domain logic lives here.

pub mod entities;
pub mod exchange_rates;
pub mod identity;
pub mod manual_rate;
pub mod normalize;
pub mod selection;
pub mod snapshot;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use entities::{
    Address, CalculationError, ChargeWeight, CommittedRate, FieldError, Money, Parcel, ParcelItem,
    Quote, ServiceMode, ShipmentForm, ShipmentScope, MANUAL_CARRIER_ID,
};
pub use exchange_rates::{default_rates, ExchangeRateTable, DEFAULT_BASE_CURRENCY};
pub use identity::{rate_identity, RateId};
pub use manual_rate::{ManualRateInjector, ManualRateOutcome};
pub use normalize::{
    base_amount, filter_available, filter_errors, sort_quotes, AvailabilityMode, RateFilter,
    RateSort,
};
pub use selection::{CalculationTicket, RateState, SelectionController, SelectionError};
pub use snapshot::{AddressFingerprint, ParameterSnapshot};
pub use validation::{
    SubmissionValidator, ValidationIssue, ValidationReport, DEFAULT_REFERENCE_COUNTRY,
};
