//! Shipping-rate calculation and selection for shipment booking.
//!
//! [`app::RateSession`] ties the pieces together for one booking form:
//! quotes come from a [`infra::QuoteSource`], are normalized and ranked in
//! [`domain::normalize`], and the user's pick is tracked by
//! [`domain::SelectionController`] until [`domain::SubmissionValidator`]
//! clears the form for submission.

pub mod app;
pub mod domain;
pub mod infra;
pub mod util;

pub use app::{CalculationOutcome, PendingCalculation, RateSession};
pub use util::persistence::{load_config, RatingConfig};
