//! Pre-submit gate for a booking.
//!
//! Every stage runs so the caller can show all problems at once. Validation
//! is local and synchronous; it never fails and never touches the network.

use serde::{Deserialize, Serialize};
use time::Date;

use super::entities::{Address, ServiceMode, ShipmentForm, ShipmentScope};
use super::selection::{RateState, SelectionController};
use super::snapshot::ParameterSnapshot;

/// Absorbs floating-point noise when summing item weights.
const WEIGHT_EPSILON_KG: f64 = 1e-6;

pub const DEFAULT_REFERENCE_COUNTRY: &str = "TH";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub info: String,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            info: info.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors_at<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ValidationIssue> {
        self.errors.iter().filter(move |issue| issue.path == path)
    }
}

#[derive(Clone, Debug)]
pub struct SubmissionValidator {
    reference_country: String,
}

impl Default for SubmissionValidator {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_COUNTRY)
    }
}

impl SubmissionValidator {
    pub fn new(reference_country: impl Into<String>) -> Self {
        Self {
            reference_country: reference_country.into().trim().to_ascii_uppercase(),
        }
    }

    pub fn validate(
        &self,
        form: &ShipmentForm,
        controller: &SelectionController,
        mode: ServiceMode,
        today: Date,
    ) -> ValidationReport {
        let mut errors = Vec::new();
        check_weights(form, &mut errors);
        check_pickup_date(form, today, &mut errors);
        self.check_scope(form, &mut errors);
        check_rate_readiness(form, controller, mode, &mut errors);
        ValidationReport { errors }
    }

    fn is_reference(&self, address: &Address) -> bool {
        address.country.trim().eq_ignore_ascii_case(&self.reference_country)
    }

    fn check_scope(&self, form: &ShipmentForm, errors: &mut Vec<ValidationIssue>) {
        let from_reference = self.is_reference(&form.origin);
        let to_reference = self.is_reference(&form.destination);
        let country = &self.reference_country;

        let expected = match form.scope {
            ShipmentScope::Domestic if !(from_reference && to_reference) => Some(format!(
                "domestic shipments must both originate and arrive in {country}"
            )),
            ShipmentScope::Export if !(from_reference && !to_reference) => Some(format!(
                "export shipments must originate in {country} and arrive outside {country}"
            )),
            ShipmentScope::Import if !(!from_reference && to_reference) => Some(format!(
                "import shipments must originate outside {country} and arrive in {country}"
            )),
            ShipmentScope::International if from_reference || to_reference => Some(format!(
                "international shipments must neither originate nor arrive in {country}"
            )),
            _ => None,
        };

        if let Some(info) = expected {
            errors.push(ValidationIssue::new("scope", info));
        }
    }
}

fn check_weights(form: &ShipmentForm, errors: &mut Vec<ValidationIssue>) {
    if form.parcels.is_empty() {
        errors.push(ValidationIssue::new(
            "parcels",
            "at least one parcel is required",
        ));
        return;
    }

    for (index, parcel) in form.parcels.iter().enumerate() {
        let parcel_path = format!("parcels[{index}]");
        let mut items_valid = true;

        for (item_index, item) in parcel.items.iter().enumerate() {
            let item_path = format!("{parcel_path}.items[{item_index}]");
            if !(item.weight_kg.is_finite() && item.weight_kg > 0.0) {
                errors.push(ValidationIssue::new(
                    format!("{item_path}.weight"),
                    "item weight must be greater than 0",
                ));
                items_valid = false;
            }
            if item.quantity == 0 {
                errors.push(ValidationIssue::new(
                    format!("{item_path}.quantity"),
                    "item quantity must be at least 1",
                ));
                items_valid = false;
            }
        }

        if !(parcel.weight_kg.is_finite() && parcel.weight_kg > 0.0) {
            errors.push(ValidationIssue::new(
                format!("{parcel_path}.weight"),
                "parcel weight must be greater than 0",
            ));
            continue;
        }

        let items_weight = parcel.items_weight_kg();
        if items_valid && items_weight > parcel.weight_kg + WEIGHT_EPSILON_KG {
            errors.push(ValidationIssue::new(
                format!("{parcel_path}.weight"),
                format!(
                    "sum of item weights ({items_weight:.2}kg) exceeds parcel weight ({:.2}kg)",
                    parcel.weight_kg
                ),
            ));
        }
    }
}

fn check_pickup_date(form: &ShipmentForm, today: Date, errors: &mut Vec<ValidationIssue>) {
    if let Some(pickup) = form.pickup_date {
        if pickup < today {
            errors.push(ValidationIssue::new(
                "pickup_date",
                format!("pickup date {pickup} is in the past"),
            ));
        }
    }
}

fn check_rate_readiness(
    form: &ShipmentForm,
    controller: &SelectionController,
    mode: ServiceMode,
    errors: &mut Vec<ValidationIssue>,
) {
    let issue = match mode {
        ServiceMode::NoRateRequired => None,
        ServiceMode::ManualCourier => controller
            .selected_id()
            .is_none()
            .then_some("enter a price for the manual courier"),
        ServiceMode::Normal | ServiceMode::Urgent => match controller.state() {
            RateState::Selected => None,
            RateState::Available => Some("select a shipping rate"),
            RateState::Calculating => Some("shipping rates are still being calculated"),
            RateState::Empty | RateState::Stale => match &form.committed_rate {
                Some(committed) if committed.snapshot == ParameterSnapshot::capture(form) => None,
                Some(_) => Some(
                    "shipment details changed since the rate was committed; recalculate shipping rates",
                ),
                None => Some("calculate shipping rates before submitting"),
            },
        },
    };

    if let Some(info) = issue {
        errors.push(ValidationIssue::new("rate", info));
    }
}
