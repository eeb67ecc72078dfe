use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::snapshot::ParameterSnapshot;

/// Carrier id reserved for the user-priced courier quote.
pub const MANUAL_CARRIER_ID: &str = "manual-courier";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChargeWeight {
    pub value: f64,
    pub unit: String,
}

/// One carrier's priced offer for the current shipment.
///
/// Quotes are produced by the rating call and never edited afterwards; a
/// recalculation replaces the whole set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub carrier_id: String,
    pub carrier_slug: String,
    pub service_type: String,
    pub service_name: String,
    pub transit_time_days: Option<u32>,
    pub total_charge: Option<Money>,
    pub charge_weight: Option<ChargeWeight>,
    pub pickup_deadline: Option<OffsetDateTime>,
    pub booking_cutoff: Option<OffsetDateTime>,
    pub delivery_date: Option<OffsetDateTime>,
    /// Set when the carrier declined to quote.
    pub error_message: Option<String>,
    pub info_message: Option<String>,
}

impl Quote {
    /// Returns true if the carrier attached a non-blank error to this quote.
    pub fn has_error(&self) -> bool {
        self.error_message
            .as_deref()
            .map(|message| !message.trim().is_empty())
            .unwrap_or(false)
    }

    /// Returns true if the quote carries a usable, strictly positive price.
    pub fn is_priced(&self) -> bool {
        self.total_charge
            .as_ref()
            .map(|charge| charge.amount.is_finite() && charge.amount > 0.0)
            .unwrap_or(false)
    }

    pub fn is_manual(&self) -> bool {
        self.carrier_id == MANUAL_CARRIER_ID
    }
}

/// How the shipment is moved, which decides what rate rules apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceMode {
    #[default]
    Normal,
    Urgent,
    /// Courier priced by hand, outside the rating service.
    ManualCourier,
    /// Free pickup arrangement; no rate is attached to the booking.
    NoRateRequired,
}

impl ServiceMode {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceMode::Normal => "Normal",
            ServiceMode::Urgent => "Urgent",
            ServiceMode::ManualCourier => "Manual courier",
            ServiceMode::NoRateRequired => "No rate required",
        }
    }

    /// Whether quotes for this mode come from the rating service.
    pub fn uses_rating_service(&self) -> bool {
        match self {
            ServiceMode::Normal | ServiceMode::Urgent => true,
            ServiceMode::ManualCourier | ServiceMode::NoRateRequired => false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentScope {
    #[default]
    Domestic,
    Export,
    Import,
    International,
}

impl ShipmentScope {
    pub fn label(&self) -> &'static str {
        match self {
            ShipmentScope::Domestic => "domestic",
            ShipmentScope::Export => "export",
            ShipmentScope::Import => "import",
            ShipmentScope::International => "international",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub company_name: String,
    pub contact_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 code.
    pub country: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParcelItem {
    pub description: String,
    pub weight_kg: f64,
    pub quantity: u32,
    #[serde(default)]
    pub declared_value: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub weight_kg: f64,
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
    #[serde(default)]
    pub items: Vec<ParcelItem>,
}

impl Parcel {
    /// Sum of item weight × quantity.
    pub fn items_weight_kg(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.weight_kg * item.quantity as f64)
            .sum()
    }
}

/// A rate carried over from an earlier booking that is being edited.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommittedRate {
    pub quote: Quote,
    /// Shipment parameters the committed quote was priced with.
    pub snapshot: ParameterSnapshot,
}

/// Raw values supplied by the booking form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentForm {
    pub scope: ShipmentScope,
    pub origin: Address,
    pub destination: Address,
    pub parcels: Vec<Parcel>,
    #[serde(default)]
    pub pickup_date: Option<Date>,
    #[serde(default)]
    pub delivery_date: Option<Date>,
    /// Currency the goods are traded in.
    #[serde(default)]
    pub trade_currency: String,
    #[serde(default)]
    pub committed_rate: Option<CommittedRate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Failure of the rating call as a whole, as opposed to a single carrier
/// declining to quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationError {
    pub message: String,
    #[serde(default)]
    pub details: Vec<FieldError>,
}

impl CalculationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Vec::new(),
        }
    }
}
