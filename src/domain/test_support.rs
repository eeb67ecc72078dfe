use time::macros::date;

use super::entities::{Address, Money, Parcel, ParcelItem, Quote, ShipmentForm, ShipmentScope};

pub(crate) fn quote(
    carrier_id: &str,
    service_type: &str,
    transit_time_days: Option<u32>,
    amount: f64,
    currency: &str,
) -> Quote {
    Quote {
        carrier_id: carrier_id.to_string(),
        carrier_slug: carrier_id.to_string(),
        service_type: service_type.to_string(),
        service_name: format!("{carrier_id} {service_type}"),
        transit_time_days,
        total_charge: Some(Money::new(amount, currency)),
        charge_weight: None,
        pickup_deadline: None,
        booking_cutoff: None,
        delivery_date: None,
        error_message: None,
        info_message: None,
    }
}

pub(crate) fn failed_quote(carrier_id: &str, message: &str) -> Quote {
    let mut q = quote(carrier_id, "standard", None, 0.0, "THB");
    q.total_charge = None;
    q.error_message = Some(message.to_string());
    q
}

pub(crate) fn address(country: &str, postal_code: &str) -> Address {
    Address {
        company_name: "Acme Trading".to_string(),
        contact_name: "Somchai".to_string(),
        phone: "+66 2 000 0000".to_string(),
        street: "99 Sukhumvit Rd".to_string(),
        city: "Bangkok".to_string(),
        state: "Bangkok".to_string(),
        postal_code: postal_code.to_string(),
        country: country.to_string(),
    }
}

pub(crate) fn parcel(weight_kg: f64, item_weight_kg: f64, quantity: u32) -> Parcel {
    Parcel {
        weight_kg,
        length_cm: 30.0,
        width_cm: 20.0,
        height_cm: 10.0,
        items: vec![ParcelItem {
            description: "Sample goods".to_string(),
            weight_kg: item_weight_kg,
            quantity,
            declared_value: None,
        }],
    }
}

/// Export from TH to the US with a single valid parcel.
pub(crate) fn export_form() -> ShipmentForm {
    ShipmentForm {
        scope: ShipmentScope::Export,
        origin: address("TH", "10110"),
        destination: address("US", "94105"),
        parcels: vec![parcel(2.0, 0.5, 2)],
        pickup_date: Some(date!(2026 - 10 - 20)),
        delivery_date: None,
        trade_currency: "USD".to_string(),
        committed_rate: None,
    }
}
