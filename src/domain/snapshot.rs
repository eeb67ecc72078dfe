//! Fingerprint of the shipment fields that influence pricing.

use serde::{Deserialize, Serialize};

use super::entities::{Address, Parcel, ShipmentForm};

/// The address fields a carrier prices on. Contact name and phone are left
/// out on purpose.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressFingerprint {
    pub country: String,
    pub postal_code: String,
    pub city: String,
    pub state: String,
    pub street: String,
    pub company_name: String,
}

impl From<&Address> for AddressFingerprint {
    fn from(address: &Address) -> Self {
        Self {
            country: address.country.clone(),
            postal_code: address.postal_code.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            street: address.street.clone(),
            company_name: address.company_name.clone(),
        }
    }
}

/// Ordered tuple of price-relevant shipment parameters.
///
/// Equality is structural and order-sensitive: a reordered parcel list is a
/// different snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub origin: AddressFingerprint,
    pub destination: AddressFingerprint,
    pub parcels: Vec<Parcel>,
}

impl ParameterSnapshot {
    pub fn capture(form: &ShipmentForm) -> Self {
        Self::from_parts(&form.origin, &form.destination, &form.parcels)
    }

    pub fn from_parts(origin: &Address, destination: &Address, parcels: &[Parcel]) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            parcels: parcels.to_vec(),
        }
    }

    /// Names of the top-level components that differ, for logging.
    pub fn changed_parts(&self, other: &Self) -> Vec<&'static str> {
        let mut parts = Vec::new();
        if self.origin != other.origin {
            parts.push("origin");
        }
        if self.destination != other.destination {
            parts.push("destination");
        }
        if self.parcels != other.parcels {
            parts.push("parcels");
        }
        parts
    }
}
