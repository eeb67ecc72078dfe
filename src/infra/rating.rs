//! Thin asynchronous client for the rating service.
//!
//! - Posts the shipment parameters and returns the carrier quotes.
//! - Fetches the currency → base-currency rate table.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};

use crate::domain::{
    Address, CalculationError, ChargeWeight, FieldError, Money, Parcel, Quote, ServiceMode,
    ShipmentForm, ShipmentScope,
};
use crate::util::persistence::RatingConfig;

const RATES_PATH: &str = "rates";

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error: {message}")]
    Api {
        message: String,
        details: Vec<FieldError>,
    },
}

impl RatingError {
    pub fn api(message: impl Into<String>) -> Self {
        RatingError::Api {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Structured form shown next to the rates table.
    pub fn to_calculation_error(&self) -> CalculationError {
        match self {
            RatingError::Api { message, details } => CalculationError {
                message: message.clone(),
                details: details.clone(),
            },
            other => CalculationError::new(other.to_string()),
        }
    }
}

/// Produces priced quotes for a shipment.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quotes(&self, request: &RateRequest) -> Result<Vec<Quote>, RatingError>;
}

/// Produces a currency → rate-to-base map.
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    async fn fetch_rates(&self) -> Result<HashMap<String, f64>, RatingError>;
}

/// Body of a rating request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RateRequest {
    pub service_mode: ServiceMode,
    pub scope: ShipmentScope,
    pub origin: Address,
    pub destination: Address,
    pub parcels: Vec<Parcel>,
    pub pickup_date: Option<Date>,
    pub currency: String,
}

impl RateRequest {
    pub fn from_form(form: &ShipmentForm, service_mode: ServiceMode) -> Self {
        Self {
            service_mode,
            scope: form.scope,
            origin: form.origin.clone(),
            destination: form.destination.clone(),
            parcels: form.parcels.clone(),
            pickup_date: form.pickup_date,
            currency: form.trade_currency.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<FieldErrorDto>,
}

impl<T> ApiEnvelope<T> {
    fn into_result(self, http_status: StatusCode) -> Result<T, RatingError> {
        let ApiEnvelope {
            status,
            data,
            message,
            errors,
        } = self;

        if http_status.is_success() && status.eq_ignore_ascii_case("ok") {
            return data.ok_or_else(|| RatingError::api("response missing data"));
        }

        Err(RatingError::Api {
            message: message.unwrap_or(status),
            details: errors.into_iter().map(FieldError::from).collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct FieldErrorDto {
    #[serde(default, alias = "path")]
    field: String,
    #[serde(default, alias = "info")]
    message: String,
}

impl From<FieldErrorDto> for FieldError {
    fn from(dto: FieldErrorDto) -> Self {
        Self {
            field: dto.field,
            message: dto.message,
        }
    }
}

#[derive(Clone)]
pub struct RatingClient {
    http: Client,
    base_url: Url,
    exchange_rates_url: Url,
}

impl RatingClient {
    pub fn new(config: &RatingConfig) -> Result<Self, RatingError> {
        let http = Client::builder().user_agent(&config.user_agent).build()?;
        Ok(Self {
            http,
            base_url: Url::parse(&config.rating_base_url)?,
            exchange_rates_url: Url::parse(&config.exchange_rates_url)?,
        })
    }

    async fn fetch_data<T>(&self, builder: reqwest::RequestBuilder) -> Result<T, RatingError>
    where
        T: DeserializeOwned,
    {
        let response = builder.send().await?;
        let status = response.status();
        let envelope: ApiEnvelope<T> = match response.json().await {
            Ok(envelope) => envelope,
            Err(err) if status.is_success() => return Err(err.into()),
            Err(_) => return Err(RatingError::api(format!("rating service returned {status}"))),
        };
        envelope.into_result(status)
    }
}

#[async_trait]
impl QuoteSource for RatingClient {
    async fn fetch_quotes(&self, request: &RateRequest) -> Result<Vec<Quote>, RatingError> {
        let url = self.base_url.join(RATES_PATH)?;
        log::info!(
            "[rates] Requesting {} quotes from {url} ({} parcels)",
            request.service_mode.label(),
            request.parcels.len()
        );

        let raw = self
            .fetch_data::<serde_json::Value>(self.http.post(url).json(request))
            .await?;
        let quotes = parse_quotes(raw);
        log::info!("[rates] Parsed {} quotes", quotes.len());
        Ok(quotes)
    }
}

#[async_trait]
impl ExchangeRateSource for RatingClient {
    async fn fetch_rates(&self) -> Result<HashMap<String, f64>, RatingError> {
        log::debug!("[fx] Fetching exchange rates from {}", self.exchange_rates_url);
        let raw = self
            .fetch_data::<serde_json::Value>(self.http.get(self.exchange_rates_url.clone()))
            .await?;
        let rates = parse_rates(&raw);
        if rates.is_empty() {
            return Err(RatingError::api("exchange-rate response contained no rates"));
        }
        Ok(rates)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteDto {
    #[serde(deserialize_with = "string_from_json")]
    carrier_id: String,
    #[serde(default)]
    carrier_slug: Option<String>,
    #[serde(default)]
    service_type: Option<String>,
    #[serde(default)]
    service_name: Option<String>,
    #[serde(default, alias = "transitTimeDays", deserialize_with = "lenient_number")]
    transit_time: Option<f64>,
    #[serde(default)]
    total_charge: Option<ChargeDto>,
    #[serde(default)]
    charge_weight: Option<WeightDto>,
    #[serde(default)]
    pickup_deadline: Option<String>,
    #[serde(default, alias = "bookingCutoff")]
    booking_cut_off: Option<String>,
    #[serde(default)]
    delivery_date: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    info_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeDto {
    #[serde(default, deserialize_with = "lenient_number")]
    amount: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeightDto {
    #[serde(default, deserialize_with = "lenient_number")]
    value: Option<f64>,
    #[serde(default)]
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuotesWrapper {
    quotes: Vec<serde_json::Value>,
}

impl From<QuoteDto> for Quote {
    fn from(dto: QuoteDto) -> Self {
        let carrier_slug = dto
            .carrier_slug
            .unwrap_or_else(|| dto.carrier_id.clone());
        Self {
            carrier_id: dto.carrier_id,
            carrier_slug,
            service_type: dto.service_type.unwrap_or_default(),
            service_name: dto.service_name.unwrap_or_default(),
            transit_time_days: dto
                .transit_time
                .filter(|days| days.is_finite() && *days >= 0.0)
                .map(|days| days.round() as u32),
            total_charge: dto.total_charge.and_then(|charge| {
                charge.amount.map(|amount| Money {
                    amount,
                    currency: charge.currency.unwrap_or_default(),
                })
            }),
            charge_weight: dto.charge_weight.and_then(|weight| {
                weight.value.map(|value| ChargeWeight {
                    value,
                    unit: weight.unit.unwrap_or_else(|| "kg".to_string()),
                })
            }),
            pickup_deadline: parse_timestamp(dto.pickup_deadline.as_deref()),
            booking_cutoff: parse_timestamp(dto.booking_cut_off.as_deref()),
            delivery_date: parse_timestamp(dto.delivery_date.as_deref()),
            error_message: dto.error_message.filter(|m| !m.trim().is_empty()),
            info_message: dto.info_message.filter(|m| !m.trim().is_empty()),
        }
    }
}

/// Accepts a bare array or a `{ "quotes": [...] }` wrapper. Entries that do
/// not parse are skipped.
fn parse_quotes(value: serde_json::Value) -> Vec<Quote> {
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        other => match serde_json::from_value::<QuotesWrapper>(other) {
            Ok(wrapper) => wrapper.quotes,
            Err(err) => {
                log::warn!("[rates] Unrecognised quote payload: {err}");
                return Vec::new();
            }
        },
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<QuoteDto>(entry) {
            Ok(dto) => Some(Quote::from(dto)),
            Err(err) => {
                log::warn!("[rates] Skipping malformed quote: {err}");
                None
            }
        })
        .collect()
}

/// Accepts `{ "USD": 35.1, ... }` or `{ "rates": { ... } }`; numeric strings
/// are allowed, anything else is ignored.
fn parse_rates(value: &serde_json::Value) -> HashMap<String, f64> {
    let object = value
        .get("rates")
        .and_then(|rates| rates.as_object())
        .or_else(|| value.as_object());

    object
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(code, rate)| {
                    let rate = match rate {
                        serde_json::Value::Number(number) => number.as_f64(),
                        serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
                        _ => None,
                    }?;
                    Some((code.trim().to_ascii_uppercase(), rate))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_timestamp(raw: Option<&str>) -> Option<OffsetDateTime> {
    raw.and_then(|value| OffsetDateTime::parse(value.trim(), &Rfc3339).ok())
}

fn string_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> serde::de::Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

/// Number, numeric string, or null.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct LenientNumber;

    impl<'de> serde::de::Visitor<'de> for LenientNumber {
        type Value = Option<f64>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a number, numeric string or null")
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value as f64))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value as f64))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.trim().parse::<f64>().ok())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(LenientNumber)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_carrier_payload_with_string_numbers() {
        let payload = json!([
            {
                "carrierId": 17,
                "carrierSlug": "dhl",
                "serviceType": "express",
                "serviceName": "DHL Express Worldwide",
                "transitTime": "2",
                "totalCharge": { "amount": "1450.50", "currency": "THB" },
                "chargeWeight": { "value": 2.5, "unit": "kg" },
                "pickupDeadline": "2026-10-20T17:00:00+07:00",
                "deliveryDate": "not a date"
            },
            {
                "carrierId": "fedex",
                "serviceType": "economy",
                "totalCharge": null,
                "errorMessage": "Destination postal code not served"
            }
        ]);

        let quotes = parse_quotes(payload);
        assert_eq!(quotes.len(), 2);

        let dhl = &quotes[0];
        assert_eq!(dhl.carrier_id, "17");
        assert_eq!(dhl.transit_time_days, Some(2));
        assert_eq!(dhl.total_charge, Some(Money::new(1450.5, "THB")));
        assert!(dhl.pickup_deadline.is_some());
        assert!(dhl.delivery_date.is_none());
        assert!(!dhl.has_error());

        let fedex = &quotes[1];
        assert_eq!(fedex.carrier_slug, "fedex");
        assert!(fedex.total_charge.is_none());
        assert!(fedex.has_error());
    }

    #[test]
    fn accepts_wrapped_payload_and_skips_malformed_entries() {
        let payload = json!({
            "quotes": [
                { "carrierId": "ups", "serviceType": "saver", "totalCharge": { "amount": 900, "currency": "THB" } },
                { "serviceType": "missing carrier" }
            ]
        });

        let quotes = parse_quotes(payload);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].id().as_str(), "ups-saver-null-900-THB");
    }

    #[test]
    fn envelope_failure_carries_field_details() {
        let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_value(json!({
            "status": "error",
            "data": null,
            "message": "Invalid shipment",
            "errors": [{ "path": "destination.postal_code", "info": "required" }]
        }))
        .unwrap();

        let err = envelope
            .into_result(StatusCode::UNPROCESSABLE_ENTITY)
            .unwrap_err();
        let calculation = err.to_calculation_error();
        assert_eq!(calculation.message, "Invalid shipment");
        assert_eq!(
            calculation.details,
            vec![FieldError {
                field: "destination.postal_code".to_string(),
                message: "required".to_string(),
            }]
        );
    }

    #[test]
    fn envelope_without_data_is_an_error() {
        let envelope: ApiEnvelope<serde_json::Value> =
            serde_json::from_value(json!({ "status": "ok" })).unwrap();
        assert!(matches!(
            envelope.into_result(StatusCode::OK),
            Err(RatingError::Api { .. })
        ));
    }

    #[test]
    fn parses_flat_and_nested_rate_maps() {
        let flat = parse_rates(&json!({ "usd": 35.2, "EUR": "38.1", "bad": true }));
        assert_eq!(flat.get("USD"), Some(&35.2));
        assert_eq!(flat.get("EUR"), Some(&38.1));
        assert_eq!(flat.len(), 2);

        let nested = parse_rates(&json!({ "base": "THB", "rates": { "JPY": 0.24 } }));
        assert_eq!(nested.len(), 1);
        assert_eq!(nested.get("JPY"), Some(&0.24));
    }

    #[test]
    fn request_mirrors_form() {
        let form = ShipmentForm {
            trade_currency: "USD".to_string(),
            ..Default::default()
        };
        let request = RateRequest::from_form(&form, ServiceMode::Urgent);
        assert_eq!(request.service_mode, ServiceMode::Urgent);
        assert_eq!(request.currency, "USD");
        assert_eq!(request.scope, ShipmentScope::Domestic);
    }
}
