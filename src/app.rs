//! One booking form's rate session.
//!
//! The form drives the session: it reports parameter changes, triggers
//! calculations, picks a quote and asks for validation before submit. A
//! calculation is split in three steps so the network calls borrow nothing
//! from the session:
//!
//! ```no_run
//! # use shipment_rates::{app::RateSession, domain::ShipmentForm};
//! # async fn demo(session: &mut RateSession, form: &ShipmentForm) {
//! if let Some(pending) = session.start_calculation(form) {
//!     let outcome = pending.run().await;
//!     let _ = session.finish_calculation(outcome);
//! }
//! # }
//! ```

use std::sync::Arc;

use crate::{
    domain::{
        filter_available, filter_errors, sort_quotes, AvailabilityMode, CalculationError,
        CalculationTicket, ExchangeRateTable, ManualRateInjector, ManualRateOutcome,
        ParameterSnapshot, Quote, RateFilter, RateId, RateSort, RateState, SelectionController,
        SelectionError, ServiceMode, ShipmentForm, SubmissionValidator, ValidationReport,
    },
    infra::{
        cache::{CacheStatus, ExchangeRateCache, RatesLookup},
        rating::{QuoteSource, RateRequest, RatingError},
    },
    util::{clock::Clock, persistence::RatingConfig},
};

pub struct RateSession {
    quote_source: Arc<dyn QuoteSource>,
    exchange_rates: Arc<ExchangeRateCache>,
    clock: Arc<dyn Clock>,
    controller: SelectionController,
    manual_rate: ManualRateInjector,
    validator: SubmissionValidator,
    service_mode: ServiceMode,
    error_quotes: Vec<Quote>,
    rates: Option<RatesLookup>,
}

impl RateSession {
    pub fn new(
        quote_source: Arc<dyn QuoteSource>,
        exchange_rates: Arc<ExchangeRateCache>,
        clock: Arc<dyn Clock>,
        config: &RatingConfig,
    ) -> Self {
        Self {
            quote_source,
            exchange_rates,
            clock,
            controller: SelectionController::new(),
            manual_rate: ManualRateInjector::new(config.manual_courier_name.clone()),
            validator: SubmissionValidator::new(config.reference_country.clone()),
            service_mode: ServiceMode::default(),
            error_quotes: Vec::new(),
            rates: None,
        }
    }

    pub fn service_mode(&self) -> ServiceMode {
        self.service_mode
    }

    /// Switching modes discards all rate state; quotes from one mode never
    /// carry over into another.
    pub fn set_service_mode(&mut self, mode: ServiceMode) {
        if mode == self.service_mode {
            return;
        }
        log::debug!(
            "[rates] Service mode {} -> {}",
            self.service_mode.label(),
            mode.label()
        );
        self.service_mode = mode;
        self.clear();
    }

    pub fn state(&self) -> RateState {
        self.controller.state()
    }

    pub fn controller(&self) -> &SelectionController {
        &self.controller
    }

    pub fn quotes(&self) -> &[Quote] {
        self.controller.quotes()
    }

    /// Carriers that declined to quote in the last accepted calculation.
    pub fn error_quotes(&self) -> &[Quote] {
        &self.error_quotes
    }

    pub fn selected_id(&self) -> Option<&RateId> {
        self.controller.selected_id()
    }

    pub fn is_calculating(&self) -> bool {
        self.controller.is_calculating()
    }

    pub fn calculation_error(&self) -> Option<&CalculationError> {
        self.controller.calculation_error()
    }

    /// Status of the exchange rates used by the last accepted calculation.
    pub fn exchange_rate_status(&self) -> Option<CacheStatus> {
        self.rates.as_ref().map(|lookup| lookup.status)
    }

    /// Quotes filtered and sorted for display. The working set is untouched.
    pub fn display_quotes(&self, filter: &RateFilter, sort: RateSort) -> Vec<Quote> {
        let empty = ExchangeRateTable::default();
        let table = self
            .rates
            .as_ref()
            .map(|lookup| &lookup.table)
            .unwrap_or(&empty);
        let mut quotes = filter.apply(self.controller.quotes());
        sort_quotes(&mut quotes, sort, table);
        quotes
    }

    /// Starts a calculation unless one is in flight or the mode is not rated
    /// by the service.
    pub fn start_calculation(&mut self, form: &ShipmentForm) -> Option<PendingCalculation> {
        if !self.service_mode.uses_rating_service() {
            log::debug!(
                "[rates] {} mode is not rated by the service",
                self.service_mode.label()
            );
            return None;
        }
        let ticket = self
            .controller
            .begin_calculation(ParameterSnapshot::capture(form))?;
        Some(PendingCalculation {
            ticket,
            request: RateRequest::from_form(form, self.service_mode),
            availability: self.service_mode.availability_mode(),
            quote_source: Arc::clone(&self.quote_source),
            exchange_rates: Arc::clone(&self.exchange_rates),
        })
    }

    /// Applies a finished calculation. Results of superseded requests are
    /// rejected and leave the session untouched.
    pub fn finish_calculation(
        &mut self,
        outcome: CalculationOutcome,
    ) -> Result<(), SelectionError> {
        let CalculationOutcome {
            ticket,
            availability,
            result,
        } = outcome;

        match result {
            Ok((raw, lookup)) => {
                if lookup.is_degraded() {
                    log::warn!("[rates] Ranking with {:?} exchange rates", lookup.status);
                }
                let available = filter_available(&raw, availability, &lookup.table);
                let errors = filter_errors(&raw);
                self.controller.accept_quote_set(&ticket, available)?;
                log::info!(
                    "[rates] {} quotes available, {} carriers declined",
                    self.controller.quotes().len(),
                    errors.len()
                );
                self.error_quotes = errors;
                self.rates = Some(lookup);
                Ok(())
            }
            Err(err) => self
                .controller
                .fail_calculation(&ticket, err.to_calculation_error()),
        }
    }

    /// Runs a whole calculation. Returns `Ok(false)` if none was started.
    pub async fn calculate(&mut self, form: &ShipmentForm) -> Result<bool, SelectionError> {
        let Some(pending) = self.start_calculation(form) else {
            return Ok(false);
        };
        let outcome = pending.run().await;
        self.finish_calculation(outcome)?;
        Ok(true)
    }

    /// Single entry point for every price-relevant field edit.
    pub fn on_parameter_change(&mut self, form: &ShipmentForm) -> bool {
        let invalidated = self
            .controller
            .on_parameter_change(&ParameterSnapshot::capture(form));
        if invalidated {
            self.error_quotes.clear();
        }
        invalidated
    }

    pub fn select(&mut self, id: &RateId) -> Result<(), SelectionError> {
        if id.is_manual() && self.service_mode != ServiceMode::ManualCourier {
            return Err(SelectionError::ManualRateUnavailable);
        }
        self.controller.select(id)
    }

    /// Feeds the manual courier price field.
    pub fn set_manual_amount(
        &mut self,
        amount: Option<f64>,
        currency: &str,
    ) -> Result<ManualRateOutcome, SelectionError> {
        if self.service_mode != ServiceMode::ManualCourier {
            return Err(SelectionError::ManualRateUnavailable);
        }
        self.manual_rate
            .apply(&mut self.controller, amount, currency)
    }

    pub fn validate(&self, form: &ShipmentForm) -> ValidationReport {
        self.validator.validate(
            form,
            &self.controller,
            self.service_mode,
            self.clock.today(),
        )
    }

    pub fn clear(&mut self) {
        self.controller.clear();
        self.manual_rate.reset();
        self.error_quotes.clear();
        self.rates = None;
    }
}

/// A started calculation that has not hit the network yet.
pub struct PendingCalculation {
    ticket: CalculationTicket,
    request: RateRequest,
    availability: AvailabilityMode,
    quote_source: Arc<dyn QuoteSource>,
    exchange_rates: Arc<ExchangeRateCache>,
}

impl PendingCalculation {
    pub fn ticket(&self) -> &CalculationTicket {
        &self.ticket
    }

    pub fn request(&self) -> &RateRequest {
        &self.request
    }

    /// Fetches quotes and, if that succeeded, the exchange rates to rank them.
    pub async fn run(self) -> CalculationOutcome {
        let result = match self.quote_source.fetch_quotes(&self.request).await {
            Ok(quotes) => Ok((quotes, self.exchange_rates.get(false).await)),
            Err(err) => {
                log::warn!("[rates] Rating call failed: {err}");
                Err(err)
            }
        };
        CalculationOutcome {
            ticket: self.ticket,
            availability: self.availability,
            result,
        }
    }
}

pub struct CalculationOutcome {
    ticket: CalculationTicket,
    availability: AvailabilityMode,
    result: Result<(Vec<Quote>, RatesLookup), RatingError>,
}

impl CalculationOutcome {
    pub fn ticket(&self) -> &CalculationTicket {
        &self.ticket
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
