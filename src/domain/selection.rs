//! Quote set, selection and the snapshot they were priced against.
//!
//! The controller owns the only copy of the working quote set. All field-level
//! "shipment changed" notifications funnel into [`SelectionController::on_parameter_change`].

use thiserror::Error;
use uuid::Uuid;

use super::entities::{CalculationError, Quote};
use super::identity::{rate_identity, RateId};
use super::snapshot::ParameterSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateState {
    /// No quote set.
    Empty,
    /// A rating request is in flight.
    Calculating,
    /// Quotes present, nothing selected.
    Available,
    /// Quotes present and one of them selected.
    Selected,
    /// Shipment changed after quoting. Gates like `Empty`.
    Stale,
}

impl RateState {
    pub fn label(&self) -> &'static str {
        match self {
            RateState::Empty => "No rates",
            RateState::Calculating => "Calculating",
            RateState::Available => "Select a rate",
            RateState::Selected => "Rate selected",
            RateState::Stale => "Shipment changed, recalculate",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("a rate calculation is already in flight")]
    CalculationInFlight,
    #[error("calculation result belongs to a superseded request")]
    SupersededCalculation,
    #[error("no quotes to select from")]
    NoQuotes,
    #[error("unknown rate id: {0}")]
    UnknownRate(RateId),
    #[error("manual rates are only available in manual courier mode")]
    ManualRateUnavailable,
}

/// Handle for one outstanding rating request.
#[derive(Clone, Debug, PartialEq)]
pub struct CalculationTicket {
    id: Uuid,
    snapshot: ParameterSnapshot,
}

impl CalculationTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Shipment parameters the request was priced with.
    pub fn snapshot(&self) -> &ParameterSnapshot {
        &self.snapshot
    }
}

#[derive(Clone, Debug, Default)]
pub struct SelectionController {
    quotes: Option<Vec<Quote>>,
    selected: Option<RateId>,
    snapshot: Option<ParameterSnapshot>,
    in_flight: Option<CalculationTicket>,
    stale: bool,
    calculation_error: Option<CalculationError>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RateState {
        if self.in_flight.is_some() {
            return RateState::Calculating;
        }
        if self.stale {
            return RateState::Stale;
        }
        match (&self.quotes, &self.selected) {
            (None, _) => RateState::Empty,
            (Some(_), None) => RateState::Available,
            (Some(_), Some(_)) => RateState::Selected,
        }
    }

    pub fn quotes(&self) -> &[Quote] {
        self.quotes.as_deref().unwrap_or(&[])
    }

    pub fn selected_id(&self) -> Option<&RateId> {
        self.selected.as_ref()
    }

    pub fn selected_quote(&self) -> Option<&Quote> {
        let selected = self.selected.as_ref()?;
        self.quotes()
            .iter()
            .find(|quote| rate_identity(quote) == *selected)
    }

    pub fn snapshot(&self) -> Option<&ParameterSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_calculating(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn calculation_error(&self) -> Option<&CalculationError> {
        self.calculation_error.as_ref()
    }

    /// True when quotes from a completed, still-valid calculation are present.
    pub fn has_fresh_quotes(&self) -> bool {
        matches!(self.state(), RateState::Available | RateState::Selected)
    }

    fn contains(&self, id: &RateId) -> bool {
        self.quotes().iter().any(|quote| rate_identity(quote) == *id)
    }

    fn is_current(&self, ticket: &CalculationTicket) -> bool {
        self.in_flight
            .as_ref()
            .map(|current| current.id == ticket.id)
            .unwrap_or(false)
    }

    /// Starts a calculation priced with `request`. Returns `None` while
    /// another calculation is outstanding; the trigger is dropped, not queued.
    pub fn begin_calculation(&mut self, request: ParameterSnapshot) -> Option<CalculationTicket> {
        if let Some(current) = &self.in_flight {
            log::debug!(
                "[selection] Ignoring calculate request; {} still in flight",
                current.id
            );
            return None;
        }
        let ticket = CalculationTicket {
            id: Uuid::new_v4(),
            snapshot: request,
        };
        log::debug!("[selection] Calculation {} started", ticket.id);
        self.calculation_error = None;
        self.in_flight = Some(ticket.clone());
        Some(ticket)
    }

    /// Stores the quote set produced for `ticket`. Any prior selection is
    /// dropped; a new calculation always needs a fresh choice.
    pub fn accept_quote_set(
        &mut self,
        ticket: &CalculationTicket,
        quotes: Vec<Quote>,
    ) -> Result<(), SelectionError> {
        if !self.is_current(ticket) {
            log::warn!(
                "[selection] Dropping {} quotes from superseded calculation {}",
                quotes.len(),
                ticket.id
            );
            return Err(SelectionError::SupersededCalculation);
        }
        log::debug!(
            "[selection] Calculation {} accepted with {} quotes",
            ticket.id,
            quotes.len()
        );
        self.in_flight = None;
        self.quotes = Some(quotes);
        self.snapshot = Some(ticket.snapshot.clone());
        self.selected = None;
        self.stale = false;
        self.calculation_error = None;
        Ok(())
    }

    /// Ends the flight for `ticket` without touching the existing quote set.
    pub fn fail_calculation(
        &mut self,
        ticket: &CalculationTicket,
        error: CalculationError,
    ) -> Result<(), SelectionError> {
        if !self.is_current(ticket) {
            log::debug!(
                "[selection] Ignoring failure of superseded calculation {}: {}",
                ticket.id,
                error.message
            );
            return Err(SelectionError::SupersededCalculation);
        }
        log::warn!(
            "[selection] Calculation {} failed: {}",
            ticket.id,
            error.message
        );
        self.in_flight = None;
        self.calculation_error = Some(error);
        Ok(())
    }

    /// Points the selection at a quote in the current set. The manual id is
    /// no exception; its quote has to be upserted first.
    pub fn select(&mut self, id: &RateId) -> Result<(), SelectionError> {
        match self.state() {
            RateState::Available | RateState::Selected => {}
            RateState::Calculating => return Err(SelectionError::CalculationInFlight),
            RateState::Empty | RateState::Stale => return Err(SelectionError::NoQuotes),
        }
        if !self.contains(id) {
            return Err(SelectionError::UnknownRate(id.clone()));
        }
        self.selected = Some(id.clone());
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Inserts `quote`, replacing an entry with the same identity in place.
    pub fn upsert_quote(&mut self, quote: Quote) -> Result<(), SelectionError> {
        if self.in_flight.is_some() {
            return Err(SelectionError::CalculationInFlight);
        }
        let id = rate_identity(&quote);
        let quotes = self.quotes.get_or_insert_with(Vec::new);
        match quotes.iter_mut().find(|existing| rate_identity(existing) == id) {
            Some(existing) => *existing = quote,
            None => quotes.push(quote),
        }
        self.stale = false;
        Ok(())
    }

    /// Removes the quote with `id`, dropping the selection if it pointed there.
    pub fn remove_quote(&mut self, id: &RateId) {
        if let Some(quotes) = self.quotes.as_mut() {
            quotes.retain(|quote| rate_identity(quote) != *id);
            if quotes.is_empty() && self.snapshot.is_none() {
                self.quotes = None;
            }
        }
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
    }

    /// Compares the live shipment parameters against the ones the current
    /// quotes were priced with. On any difference quotes, selection and
    /// snapshot are dropped together. Returns true if anything was invalidated.
    pub fn on_parameter_change(&mut self, live: &ParameterSnapshot) -> bool {
        let mut invalidated = false;

        if let Some(ticket) = &self.in_flight {
            if ticket.snapshot != *live {
                log::debug!(
                    "[selection] Calculation {} superseded by parameter change ({})",
                    ticket.id,
                    ticket.snapshot.changed_parts(live).join(", ")
                );
                self.in_flight = None;
                invalidated = true;
            }
        }

        if let Some(stored) = &self.snapshot {
            if stored != live {
                log::debug!(
                    "[selection] Quotes invalidated; changed: {}",
                    stored.changed_parts(live).join(", ")
                );
                self.quotes = None;
                self.selected = None;
                self.snapshot = None;
                self.stale = true;
                return true;
            }
        }

        if invalidated && self.quotes.is_none() {
            self.stale = true;
        }
        invalidated
    }

    pub fn clear(&mut self) {
        if let Some(ticket) = &self.in_flight {
            log::debug!("[selection] Clearing; calculation {} superseded", ticket.id);
        }
        *self = Self::default();
    }
}
