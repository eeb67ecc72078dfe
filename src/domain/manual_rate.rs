use super::entities::{Money, Quote, MANUAL_CARRIER_ID};
use super::identity::RateId;
use super::selection::{SelectionController, SelectionError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManualRateOutcome {
    /// The synthetic quote was written and selected.
    Upserted,
    /// Same amount and currency as the last write; nothing touched.
    Unchanged,
    /// Amount missing or not positive; quote and selection removed.
    Cleared,
}

#[derive(Clone, Debug, PartialEq)]
struct ManualRateKey {
    amount: f64,
    currency: String,
}

/// Maintains the single user-priced courier quote inside the working set.
#[derive(Clone, Debug)]
pub struct ManualRateInjector {
    service_name: String,
    last_written: Option<ManualRateKey>,
}

impl Default for ManualRateInjector {
    fn default() -> Self {
        Self::new("Manual courier")
    }
}

impl ManualRateInjector {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            last_written: None,
        }
    }

    pub fn apply(
        &mut self,
        controller: &mut SelectionController,
        amount: Option<f64>,
        currency: &str,
    ) -> Result<ManualRateOutcome, SelectionError> {
        let Some(amount) = amount.filter(|value| value.is_finite() && *value > 0.0) else {
            self.last_written = None;
            controller.remove_quote(&RateId::manual());
            log::debug!("[manual-rate] Cleared manual courier rate");
            return Ok(ManualRateOutcome::Cleared);
        };

        let key = ManualRateKey {
            amount,
            currency: currency.trim().to_ascii_uppercase(),
        };
        let still_selected = controller.selected_id() == Some(&RateId::manual());
        if still_selected && self.last_written.as_ref() == Some(&key) {
            return Ok(ManualRateOutcome::Unchanged);
        }

        controller.upsert_quote(self.build_quote(&key))?;
        controller.select(&RateId::manual())?;
        log::debug!(
            "[manual-rate] Manual courier rate set to {} {}",
            key.amount,
            key.currency
        );
        self.last_written = Some(key);
        Ok(ManualRateOutcome::Upserted)
    }

    /// Forgets the last written key, e.g. after the service mode changed.
    pub fn reset(&mut self) {
        self.last_written = None;
    }

    fn build_quote(&self, key: &ManualRateKey) -> Quote {
        Quote {
            carrier_id: MANUAL_CARRIER_ID.to_string(),
            carrier_slug: MANUAL_CARRIER_ID.to_string(),
            service_type: "manual".to_string(),
            service_name: self.service_name.clone(),
            transit_time_days: None,
            total_charge: Some(Money::new(key.amount, key.currency.clone())),
            charge_weight: None,
            pickup_deadline: None,
            booking_cutoff: None,
            delivery_date: None,
            error_message: None,
            info_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::selection::RateState;

    #[test]
    fn repeated_injection_keeps_one_quote() {
        let mut controller = SelectionController::new();
        let mut injector = ManualRateInjector::default();

        let first = injector.apply(&mut controller, Some(100.0), "THB").unwrap();
        let second = injector.apply(&mut controller, Some(100.0), "THB").unwrap();

        assert_eq!(first, ManualRateOutcome::Upserted);
        assert_eq!(second, ManualRateOutcome::Unchanged);
        assert_eq!(controller.quotes().len(), 1);
        assert_eq!(controller.selected_id(), Some(&RateId::manual()));
        assert_eq!(controller.state(), RateState::Selected);
    }

    #[test]
    fn editing_amount_replaces_quote() {
        let mut controller = SelectionController::new();
        let mut injector = ManualRateInjector::default();

        injector.apply(&mut controller, Some(100.0), "THB").unwrap();
        injector.apply(&mut controller, Some(150.0), "THB").unwrap();
        let outcome = injector.apply(&mut controller, Some(150.0), "usd").unwrap();

        assert_eq!(outcome, ManualRateOutcome::Upserted);
        assert_eq!(controller.quotes().len(), 1);
        let charge = controller.quotes()[0].total_charge.clone().unwrap();
        assert_eq!(charge, Money::new(150.0, "USD"));
        assert_eq!(controller.selected_id(), Some(&RateId::manual()));
    }

    #[test]
    fn invalid_amount_clears_selection() {
        for amount in [None, Some(0.0), Some(-5.0), Some(f64::NAN)] {
            let mut controller = SelectionController::new();
            let mut injector = ManualRateInjector::default();
            injector.apply(&mut controller, Some(100.0), "THB").unwrap();

            let outcome = injector.apply(&mut controller, amount, "THB").unwrap();
            assert_eq!(outcome, ManualRateOutcome::Cleared);
            assert!(controller.selected_id().is_none());
            assert!(controller.quotes().is_empty());
            assert_eq!(controller.state(), RateState::Empty);
        }
    }

    #[test]
    fn same_value_is_rewritten_after_external_clear() {
        let mut controller = SelectionController::new();
        let mut injector = ManualRateInjector::default();
        injector.apply(&mut controller, Some(100.0), "THB").unwrap();

        controller.clear();
        let outcome = injector.apply(&mut controller, Some(100.0), "THB").unwrap();

        assert_eq!(outcome, ManualRateOutcome::Upserted);
        assert_eq!(controller.quotes().len(), 1);
    }

    #[test]
    fn refuses_to_write_during_calculation() {
        let mut controller = SelectionController::new();
        let mut injector = ManualRateInjector::default();
        controller.begin_calculation(Default::default()).unwrap();

        let result = injector.apply(&mut controller, Some(100.0), "THB");
        assert_eq!(result, Err(SelectionError::CalculationInFlight));
        assert!(controller.quotes().is_empty());
    }
}
