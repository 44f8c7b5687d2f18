//! Billing report aggregator
//!
//! Keeps the total of the latest billing report, converted into the display
//! currency when it differs from the report currency. Exchange rates are
//! cached per currency pair; a rate only replaces the cached one when its
//! own timestamp is not earlier, so late deliveries never win.
//!
//! The total is computed when a report arrives, using the rate cached at
//! that moment. Without a rate the amount stays in report currency.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use types::events::{Event, EventPayload, ExchangeRate, Topic};
use types::layout::{Point, Size};

use crate::config::BillingConfig;
use crate::error::RenderError;
use crate::format::format_currency;
use crate::metrics::RenderMetrics;
use crate::observe::{run_observer, ObserveOutcome};
use crate::renderer::ItemRenderer;
use crate::source::EventSource;
use crate::template::{render_view, Template};

type CurrencyPair = (String, String);

/// Most recent billing total, as handed to the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingSnapshot {
    pub anchor: Point,
    pub period: String,
    /// Formatted amount, e.g. "17.27 EUR"
    pub amount: String,
    #[serde(skip)]
    pub total: Decimal,
    #[serde(skip)]
    pub currency: String,
}

#[derive(Default)]
struct BillingState {
    rates: HashMap<CurrencyPair, ExchangeRate>,
    snapshot: Option<BillingSnapshot>,
}

/// Renders the latest billing report total.
pub struct BillingAggregator {
    source: Arc<dyn EventSource>,
    template: Arc<dyn Template>,
    anchor: Point,
    size: Size,
    report_currency: String,
    display_currency: String,
    state: Mutex<BillingState>,
    metrics: Arc<RenderMetrics>,
}

impl BillingAggregator {
    pub fn new(config: &BillingConfig, template: Arc<dyn Template>, source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            template,
            anchor: config.anchor.point(),
            size: config.size.size(),
            report_currency: config.report_currency.clone(),
            display_currency: config.display_currency.clone(),
            state: Mutex::new(BillingState::default()),
            metrics: Arc::new(RenderMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RenderMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Whether totals need converting, and so whether rates matter at all.
    pub fn converts(&self) -> bool {
        self.report_currency != self.display_currency
    }

    /// Fold retained exchange rates (when converting), then the latest report.
    ///
    /// A failed rate fetch is logged and skipped; a failed report fetch is
    /// returned after logging.
    pub fn bootstrap(&self) -> Result<(), RenderError> {
        if self.converts() {
            match self.source.all(Topic::ExchangeRate) {
                Ok(events) => {
                    info!(count = events.len(), "Fetched exchange rate history");
                    for event in &events {
                        self.fold(event);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Unable to fetch exchange rates");
                    self.metrics.record_bootstrap_failure();
                }
            }
        }

        match self.source.latest(Topic::BillingReport) {
            Ok(event) => {
                self.fold(&event);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Unable to fetch billing report");
                self.metrics.record_bootstrap_failure();
                Err(err.into())
            }
        }
    }

    /// Apply one event. Returns whether state changed.
    pub fn fold(&self, event: &Event) -> bool {
        let changed = match &event.payload {
            EventPayload::BillingReport {
                billing_period,
                billing_amount,
                tax_amount,
            } => {
                let total = billing_amount
                    .values()
                    .chain(tax_amount.values())
                    .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(*item));
                let mut state = self.lock();
                let next = total.and_then(|total| self.compute(&state.rates, billing_period, total));
                match next {
                    Some(snapshot) => {
                        debug!(period = %billing_period, amount = %snapshot.amount, "Billing report updated");
                        state.snapshot = Some(snapshot);
                        true
                    }
                    None => {
                        warn!(period = %billing_period, "Billing total overflows, keeping previous report");
                        false
                    }
                }
            }
            EventPayload::ExchangeRates { rates } => {
                let mut state = self.lock();
                rates
                    .iter()
                    .fold(false, |changed, rate| self.assign_rate(&mut state.rates, rate) || changed)
            }
            _ => false,
        };

        if changed {
            self.metrics.record_fold();
        } else {
            self.metrics.record_ignored();
        }
        changed
    }

    /// Rate cached for a currency pair.
    pub fn cached_rate(&self, from: &str, to: &str) -> Option<Decimal> {
        self.lock()
            .rates
            .get(&(from.to_string(), to.to_string()))
            .map(|rate| rate.rate)
    }

    pub fn snapshot(&self) -> Option<BillingSnapshot> {
        self.lock().snapshot.clone()
    }

    fn assign_rate(&self, rates: &mut HashMap<CurrencyPair, ExchangeRate>, rate: &ExchangeRate) -> bool {
        if !self.converts() || rate.from_currency != self.report_currency || rate.to_currency != self.display_currency {
            debug!(from = %rate.from_currency, to = %rate.to_currency, "Exchange rate not needed");
            return false;
        }

        let key = (rate.from_currency.clone(), rate.to_currency.clone());
        if let Some(cached) = rates.get(&key) {
            if rate.timestamp < cached.timestamp {
                debug!(
                    from = %rate.from_currency,
                    to = %rate.to_currency,
                    rejected = %rate.timestamp,
                    cached = %cached.timestamp,
                    "Stale exchange rate rejected"
                );
                return false;
            }
        }
        rates.insert(key, rate.clone());
        true
    }

    /// `None` when the converted amount overflows.
    fn compute(
        &self,
        rates: &HashMap<CurrencyPair, ExchangeRate>,
        period: &str,
        total: Decimal,
    ) -> Option<BillingSnapshot> {
        let key = (self.report_currency.clone(), self.display_currency.clone());
        let (amount, currency) = match rates.get(&key) {
            Some(rate) if self.converts() => (total.checked_mul(rate.rate)?, self.display_currency.clone()),
            _ => {
                if self.converts() {
                    debug!(
                        from = %self.report_currency,
                        to = %self.display_currency,
                        "No exchange rate yet, showing report currency"
                    );
                }
                (total, self.report_currency.clone())
            }
        };

        Some(BillingSnapshot {
            anchor: self.anchor,
            period: period.to_string(),
            amount: format_currency(amount, &currency),
            total: amount,
            currency,
        })
    }

    fn lock(&self) -> MutexGuard<'_, BillingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ItemRenderer for BillingAggregator {
    fn content(&self) -> Result<String, RenderError> {
        let snapshot = self.snapshot().ok_or(RenderError::NoDataYet {
            what: "billing report",
        })?;
        render_view(self.template.as_ref(), &snapshot)
    }

    fn size(&self) -> Size {
        self.size
    }

    async fn observe(&self, cancel: CancellationToken) -> ObserveOutcome {
        let mut topics = vec![Topic::BillingReport];
        if self.converts() {
            topics.push(Topic::ExchangeRate);
        }
        let events = self.source.observe(&topics);
        run_observer("billing_report", events, cancel, |event| {
            self.fold(&event);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnchorConfig;
    use crate::source::MemorySource;
    use crate::template::PlaceholderTemplate;
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;

    const TEMPLATE: &str = r#"{"x":{{anchor.x}},"period":"{{period}}","amount":"{{amount}}"}"#;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn make_config(report: &str, display: &str) -> BillingConfig {
        BillingConfig {
            anchor: AnchorConfig { x: 400, y: 10 },
            report_currency: report.to_string(),
            display_currency: display.to_string(),
            ..BillingConfig::default()
        }
    }

    fn make_report(period: &str) -> Event {
        let billing_amount = BTreeMap::from([("xxx".to_string(), dec("5.14")), ("zzz".to_string(), dec("12.53"))]);
        let tax_amount = BTreeMap::from([("xxx".to_string(), dec("0.87")), ("zzz".to_string(), dec("2.15"))]);
        Event::now(EventPayload::BillingReport {
            billing_period: period.to_string(),
            billing_amount,
            tax_amount,
        })
    }

    fn make_rate(from: &str, to: &str, rate: &str, age_secs: i64) -> ExchangeRate {
        ExchangeRate {
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            rate: dec(rate),
            timestamp: Utc::now() - Duration::seconds(age_secs),
        }
    }

    fn make_rates(rates: Vec<ExchangeRate>) -> Event {
        Event::now(EventPayload::ExchangeRates { rates })
    }

    fn make_aggregator(config: &BillingConfig, source: MemorySource) -> BillingAggregator {
        BillingAggregator::new(
            config,
            Arc::new(PlaceholderTemplate::new(TEMPLATE)),
            Arc::new(source),
        )
    }

    #[test]
    fn test_total_sums_billing_and_tax() {
        let agg = make_aggregator(&make_config("USD", "USD"), MemorySource::with_defaults());
        agg.fold(&make_report("2024-02"));

        let snapshot = agg.snapshot().unwrap();
        assert_eq!(snapshot.total, dec("20.69"));
        assert_eq!(snapshot.amount, "20.69 USD");
        assert_eq!(
            agg.content().unwrap(),
            r#"{"x":400,"period":"2024-02","amount":"20.69 USD"}"#
        );
    }

    #[test]
    fn test_converts_with_cached_rate() {
        let agg = make_aggregator(&make_config("USD", "EUR"), MemorySource::with_defaults());
        agg.fold(&make_rates(vec![make_rate("USD", "EUR", "0.8345", 0)]));
        agg.fold(&make_report("2024-02"));

        let snapshot = agg.snapshot().unwrap();
        assert_eq!(snapshot.currency, "EUR");
        assert_eq!(snapshot.amount, "17.27 EUR");
    }

    #[test]
    fn test_missing_rate_keeps_report_currency() {
        let agg = make_aggregator(&make_config("USD", "EUR"), MemorySource::with_defaults());
        agg.fold(&make_report("2024-02"));

        assert_eq!(agg.snapshot().unwrap().amount, "20.69 USD");
    }

    #[test]
    fn test_older_rate_never_overwrites_newer() {
        let agg = make_aggregator(&make_config("USD", "EUR"), MemorySource::with_defaults());

        assert!(agg.fold(&make_rates(vec![make_rate("USD", "EUR", "0.8345", 0)])));
        assert_eq!(agg.cached_rate("USD", "EUR"), Some(dec("0.8345")));

        assert!(!agg.fold(&make_rates(vec![make_rate("USD", "EUR", "1.2325", 100)])));
        assert_eq!(agg.cached_rate("USD", "EUR"), Some(dec("0.8345")));
    }

    #[test]
    fn test_newer_or_equal_rate_replaces() {
        let agg = make_aggregator(&make_config("USD", "EUR"), MemorySource::with_defaults());
        let first = make_rate("USD", "EUR", "0.8345", 100);
        let mut same_time = make_rate("USD", "EUR", "0.9000", 0);
        same_time.timestamp = first.timestamp;

        agg.fold(&make_rates(vec![first]));
        agg.fold(&make_rates(vec![same_time]));
        assert_eq!(agg.cached_rate("USD", "EUR"), Some(dec("0.9000")));

        agg.fold(&make_rates(vec![make_rate("USD", "EUR", "0.9100", 0)]));
        assert_eq!(agg.cached_rate("USD", "EUR"), Some(dec("0.9100")));
    }

    #[test]
    fn test_foreign_pairs_ignored() {
        let agg = make_aggregator(&make_config("USD", "EUR"), MemorySource::with_defaults());
        let changed = agg.fold(&make_rates(vec![
            make_rate("EUR", "USD", "1.10", 0),
            make_rate("USD", "GBP", "0.79", 0),
        ]));

        assert!(!changed);
        assert_eq!(agg.cached_rate("EUR", "USD"), None);
        assert_eq!(agg.cached_rate("USD", "GBP"), None);
    }

    #[test]
    fn test_rate_batch_folds_each_rate() {
        let agg = make_aggregator(&make_config("USD", "EUR"), MemorySource::with_defaults());
        agg.fold(&make_rates(vec![
            make_rate("USD", "EUR", "0.81", 50),
            make_rate("USD", "GBP", "0.79", 0),
            make_rate("USD", "EUR", "0.83", 10),
            make_rate("USD", "EUR", "0.80", 90),
        ]));
        assert_eq!(agg.cached_rate("USD", "EUR"), Some(dec("0.83")));
    }

    #[test]
    fn test_no_report_is_an_error() {
        let agg = make_aggregator(&make_config("USD", "USD"), MemorySource::with_defaults());
        let err = agg.content().unwrap_err();
        assert!(matches!(err, RenderError::NoDataYet { .. }));
        assert_eq!(err.to_string(), "no billing report available");
    }

    #[test]
    fn test_new_report_replaces_snapshot() {
        let agg = make_aggregator(&make_config("USD", "USD"), MemorySource::with_defaults());
        agg.fold(&make_report("2024-01"));
        agg.fold(&Event::now(EventPayload::BillingReport {
            billing_period: "2024-02".to_string(),
            billing_amount: BTreeMap::from([("xxx".to_string(), dec("3"))]),
            tax_amount: BTreeMap::new(),
        }));

        let snapshot = agg.snapshot().unwrap();
        assert_eq!(snapshot.period, "2024-02");
        assert_eq!(snapshot.amount, "3.00 USD");
    }

    #[test]
    fn test_overflowing_total_keeps_previous_report() {
        let agg = make_aggregator(&make_config("USD", "USD"), MemorySource::with_defaults());
        agg.fold(&make_report("2024-01"));

        let changed = agg.fold(&Event::now(EventPayload::BillingReport {
            billing_period: "2024-02".to_string(),
            billing_amount: BTreeMap::from([
                ("xxx".to_string(), Decimal::MAX),
                ("zzz".to_string(), Decimal::MAX),
            ]),
            tax_amount: BTreeMap::new(),
        }));

        assert!(!changed);
        let snapshot = agg.snapshot().unwrap();
        assert_eq!(snapshot.period, "2024-01");
        assert_eq!(snapshot.amount, "20.69 USD");
    }

    #[test]
    fn test_overflowing_conversion_keeps_previous_report() {
        let agg = make_aggregator(&make_config("USD", "EUR"), MemorySource::with_defaults());
        agg.fold(&make_report("2024-01"));
        agg.fold(&make_rates(vec![make_rate("USD", "EUR", "2", 0)]));

        let changed = agg.fold(&Event::now(EventPayload::BillingReport {
            billing_period: "2024-02".to_string(),
            billing_amount: BTreeMap::from([("xxx".to_string(), Decimal::MAX)]),
            tax_amount: BTreeMap::new(),
        }));

        assert!(!changed);
        assert_eq!(agg.snapshot().unwrap().period, "2024-01");
        assert!(agg.fold(&make_report("2024-03")));
        assert_eq!(agg.snapshot().unwrap().amount, "41.38 EUR");
    }

    #[test]
    fn test_bootstrap_uses_rates_then_latest_report() {
        let source = MemorySource::with_events(vec![
            make_rates(vec![make_rate("USD", "EUR", "0.8345", 0)]),
            make_report("2024-01"),
            make_report("2024-02"),
        ]);
        let agg = make_aggregator(&make_config("USD", "EUR"), source);

        agg.bootstrap().unwrap();
        let snapshot = agg.snapshot().unwrap();
        assert_eq!(snapshot.period, "2024-02");
        assert_eq!(snapshot.amount, "17.27 EUR");
    }

    #[test]
    fn test_bootstrap_skips_rates_without_conversion() {
        let source = MemorySource::with_events(vec![
            make_rates(vec![make_rate("USD", "USD", "2", 0)]),
            make_report("2024-02"),
        ]);
        let agg = make_aggregator(&make_config("USD", "USD"), source);

        agg.bootstrap().unwrap();
        assert_eq!(agg.cached_rate("USD", "USD"), None);
        assert_eq!(agg.snapshot().unwrap().amount, "20.69 USD");
    }

    #[test]
    fn test_bootstrap_without_report_fails() {
        let agg = make_aggregator(&make_config("USD", "EUR"), MemorySource::with_defaults());
        assert!(matches!(agg.bootstrap(), Err(RenderError::SourceUnavailable(_))));
        assert!(agg.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_observe_follows_rates_and_reports() {
        let source = Arc::new(MemorySource::with_defaults());
        let agg = Arc::new(BillingAggregator::new(
            &make_config("USD", "EUR"),
            Arc::new(PlaceholderTemplate::new(TEMPLATE)),
            source.clone(),
        ));
        let cancel = CancellationToken::new();

        let observer = agg.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { observer.observe(token).await });

        while source.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
        source.publish(make_rates(vec![make_rate("USD", "EUR", "0.8345", 0)]));
        source.publish(make_report("2024-02"));
        while agg.snapshot().is_none() {
            tokio::task::yield_now().await;
        }

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), ObserveOutcome::Cancelled);
        assert_eq!(agg.snapshot().unwrap().amount, "17.27 EUR");
    }
}
