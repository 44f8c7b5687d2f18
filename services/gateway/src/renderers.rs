use std::sync::Arc;

use render_engine::billing::BillingAggregator;
use render_engine::climate::ClimateAggregator;
use render_engine::config::RendererConfig;
use render_engine::metrics::RenderMetrics;
use render_engine::observe::ObserveOutcome;
use render_engine::renderer::{ItemRenderer, TimestampRenderer};
use render_engine::source::EventSource;
use render_engine::weather::WeatherAggregator;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::templates::Templates;

/// Item renderers shared by every display node.
///
/// Aggregators are created once so their state is shared across requests;
/// the order here is the order items appear in a response.
#[derive(Clone)]
pub struct Renderers {
    pub climate: Arc<ClimateAggregator>,
    pub billing: Arc<BillingAggregator>,
    pub weather: Arc<WeatherAggregator>,
    pub timestamp: Arc<TimestampRenderer>,
}

impl Renderers {
    pub fn new(
        config: &RendererConfig,
        templates: &Templates,
        source: Arc<dyn EventSource>,
        metrics: Arc<RenderMetrics>,
    ) -> Self {
        Self {
            climate: Arc::new(
                ClimateAggregator::new(&config.climate, templates.climate.clone(), source.clone())
                    .with_metrics(metrics.clone()),
            ),
            billing: Arc::new(
                BillingAggregator::new(&config.billing, templates.billing.clone(), source.clone())
                    .with_metrics(metrics.clone()),
            ),
            weather: Arc::new(
                WeatherAggregator::new(
                    &config.weather,
                    templates.weather_current.clone(),
                    templates.weather_forecast.clone(),
                    source,
                )
                .with_metrics(metrics),
            ),
            timestamp: Arc::new(TimestampRenderer::new(
                templates.timestamp.clone(),
                config.timestamp.anchor.point(),
                config.timestamp.size.size(),
            )),
        }
    }

    /// Prime every aggregator from the source history.
    ///
    /// A failed fetch leaves the aggregator empty; it reports missing data
    /// until live events arrive.
    pub fn bootstrap(&self) {
        match self.climate.bootstrap() {
            Ok(folded) => info!(folded, "Climate state bootstrapped"),
            Err(e) => debug!(error = %e, "Climate starts empty"),
        }
        if let Err(e) = self.billing.bootstrap() {
            debug!(error = %e, "Billing starts empty");
        }
        if let Err(e) = self.weather.bootstrap() {
            debug!(error = %e, "Weather starts empty");
        }
    }

    pub fn items(&self) -> Vec<Arc<dyn ItemRenderer>> {
        vec![
            self.climate.clone(),
            self.billing.clone(),
            self.weather.clone(),
            self.timestamp.clone(),
        ]
    }

    /// Start one observation task per renderer.
    pub fn spawn_observers(&self, cancel: &CancellationToken) -> Vec<JoinHandle<ObserveOutcome>> {
        self.items()
            .into_iter()
            .map(|item| {
                let token = cancel.clone();
                tokio::spawn(async move { item.observe(token).await })
            })
            .collect()
    }
}
