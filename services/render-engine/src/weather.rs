//! Weather aggregator
//!
//! Holds the most recent weather snapshot and renders a current-conditions
//! block followed by a row of forecast columns below it. Every snapshot
//! replaces the previous one wholesale.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use types::events::{CurrentWeather, Event, EventPayload, ForecastEntry, Topic};
use types::layout::{Point, Size};

use crate::config::WeatherConfig;
use crate::error::RenderError;
use crate::format::{day_name, degrees_to_direction, format_degrees, format_wind_speed, weather_icon};
use crate::metrics::RenderMetrics;
use crate::observe::{run_observer, ObserveOutcome};
use crate::renderer::ItemRenderer;
use crate::source::EventSource;
use crate::template::{render_view, Template};

#[derive(Debug, Clone, PartialEq)]
struct WeatherState {
    current: CurrentWeather,
    forecast: Vec<ForecastEntry>,
}

/// Current conditions, as handed to the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentView {
    pub anchor: Point,
    pub weather_icon: String,
    pub temperature: String,
    pub wind_speed: String,
    pub wind_direction: String,
    pub day: String,
    pub display_index: usize,
}

/// One forecast column, as handed to the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastView {
    pub anchor: Point,
    pub weather_icon: String,
    pub temperature: String,
    pub night_temperature: String,
    pub wind_speed: String,
    pub day: String,
    pub display_index: usize,
}

/// Renders current weather and the forecast row.
pub struct WeatherAggregator {
    source: Arc<dyn EventSource>,
    current_template: Arc<dyn Template>,
    forecast_template: Arc<dyn Template>,
    anchor: Point,
    current_size: Size,
    forecast_size: Size,
    forecast_limit: usize,
    state: Mutex<Option<WeatherState>>,
    metrics: Arc<RenderMetrics>,
}

impl WeatherAggregator {
    pub fn new(
        config: &WeatherConfig,
        current_template: Arc<dyn Template>,
        forecast_template: Arc<dyn Template>,
        source: Arc<dyn EventSource>,
    ) -> Self {
        Self {
            source,
            current_template,
            forecast_template,
            anchor: config.anchor.point(),
            current_size: config.current_size.size(),
            forecast_size: config.forecast_size.size(),
            forecast_limit: config.forecast_limit,
            state: Mutex::new(None),
            metrics: Arc::new(RenderMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RenderMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Fold the latest retained weather snapshot.
    pub fn bootstrap(&self) -> Result<(), RenderError> {
        match self.source.latest(Topic::Weather) {
            Ok(event) => {
                self.fold(&event);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Unable to fetch weather data");
                self.metrics.record_bootstrap_failure();
                Err(err.into())
            }
        }
    }

    /// Replace the stored snapshot. Returns false for non-weather events.
    pub fn fold(&self, event: &Event) -> bool {
        match &event.payload {
            EventPayload::WeatherSnapshot { current, forecast } => {
                *self.lock() = Some(WeatherState {
                    current: current.clone(),
                    forecast: forecast.clone(),
                });
                self.metrics.record_fold();
                debug!(forecast_days = forecast.len(), "Weather snapshot replaced");
                true
            }
            _ => {
                self.metrics.record_ignored();
                false
            }
        }
    }

    pub fn has_data(&self) -> bool {
        self.lock().is_some()
    }

    /// Template data for the current snapshot, or `None` before the first one.
    pub fn views(&self) -> Option<(CurrentView, Vec<ForecastView>)> {
        let state = self.lock().clone()?;
        Some((self.current_view(&state.current), self.forecast_views(&state.forecast)))
    }

    fn current_view(&self, current: &CurrentWeather) -> CurrentView {
        CurrentView {
            anchor: self.anchor,
            weather_icon: weather_icon(&current.icon).to_string(),
            temperature: format_degrees(current.temperature),
            wind_speed: format_wind_speed(current.wind_speed, current.wind_gust),
            wind_direction: degrees_to_direction(current.wind_direction).to_string(),
            day: day_name(current.timestamp),
            display_index: 0,
        }
    }

    fn forecast_views(&self, forecast: &[ForecastEntry]) -> Vec<ForecastView> {
        let mut anchor = self.anchor.offset_y(self.current_size.height);
        forecast
            .iter()
            .take(self.forecast_limit)
            .enumerate()
            .map(|(display_index, entry)| {
                let view = ForecastView {
                    anchor,
                    weather_icon: weather_icon(&entry.icon).to_string(),
                    temperature: format_degrees(entry.day_temperature),
                    night_temperature: format_degrees(entry.night_temperature),
                    wind_speed: format_wind_speed(entry.wind_speed, entry.wind_gust),
                    day: day_name(entry.timestamp),
                    display_index,
                };
                anchor = anchor.offset_x(self.forecast_size.width);
                view
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Option<WeatherState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ItemRenderer for WeatherAggregator {
    fn content(&self) -> Result<String, RenderError> {
        let (current, forecast) = self
            .views()
            .ok_or(RenderError::NoDataYet { what: "weather data" })?;

        let mut content = render_view(self.current_template.as_ref(), &current)?;
        for view in &forecast {
            content.push_str(&render_view(self.forecast_template.as_ref(), view)?);
        }
        Ok(content)
    }

    fn size(&self) -> Size {
        let columns = u32::try_from(self.forecast_limit).unwrap_or(u32::MAX);
        Size::new(
            self.current_size.height.saturating_add(self.forecast_size.height),
            self.current_size
                .width
                .max(self.forecast_size.width.saturating_mul(columns)),
        )
    }

    async fn observe(&self, cancel: CancellationToken) -> ObserveOutcome {
        let events = self.source.observe(&[Topic::Weather]);
        run_observer("weather", events, cancel, |event| {
            self.fold(&event);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnchorConfig, SizeConfig};
    use crate::format::NOT_APPLICABLE;
    use crate::source::MemorySource;
    use crate::template::PlaceholderTemplate;
    use chrono::{Duration, TimeZone, Utc};

    const CURRENT: &str = r#"{"x":{{anchor.x}},"y":{{anchor.y}},"t":"{{temperature}}","w":"{{wind_speed}}","d":"{{wind_direction}}","day":"{{day}}"},"#;
    const FORECAST: &str = r#"{"x":{{anchor.x}},"y":{{anchor.y}},"i":{{display_index}},"t":"{{temperature}}/{{night_temperature}}"},"#;

    fn make_config(limit: usize) -> WeatherConfig {
        WeatherConfig {
            anchor: AnchorConfig { x: 10, y: 300 },
            current_size: SizeConfig {
                height: 80,
                width: 400,
            },
            forecast_size: SizeConfig {
                height: 100,
                width: 60,
            },
            forecast_limit: limit,
        }
    }

    fn make_event(days: usize, temperature: f64) -> Event {
        // 2024-03-01 is a Friday
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let current = CurrentWeather {
            timestamp: start,
            temperature,
            wind_speed: 7.0,
            wind_gust: 32.0,
            wind_direction: 175.0,
            icon: "01d".to_string(),
        };
        let forecast = (0..days)
            .map(|day| ForecastEntry {
                timestamp: start + Duration::days(day as i64 + 1),
                day_temperature: 14.0 + day as f64,
                night_temperature: 4.0,
                wind_speed: 45.7,
                wind_gust: 0.0,
                icon: "10n".to_string(),
            })
            .collect();
        Event::new(start, EventPayload::WeatherSnapshot { current, forecast })
    }

    fn make_aggregator(limit: usize, source: MemorySource) -> WeatherAggregator {
        WeatherAggregator::new(
            &make_config(limit),
            Arc::new(PlaceholderTemplate::new(CURRENT)),
            Arc::new(PlaceholderTemplate::new(FORECAST)),
            Arc::new(source),
        )
    }

    #[test]
    fn test_current_view_formatting() {
        let agg = make_aggregator(6, MemorySource::with_defaults());
        agg.fold(&make_event(0, 12.34));

        let (current, forecast) = agg.views().unwrap();
        assert!(forecast.is_empty());
        assert_eq!(current.temperature, "12.3");
        assert_eq!(current.wind_speed, "7/32");
        assert_eq!(current.wind_direction, "S");
        assert_eq!(current.day, "Friday");
        assert_eq!(current.weather_icon, "\u{f00d}");
        assert_eq!(current.display_index, 0);
    }

    #[test]
    fn test_forecast_layout_and_limit() {
        let agg = make_aggregator(3, MemorySource::with_defaults());
        agg.fold(&make_event(5, 12.0));

        let (_, forecast) = agg.views().unwrap();
        assert_eq!(forecast.len(), 3);
        assert_eq!(forecast[0].anchor, Point::new(10, 380));
        assert_eq!(forecast[1].anchor, Point::new(70, 380));
        assert_eq!(forecast[2].anchor, Point::new(130, 380));
        assert_eq!(forecast[2].display_index, 2);
        assert_eq!(forecast[0].day, "Saturday");
        assert_eq!(forecast[0].wind_speed, "45");
        assert_eq!(forecast[0].night_temperature, "4.0");
        assert_eq!(forecast[0].weather_icon, "\u{f028}");
    }

    #[test]
    fn test_content_renders_current_then_forecast() {
        let agg = make_aggregator(6, MemorySource::with_defaults());
        agg.fold(&make_event(2, 12.0));

        assert_eq!(
            agg.content().unwrap(),
            concat!(
                r#"{"x":10,"y":300,"t":"12.0","w":"7/32","d":"S","day":"Friday"},"#,
                r#"{"x":10,"y":380,"i":0,"t":"14.0/4.0"},"#,
                r#"{"x":70,"y":380,"i":1,"t":"15.0/4.0"},"#
            )
        );
    }

    #[test]
    fn test_snapshot_replaced_wholesale() {
        let agg = make_aggregator(6, MemorySource::with_defaults());
        agg.fold(&make_event(4, 12.0));
        agg.fold(&make_event(1, 20.0));

        let (current, forecast) = agg.views().unwrap();
        assert_eq!(current.temperature, "20.0");
        assert_eq!(forecast.len(), 1);
    }

    #[test]
    fn test_invalid_bearing_is_not_applicable() {
        let agg = make_aggregator(6, MemorySource::with_defaults());
        let mut event = make_event(0, 12.0);
        if let EventPayload::WeatherSnapshot { current, .. } = &mut event.payload {
            current.wind_direction = 600.0;
        }
        agg.fold(&event);
        assert_eq!(agg.views().unwrap().0.wind_direction, NOT_APPLICABLE);
    }

    #[test]
    fn test_no_data_is_an_error() {
        let agg = make_aggregator(6, MemorySource::with_defaults());
        assert!(matches!(agg.content(), Err(RenderError::NoDataYet { .. })));
    }

    #[test]
    fn test_bootstrap_takes_latest() {
        let source = MemorySource::with_events(vec![make_event(1, 10.0), make_event(1, 11.0)]);
        let agg = make_aggregator(6, source);

        agg.bootstrap().unwrap();
        assert_eq!(agg.views().unwrap().0.temperature, "11.0");
    }

    #[test]
    fn test_bootstrap_failure_is_reported() {
        let agg = make_aggregator(6, MemorySource::with_defaults());
        assert!(agg.bootstrap().is_err());
        assert!(!agg.has_data());
    }

    #[test]
    fn test_size_covers_current_and_forecast_row() {
        let agg = make_aggregator(6, MemorySource::with_defaults());
        assert_eq!(agg.size(), Size::new(180, 400));

        let agg = make_aggregator(8, MemorySource::with_defaults());
        assert_eq!(agg.size(), Size::new(180, 480));
    }

    #[tokio::test]
    async fn test_observe_stops_on_stream_close() {
        let source = Arc::new(MemorySource::with_defaults());
        let agg = Arc::new(WeatherAggregator::new(
            &make_config(6),
            Arc::new(PlaceholderTemplate::new(CURRENT)),
            Arc::new(PlaceholderTemplate::new(FORECAST)),
            source.clone(),
        ));

        let observer = agg.clone();
        let handle = tokio::spawn(async move { observer.observe(CancellationToken::new()).await });

        while source.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
        source.publish(make_event(2, 9.0));
        source.close();

        assert_eq!(handle.await.unwrap(), ObserveOutcome::StreamClosed);
        assert!(agg.has_data());
    }
}
