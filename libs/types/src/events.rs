//! Domain events consumed by the renderers
//!
//! Every event published by the upstream event source is decoded into the
//! tagged [`EventPayload`] union at the source boundary. Renderers dispatch
//! on the variant with an exhaustive `match`, never on runtime type checks.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::DeviceId;

/// Event source topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Temperature, humidity and battery readings of room sensors
    IndoorClimate,
    /// Periodic cloud billing reports
    BillingReport,
    /// Currency exchange rates
    ExchangeRate,
    /// Current weather and forecast
    Weather,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::IndoorClimate => "indoor_climate",
            Topic::BillingReport => "billing_report",
            Topic::ExchangeRate => "exchange_rate",
            Topic::Weather => "weather",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable event received from the event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier (UUID v7)
    pub event_id: Uuid,
    /// Time the event was produced upstream
    pub timestamp: DateTime<Utc>,
    /// Event-specific payload
    pub payload: EventPayload,
}

/// Event-specific payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    /// A single measurement reported by a room sensor.
    ClimateReading {
        device_id: DeviceId,
        measurement: MeasurementType,
        /// Raw value as reported by the device, e.g. "23.5"
        value: String,
    },

    /// Line items of a billing period, in report currency.
    BillingReport {
        billing_period: String,
        billing_amount: BTreeMap<String, Decimal>,
        tax_amount: BTreeMap<String, Decimal>,
    },

    /// One or more exchange rates, each stamped with its own time.
    ExchangeRates { rates: Vec<ExchangeRate> },

    /// Full weather snapshot: current conditions plus ordered forecast.
    WeatherSnapshot {
        current: CurrentWeather,
        #[serde(default)]
        forecast: Vec<ForecastEntry>,
    },
}

/// Kind of measurement carried by a climate reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeasurementType {
    Temperature,
    Humidity,
    Battery,
}

/// Conversion rate between two currencies at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Current weather conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub timestamp: DateTime<Utc>,
    /// Degrees celsius
    pub temperature: f64,
    pub wind_speed: f64,
    #[serde(default)]
    pub wind_gust: f64,
    /// Bearing in degrees, 0-360
    pub wind_direction: f64,
    /// OpenWeather icon code, e.g. "01d"
    pub icon: String,
}

/// One forecast day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub timestamp: DateTime<Utc>,
    pub day_temperature: f64,
    pub night_temperature: f64,
    pub wind_speed: f64,
    #[serde(default)]
    pub wind_gust: f64,
    pub icon: String,
}

impl Event {
    /// Wrap a payload into a new event stamped with the given time.
    pub fn new(timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            timestamp,
            payload,
        }
    }

    /// Wrap a payload into a new event stamped with the current time.
    pub fn now(payload: EventPayload) -> Self {
        Self::new(Utc::now(), payload)
    }

    /// Topic this event is published on.
    pub fn topic(&self) -> Topic {
        match &self.payload {
            EventPayload::ClimateReading { .. } => Topic::IndoorClimate,
            EventPayload::BillingReport { .. } => Topic::BillingReport,
            EventPayload::ExchangeRates { .. } => Topic::ExchangeRate,
            EventPayload::WeatherSnapshot { .. } => Topic::Weather,
        }
    }

    /// Get the event type as a string label for logging.
    pub fn event_type_label(&self) -> &'static str {
        match &self.payload {
            EventPayload::ClimateReading { .. } => "ClimateReading",
            EventPayload::BillingReport { .. } => "BillingReport",
            EventPayload::ExchangeRates { .. } => "ExchangeRates",
            EventPayload::WeatherSnapshot { .. } => "WeatherSnapshot",
        }
    }
}
