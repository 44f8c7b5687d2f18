//! Value formatters
//!
//! Pure conversions from raw event fields into display strings. Climate
//! values arrive as strings straight from the sensors; anything that does not
//! parse is shown as received rather than dropped.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};

/// Shown for a measurement that has not been reported yet.
pub const UNKNOWN_VALUE: &str = "--";

/// Shown for a wind bearing outside 0-360 degrees.
pub const NOT_APPLICABLE: &str = "N/A";

const COMPASS_POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// Battery level glyphs (FontAwesome battery set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryIcon {
    Full,
    ThreeQuarters,
    Half,
    Quarter,
    Empty,
}

impl BatteryIcon {
    pub fn glyph(&self) -> &'static str {
        match self {
            BatteryIcon::Full => "\u{f240}",
            BatteryIcon::ThreeQuarters => "\u{f241}",
            BatteryIcon::Half => "\u{f242}",
            BatteryIcon::Quarter => "\u{f243}",
            BatteryIcon::Empty => "\u{f244}",
        }
    }
}

impl Serialize for BatteryIcon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.glyph())
    }
}

/// Text colors supported by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TextColor {
    White,
    Black,
    Red,
}

/// One decimal place, e.g. "23.47" -> "23.5".
pub fn format_temperature(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(value) => format!("{:.1}", value),
        Err(_) => raw.to_string(),
    }
}

/// No decimal places, e.g. "57.4" -> "57".
pub fn format_humidity(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(value) => format!("{:.0}", value),
        Err(_) => raw.to_string(),
    }
}

fn parse_battery(raw: &str) -> Option<i64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
}

/// Battery percentage, truncated. Unparsable values count as 0.
pub fn battery_value(raw: &str) -> i64 {
    parse_battery(raw).unwrap_or(0)
}

pub fn battery_icon(raw: &str) -> BatteryIcon {
    match battery_value(raw) {
        v if v >= 90 => BatteryIcon::Full,
        v if v >= 75 => BatteryIcon::ThreeQuarters,
        v if v >= 50 => BatteryIcon::Half,
        v if v >= 10 => BatteryIcon::Quarter,
        _ => BatteryIcon::Empty,
    }
}

/// Red for a nearly empty battery. Unparsable values keep the default color.
pub fn battery_icon_color(raw: &str) -> TextColor {
    match parse_battery(raw) {
        Some(v) if v <= 5 => TextColor::Red,
        _ => TextColor::Black,
    }
}

/// Temperature from a weather snapshot, one decimal place.
pub fn format_degrees(value: f64) -> String {
    format!("{:.1}", value)
}

/// Integer wind speed, with the gust appended when there is one: "7/32".
pub fn format_wind_speed(speed: f64, gust: f64) -> String {
    let speed = speed.trunc() as i64;
    let gust = gust.trunc() as i64;
    if gust > 0 {
        format!("{}/{}", speed, gust)
    } else {
        speed.to_string()
    }
}

/// Map a bearing onto one of eight 45° compass sectors centered on N, NE, ...
pub fn degrees_to_direction(degrees: f64) -> &'static str {
    if !(0.0..=360.0).contains(&degrees) {
        return NOT_APPLICABLE;
    }
    let sector = ((degrees + 22.5) / 45.0).floor() as usize % COMPASS_POINTS.len();
    COMPASS_POINTS[sector]
}

/// Amount rounded to cents followed by the currency code: "20.69 EUR".
pub fn format_currency(amount: Decimal, currency: &str) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    format!("{} {}", rounded, currency)
}

/// English weekday name, e.g. "Monday".
pub fn day_name(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%A").to_string()
}

/// Timestamp as shown on the panel: "2024-03-01 10:00:00 UTC".
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Weather-font glyph for an OpenWeather icon code. Unknown codes show rain.
pub fn weather_icon(code: &str) -> &'static str {
    match code {
        "01d" => "\u{f00d}",
        "01n" => "\u{f02e}",
        "02d" => "\u{f002}",
        "02n" => "\u{f086}",
        "03d" | "03n" => "\u{f013}",
        "04d" => "\u{f07d}",
        "04n" => "\u{f07e}",
        "09d" => "\u{f0b2}",
        "09n" => "\u{f0b4}",
        "10d" => "\u{f008}",
        "10n" => "\u{f028}",
        "11d" | "11n" => "\u{f01e}",
        "13d" | "13n" => "\u{f01b}",
        "50d" | "50n" => "\u{f041}",
        _ => "\u{f008}",
    }
}
