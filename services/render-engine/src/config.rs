//! Renderer configuration
//!
//! Deserialized from the `climate`, `billing`, `weather`, `timestamp` and
//! `displays` sections of the service configuration. Every field has a
//! default so partial files load; geometry given as negative numbers is
//! clamped to 0 when converted into layout types.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer};
use types::ids::{DeviceId, NodeId, RoomId};
use types::layout::{Point, Size, Spacing};

/// Configured position, converted to a [`Point`] with negatives clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    pub x: i64,
    pub y: i64,
}

impl AnchorConfig {
    pub fn point(&self) -> Point {
        Point::clamped(self.x, self.y)
    }
}

/// Configured footprint, converted to a [`Size`] with negatives clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SizeConfig {
    pub height: i64,
    pub width: i64,
}

impl SizeConfig {
    pub fn size(&self) -> Size {
        Size::clamped(self.height, self.width)
    }
}

/// Spacing is either one number for every side or an object of sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SpacingConfig {
    Uniform(i64),
    Sides {
        #[serde(default)]
        top: i64,
        #[serde(default)]
        left: i64,
        #[serde(default)]
        right: i64,
        #[serde(default)]
        bottom: i64,
    },
}

impl Default for SpacingConfig {
    fn default() -> Self {
        SpacingConfig::Uniform(0)
    }
}

impl SpacingConfig {
    pub fn spacing(&self) -> Spacing {
        use types::layout::force_positive;
        match *self {
            SpacingConfig::Uniform(all) => Spacing::uniform(force_positive(all)),
            SpacingConfig::Sides {
                top,
                left,
                right,
                bottom,
            } => Spacing {
                top: force_positive(top),
                left: force_positive(left),
                right: force_positive(right),
                bottom: force_positive(bottom),
            },
        }
    }
}

/// A room shown by the climate item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoomEntry {
    pub id: RoomId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "display_index")]
    pub display_index: Option<u32>,
}

/// A sensor and the room it reports for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceEntry {
    pub id: DeviceId,
    #[serde(default)]
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    pub anchor: AnchorConfig,
    pub size: SizeConfig,
    pub spacing: SpacingConfig,
    pub rooms: Vec<RoomEntry>,
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub anchor: AnchorConfig,
    pub size: SizeConfig,
    pub report_currency: String,
    pub display_currency: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            anchor: AnchorConfig::default(),
            size: SizeConfig::default(),
            report_currency: "USD".to_string(),
            display_currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub anchor: AnchorConfig,
    pub current_size: SizeConfig,
    pub forecast_size: SizeConfig,
    /// Maximum number of forecast columns.
    pub forecast_limit: usize,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            anchor: AnchorConfig::default(),
            current_size: SizeConfig::default(),
            forecast_size: SizeConfig::default(),
            forecast_limit: 6,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    pub anchor: AnchorConfig,
    pub size: SizeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisplayEntry {
    pub id: NodeId,
}

/// Configuration of every item renderer plus the known displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub climate: ClimateConfig,
    pub billing: BillingConfig,
    pub weather: WeatherConfig,
    pub timestamp: TimestampConfig,
    pub displays: Vec<DisplayEntry>,
}

/// Known display nodes. Requests for any other node are rejected before a
/// renderer runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayConfig {
    displays: BTreeSet<NodeId>,
}

impl DisplayConfig {
    pub fn new(entries: &[DisplayEntry]) -> Self {
        Self {
            displays: entries.iter().map(|entry| entry.id.clone()).collect(),
        }
    }

    pub fn exists(&self, node_id: &str) -> bool {
        self.displays.contains(&NodeId::new(node_id))
    }

    /// All configured display ids, sorted.
    pub fn all(&self) -> Vec<NodeId> {
        self.displays.iter().cloned().collect()
    }
}

/// Accept display indices written as numbers or numeric strings.
fn display_index<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid display index: {s}"))),
    }
}
