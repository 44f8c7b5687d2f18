//! Indoor climate aggregator
//!
//! Groups sensor readings by room and renders one element per room, left to
//! right in display-index order.
//!
//! - Readings from devices without a configured room are ignored.
//! - A room's state is created on its first reading with `--` placeholders
//!   and is never removed.
//! - Each reading overwrites exactly the one field named by its measurement.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use types::events::{Event, EventPayload, MeasurementType, Topic};
use types::ids::{DeviceId, RoomId};
use types::layout::{Point, Size, Spacing};

use crate::config::ClimateConfig;
use crate::error::RenderError;
use crate::format::{
    battery_icon, battery_icon_color, format_humidity, format_temperature, BatteryIcon, TextColor,
    UNKNOWN_VALUE,
};
use crate::metrics::RenderMetrics;
use crate::observe::{run_observer, ObserveOutcome};
use crate::renderer::ItemRenderer;
use crate::source::EventSource;
use crate::template::{render_view, Template};

#[derive(Debug, Clone, PartialEq, Eq)]
struct RoomInfo {
    name: String,
    display_index: u32,
}

/// Static device → room and room → {name, display index} mapping.
#[derive(Debug, Clone, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, RoomInfo>,
    devices: HashMap<DeviceId, RoomId>,
}

impl RoomDirectory {
    /// Build the directory from configuration. Rooms without a name are
    /// called `Room <n>` and rooms without a display index get their list
    /// position; devices without a room are skipped.
    pub fn from_config(config: &ClimateConfig) -> Self {
        let rooms = config
            .rooms
            .iter()
            .enumerate()
            .map(|(idx, room)| {
                let info = RoomInfo {
                    name: room.name.clone().unwrap_or_else(|| format!("Room {}", idx)),
                    display_index: room
                        .display_index
                        .unwrap_or_else(|| u32::try_from(idx).unwrap_or(u32::MAX)),
                };
                (room.id.clone(), info)
            })
            .collect();

        let devices = config
            .devices
            .iter()
            .filter_map(|device| {
                device
                    .room_id
                    .as_ref()
                    .map(|room_id| (device.id.clone(), room_id.clone()))
            })
            .collect();

        Self { rooms, devices }
    }

    pub fn room_for(&self, device_id: &DeviceId) -> Option<&RoomId> {
        self.devices.get(device_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Fresh state for a room, seeded with its configured name and index.
    fn new_state(&self, room_id: &RoomId) -> RoomClimate {
        let mut state = RoomClimate::default();
        if let Some(info) = self.rooms.get(room_id) {
            state.room_name = info.name.clone();
            state.display_index = info.display_index;
        }
        state
    }
}

/// Last known climate of one room, as handed to the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomClimate {
    pub room_name: String,
    pub display_index: u32,
    pub temperature: String,
    pub humidity: String,
    pub battery_icon: BatteryIcon,
    pub battery_icon_color: TextColor,
    pub anchor: Point,
}

impl Default for RoomClimate {
    fn default() -> Self {
        Self {
            room_name: "Room".to_string(),
            display_index: 0,
            temperature: UNKNOWN_VALUE.to_string(),
            humidity: UNKNOWN_VALUE.to_string(),
            battery_icon: BatteryIcon::Empty,
            battery_icon_color: TextColor::Black,
            anchor: Point::default(),
        }
    }
}

impl RoomClimate {
    fn apply(&mut self, measurement: MeasurementType, value: &str) {
        match measurement {
            MeasurementType::Temperature => self.temperature = format_temperature(value),
            MeasurementType::Humidity => self.humidity = format_humidity(value),
            MeasurementType::Battery => {
                self.battery_icon = battery_icon(value);
                self.battery_icon_color = battery_icon_color(value);
            }
        }
    }
}

/// Renders one climate element per room.
pub struct ClimateAggregator {
    source: Arc<dyn EventSource>,
    template: Arc<dyn Template>,
    directory: RoomDirectory,
    anchor: Point,
    size: Size,
    spacing: Spacing,
    rooms: Mutex<HashMap<RoomId, RoomClimate>>,
    metrics: Arc<RenderMetrics>,
}

impl ClimateAggregator {
    pub fn new(config: &ClimateConfig, template: Arc<dyn Template>, source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            template,
            directory: RoomDirectory::from_config(config),
            anchor: config.anchor.point(),
            size: config.size.size(),
            spacing: config.spacing.spacing(),
            rooms: Mutex::new(HashMap::new()),
            metrics: Arc::new(RenderMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RenderMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Horizontal distance between two room elements.
    pub fn column_pitch(&self) -> u32 {
        self.size.width.saturating_add(self.spacing.horizontal())
    }

    /// Fold every retained climate reading.
    ///
    /// Rooms touched by the history are replaced wholesale. On a fetch
    /// failure the current state is kept.
    pub fn bootstrap(&self) -> Result<usize, RenderError> {
        let events = match self.source.all(Topic::IndoorClimate) {
            Ok(events) => events,
            Err(err) => {
                error!(error = %err, "Unable to fetch indoor climate history");
                self.metrics.record_bootstrap_failure();
                return Err(err.into());
            }
        };
        info!(count = events.len(), "Fetched indoor climate history");

        let mut fresh = HashMap::new();
        for event in &events {
            self.fold_into(&mut fresh, event);
        }
        let replaced = fresh.len();
        self.lock().extend(fresh);
        Ok(replaced)
    }

    /// Apply one event. Returns whether any room changed.
    pub fn fold(&self, event: &Event) -> bool {
        let mut rooms = self.lock();
        self.fold_into(&mut rooms, event)
    }

    /// Current room states in display order.
    pub fn rooms(&self) -> Vec<(RoomId, RoomClimate)> {
        let mut rooms: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, climate)| (id.clone(), climate.clone()))
            .collect();
        rooms.sort_by(|(a_id, a), (b_id, b)| {
            a.display_index
                .cmp(&b.display_index)
                .then_with(|| a_id.cmp(b_id))
        });
        rooms
    }

    fn fold_into(&self, rooms: &mut HashMap<RoomId, RoomClimate>, event: &Event) -> bool {
        let (device_id, measurement, value) = match &event.payload {
            EventPayload::ClimateReading {
                device_id,
                measurement,
                value,
            } => (device_id, *measurement, value),
            _ => {
                self.metrics.record_ignored();
                return false;
            }
        };

        let Some(room_id) = self.directory.room_for(device_id) else {
            debug!(device = %device_id, "Reading from unmapped device ignored");
            self.metrics.record_ignored();
            return false;
        };

        rooms
            .entry(room_id.clone())
            .or_insert_with(|| self.directory.new_state(room_id))
            .apply(measurement, value);
        self.metrics.record_fold();
        debug!(room = %room_id, measurement = ?measurement, "Room climate updated");
        true
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RoomId, RoomClimate>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ItemRenderer for ClimateAggregator {
    fn content(&self) -> Result<String, RenderError> {
        if self.directory.room_count() == 0 {
            debug!("No rooms configured, nothing to render");
            return Ok(String::new());
        }

        let pitch = self.column_pitch();
        let mut anchor = self.anchor;
        let mut content = String::new();
        for (_, mut climate) in self.rooms() {
            climate.anchor = anchor;
            content.push_str(&render_view(self.template.as_ref(), &climate)?);
            anchor = anchor.offset_x(pitch);
        }
        Ok(content)
    }

    fn size(&self) -> Size {
        let columns = u32::try_from(self.lock().len()).unwrap_or(u32::MAX);
        Size::new(self.size.height, self.column_pitch().saturating_mul(columns))
    }

    async fn observe(&self, cancel: CancellationToken) -> ObserveOutcome {
        let events = self.source.observe(&[Topic::IndoorClimate]);
        run_observer("indoor_climate", events, cancel, |event| {
            self.fold(&event);
        })
        .await
    }
}
