//! Item renderer capability
//!
//! Every piece of a display response implements [`ItemRenderer`]: the three
//! aggregators, the compositor itself, and the two stateless items below.
//! The compositor holds them as `Arc<dyn ItemRenderer>` and calls them
//! uniformly.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use types::ids::{NodeId, RenderId};
use types::layout::{Point, Size};

use crate::error::RenderError;
use crate::format::format_timestamp;
use crate::observe::ObserveOutcome;
use crate::template::{render_view, Template};

/// Clock used by items that stamp the current time.
pub type Clock = fn() -> DateTime<Utc>;

/// A unit producing one display fragment plus its footprint.
#[async_trait]
pub trait ItemRenderer: Send + Sync {
    /// Render the current state into a markup fragment. An empty string means
    /// there is nothing to show.
    fn content(&self) -> Result<String, RenderError>;

    /// Footprint on the panel.
    fn size(&self) -> Size;

    /// Keep state current until `cancel` fires or the event stream ends.
    /// Renderers without an event source return immediately.
    async fn observe(&self, _cancel: CancellationToken) -> ObserveOutcome {
        ObserveOutcome::NothingToObserve
    }
}

#[derive(Serialize)]
struct TimestampData {
    anchor: Point,
    timestamp: String,
}

/// Renders the time of the response.
pub struct TimestampRenderer {
    template: Arc<dyn Template>,
    anchor: Point,
    size: Size,
    clock: Clock,
}

impl TimestampRenderer {
    pub fn new(template: Arc<dyn Template>, anchor: Point, size: Size) -> Self {
        Self {
            template,
            anchor,
            size,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock, e.g. to render a fixed time.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl ItemRenderer for TimestampRenderer {
    fn content(&self) -> Result<String, RenderError> {
        let data = TimestampData {
            anchor: self.anchor,
            timestamp: format_timestamp((self.clock)()),
        };
        render_view(self.template.as_ref(), &data)
    }

    fn size(&self) -> Size {
        self.size
    }
}

#[derive(Serialize)]
struct ErrorData {
    render_id: String,
    node_id: String,
    message: String,
    timestamp: String,
}

/// Renders an error message box for a node.
pub struct ErrorRenderer {
    template: Arc<dyn Template>,
    node_id: NodeId,
    message: String,
    clock: Clock,
}

impl ErrorRenderer {
    pub const SIZE: Size = Size {
        height: 124,
        width: 400,
    };

    pub fn new(template: Arc<dyn Template>, node_id: NodeId, message: impl Into<String>) -> Self {
        Self {
            template,
            node_id,
            message: sanitize_message(&message.into()),
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Message as it will be rendered.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[async_trait]
impl ItemRenderer for ErrorRenderer {
    fn content(&self) -> Result<String, RenderError> {
        let data = ErrorData {
            render_id: RenderId::new().to_string(),
            node_id: self.node_id.to_string(),
            message: self.message.clone(),
            timestamp: format_timestamp((self.clock)()),
        };
        render_view(self.template.as_ref(), &data)
    }

    fn size(&self) -> Size {
        Self::SIZE
    }
}

/// Make a message safe to place inside a JSON string literal of a template.
fn sanitize_message(message: &str) -> String {
    message
        .replace('\\', "\\\\")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace('"', "'")
}
