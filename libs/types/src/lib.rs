//! Types library for the e-ink display renderer
//!
//! This library provides the vocabulary shared by the render engine and the
//! gateway: identifiers, the tagged event union consumed from the event
//! source, and panel geometry.
//!
//! # Modules
//! - `ids`: Identifiers (DeviceId, RoomId, NodeId, RenderId)
//! - `events`: Event union (climate readings, billing reports, exchange rates, weather)
//! - `layout`: Panel geometry (Point, Size, Spacing)

// Public modules
pub mod events;
pub mod ids;
pub mod layout;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::events::*;
    pub use crate::ids::*;
    pub use crate::layout::*;
}
