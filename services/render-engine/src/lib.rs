//! Render Engine
//!
//! Consumes domain events and keeps live render state for an e-ink display:
//! - Indoor climate per room (temperature, humidity, battery)
//! - Latest billing report total with currency conversion
//! - Current weather and forecast
//! - Timestamp and error items
//! - Response composition with a partial-failure policy
//!
//! Aggregators bootstrap from the event source history, then fold live
//! events on a background task while request handlers read snapshots.
//!
//! # Architecture
//!
//! ```text
//!            Event Source
//!                 │
//!   ┌─────────────┼─────────────┐
//!   │             │             │
//! ┌─▼──────┐  ┌───▼────┐  ┌─────▼───┐
//! │Climate │  │Billing │  │Weather  │   ← fold under lock
//! └─┬──────┘  └───┬────┘  └─────┬───┘
//!   │             │             │
//! ┌─▼─────────────▼─────────────▼──┐
//! │     Response Compositor        │   ← snapshot, render, join
//! └────────────────────────────────┘
//! ```

pub mod billing;
pub mod climate;
pub mod compositor;
pub mod config;
pub mod error;
pub mod format;
pub mod metrics;
pub mod observe;
pub mod renderer;
pub mod source;
pub mod template;
pub mod weather;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
