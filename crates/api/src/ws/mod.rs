//! WebSocket push channel for dashboards.
//!
//! [`DashboardHub`] holds the connected clients and their bounded queues,
//! [`ws_handler`] upgrades a request and serves one client, and
//! [`start_relay`] turns live-telemetry changes into pushed frames.

pub mod frames;
pub mod hub;
pub mod relay;
mod session;

pub use frames::{ClientCommand, LiveMessage};
pub use hub::DashboardHub;
pub use relay::start_relay;
pub use session::ws_handler;
