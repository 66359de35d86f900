//! Poke gateway
//!
//! HTTP front door for one-shot broker publishes: `POST /send-message`
//! relays a single message through a transient broker session and
//! `GET /health` reports liveness.

pub mod adapter;
pub mod config;
pub mod error;
pub mod server;

pub use adapter::{error_response, normalize_send_body};
pub use config::{GatewayConfig, RelayDefaults, ServerConfig};
pub use error::{GatewayError, Result};
pub use server::{routes, AppState, GatewayServer};
