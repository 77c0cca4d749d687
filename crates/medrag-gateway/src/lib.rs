//! HTTP chat front end: static page, form and JSON question endpoints, health.

mod error;
mod handlers;
mod router;
mod server;

pub use error::GatewayError;
pub use router::build_router;
pub use server::{AppState, GatewayServer};
