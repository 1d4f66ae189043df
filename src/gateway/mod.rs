pub mod client;
pub mod error;
pub mod models;

pub use client::GatewayClient;
pub use error::{DeclineKind, GatewayError, GatewayResponse};
