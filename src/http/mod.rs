//! HTTP client for the key endpoint, with deadline-bounded retries.

mod client;
mod retry;

pub use client::{GatewayClient, GatewayClientBuilder};
pub use retry::DeadlineBackoff;
