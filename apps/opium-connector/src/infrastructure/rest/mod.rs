//! Opium REST integration: HTTP client, wire types, and the port adapter.

pub mod api_types;
mod adapter;
mod client;
mod error;

pub use adapter::OpiumRestAdapter;
pub use client::{OpiumHttpClient, RetryConfig};
pub use error::OpiumApiError;
